use std::collections::{HashMap, VecDeque};
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::{Mutex, Notify, RwLock};
use tokio::time::Instant;
use tracing::debug;
use uuid::Uuid;

use crate::{JobStatus, NotificationError, NotificationJob, QueueStats};

/// Durable hand-off point between request handlers and notification workers.
#[async_trait]
pub trait NotificationQueue: Send + Sync {
    async fn enqueue(&self, job: &NotificationJob) -> Result<(), NotificationError>;

    /// Claims the next pending job for `worker_id`, waiting briefly when the
    /// queue is empty. The returned job is already in `Delivering`.
    async fn dequeue(&self, worker_id: &str) -> Result<Option<NotificationJob>, NotificationError>;

    /// Persists the job's current state. A `Retrying` job stays claimed
    /// until `requeue`.
    async fn update_job(&self, job: &NotificationJob) -> Result<(), NotificationError>;

    /// Puts a `Retrying` job back on the pending list.
    async fn requeue(&self, job: &NotificationJob) -> Result<(), NotificationError>;

    async fn get_job(&self, job_id: Uuid) -> Result<Option<NotificationJob>, NotificationError>;

    async fn stats(&self) -> Result<QueueStats, NotificationError>;
}

/// Finished jobs the memory queue keeps for lookups by default.
pub const DEFAULT_RETAINED_FINISHED_JOBS: usize = 1_000;

/// In-process queue used when no Redis URL is configured, and by tests.
///
/// Delivered and failed jobs are kept for lookup until more than
/// `retain_finished` of them exist, then the oldest are dropped.
pub struct MemoryNotificationQueue {
    pending: Mutex<VecDeque<Uuid>>,
    jobs: RwLock<HashMap<Uuid, NotificationJob>>,
    finished: Mutex<VecDeque<Uuid>>,
    retain_finished: usize,
    available: Notify,
    poll_interval: Duration,
    stats: RwLock<QueueStats>,
}

impl Default for MemoryNotificationQueue {
    fn default() -> Self {
        Self::new(Duration::from_millis(250))
    }
}

impl MemoryNotificationQueue {
    pub fn new(poll_interval: Duration) -> Self {
        Self::with_retention(poll_interval, DEFAULT_RETAINED_FINISHED_JOBS)
    }

    pub fn with_retention(poll_interval: Duration, retain_finished: usize) -> Self {
        Self {
            pending: Mutex::new(VecDeque::new()),
            jobs: RwLock::new(HashMap::new()),
            finished: Mutex::new(VecDeque::new()),
            retain_finished,
            available: Notify::new(),
            poll_interval,
            stats: RwLock::new(QueueStats::default()),
        }
    }

    pub async fn pending_len(&self) -> usize {
        self.pending.lock().await.len()
    }

    /// Jobs held in memory, finished ones included.
    pub async fn job_count(&self) -> usize {
        self.jobs.read().await.len()
    }

    async fn retire(&self, job_id: Uuid) {
        let mut finished = self.finished.lock().await;
        finished.push_back(job_id);
        if finished.len() <= self.retain_finished {
            return;
        }

        let mut jobs = self.jobs.write().await;
        while finished.len() > self.retain_finished {
            if let Some(evicted) = finished.pop_front() {
                jobs.remove(&evicted);
                debug!("Job {} evicted from memory queue", evicted);
            }
        }
    }

    async fn claim(&self, worker_id: &str) -> Result<Option<NotificationJob>, NotificationError> {
        let Some(job_id) = self.pending.lock().await.pop_front() else {
            return Ok(None);
        };

        let mut jobs = self.jobs.write().await;
        let job = jobs
            .get_mut(&job_id)
            .ok_or_else(|| NotificationError::JobNotFound(job_id.to_string()))?;
        job.transition(JobStatus::Delivering)?;
        job.worker_id = Some(worker_id.to_string());
        let claimed = job.clone();
        drop(jobs);

        let mut stats = self.stats.write().await;
        stats.queued_jobs = stats.queued_jobs.saturating_sub(1);
        stats.delivering_jobs += 1;

        debug!("Job {} claimed by worker {}", job_id, worker_id);
        Ok(Some(claimed))
    }
}

#[async_trait]
impl NotificationQueue for MemoryNotificationQueue {
    async fn enqueue(&self, job: &NotificationJob) -> Result<(), NotificationError> {
        self.jobs.write().await.insert(job.job_id, job.clone());
        self.pending.lock().await.push_back(job.job_id);
        self.stats.write().await.queued_jobs += 1;
        self.available.notify_one();

        debug!("Job {} enqueued", job.job_id);
        Ok(())
    }

    async fn dequeue(&self, worker_id: &str) -> Result<Option<NotificationJob>, NotificationError> {
        let deadline = Instant::now() + self.poll_interval;
        loop {
            if let Some(job) = self.claim(worker_id).await? {
                return Ok(Some(job));
            }

            // A stored permit may be stale, so keep waiting until the deadline
            let remaining = deadline.saturating_duration_since(Instant::now());
            if remaining.is_zero() {
                return Ok(None);
            }
            let _ = tokio::time::timeout(remaining, self.available.notified()).await;
        }
    }

    async fn update_job(&self, job: &NotificationJob) -> Result<(), NotificationError> {
        let mut jobs = self.jobs.write().await;
        let stored = jobs
            .get_mut(&job.job_id)
            .ok_or_else(|| NotificationError::JobNotFound(job.job_id.to_string()))?;
        *stored = job.clone();
        drop(jobs);

        if job.status.is_terminal() {
            self.retire(job.job_id).await;
        }

        let mut stats = self.stats.write().await;
        match job.status {
            JobStatus::Delivered => {
                stats.delivering_jobs = stats.delivering_jobs.saturating_sub(1);
                stats.delivered_total += 1;
            }
            JobStatus::Failed => {
                stats.delivering_jobs = stats.delivering_jobs.saturating_sub(1);
                stats.failed_total += 1;
            }
            JobStatus::Retrying => {
                stats.delivering_jobs = stats.delivering_jobs.saturating_sub(1);
                stats.retried_total += 1;
            }
            JobStatus::Queued | JobStatus::Delivering => {}
        }
        Ok(())
    }

    async fn requeue(&self, job: &NotificationJob) -> Result<(), NotificationError> {
        if job.status != JobStatus::Retrying {
            return Err(NotificationError::InvalidStatusTransition {
                from: format!("{:?}", job.status),
                to: "Requeued".to_string(),
            });
        }

        self.jobs.write().await.insert(job.job_id, job.clone());
        self.pending.lock().await.push_back(job.job_id);
        self.stats.write().await.queued_jobs += 1;
        self.available.notify_one();
        Ok(())
    }

    async fn get_job(&self, job_id: Uuid) -> Result<Option<NotificationJob>, NotificationError> {
        Ok(self.jobs.read().await.get(&job_id).cloned())
    }

    async fn stats(&self) -> Result<QueueStats, NotificationError> {
        Ok(self.stats.read().await.clone())
    }
}
