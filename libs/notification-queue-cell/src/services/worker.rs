use std::sync::Arc;

use tokio::sync::{watch, Mutex};
use tokio::task::JoinSet;
use tokio::time::{timeout, Duration};
use tracing::{debug, error, info, instrument, warn};

use crate::services::{queue::NotificationQueue, transport::NotificationTransport};
use crate::{JobStatus, NotificationError, NotificationJob, WorkerConfig};

/// Outcome of handling one job, mostly useful to tests and logs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DeliveryOutcome {
    Delivered,
    Retrying { attempt: u32, delay: Duration },
    Failed { attempts: u32 },
}

pub struct NotificationWorker {
    worker_id: String,
    config: WorkerConfig,
    queue: Arc<dyn NotificationQueue>,
    transport: Arc<dyn NotificationTransport>,
    shutdown_tx: Arc<watch::Sender<bool>>,
    /// Backoff timers of jobs waiting to be requeued.
    retries: Arc<Mutex<JoinSet<()>>>,
}

impl NotificationWorker {
    pub fn new(
        config: WorkerConfig,
        queue: Arc<dyn NotificationQueue>,
        transport: Arc<dyn NotificationTransport>,
    ) -> Self {
        Self {
            worker_id: config.worker_id.clone(),
            config,
            queue,
            transport,
            shutdown_tx: Arc::new(watch::Sender::new(false)),
            retries: Arc::new(Mutex::new(JoinSet::new())),
        }
    }

    /// Runs `concurrency` delivery loops until `shutdown` is called.
    #[instrument(skip(self), fields(worker_id = %self.worker_id))]
    pub async fn start(&self) -> Result<(), NotificationError> {
        info!("Starting notification worker {}", self.worker_id);

        let handles: Vec<_> = (0..self.config.concurrency.max(1))
            .map(|i| {
                let worker = self.clone_for_loop();
                let loop_name = format!("{}-{}", self.worker_id, i);
                tokio::spawn(async move { worker.worker_loop(loop_name).await })
            })
            .collect();

        for result in futures::future::join_all(handles).await {
            if let Err(e) = result {
                error!("Notification worker loop panicked: {}", e);
            }
        }

        // Loops may have scheduled retries while shutdown was draining
        self.drain_retries().await;
        info!("Notification worker {} stopped", self.worker_id);
        Ok(())
    }

    /// Stops the loops and cuts pending backoffs short: every job waiting
    /// for a retry is back on the queue when this returns.
    pub async fn shutdown(&self) {
        info!("Initiating graceful shutdown for notification worker {}", self.worker_id);
        self.shutdown_tx.send_replace(true);
        self.drain_retries().await;
    }

    async fn drain_retries(&self) {
        let mut retries = self.retries.lock().await;
        while let Some(result) = retries.join_next().await {
            if let Err(e) = result {
                error!("Notification retry task ended abnormally: {}", e);
            }
        }
    }

    pub async fn is_shutdown(&self) -> bool {
        *self.shutdown_tx.borrow()
    }

    /// Claims at most one job and handles it. Returns `None` when the queue was empty.
    pub async fn process_next(&self) -> Result<Option<DeliveryOutcome>, NotificationError> {
        match self.queue.dequeue(&self.worker_id).await? {
            Some(job) => self.process_job(job).await.map(Some),
            None => Ok(None),
        }
    }

    /// Backoff before the retry that follows `attempt` failed deliveries.
    pub fn retry_delay(&self, attempt: u32) -> Duration {
        let exponent = attempt.saturating_sub(1).min(16);
        let delay_ms = self
            .config
            .base_backoff_ms
            .saturating_mul(1u64 << exponent)
            .min(self.config.max_backoff_ms);
        Duration::from_millis(delay_ms)
    }

    async fn worker_loop(&self, loop_name: String) {
        debug!("Notification loop started: {}", loop_name);

        while !self.is_shutdown().await {
            match self.queue.dequeue(&loop_name).await {
                Ok(Some(job)) => {
                    if let Err(e) = self.process_job(job).await {
                        error!("Loop {} failed to process notification job: {}", loop_name, e);
                    }
                }
                // dequeue already waited for work
                Ok(None) => {}
                Err(e) => {
                    error!("Loop {} failed to dequeue notification job: {}", loop_name, e);
                    tokio::time::sleep(Duration::from_millis(self.config.error_backoff_ms)).await;
                }
            }
        }

        debug!("Notification loop ended: {}", loop_name);
    }

    #[instrument(skip(self, job), fields(job_id = %job.job_id, kind = %job.notification.kind))]
    async fn process_job(&self, mut job: NotificationJob) -> Result<DeliveryOutcome, NotificationError> {
        job.attempts += 1;
        let delivery_timeout = Duration::from_millis(self.config.delivery_timeout_ms);

        let result = match timeout(delivery_timeout, self.transport.deliver(&job.notification)).await {
            Ok(result) => result,
            Err(_) => Err(NotificationError::DeliveryTimeout {
                timeout_ms: self.config.delivery_timeout_ms,
            }),
        };

        match result {
            Ok(()) => {
                job.last_error = None;
                job.transition(JobStatus::Delivered)?;
                self.queue.update_job(&job).await?;
                info!("Notification job {} delivered on attempt {}", job.job_id, job.attempts);
                Ok(DeliveryOutcome::Delivered)
            }
            Err(e) if job.can_retry() => {
                job.last_error = Some(e.to_string());
                job.transition(JobStatus::Retrying)?;
                self.queue.update_job(&job).await?;

                let delay = self.retry_delay(job.attempts);
                warn!(
                    "Notification job {} failed (attempt {}/{}), retrying in {:?}: {}",
                    job.job_id, job.attempts, job.max_attempts, delay, e
                );

                let attempt = job.attempts;
                self.schedule_retry(job, delay).await;

                Ok(DeliveryOutcome::Retrying { attempt, delay })
            }
            Err(e) => {
                job.last_error = Some(e.to_string());
                job.transition(JobStatus::Failed)?;
                self.queue.update_job(&job).await?;

                let exhausted = NotificationError::MaxAttemptsExceeded {
                    job_id: job.job_id.to_string(),
                    max_attempts: job.max_attempts,
                };
                error!("{}: last error: {}", exhausted, e);
                Ok(DeliveryOutcome::Failed { attempts: job.attempts })
            }
        }
    }

    /// Requeues `job` after `delay`, or right away once shutdown starts.
    /// The queue keeps the job claimed until then.
    async fn schedule_retry(&self, job: NotificationJob, delay: Duration) {
        let queue = Arc::clone(&self.queue);
        let stop = self.shutdown_tx.subscribe();

        let mut retries = self.retries.lock().await;
        while let Some(finished) = retries.try_join_next() {
            if let Err(e) = finished {
                error!("Notification retry task ended abnormally: {}", e);
            }
        }

        retries.spawn(async move {
            tokio::select! {
                _ = tokio::time::sleep(delay) => {}
                _ = shutdown_started(stop) => {
                    debug!("Shutdown cut backoff short for job {}", job.job_id);
                }
            }
            if let Err(e) = queue.requeue(&job).await {
                error!("Failed to requeue notification job {}: {}", job.job_id, e);
            }
        });
    }

    fn clone_for_loop(&self) -> Self {
        Self {
            worker_id: self.worker_id.clone(),
            config: self.config.clone(),
            queue: Arc::clone(&self.queue),
            transport: Arc::clone(&self.transport),
            shutdown_tx: Arc::clone(&self.shutdown_tx),
            retries: Arc::clone(&self.retries),
        }
    }
}

async fn shutdown_started(mut stop: watch::Receiver<bool>) {
    let _ = stop.wait_for(|stopped| *stopped).await;
}
