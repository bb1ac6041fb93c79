use async_trait::async_trait;
use chrono::Utc;
use deadpool_redis::{Config, Connection, Pool, Runtime};
use redis::AsyncCommands;
use tracing::{debug, info};
use uuid::Uuid;

use crate::services::queue::NotificationQueue;
use crate::{JobStatus, NotificationError, NotificationJob, QueueStats};

const PENDING_KEY: &str = "notification_queue:pending";
const PROCESSING_KEY: &str = "notification_queue:processing";
const TOTALS_KEY: &str = "notification_queue:totals";

fn job_key(job_id: Uuid) -> String {
    format!("notification_job:{}", job_id)
}

fn pool_error(context: &'static str, detail: String) -> NotificationError {
    NotificationError::RedisError(redis::RedisError::from((
        redis::ErrorKind::IoError,
        context,
        detail,
    )))
}

/// Redis-backed queue: a pending list, a processing list and one hash per job.
///
/// A job stays on the processing list from dequeue until it is delivered,
/// failed for good, or requeued, so a retry waiting out its backoff is never
/// off both lists. Counters live in Redis and are shared by every instance.
pub struct RedisNotificationQueue {
    pool: Pool,
}

impl RedisNotificationQueue {
    pub async fn new(redis_url: &str) -> Result<Self, NotificationError> {
        let cfg = Config::from_url(redis_url);
        let pool = cfg
            .create_pool(Some(Runtime::Tokio1))
            .map_err(|e| pool_error("Failed to create Redis pool", e.to_string()))?;

        let mut conn = pool
            .get()
            .await
            .map_err(|e| pool_error("Failed to connect to Redis", e.to_string()))?;

        let _: String = redis::cmd("PING").query_async(&mut conn).await?;
        info!("Redis notification queue initialized");

        Ok(Self { pool })
    }

    async fn get_connection(&self) -> Result<Connection, NotificationError> {
        self.pool
            .get()
            .await
            .map_err(|e| pool_error("Failed to get Redis connection", e.to_string()))
    }

    async fn write_job(&self, conn: &mut Connection, job: &NotificationJob) -> Result<(), NotificationError> {
        let key = job_key(job.job_id);
        let data = serde_json::to_string(job)?;
        let status = serde_json::to_string(&job.status)?;

        let _: () = conn
            .hset_multiple(
                &key,
                &[
                    ("data", data.as_str()),
                    ("status", status.as_str()),
                    ("updated_at", job.updated_at.to_rfc3339().as_str()),
                ],
            )
            .await?;
        // Job hashes live for 7 days
        let _: () = conn.expire(&key, 604_800).await?;
        Ok(())
    }

    async fn read_job(&self, conn: &mut Connection, job_id: &str) -> Result<Option<NotificationJob>, NotificationError> {
        let data: Option<String> = conn.hget(format!("notification_job:{}", job_id), "data").await?;
        match data {
            Some(raw) => Ok(Some(serde_json::from_str(&raw)?)),
            None => Ok(None),
        }
    }
}

#[async_trait]
impl NotificationQueue for RedisNotificationQueue {
    async fn enqueue(&self, job: &NotificationJob) -> Result<(), NotificationError> {
        let mut conn = self.get_connection().await?;
        self.write_job(&mut conn, job).await?;
        let _: () = conn.lpush(PENDING_KEY, job.job_id.to_string()).await?;

        debug!("Job {} enqueued", job.job_id);
        Ok(())
    }

    async fn dequeue(&self, worker_id: &str) -> Result<Option<NotificationJob>, NotificationError> {
        let mut conn = self.get_connection().await?;

        // Atomic move from pending to processing
        let job_id: Option<String> = conn.brpoplpush(PENDING_KEY, PROCESSING_KEY, 1.0).await?;
        let Some(job_id) = job_id else {
            return Ok(None);
        };

        let Some(mut job) = self.read_job(&mut conn, &job_id).await? else {
            // Hash expired while the id was still listed
            let _: () = conn.lrem(PROCESSING_KEY, 1, &job_id).await?;
            return Ok(None);
        };

        job.transition(JobStatus::Delivering)?;
        job.worker_id = Some(worker_id.to_string());
        self.write_job(&mut conn, &job).await?;

        debug!("Job {} dequeued by worker {}", job.job_id, worker_id);
        Ok(Some(job))
    }

    async fn update_job(&self, job: &NotificationJob) -> Result<(), NotificationError> {
        let mut conn = self.get_connection().await?;
        self.write_job(&mut conn, job).await?;

        if job.status.is_terminal() {
            let _: () = conn.lrem(PROCESSING_KEY, 1, job.job_id.to_string()).await?;
        }

        let counter = match job.status {
            JobStatus::Delivered => Some("delivered"),
            JobStatus::Failed => Some("failed"),
            JobStatus::Retrying => Some("retried"),
            JobStatus::Queued | JobStatus::Delivering => None,
        };
        if let Some(field) = counter {
            let _: () = conn.hincr(TOTALS_KEY, field, 1).await?;
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

        let mut conn = self.get_connection().await?;
        let mut stored = job.clone();
        stored.updated_at = Utc::now();
        self.write_job(&mut conn, &stored).await?;

        let job_id = job.job_id.to_string();
        let _: () = redis::pipe()
            .atomic()
            .lrem(PROCESSING_KEY, 1, &job_id)
            .ignore()
            .lpush(PENDING_KEY, &job_id)
            .ignore()
            .query_async(&mut conn)
            .await?;

        info!("Job {} requeued (attempt {}/{})", job.job_id, job.attempts, job.max_attempts);
        Ok(())
    }

    async fn get_job(&self, job_id: Uuid) -> Result<Option<NotificationJob>, NotificationError> {
        let mut conn = self.get_connection().await?;
        self.read_job(&mut conn, &job_id.to_string()).await
    }

    async fn stats(&self) -> Result<QueueStats, NotificationError> {
        let mut conn = self.get_connection().await?;
        let queued: u64 = conn.llen(PENDING_KEY).await?;
        let in_flight: u64 = conn.llen(PROCESSING_KEY).await?;
        let (delivered, retried, failed): (Option<u64>, Option<u64>, Option<u64>) = redis::cmd("HMGET")
            .arg(TOTALS_KEY)
            .arg("delivered")
            .arg("retried")
            .arg("failed")
            .query_async(&mut conn)
            .await?;

        Ok(QueueStats {
            queued_jobs: queued,
            delivering_jobs: in_flight,
            delivered_total: delivered.unwrap_or(0),
            retried_total: retried.unwrap_or(0),
            failed_total: failed.unwrap_or(0),
        })
    }
}
