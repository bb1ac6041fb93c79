use thiserror::Error;

#[derive(Error, Debug)]
pub enum NotificationError {
    #[error("Job not found: {0}")]
    JobNotFound(String),

    #[error("Invalid job status transition from {from} to {to}")]
    InvalidStatusTransition { from: String, to: String },

    #[error("Redis connection error: {0}")]
    RedisError(#[from] redis::RedisError),

    #[error("Serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),

    #[error("Delivery failed: {0}")]
    DeliveryFailed(String),

    #[error("Delivery timeout: transport took longer than {timeout_ms} ms")]
    DeliveryTimeout { timeout_ms: u64 },

    #[error("Maximum delivery attempts ({max_attempts}) exceeded for job {job_id}")]
    MaxAttemptsExceeded { job_id: String, max_attempts: u32 },
}
