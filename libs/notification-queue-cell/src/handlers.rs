use std::sync::Arc;

use axum::{
    extract::{Path, State},
    response::Json,
};
use serde_json::{json, Value};
use tracing::{debug, error};
use uuid::Uuid;

use shared_models::error::AppError;

use crate::services::queue::NotificationQueue;

/// Get a notification job by id
pub async fn get_job(
    State(queue): State<Arc<dyn NotificationQueue>>,
    Path(job_id): Path<Uuid>,
) -> Result<Json<Value>, AppError> {
    debug!("Notification job lookup: {}", job_id);

    let job = queue.get_job(job_id).await.map_err(|e| {
        error!("Failed to load notification job {}: {}", job_id, e);
        AppError::Internal(e.to_string())
    })?;

    match job {
        Some(job) => Ok(Json(json!({ "job": job }))),
        None => Err(AppError::NotFound(format!("Notification job {} not found", job_id))),
    }
}

/// Queue depth and delivery counters
pub async fn get_queue_stats(
    State(queue): State<Arc<dyn NotificationQueue>>,
) -> Result<Json<Value>, AppError> {
    let stats = queue.stats().await.map_err(|e| {
        error!("Failed to read notification queue stats: {}", e);
        AppError::Internal(e.to_string())
    })?;
    Ok(Json(json!({ "stats": stats })))
}
