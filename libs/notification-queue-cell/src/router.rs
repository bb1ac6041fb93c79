use std::sync::Arc;

use axum::{routing::get, Router};

use crate::handlers::{get_job, get_queue_stats};
use crate::services::queue::NotificationQueue;

pub fn notification_routes(queue: Arc<dyn NotificationQueue>) -> Router {
    Router::new()
        .route("/jobs/{job_id}", get(get_job))
        .route("/stats", get(get_queue_stats))
        .with_state(queue)
}
