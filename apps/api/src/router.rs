use std::sync::Arc;

use axum::{routing::get, Router};

use appointment_cell::{scheduling_routes, SchedulingState};
use notification_queue_cell::{notification_routes, NotificationQueue};

pub fn create_router(state: Arc<SchedulingState>, queue: Arc<dyn NotificationQueue>) -> Router {
    Router::new()
        .route("/", get(|| async { "Clinic scheduling API is running!" }))
        .merge(scheduling_routes(state))
        .nest("/notifications", notification_routes(queue))
}
