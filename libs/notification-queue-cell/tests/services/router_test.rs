use std::sync::Arc;

use axum::{
    body::{to_bytes, Body},
    http::{Request, StatusCode},
};
use serde_json::Value;
use tower::ServiceExt;
use uuid::Uuid;

use notification_queue_cell::*;

use super::sample_notification;

async fn body_json(response: axum::response::Response) -> Value {
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    serde_json::from_slice(&bytes).unwrap()
}

#[tokio::test]
async fn test_get_job_returns_stored_job() {
    let queue = Arc::new(MemoryNotificationQueue::default());
    let job = NotificationJob::new(sample_notification(NotificationKind::Confirmed), 3);
    queue.enqueue(&job).await.unwrap();

    let app = notification_routes(queue);
    let response = app
        .oneshot(
            Request::builder()
                .uri(format!("/jobs/{}", job.job_id))
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let body = body_json(response).await;
    assert_eq!(body["job"]["status"], "Queued");
    assert_eq!(body["job"]["notification"]["kind"], "confirmed");
}

#[tokio::test]
async fn test_get_unknown_job_is_404() {
    let app = notification_routes(Arc::new(MemoryNotificationQueue::default()));
    let response = app
        .oneshot(
            Request::builder()
                .uri(format!("/jobs/{}", Uuid::new_v4()))
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_stats_endpoint() {
    let queue = Arc::new(MemoryNotificationQueue::default());
    queue
        .enqueue(&NotificationJob::new(sample_notification(NotificationKind::Updated), 3))
        .await
        .unwrap();

    let response = notification_routes(queue)
        .oneshot(Request::builder().uri("/stats").body(Body::empty()).unwrap())
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(body_json(response).await["stats"]["queued_jobs"], 1);
}
