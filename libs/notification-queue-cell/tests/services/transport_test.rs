use assert_matches::assert_matches;
use serde_json::json;
use wiremock::matchers::{body_json, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use notification_queue_cell::*;

use super::sample_notification;

#[tokio::test]
async fn test_webhook_posts_notification_as_json() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/notify"))
        .and(body_json(json!({
            "recipient": 7,
            "appointment_id": 11,
            "kind": "confirmed",
            "date": "2024-05-01",
            "time": "09:00"
        })))
        .respond_with(ResponseTemplate::new(202))
        .expect(1)
        .mount(&server)
        .await;

    let transport = WebhookTransport::new(format!("{}/notify", server.uri())).unwrap();
    transport
        .deliver(&sample_notification(NotificationKind::Confirmed))
        .await
        .unwrap();
}

#[tokio::test]
async fn test_webhook_error_status_is_delivery_failure() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(503).set_body_string("down for maintenance"))
        .mount(&server)
        .await;

    let transport = WebhookTransport::new(server.uri()).unwrap();
    let result = transport
        .deliver(&sample_notification(NotificationKind::Cancelled))
        .await;

    assert_matches!(result, Err(NotificationError::DeliveryFailed(msg)) if msg.contains("503"));
}

#[tokio::test]
async fn test_log_transport_always_succeeds() {
    let result = LogTransport
        .deliver(&sample_notification(NotificationKind::Updated))
        .await;
    assert!(result.is_ok());
}
