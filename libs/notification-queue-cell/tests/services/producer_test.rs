use std::sync::Arc;
use std::time::Duration;

use notification_queue_cell::*;

use super::sample_notification;

#[tokio::test]
async fn test_enqueue_creates_queued_job_with_configured_attempts() {
    let queue = Arc::new(MemoryNotificationQueue::new(Duration::from_millis(20)));
    let producer = NotificationProducer::new(queue.clone(), 4);

    let job = producer
        .enqueue(sample_notification(NotificationKind::Confirmed))
        .await
        .unwrap();

    assert_eq!(job.status, JobStatus::Queued);
    assert_eq!(job.max_attempts, 4);
    let stored = queue.get_job(job.job_id).await.unwrap().expect("stored job");
    assert_eq!(stored.notification, sample_notification(NotificationKind::Confirmed));
}

#[tokio::test]
async fn test_send_enqueues_in_background() {
    let queue = Arc::new(MemoryNotificationQueue::new(Duration::from_millis(20)));
    let producer = NotificationProducer::new(queue.clone(), 3);

    producer.send(sample_notification(NotificationKind::Cancelled));

    let claimed = tokio::time::timeout(Duration::from_secs(1), async {
        loop {
            if let Some(job) = queue.dequeue("w1").await.unwrap() {
                return job;
            }
        }
    })
    .await
    .expect("background enqueue should land");
    assert_eq!(claimed.notification.kind, NotificationKind::Cancelled);
}

#[test]
fn test_send_without_runtime_does_not_panic() {
    let queue = Arc::new(MemoryNotificationQueue::default());
    let producer = NotificationProducer::new(queue, 3);
    producer.send(sample_notification(NotificationKind::Updated));
}
