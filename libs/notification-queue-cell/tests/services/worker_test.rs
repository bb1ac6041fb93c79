use std::sync::Arc;
use std::time::Duration;

use assert_matches::assert_matches;
use async_trait::async_trait;
use mockall::{mock, predicate};
use wiremock::matchers::method;
use wiremock::{Mock, MockServer, ResponseTemplate};

use notification_queue_cell::*;

use super::{fast_worker_config, sample_notification};

mock! {
    pub Transport {}

    #[async_trait]
    impl NotificationTransport for Transport {
        async fn deliver(&self, notification: &Notification) -> Result<(), NotificationError>;
    }
}

struct SlowTransport(Duration);

#[async_trait]
impl NotificationTransport for SlowTransport {
    async fn deliver(&self, _notification: &Notification) -> Result<(), NotificationError> {
        tokio::time::sleep(self.0).await;
        Ok(())
    }
}

fn memory_queue() -> Arc<MemoryNotificationQueue> {
    Arc::new(MemoryNotificationQueue::new(Duration::from_millis(500)))
}

#[tokio::test]
async fn test_successful_delivery_marks_job_delivered() {
    let queue = memory_queue();
    let producer = NotificationProducer::new(queue.clone(), 3);
    let job = producer
        .enqueue(sample_notification(NotificationKind::Confirmed))
        .await
        .unwrap();

    let mut transport = MockTransport::new();
    transport
        .expect_deliver()
        .with(predicate::eq(sample_notification(NotificationKind::Confirmed)))
        .times(1)
        .returning(|_| Ok(()));

    let worker = NotificationWorker::new(fast_worker_config(1_000), queue.clone(), Arc::new(transport));
    assert_eq!(worker.process_next().await.unwrap(), Some(DeliveryOutcome::Delivered));

    let stored = queue.get_job(job.job_id).await.unwrap().unwrap();
    assert_eq!(stored.status, JobStatus::Delivered);
    assert_eq!(stored.attempts, 1);
    assert!(stored.completed_at.is_some());
    assert_eq!(queue.stats().await.unwrap().delivered_total, 1);
}

#[tokio::test]
async fn test_failed_delivery_retries_then_fails_after_max_attempts() {
    let queue = memory_queue();
    let producer = NotificationProducer::new(queue.clone(), 2);
    let job = producer
        .enqueue(sample_notification(NotificationKind::Updated))
        .await
        .unwrap();

    let mut transport = MockTransport::new();
    transport
        .expect_deliver()
        .times(2)
        .returning(|_| Err(NotificationError::DeliveryFailed("connection refused".to_string())));

    let worker = NotificationWorker::new(fast_worker_config(1_000), queue.clone(), Arc::new(transport));

    assert_eq!(
        worker.process_next().await.unwrap(),
        Some(DeliveryOutcome::Retrying { attempt: 1, delay: Duration::from_millis(10) })
    );

    // The retry is requeued after its backoff; dequeue waits for it.
    assert_eq!(
        worker.process_next().await.unwrap(),
        Some(DeliveryOutcome::Failed { attempts: 2 })
    );

    let stored = queue.get_job(job.job_id).await.unwrap().unwrap();
    assert_eq!(stored.status, JobStatus::Failed);
    assert_eq!(stored.attempts, 2);
    assert_matches!(stored.last_error.as_deref(), Some(msg) if msg.contains("connection refused"));

    let stats = queue.stats().await.unwrap();
    assert_eq!(stats.retried_total, 1);
    assert_eq!(stats.failed_total, 1);
    assert_eq!(stats.delivered_total, 0);
}

#[tokio::test]
async fn test_slow_transport_counts_as_timeout() {
    let queue = memory_queue();
    let producer = NotificationProducer::new(queue.clone(), 1);
    let job = producer
        .enqueue(sample_notification(NotificationKind::Cancelled))
        .await
        .unwrap();

    let worker = NotificationWorker::new(
        fast_worker_config(1_000),
        queue.clone(),
        Arc::new(SlowTransport(Duration::from_secs(5))),
    );

    assert_eq!(
        worker.process_next().await.unwrap(),
        Some(DeliveryOutcome::Failed { attempts: 1 })
    );
    let stored = queue.get_job(job.job_id).await.unwrap().unwrap();
    assert_matches!(stored.last_error.as_deref(), Some(msg) if msg.contains("200 ms"));
}

#[tokio::test]
async fn test_worker_delivers_through_webhook_until_shutdown() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(200))
        .expect(2)
        .mount(&server)
        .await;

    let queue = memory_queue();
    let producer = NotificationProducer::new(queue.clone(), 3);
    producer.enqueue(sample_notification(NotificationKind::Confirmed)).await.unwrap();
    producer.enqueue(sample_notification(NotificationKind::Cancelled)).await.unwrap();

    let transport = Arc::new(WebhookTransport::new(server.uri()).unwrap());
    let worker = Arc::new(NotificationWorker::new(fast_worker_config(1_000), queue.clone(), transport));

    let handle = {
        let worker = worker.clone();
        tokio::spawn(async move { worker.start().await })
    };

    tokio::time::timeout(Duration::from_secs(5), async {
        while queue.stats().await.unwrap().delivered_total < 2 {
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    })
    .await
    .expect("both notifications should be delivered");

    worker.shutdown().await;
    let finished = tokio::time::timeout(Duration::from_secs(5), handle).await;
    assert_matches!(finished, Ok(Ok(Ok(()))));
}

#[tokio::test]
async fn test_process_next_on_empty_queue() {
    let queue = Arc::new(MemoryNotificationQueue::new(Duration::from_millis(10)));
    let worker = NotificationWorker::new(fast_worker_config(1_000), queue, Arc::new(LogTransport));
    assert_eq!(worker.process_next().await.unwrap(), None);
}

#[tokio::test]
async fn test_shutdown_during_backoff_puts_job_back_on_queue() {
    let queue = memory_queue();
    let producer = NotificationProducer::new(queue.clone(), 3);
    let job = producer
        .enqueue(sample_notification(NotificationKind::Confirmed))
        .await
        .unwrap();

    let mut failing = MockTransport::new();
    failing
        .expect_deliver()
        .times(1)
        .returning(|_| Err(NotificationError::DeliveryFailed("gateway down".to_string())));

    let config = WorkerConfig {
        base_backoff_ms: 60_000,
        ..fast_worker_config(60_000)
    };
    let worker = NotificationWorker::new(config, queue.clone(), Arc::new(failing));
    assert_matches!(
        worker.process_next().await.unwrap(),
        Some(DeliveryOutcome::Retrying { attempt: 1, .. })
    );
    assert_eq!(queue.pending_len().await, 0);

    // Shutdown must not wait out the minute-long backoff
    tokio::time::timeout(Duration::from_secs(2), worker.shutdown())
        .await
        .expect("shutdown should cut the backoff short");
    assert_eq!(queue.pending_len().await, 1);

    let mut healthy = MockTransport::new();
    healthy.expect_deliver().times(1).returning(|_| Ok(()));
    let next_worker = NotificationWorker::new(fast_worker_config(1_000), queue.clone(), Arc::new(healthy));
    assert_eq!(next_worker.process_next().await.unwrap(), Some(DeliveryOutcome::Delivered));

    let stored = queue.get_job(job.job_id).await.unwrap().unwrap();
    assert_eq!(stored.status, JobStatus::Delivered);
    assert_eq!(stored.attempts, 2);
}
