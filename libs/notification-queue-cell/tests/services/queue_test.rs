use std::time::Duration;

use assert_matches::assert_matches;
use notification_queue_cell::*;

use super::sample_notification;

#[tokio::test]
async fn test_dequeue_claims_jobs_in_fifo_order() {
    let queue = MemoryNotificationQueue::new(Duration::from_millis(20));
    let first = NotificationJob::new(sample_notification(NotificationKind::Confirmed), 3);
    let second = NotificationJob::new(sample_notification(NotificationKind::Cancelled), 3);

    queue.enqueue(&first).await.unwrap();
    queue.enqueue(&second).await.unwrap();
    assert_eq!(queue.pending_len().await, 2);

    let claimed = queue.dequeue("w1").await.unwrap().expect("first job");
    assert_eq!(claimed.job_id, first.job_id);
    assert_eq!(claimed.status, JobStatus::Delivering);
    assert_eq!(claimed.worker_id.as_deref(), Some("w1"));

    let claimed = queue.dequeue("w1").await.unwrap().expect("second job");
    assert_eq!(claimed.job_id, second.job_id);

    let stats = queue.stats().await.unwrap();
    assert_eq!(stats.queued_jobs, 0);
    assert_eq!(stats.delivering_jobs, 2);
}

#[tokio::test]
async fn test_dequeue_on_empty_queue_returns_none_after_poll_interval() {
    let queue = MemoryNotificationQueue::new(Duration::from_millis(20));
    let result = tokio::time::timeout(Duration::from_secs(1), queue.dequeue("w1")).await;
    assert_matches!(result, Ok(Ok(None)));
}

#[tokio::test]
async fn test_dequeue_wakes_up_when_job_arrives() {
    let queue = std::sync::Arc::new(MemoryNotificationQueue::new(Duration::from_secs(5)));
    let job = NotificationJob::new(sample_notification(NotificationKind::Updated), 3);

    let waiter = {
        let queue = queue.clone();
        tokio::spawn(async move { queue.dequeue("w1").await })
    };
    tokio::time::sleep(Duration::from_millis(20)).await;
    queue.enqueue(&job).await.unwrap();

    let claimed = tokio::time::timeout(Duration::from_secs(1), waiter)
        .await
        .expect("dequeue should wake before its poll interval")
        .unwrap()
        .unwrap();
    assert_eq!(claimed.map(|j| j.job_id), Some(job.job_id));
}

#[tokio::test]
async fn test_requeue_requires_retrying_status() {
    let queue = MemoryNotificationQueue::new(Duration::from_millis(20));
    let job = NotificationJob::new(sample_notification(NotificationKind::Confirmed), 3);
    queue.enqueue(&job).await.unwrap();

    let mut claimed = queue.dequeue("w1").await.unwrap().unwrap();
    assert_matches!(
        queue.requeue(&claimed).await,
        Err(NotificationError::InvalidStatusTransition { .. })
    );

    claimed.attempts = 1;
    claimed.transition(JobStatus::Retrying).unwrap();
    queue.update_job(&claimed).await.unwrap();
    queue.requeue(&claimed).await.unwrap();

    let again = queue.dequeue("w2").await.unwrap().expect("requeued job");
    assert_eq!(again.job_id, job.job_id);
    assert_eq!(again.attempts, 1);
    assert_eq!(queue.stats().await.unwrap().retried_total, 1);
}

#[tokio::test]
async fn test_update_unknown_job_is_not_found() {
    let queue = MemoryNotificationQueue::default();
    let job = NotificationJob::new(sample_notification(NotificationKind::Confirmed), 3);
    assert_matches!(queue.update_job(&job).await, Err(NotificationError::JobNotFound(_)));
    assert!(queue.get_job(job.job_id).await.unwrap().is_none());
}

#[tokio::test]
async fn test_finished_jobs_beyond_retention_are_evicted() {
    let queue = MemoryNotificationQueue::with_retention(Duration::from_millis(20), 3);

    let mut job_ids = Vec::new();
    for _ in 0..5 {
        let job = NotificationJob::new(sample_notification(NotificationKind::Confirmed), 3);
        queue.enqueue(&job).await.unwrap();
        let mut claimed = queue.dequeue("w1").await.unwrap().unwrap();
        claimed.attempts = 1;
        claimed.transition(JobStatus::Delivered).unwrap();
        queue.update_job(&claimed).await.unwrap();
        job_ids.push(job.job_id);
    }

    assert_eq!(queue.job_count().await, 3);
    for evicted in &job_ids[..2] {
        assert!(queue.get_job(*evicted).await.unwrap().is_none());
    }
    for kept in &job_ids[2..] {
        assert_eq!(queue.get_job(*kept).await.unwrap().unwrap().status, JobStatus::Delivered);
    }
    assert_eq!(queue.stats().await.unwrap().delivered_total, 5);
}

#[tokio::test]
async fn test_unfinished_jobs_are_never_evicted() {
    let queue = MemoryNotificationQueue::with_retention(Duration::from_millis(20), 0);
    let waiting = NotificationJob::new(sample_notification(NotificationKind::Updated), 3);
    let done = NotificationJob::new(sample_notification(NotificationKind::Cancelled), 1);
    queue.enqueue(&done).await.unwrap();
    queue.enqueue(&waiting).await.unwrap();

    let mut claimed = queue.dequeue("w1").await.unwrap().unwrap();
    claimed.attempts = 1;
    claimed.transition(JobStatus::Failed).unwrap();
    queue.update_job(&claimed).await.unwrap();

    assert!(queue.get_job(done.job_id).await.unwrap().is_none());
    assert_eq!(queue.get_job(waiting.job_id).await.unwrap().unwrap().status, JobStatus::Queued);
}
