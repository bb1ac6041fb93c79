//! Needs the Redis named by REDIS_URL. Skipped unless LIVE_INTEGRATION_TESTS=true.

use notification_queue_cell::*;

use super::sample_notification;

fn live_redis_url() -> Option<String> {
    if std::env::var("LIVE_INTEGRATION_TESTS").unwrap_or_default() != "true" {
        println!("Skipping live Redis tests (set LIVE_INTEGRATION_TESTS=true to enable)");
        return None;
    }
    std::env::var("REDIS_URL").ok()
}

#[tokio::test]
async fn test_live_retrying_job_stays_claimed_until_requeued() {
    let Some(url) = live_redis_url() else {
        return;
    };
    let queue = RedisNotificationQueue::new(&url).await.unwrap();
    let before = queue.stats().await.unwrap();

    let job = NotificationJob::new(sample_notification(NotificationKind::Updated), 3);
    queue.enqueue(&job).await.unwrap();

    // Other jobs may be pending; drain until ours comes up
    let mut claimed = loop {
        let next = queue.dequeue("live-test").await.unwrap().expect("job should be pending");
        if next.job_id == job.job_id {
            break next;
        }
    };
    claimed.attempts = 1;
    claimed.transition(JobStatus::Retrying).unwrap();
    queue.update_job(&claimed).await.unwrap();

    let parked = queue.stats().await.unwrap();
    assert!(parked.delivering_jobs >= 1);
    assert_eq!(parked.retried_total, before.retried_total + 1);

    queue.requeue(&claimed).await.unwrap();
    let requeued = queue.dequeue("live-test").await.unwrap().expect("requeued job");
    assert_eq!(requeued.job_id, job.job_id);
    assert_eq!(requeued.attempts, 1);

    let mut done = requeued;
    done.attempts = 2;
    done.transition(JobStatus::Delivered).unwrap();
    queue.update_job(&done).await.unwrap();

    let after = queue.stats().await.unwrap();
    assert_eq!(after.delivered_total, before.delivered_total + 1);
}
