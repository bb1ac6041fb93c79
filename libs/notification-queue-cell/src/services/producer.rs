use std::sync::Arc;

use tracing::{debug, warn};

use crate::services::queue::NotificationQueue;
use crate::{Notification, NotificationError, NotificationJob};

/// Fire-and-forget notification dispatch.
///
/// `send` returns immediately; whatever happens afterwards never reaches the
/// caller.
pub trait Notifier: Send + Sync {
    fn send(&self, notification: Notification);
}

/// Notifier that hands notifications to the background queue.
pub struct NotificationProducer {
    queue: Arc<dyn NotificationQueue>,
    max_attempts: u32,
}

impl NotificationProducer {
    pub fn new(queue: Arc<dyn NotificationQueue>, max_attempts: u32) -> Self {
        Self { queue, max_attempts }
    }

    /// Enqueues and waits for the queue to accept the job.
    pub async fn enqueue(&self, notification: Notification) -> Result<NotificationJob, NotificationError> {
        let job = NotificationJob::new(notification, self.max_attempts);
        self.queue.enqueue(&job).await?;
        Ok(job)
    }
}

impl Notifier for NotificationProducer {
    fn send(&self, notification: Notification) {
        let Ok(runtime) = tokio::runtime::Handle::try_current() else {
            warn!("No async runtime available, dropping {} notification", notification.kind);
            return;
        };

        let queue = Arc::clone(&self.queue);
        let job = NotificationJob::new(notification, self.max_attempts);

        runtime.spawn(async move {
            match queue.enqueue(&job).await {
                Ok(()) => debug!("Notification job {} queued", job.job_id),
                Err(e) => warn!("Failed to queue notification job {}: {}", job.job_id, e),
            }
        });
    }
}
