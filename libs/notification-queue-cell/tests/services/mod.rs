use chrono::{NaiveDate, NaiveTime};

use notification_queue_cell::*;
use shared_models::{AppointmentId, PatientId};

mod producer_test;
mod queue_test;
mod redis_queue_test;
mod router_test;
mod transport_test;
mod worker_test;

pub fn sample_notification(kind: NotificationKind) -> Notification {
    Notification::new(
        PatientId::new(7).unwrap(),
        kind,
        NaiveDate::from_ymd_opt(2024, 5, 1).unwrap(),
        NaiveTime::from_hms_opt(9, 0, 0).unwrap(),
    )
    .for_appointment(AppointmentId::new(11).unwrap())
}

pub fn fast_worker_config(max_backoff_ms: u64) -> WorkerConfig {
    WorkerConfig {
        worker_id: "test-worker".to_string(),
        concurrency: 1,
        delivery_timeout_ms: 200,
        base_backoff_ms: 10,
        max_backoff_ms,
        error_backoff_ms: 10,
    }
}
