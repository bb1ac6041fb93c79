use std::fmt;

use chrono::{DateTime, NaiveDate, NaiveTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use shared_models::{AppointmentId, PatientId};

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum NotificationKind {
    Confirmed,
    Updated,
    Cancelled,
}

impl fmt::Display for NotificationKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            NotificationKind::Confirmed => write!(f, "confirmed"),
            NotificationKind::Updated => write!(f, "updated"),
            NotificationKind::Cancelled => write!(f, "cancelled"),
        }
    }
}

/// Message about one appointment, addressed to the patient.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Notification {
    pub recipient: PatientId,
    pub appointment_id: Option<AppointmentId>,
    pub kind: NotificationKind,
    pub date: NaiveDate,
    #[serde(with = "shared_utils::date::hh_mm")]
    pub time: NaiveTime,
}

impl Notification {
    pub fn new(recipient: PatientId, kind: NotificationKind, date: NaiveDate, time: NaiveTime) -> Self {
        Self {
            recipient,
            appointment_id: None,
            kind,
            date,
            time,
        }
    }

    pub fn for_appointment(mut self, appointment_id: AppointmentId) -> Self {
        self.appointment_id = Some(appointment_id);
        self
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub enum JobStatus {
    Queued,
    Delivering,
    Retrying,
    Delivered,
    Failed,
}

impl JobStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(self, JobStatus::Delivered | JobStatus::Failed)
    }

    pub fn can_transition_to(&self, target: &JobStatus) -> bool {
        use JobStatus::*;
        matches!(
            (self, target),
            (Queued, Delivering)
                | (Retrying, Delivering)
                | (Delivering, Delivered)
                | (Delivering, Retrying)
                | (Delivering, Failed)
        )
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NotificationJob {
    pub job_id: Uuid,
    pub notification: Notification,
    pub status: JobStatus,
    pub attempts: u32,
    pub max_attempts: u32,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
    pub last_error: Option<String>,
    pub worker_id: Option<String>,
}

impl NotificationJob {
    pub fn new(notification: Notification, max_attempts: u32) -> Self {
        let now = Utc::now();
        Self {
            job_id: Uuid::new_v4(),
            notification,
            status: JobStatus::Queued,
            attempts: 0,
            max_attempts: max_attempts.max(1),
            created_at: now,
            updated_at: now,
            completed_at: None,
            last_error: None,
            worker_id: None,
        }
    }

    pub fn can_retry(&self) -> bool {
        self.attempts < self.max_attempts
    }

    /// Moves the job to `status`, rejecting transitions the lifecycle does not allow.
    pub fn transition(&mut self, status: JobStatus) -> Result<(), crate::NotificationError> {
        if !self.status.can_transition_to(&status) {
            return Err(crate::NotificationError::InvalidStatusTransition {
                from: format!("{:?}", self.status),
                to: format!("{:?}", status),
            });
        }

        let now = Utc::now();
        if status.is_terminal() {
            self.completed_at = Some(now);
        }
        self.status = status;
        self.updated_at = now;
        Ok(())
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct QueueStats {
    pub queued_jobs: u64,
    pub delivering_jobs: u64,
    pub delivered_total: u64,
    pub retried_total: u64,
    pub failed_total: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkerConfig {
    pub worker_id: String,
    pub concurrency: u32,
    pub delivery_timeout_ms: u64,
    pub base_backoff_ms: u64,
    pub max_backoff_ms: u64,
    pub error_backoff_ms: u64,
}

impl Default for WorkerConfig {
    fn default() -> Self {
        Self {
            worker_id: format!("notifier-{}", Uuid::new_v4()),
            concurrency: 2,
            delivery_timeout_ms: 10_000,
            base_backoff_ms: 500,
            max_backoff_ms: 60_000,
            error_backoff_ms: 5_000,
        }
    }
}

impl WorkerConfig {
    pub fn from_app_config(config: &shared_config::AppConfig) -> Self {
        Self {
            concurrency: config.notifier_workers.max(1),
            base_backoff_ms: config.notifier_backoff_ms,
            ..Self::default()
        }
    }
}
