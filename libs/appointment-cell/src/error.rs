use std::fmt;

use thiserror::Error;
use tracing::error;

use shared_models::{error::AppError, InvalidId};
use shared_utils::DateError;

/// Which uniqueness or lifecycle rule a write ran into.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConflictReason {
    /// An active appointment already holds the provider's date and time.
    SlotTaken,
    /// A concurrent booking claimed the same patient ordinal first.
    OrdinalRace,
    /// A slot with the same provider, specialty, date and time exists.
    DuplicateSlot,
    /// The slot is referenced by an active appointment.
    SlotInUse,
    /// The appointment is cancelled and cannot become active again.
    AppointmentCancelled,
}

impl fmt::Display for ConflictReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let message = match self {
            ConflictReason::SlotTaken => "Appointment slot is already booked",
            ConflictReason::OrdinalRace => "Appointment was booked concurrently, please retry",
            ConflictReason::DuplicateSlot => "Slot already exists",
            ConflictReason::SlotInUse => "Slot is referenced by an active appointment",
            ConflictReason::AppointmentCancelled => "Cancelled appointments cannot be reactivated",
        };
        f.write_str(message)
    }
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SchedulingError {
    #[error("{0}")]
    Validation(String),

    #[error("{0}")]
    NotFound(String),

    #[error("{0}")]
    Conflict(ConflictReason),

    #[error("Storage error: {0}")]
    Storage(String),
}

impl SchedulingError {
    pub fn is_conflict(&self, reason: ConflictReason) -> bool {
        matches!(self, SchedulingError::Conflict(r) if *r == reason)
    }
}

impl From<DateError> for SchedulingError {
    fn from(err: DateError) -> Self {
        SchedulingError::Validation(err.to_string())
    }
}

impl From<InvalidId> for SchedulingError {
    fn from(err: InvalidId) -> Self {
        SchedulingError::Validation(err.to_string())
    }
}

impl From<SchedulingError> for AppError {
    fn from(err: SchedulingError) -> Self {
        match err {
            SchedulingError::Validation(msg) => AppError::ValidationError(msg),
            SchedulingError::NotFound(msg) => AppError::NotFound(msg),
            SchedulingError::Conflict(reason) => AppError::Conflict(reason.to_string()),
            SchedulingError::Storage(detail) => {
                error!("Scheduling storage failure: {}", detail);
                AppError::Database(detail)
            }
        }
    }
}
