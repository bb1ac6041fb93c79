//! Typed identifiers. Raw numbers from requests are validated once, when they
//! are deserialized or converted, and travel as these types afterwards.

use std::fmt;

use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{kind} must be a positive integer, got {value}")]
pub struct InvalidId {
    pub kind: &'static str,
    pub value: i64,
}

macro_rules! typed_id {
    ($(#[$meta:meta])* $name:ident, $kind:literal) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        #[serde(try_from = "i64", into = "i64")]
        pub struct $name(i64);

        impl $name {
            pub fn new(value: i64) -> Result<Self, InvalidId> {
                Self::try_from(value)
            }

            pub fn get(self) -> i64 {
                self.0
            }
        }

        impl TryFrom<i64> for $name {
            type Error = InvalidId;

            fn try_from(value: i64) -> Result<Self, Self::Error> {
                if value > 0 {
                    Ok(Self(value))
                } else {
                    Err(InvalidId { kind: $kind, value })
                }
            }
        }

        impl From<$name> for i64 {
            fn from(id: $name) -> i64 {
                id.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}", self.0)
            }
        }
    };
}

typed_id!(PatientId, "patient_id");
typed_id!(ProviderId, "provider_id");
typed_id!(SpecialtyId, "specialty_id");
typed_id!(AppointmentId, "appointment_id");
typed_id!(SlotId, "slot_id");

/// Patient-scoped sequence number of an appointment, starting at 1.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "i64", into = "i64")]
pub struct Ordinal(u32);

impl Ordinal {
    pub const FIRST: Ordinal = Ordinal(1);

    pub fn get(self) -> u32 {
        self.0
    }

    /// Ordinal that follows `existing` appointments.
    pub fn after(existing: u32) -> Self {
        Ordinal(existing.saturating_add(1))
    }
}

impl TryFrom<i64> for Ordinal {
    type Error = InvalidId;

    fn try_from(value: i64) -> Result<Self, Self::Error> {
        u32::try_from(value)
            .ok()
            .filter(|v| *v > 0)
            .map(Ordinal)
            .ok_or(InvalidId { kind: "ordinal", value })
    }
}

impl From<Ordinal> for i64 {
    fn from(ordinal: Ordinal) -> i64 {
        i64::from(ordinal.0)
    }
}

impl fmt::Display for Ordinal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}
