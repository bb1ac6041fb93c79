use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, NaiveDate, NaiveTime, Utc};
use serde::{Deserialize, Serialize};

use shared_models::{AppointmentId, Ordinal, PatientId, ProviderId, SlotId, SpecialtyId};

// ==============================================================================
// SLOT MODELS
// ==============================================================================

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Slot {
    pub id: SlotId,
    pub provider_id: ProviderId,
    pub specialty_id: SpecialtyId,
    pub date: NaiveDate,
    #[serde(with = "shared_utils::date::hh_mm")]
    pub time: NaiveTime,
    pub occupied: bool,
}

impl Slot {
    pub fn key(&self) -> SlotKey {
        SlotKey::new(self.provider_id, self.date, self.time)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewSlot {
    pub provider_id: ProviderId,
    pub specialty_id: SpecialtyId,
    pub date: NaiveDate,
    pub time: NaiveTime,
    pub occupied: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SlotState {
    #[default]
    Free,
    Occupied,
}

impl SlotState {
    pub fn is_occupied(self) -> bool {
        matches!(self, SlotState::Occupied)
    }
}

/// Fields of a slot to overwrite; `None` keeps the stored value.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SlotPatch {
    pub provider_id: Option<ProviderId>,
    pub specialty_id: Option<SpecialtyId>,
    pub date: Option<NaiveDate>,
    pub time: Option<NaiveTime>,
    pub occupied: Option<bool>,
}

impl SlotPatch {
    pub fn is_empty(&self) -> bool {
        self.provider_id.is_none()
            && self.specialty_id.is_none()
            && self.date.is_none()
            && self.time.is_none()
            && self.occupied.is_none()
    }

    pub fn apply(&self, slot: &mut Slot) {
        if let Some(provider_id) = self.provider_id {
            slot.provider_id = provider_id;
        }
        if let Some(specialty_id) = self.specialty_id {
            slot.specialty_id = specialty_id;
        }
        if let Some(date) = self.date {
            slot.date = date;
        }
        if let Some(time) = self.time {
            slot.time = time;
        }
        if let Some(occupied) = self.occupied {
            slot.occupied = occupied;
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SlotAction {
    Occupy,
    Release,
    Delete,
}

/// A provider's (date, time). Occupy, release and the double-booking rule
/// all match on this key, across specialties.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct SlotKey {
    pub provider_id: ProviderId,
    pub date: NaiveDate,
    #[serde(with = "shared_utils::date::hh_mm")]
    pub time: NaiveTime,
}

impl SlotKey {
    pub fn new(provider_id: ProviderId, date: NaiveDate, time: NaiveTime) -> Self {
        Self { provider_id, date, time }
    }
}

impl fmt::Display for SlotKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "provider {} on {} at {}", self.provider_id, self.date, self.time.format("%H:%M"))
    }
}

// ==============================================================================
// APPOINTMENT MODELS
// ==============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AppointmentStatus {
    Active,
    Cancelled,
}

impl AppointmentStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            AppointmentStatus::Active => "active",
            AppointmentStatus::Cancelled => "cancelled",
        }
    }

    pub fn is_active(self) -> bool {
        matches!(self, AppointmentStatus::Active)
    }

    /// Cancellation is terminal; everything else is allowed.
    pub fn can_transition_to(self, target: AppointmentStatus) -> bool {
        !matches!((self, target), (AppointmentStatus::Cancelled, AppointmentStatus::Active))
    }
}

impl fmt::Display for AppointmentStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for AppointmentStatus {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value {
            "active" => Ok(AppointmentStatus::Active),
            "cancelled" => Ok(AppointmentStatus::Cancelled),
            other => Err(format!("unknown appointment status '{}'", other)),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Appointment {
    pub id: AppointmentId,
    pub patient_id: PatientId,
    pub provider_id: ProviderId,
    pub specialty_id: SpecialtyId,
    pub date: NaiveDate,
    #[serde(with = "shared_utils::date::hh_mm")]
    pub time: NaiveTime,
    pub ordinal: Ordinal,
    pub status: AppointmentStatus,
    pub created_at: DateTime<Utc>,
}

impl Appointment {
    pub fn slot_key(&self) -> SlotKey {
        SlotKey::new(self.provider_id, self.date, self.time)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewAppointment {
    pub patient_id: PatientId,
    pub provider_id: ProviderId,
    pub specialty_id: SpecialtyId,
    pub date: NaiveDate,
    pub time: NaiveTime,
    pub ordinal: Ordinal,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DailyCount {
    pub date: NaiveDate,
    pub count: u64,
}

// ==============================================================================
// REQUEST MODELS
// ==============================================================================

#[derive(Debug, Clone, Deserialize)]
pub struct BookAppointmentRequest {
    pub patient_id: PatientId,
    pub provider_id: ProviderId,
    pub specialty_id: SpecialtyId,
    pub date: String,
    pub time: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RescheduleAppointmentRequest {
    pub patient_id: PatientId,
    pub provider_id: ProviderId,
    pub date: String,
    pub time: String,
    #[serde(default = "default_status")]
    pub status: AppointmentStatus,
}

fn default_status() -> AppointmentStatus {
    AppointmentStatus::Active
}

#[derive(Debug, Clone, Deserialize)]
pub struct SetStatusRequest {
    pub status: AppointmentStatus,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RegisterSlotRequest {
    pub provider_id: ProviderId,
    pub specialty_id: SpecialtyId,
    pub date: String,
    pub time: String,
    #[serde(default)]
    pub state: SlotState,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct UpdateSlotRequest {
    pub provider_id: Option<ProviderId>,
    pub specialty_id: Option<SpecialtyId>,
    pub date: Option<String>,
    pub time: Option<String>,
    pub occupied: Option<bool>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct EditSlotRequest {
    pub provider_id: ProviderId,
    pub date: String,
    pub time: String,
    pub action: SlotAction,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SlotQuery {
    pub date: String,
    pub specialty_id: SpecialtyId,
}
