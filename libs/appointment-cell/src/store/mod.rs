//! Persistence behind the catalog and ledger.
//!
//! Every coordinator operation runs inside one `SchedulingTx`. Changes become
//! visible on `commit`; a transaction dropped without committing is rolled
//! back, so an early `?` return leaves storage untouched.

use async_trait::async_trait;
use chrono::NaiveDate;

use shared_models::{AppointmentId, Ordinal, PatientId, ProviderId, SlotId};

use crate::error::SchedulingError;
use crate::models::{Appointment, DailyCount, NewAppointment, NewSlot, Slot, SlotKey};

pub mod memory;
pub mod postgres;

pub use memory::MemorySchedulingStore;
pub use postgres::PgSchedulingStore;

#[async_trait]
pub trait SchedulingStore: Send + Sync {
    async fn begin(&self) -> Result<Box<dyn SchedulingTx>, SchedulingError>;
}

#[async_trait]
pub trait SchedulingTx: Send {
    // Slots

    /// Fails `Conflict(DuplicateSlot)` when the provider, specialty, date and
    /// time are already registered.
    async fn insert_slot(&mut self, slot: NewSlot) -> Result<Slot, SchedulingError>;

    async fn get_slot(&mut self, id: SlotId) -> Result<Option<Slot>, SchedulingError>;

    /// Overwrites every column of the stored slot with `slot`.
    async fn save_slot(&mut self, slot: &Slot) -> Result<(), SchedulingError>;

    /// Sets the occupied flag on every slot matching `key`; returns rows touched.
    async fn set_occupied(&mut self, key: &SlotKey, occupied: bool) -> Result<u64, SchedulingError>;

    async fn delete_slots(&mut self, key: &SlotKey) -> Result<u64, SchedulingError>;

    /// All slots of a provider on one day, any specialty, ordered by time.
    async fn slots_for_day(&mut self, provider_id: ProviderId, date: NaiveDate) -> Result<Vec<Slot>, SchedulingError>;

    // Appointments

    async fn count_for_patient(&mut self, patient_id: PatientId) -> Result<u32, SchedulingError>;

    /// Inserts an active appointment. Fails `Conflict(OrdinalRace)` when the
    /// ordinal is taken and `Conflict(SlotTaken)` when another active
    /// appointment holds the slot.
    async fn insert_appointment(&mut self, appointment: NewAppointment) -> Result<Appointment, SchedulingError>;

    async fn get_appointment(&mut self, id: AppointmentId) -> Result<Option<Appointment>, SchedulingError>;

    async fn find_by_ordinal(
        &mut self,
        patient_id: PatientId,
        ordinal: Ordinal,
    ) -> Result<Option<Appointment>, SchedulingError>;

    async fn find_active_at(&mut self, key: &SlotKey) -> Result<Option<Appointment>, SchedulingError>;

    /// Overwrites provider, date, time and status of the stored appointment.
    async fn save_appointment(&mut self, appointment: &Appointment) -> Result<(), SchedulingError>;

    /// Ordinal ascending, which is creation order.
    async fn appointments_for_patient(&mut self, patient_id: PatientId) -> Result<Vec<Appointment>, SchedulingError>;

    /// Date then time, any status.
    async fn appointments_for_provider(&mut self, provider_id: ProviderId) -> Result<Vec<Appointment>, SchedulingError>;

    async fn active_for_day(&mut self, provider_id: ProviderId, date: NaiveDate) -> Result<Vec<Appointment>, SchedulingError>;

    async fn active_counts_by_date(&mut self) -> Result<Vec<DailyCount>, SchedulingError>;

    async fn commit(self: Box<Self>) -> Result<(), SchedulingError>;
}
