use std::collections::BTreeMap;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{NaiveDate, Utc};
use tokio::sync::{Mutex, OwnedMutexGuard};
use tracing::debug;

use shared_models::{AppointmentId, Ordinal, PatientId, ProviderId, SlotId};

use crate::error::{ConflictReason, SchedulingError};
use crate::models::{Appointment, DailyCount, NewAppointment, NewSlot, Slot, SlotKey};
use crate::store::{SchedulingStore, SchedulingTx};

#[derive(Debug, Clone, Default)]
struct MemoryState {
    slots: BTreeMap<SlotId, Slot>,
    appointments: BTreeMap<AppointmentId, Appointment>,
    last_slot_id: i64,
    last_appointment_id: i64,
}

impl MemoryState {
    fn slot_key_taken(&self, slot: &Slot) -> bool {
        self.slots.values().any(|other| {
            other.id != slot.id
                && other.provider_id == slot.provider_id
                && other.specialty_id == slot.specialty_id
                && other.date == slot.date
                && other.time == slot.time
        })
    }

    fn active_at(&self, key: &SlotKey, except: Option<AppointmentId>) -> Option<&Appointment> {
        self.appointments
            .values()
            .find(|a| a.status.is_active() && a.slot_key() == *key && Some(a.id) != except)
    }
}

/// In-process store. One transaction at a time holds the state lock; it works
/// on a copy and swaps it in on commit.
#[derive(Debug, Clone, Default)]
pub struct MemorySchedulingStore {
    state: Arc<Mutex<MemoryState>>,
}

impl MemorySchedulingStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl SchedulingStore for MemorySchedulingStore {
    async fn begin(&self) -> Result<Box<dyn SchedulingTx>, SchedulingError> {
        let guard = Arc::clone(&self.state).lock_owned().await;
        let working = guard.clone();
        Ok(Box::new(MemoryTx { guard, working }))
    }
}

struct MemoryTx {
    guard: OwnedMutexGuard<MemoryState>,
    working: MemoryState,
}

fn sorted_by<K: Ord>(mut appointments: Vec<Appointment>, key: impl Fn(&Appointment) -> K) -> Vec<Appointment> {
    appointments.sort_by_key(key);
    appointments
}

#[async_trait]
impl SchedulingTx for MemoryTx {
    async fn insert_slot(&mut self, slot: NewSlot) -> Result<Slot, SchedulingError> {
        let id = SlotId::new(self.working.last_slot_id + 1)?;
        let slot = Slot {
            id,
            provider_id: slot.provider_id,
            specialty_id: slot.specialty_id,
            date: slot.date,
            time: slot.time,
            occupied: slot.occupied,
        };

        if self.working.slot_key_taken(&slot) {
            return Err(SchedulingError::Conflict(ConflictReason::DuplicateSlot));
        }

        self.working.last_slot_id = id.get();
        self.working.slots.insert(id, slot.clone());
        Ok(slot)
    }

    async fn get_slot(&mut self, id: SlotId) -> Result<Option<Slot>, SchedulingError> {
        Ok(self.working.slots.get(&id).cloned())
    }

    async fn save_slot(&mut self, slot: &Slot) -> Result<(), SchedulingError> {
        if !self.working.slots.contains_key(&slot.id) {
            return Err(SchedulingError::NotFound("Slot not found".to_string()));
        }
        if self.working.slot_key_taken(slot) {
            return Err(SchedulingError::Conflict(ConflictReason::DuplicateSlot));
        }
        self.working.slots.insert(slot.id, slot.clone());
        Ok(())
    }

    async fn set_occupied(&mut self, key: &SlotKey, occupied: bool) -> Result<u64, SchedulingError> {
        let mut affected = 0;
        for slot in self.working.slots.values_mut().filter(|s| s.key() == *key) {
            slot.occupied = occupied;
            affected += 1;
        }
        Ok(affected)
    }

    async fn delete_slots(&mut self, key: &SlotKey) -> Result<u64, SchedulingError> {
        let before = self.working.slots.len();
        self.working.slots.retain(|_, slot| slot.key() != *key);
        Ok((before - self.working.slots.len()) as u64)
    }

    async fn slots_for_day(&mut self, provider_id: ProviderId, date: NaiveDate) -> Result<Vec<Slot>, SchedulingError> {
        let mut slots: Vec<Slot> = self
            .working
            .slots
            .values()
            .filter(|s| s.provider_id == provider_id && s.date == date)
            .cloned()
            .collect();
        slots.sort_by_key(|s| (s.time, s.specialty_id));
        Ok(slots)
    }

    async fn count_for_patient(&mut self, patient_id: PatientId) -> Result<u32, SchedulingError> {
        let count = self
            .working
            .appointments
            .values()
            .filter(|a| a.patient_id == patient_id)
            .count();
        Ok(u32::try_from(count).unwrap_or(u32::MAX))
    }

    async fn insert_appointment(&mut self, appointment: NewAppointment) -> Result<Appointment, SchedulingError> {
        let ordinal_taken = self
            .working
            .appointments
            .values()
            .any(|a| a.patient_id == appointment.patient_id && a.ordinal == appointment.ordinal);
        if ordinal_taken {
            return Err(SchedulingError::Conflict(ConflictReason::OrdinalRace));
        }

        let key = SlotKey::new(appointment.provider_id, appointment.date, appointment.time);
        if self.working.active_at(&key, None).is_some() {
            return Err(SchedulingError::Conflict(ConflictReason::SlotTaken));
        }

        let id = AppointmentId::new(self.working.last_appointment_id + 1)?;
        let stored = Appointment {
            id,
            patient_id: appointment.patient_id,
            provider_id: appointment.provider_id,
            specialty_id: appointment.specialty_id,
            date: appointment.date,
            time: appointment.time,
            ordinal: appointment.ordinal,
            status: crate::models::AppointmentStatus::Active,
            created_at: Utc::now(),
        };

        self.working.last_appointment_id = id.get();
        self.working.appointments.insert(id, stored.clone());
        Ok(stored)
    }

    async fn get_appointment(&mut self, id: AppointmentId) -> Result<Option<Appointment>, SchedulingError> {
        Ok(self.working.appointments.get(&id).cloned())
    }

    async fn find_by_ordinal(
        &mut self,
        patient_id: PatientId,
        ordinal: Ordinal,
    ) -> Result<Option<Appointment>, SchedulingError> {
        Ok(self
            .working
            .appointments
            .values()
            .find(|a| a.patient_id == patient_id && a.ordinal == ordinal)
            .cloned())
    }

    async fn find_active_at(&mut self, key: &SlotKey) -> Result<Option<Appointment>, SchedulingError> {
        Ok(self.working.active_at(key, None).cloned())
    }

    async fn save_appointment(&mut self, appointment: &Appointment) -> Result<(), SchedulingError> {
        if !self.working.appointments.contains_key(&appointment.id) {
            return Err(SchedulingError::NotFound("Appointment not found".to_string()));
        }
        if appointment.status.is_active()
            && self.working.active_at(&appointment.slot_key(), Some(appointment.id)).is_some()
        {
            return Err(SchedulingError::Conflict(ConflictReason::SlotTaken));
        }

        self.working.appointments.insert(appointment.id, appointment.clone());
        Ok(())
    }

    async fn appointments_for_patient(&mut self, patient_id: PatientId) -> Result<Vec<Appointment>, SchedulingError> {
        let appointments = self
            .working
            .appointments
            .values()
            .filter(|a| a.patient_id == patient_id)
            .cloned()
            .collect();
        Ok(sorted_by(appointments, |a| a.ordinal))
    }

    async fn appointments_for_provider(&mut self, provider_id: ProviderId) -> Result<Vec<Appointment>, SchedulingError> {
        let appointments = self
            .working
            .appointments
            .values()
            .filter(|a| a.provider_id == provider_id)
            .cloned()
            .collect();
        Ok(sorted_by(appointments, |a| (a.date, a.time, a.id)))
    }

    async fn active_for_day(&mut self, provider_id: ProviderId, date: NaiveDate) -> Result<Vec<Appointment>, SchedulingError> {
        let appointments = self
            .working
            .appointments
            .values()
            .filter(|a| a.provider_id == provider_id && a.date == date && a.status.is_active())
            .cloned()
            .collect();
        Ok(sorted_by(appointments, |a| a.time))
    }

    async fn active_counts_by_date(&mut self) -> Result<Vec<DailyCount>, SchedulingError> {
        let mut counts: BTreeMap<NaiveDate, u64> = BTreeMap::new();
        for appointment in self.working.appointments.values().filter(|a| a.status.is_active()) {
            *counts.entry(appointment.date).or_default() += 1;
        }
        Ok(counts
            .into_iter()
            .map(|(date, count)| DailyCount { date, count })
            .collect())
    }

    async fn commit(self: Box<Self>) -> Result<(), SchedulingError> {
        let MemoryTx { mut guard, working } = *self;
        *guard = working;
        debug!("Memory scheduling transaction committed");
        Ok(())
    }
}
