#![allow(dead_code)]

use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use chrono::NaiveDate;

use appointment_cell::*;
use notification_queue_cell::{Notification, NotificationKind, Notifier};
use shared_models::{AppointmentId, Ordinal, PatientId, ProviderId, SlotId, SpecialtyId};
use shared_utils::test_utils::TestConfig;

pub fn patient(id: i64) -> PatientId {
    PatientId::new(id).unwrap()
}

pub fn provider(id: i64) -> ProviderId {
    ProviderId::new(id).unwrap()
}

pub fn specialty(id: i64) -> SpecialtyId {
    SpecialtyId::new(id).unwrap()
}

pub fn ordinal(value: i64) -> Ordinal {
    Ordinal::try_from(value).unwrap()
}

/// Keeps every notification handed to it.
#[derive(Default)]
pub struct RecordingNotifier {
    sent: Mutex<Vec<Notification>>,
}

impl RecordingNotifier {
    pub fn kinds(&self) -> Vec<NotificationKind> {
        self.sent.lock().unwrap().iter().map(|n| n.kind).collect()
    }

    pub fn sent(&self) -> Vec<Notification> {
        self.sent.lock().unwrap().clone()
    }
}

impl Notifier for RecordingNotifier {
    fn send(&self, notification: Notification) {
        self.sent.lock().unwrap().push(notification);
    }
}

pub struct Harness {
    pub state: Arc<SchedulingState>,
    pub notifier: Arc<RecordingNotifier>,
}

pub fn harness() -> Harness {
    harness_with(Arc::new(MemorySchedulingStore::new()), TestConfig::default())
}

pub fn harness_with(store: Arc<dyn SchedulingStore>, config: TestConfig) -> Harness {
    let notifier = Arc::new(RecordingNotifier::default());
    let state = SchedulingState::new(&config.to_app_config(), store, notifier.clone());
    Harness {
        state: Arc::new(state),
        notifier,
    }
}

/// Memory store that can be told to fail specific writes.
#[derive(Default)]
pub struct FaultyStore {
    inner: MemorySchedulingStore,
    faults: Arc<Faults>,
}

#[derive(Default)]
pub struct Faults {
    /// Upcoming appointment inserts that lose an ordinal race.
    pub ordinal_races: AtomicU32,
    /// Fail any write that marks a slot occupied.
    pub fail_occupy: AtomicBool,
    pub inserts_attempted: AtomicU32,
}

impl FaultyStore {
    pub fn faults(&self) -> Arc<Faults> {
        Arc::clone(&self.faults)
    }
}

#[async_trait]
impl SchedulingStore for FaultyStore {
    async fn begin(&self) -> Result<Box<dyn SchedulingTx>, SchedulingError> {
        let inner = self.inner.begin().await?;
        Ok(Box::new(FaultyTx {
            inner,
            faults: Arc::clone(&self.faults),
        }))
    }
}

struct FaultyTx {
    inner: Box<dyn SchedulingTx>,
    faults: Arc<Faults>,
}

#[async_trait]
impl SchedulingTx for FaultyTx {
    async fn insert_slot(&mut self, slot: NewSlot) -> Result<Slot, SchedulingError> {
        self.inner.insert_slot(slot).await
    }

    async fn get_slot(&mut self, id: SlotId) -> Result<Option<Slot>, SchedulingError> {
        self.inner.get_slot(id).await
    }

    async fn save_slot(&mut self, slot: &Slot) -> Result<(), SchedulingError> {
        self.inner.save_slot(slot).await
    }

    async fn set_occupied(&mut self, key: &SlotKey, occupied: bool) -> Result<u64, SchedulingError> {
        if occupied && self.faults.fail_occupy.load(Ordering::SeqCst) {
            return Err(SchedulingError::Storage("connection reset".to_string()));
        }
        self.inner.set_occupied(key, occupied).await
    }

    async fn delete_slots(&mut self, key: &SlotKey) -> Result<u64, SchedulingError> {
        self.inner.delete_slots(key).await
    }

    async fn slots_for_day(&mut self, provider_id: ProviderId, date: NaiveDate) -> Result<Vec<Slot>, SchedulingError> {
        self.inner.slots_for_day(provider_id, date).await
    }

    async fn count_for_patient(&mut self, patient_id: PatientId) -> Result<u32, SchedulingError> {
        self.inner.count_for_patient(patient_id).await
    }

    async fn insert_appointment(&mut self, appointment: NewAppointment) -> Result<Appointment, SchedulingError> {
        self.faults.inserts_attempted.fetch_add(1, Ordering::SeqCst);
        let raced = self
            .faults
            .ordinal_races
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok();
        if raced {
            return Err(SchedulingError::Conflict(ConflictReason::OrdinalRace));
        }
        self.inner.insert_appointment(appointment).await
    }

    async fn get_appointment(&mut self, id: AppointmentId) -> Result<Option<Appointment>, SchedulingError> {
        self.inner.get_appointment(id).await
    }

    async fn find_by_ordinal(
        &mut self,
        patient_id: PatientId,
        ordinal: Ordinal,
    ) -> Result<Option<Appointment>, SchedulingError> {
        self.inner.find_by_ordinal(patient_id, ordinal).await
    }

    async fn find_active_at(&mut self, key: &SlotKey) -> Result<Option<Appointment>, SchedulingError> {
        self.inner.find_active_at(key).await
    }

    async fn save_appointment(&mut self, appointment: &Appointment) -> Result<(), SchedulingError> {
        self.inner.save_appointment(appointment).await
    }

    async fn appointments_for_patient(&mut self, patient_id: PatientId) -> Result<Vec<Appointment>, SchedulingError> {
        self.inner.appointments_for_patient(patient_id).await
    }

    async fn appointments_for_provider(&mut self, provider_id: ProviderId) -> Result<Vec<Appointment>, SchedulingError> {
        self.inner.appointments_for_provider(provider_id).await
    }

    async fn active_for_day(&mut self, provider_id: ProviderId, date: NaiveDate) -> Result<Vec<Appointment>, SchedulingError> {
        self.inner.active_for_day(provider_id, date).await
    }

    async fn active_counts_by_date(&mut self) -> Result<Vec<DailyCount>, SchedulingError> {
        self.inner.active_counts_by_date().await
    }

    async fn commit(self: Box<Self>) -> Result<(), SchedulingError> {
        self.inner.commit().await
    }
}
