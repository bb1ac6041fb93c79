use std::sync::Arc;

use tracing::{info, instrument, warn};

use notification_queue_cell::{Notification, NotificationKind, Notifier};
use shared_models::{AppointmentId, Ordinal, PatientId, ProviderId, SpecialtyId};
use shared_utils::{normalize_date, parse_slot_time};

use crate::error::{ConflictReason, SchedulingError};
use crate::models::{Appointment, AppointmentStatus, SlotKey};
use crate::services::{ledger::AppointmentLedger, slots::SlotCatalog};
use crate::store::SchedulingStore;

/// Keeps slot occupancy and appointment records in step.
///
/// Each operation runs in a single store transaction, so a failure at any
/// step leaves both untouched. Notifications go out only after commit and
/// never affect the result.
#[derive(Clone)]
pub struct SchedulingCoordinator {
    store: Arc<dyn SchedulingStore>,
    catalog: SlotCatalog,
    ledger: AppointmentLedger,
    notifier: Arc<dyn Notifier>,
    max_ordinal_retries: u32,
}

impl SchedulingCoordinator {
    pub fn new(
        store: Arc<dyn SchedulingStore>,
        catalog: SlotCatalog,
        ledger: AppointmentLedger,
        notifier: Arc<dyn Notifier>,
        max_ordinal_retries: u32,
    ) -> Self {
        Self {
            store,
            catalog,
            ledger,
            notifier,
            max_ordinal_retries,
        }
    }

    /// Books the slot for the patient and returns the new appointment.
    #[instrument(skip(self))]
    pub async fn book(
        &self,
        patient_id: PatientId,
        provider_id: ProviderId,
        specialty_id: SpecialtyId,
        date: &str,
        time: &str,
    ) -> Result<Appointment, SchedulingError> {
        let time = parse_slot_time(time)?;
        let date = normalize_date(date)?;
        let key = SlotKey::new(provider_id, date, time);

        let mut attempt = 0;
        let appointment = loop {
            attempt += 1;
            match self.try_book(patient_id, specialty_id, key).await {
                Err(err) if err.is_conflict(ConflictReason::OrdinalRace) && attempt <= self.max_ordinal_retries => {
                    warn!("Ordinal race for patient {} (attempt {}), retrying", patient_id, attempt);
                }
                result => break result?,
            }
        };

        info!("Appointment {} booked as #{} for {}", appointment.id, appointment.ordinal, key);
        self.notify(&appointment, NotificationKind::Confirmed);
        Ok(appointment)
    }

    async fn try_book(
        &self,
        patient_id: PatientId,
        specialty_id: SpecialtyId,
        key: SlotKey,
    ) -> Result<Appointment, SchedulingError> {
        let mut tx = self.store.begin().await?;

        if tx.find_active_at(&key).await?.is_some() {
            return Err(SchedulingError::Conflict(ConflictReason::SlotTaken));
        }

        let appointment = self
            .ledger
            .create_in(tx.as_mut(), patient_id, key.provider_id, specialty_id, key.date, key.time)
            .await?;
        self.catalog.occupy_in(tx.as_mut(), key).await?;

        tx.commit().await?;
        Ok(appointment)
    }

    /// Moves an appointment to a new provider, date and time, and sets its
    /// status. Releasing the old slot, rewriting the row and occupying the new
    /// slot commit together or not at all.
    #[instrument(skip(self))]
    pub async fn reschedule(
        &self,
        appointment_id: AppointmentId,
        patient_id: PatientId,
        provider_id: ProviderId,
        date: &str,
        time: &str,
        status: AppointmentStatus,
    ) -> Result<Appointment, SchedulingError> {
        let time = parse_slot_time(time)?;
        let date = normalize_date(date)?;
        let target = SlotKey::new(provider_id, date, time);

        let mut tx = self.store.begin().await?;

        let current = self.ledger.get_in(tx.as_mut(), appointment_id).await?;
        if current.patient_id != patient_id {
            return Err(SchedulingError::NotFound("Appointment not found".to_string()));
        }
        if !current.status.can_transition_to(status) {
            return Err(SchedulingError::Conflict(ConflictReason::AppointmentCancelled));
        }

        if current.status.is_active() {
            self.catalog.release_in(tx.as_mut(), current.slot_key()).await?;
        }

        let update = self
            .ledger
            .update_in(tx.as_mut(), appointment_id, provider_id, date, time, status)
            .await?;

        if status.is_active() {
            self.catalog.occupy_in(tx.as_mut(), target).await?;
        }

        tx.commit().await?;

        info!(
            "Appointment {} moved from {} to {} ({})",
            appointment_id,
            update.previous.slot_key(),
            target,
            status
        );

        let kind = if status.is_active() {
            NotificationKind::Updated
        } else {
            NotificationKind::Cancelled
        };
        self.notify(&update.current, kind);
        Ok(update.current)
    }

    /// Cancels the patient's active appointment and frees its slot. A second
    /// cancel of the same ordinal is `NotFound`.
    #[instrument(skip(self))]
    pub async fn cancel(&self, patient_id: PatientId, ordinal: Ordinal) -> Result<Appointment, SchedulingError> {
        let mut tx = self.store.begin().await?;

        let cancelled = self.ledger.cancel_by_ordinal_in(tx.as_mut(), patient_id, ordinal).await?;
        self.catalog.release_in(tx.as_mut(), cancelled.slot_key()).await?;

        tx.commit().await?;

        self.notify(&cancelled, NotificationKind::Cancelled);
        Ok(cancelled)
    }

    /// Administrative status override. Slots are not touched.
    #[instrument(skip(self))]
    pub async fn set_appointment_status(
        &self,
        appointment_id: AppointmentId,
        status: AppointmentStatus,
    ) -> Result<Appointment, SchedulingError> {
        let mut tx = self.store.begin().await?;

        let current = self.ledger.get_in(tx.as_mut(), appointment_id).await?;
        if !current.status.can_transition_to(status) {
            return Err(SchedulingError::Conflict(ConflictReason::AppointmentCancelled));
        }

        let updated = self.ledger.set_status_in(tx.as_mut(), appointment_id, status).await?;
        tx.commit().await?;

        info!("Appointment {} status set to {}", appointment_id, status);
        Ok(updated)
    }

    fn notify(&self, appointment: &Appointment, kind: NotificationKind) {
        self.notifier.send(
            Notification::new(appointment.patient_id, kind, appointment.date, appointment.time)
                .for_appointment(appointment.id),
        );
    }
}
