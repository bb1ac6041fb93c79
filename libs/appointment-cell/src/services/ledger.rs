use std::sync::Arc;

use chrono::{NaiveDate, NaiveTime};
use tracing::{debug, info};

use shared_models::{AppointmentId, Ordinal, PatientId, ProviderId, SpecialtyId};

use crate::error::SchedulingError;
use crate::models::{Appointment, AppointmentStatus, DailyCount, NewAppointment};
use crate::store::{SchedulingStore, SchedulingTx};

/// Result of overwriting an appointment: the row before and after.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LedgerUpdate {
    pub previous: Appointment,
    pub current: Appointment,
}

fn appointment_not_found() -> SchedulingError {
    SchedulingError::NotFound("Appointment not found".to_string())
}

/// Patient appointment records. Rows are never deleted; cancelling flips the status.
#[derive(Clone)]
pub struct AppointmentLedger {
    store: Arc<dyn SchedulingStore>,
}

impl AppointmentLedger {
    pub fn new(store: Arc<dyn SchedulingStore>) -> Self {
        Self { store }
    }

    /// Single attempt; a lost ordinal race surfaces as `Conflict(OrdinalRace)`.
    pub async fn create(
        &self,
        patient_id: PatientId,
        provider_id: ProviderId,
        specialty_id: SpecialtyId,
        date: NaiveDate,
        time: NaiveTime,
    ) -> Result<Appointment, SchedulingError> {
        let mut tx = self.store.begin().await?;
        let appointment = self
            .create_in(tx.as_mut(), patient_id, provider_id, specialty_id, date, time)
            .await?;
        tx.commit().await?;
        Ok(appointment)
    }

    pub async fn create_in(
        &self,
        tx: &mut dyn SchedulingTx,
        patient_id: PatientId,
        provider_id: ProviderId,
        specialty_id: SpecialtyId,
        date: NaiveDate,
        time: NaiveTime,
    ) -> Result<Appointment, SchedulingError> {
        let existing = tx.count_for_patient(patient_id).await?;
        let ordinal = Ordinal::after(existing);

        let appointment = tx
            .insert_appointment(NewAppointment {
                patient_id,
                provider_id,
                specialty_id,
                date,
                time,
                ordinal,
            })
            .await?;

        debug!("Patient {} appointment #{} created", patient_id, ordinal);
        Ok(appointment)
    }

    pub async fn update(
        &self,
        appointment_id: AppointmentId,
        provider_id: ProviderId,
        date: NaiveDate,
        time: NaiveTime,
        status: AppointmentStatus,
    ) -> Result<LedgerUpdate, SchedulingError> {
        let mut tx = self.store.begin().await?;
        let update = self
            .update_in(tx.as_mut(), appointment_id, provider_id, date, time, status)
            .await?;
        tx.commit().await?;
        Ok(update)
    }

    /// Reads the current row, then overwrites provider, date, time and status.
    pub async fn update_in(
        &self,
        tx: &mut dyn SchedulingTx,
        appointment_id: AppointmentId,
        provider_id: ProviderId,
        date: NaiveDate,
        time: NaiveTime,
        status: AppointmentStatus,
    ) -> Result<LedgerUpdate, SchedulingError> {
        let previous = self.get_in(tx, appointment_id).await?;

        let current = Appointment {
            provider_id,
            date,
            time,
            status,
            ..previous.clone()
        };
        tx.save_appointment(&current).await?;

        Ok(LedgerUpdate { previous, current })
    }

    pub async fn cancel_by_ordinal(
        &self,
        patient_id: PatientId,
        ordinal: Ordinal,
    ) -> Result<Appointment, SchedulingError> {
        let mut tx = self.store.begin().await?;
        let cancelled = self.cancel_by_ordinal_in(tx.as_mut(), patient_id, ordinal).await?;
        tx.commit().await?;
        Ok(cancelled)
    }

    /// Cancels the patient's active appointment with that ordinal and returns it.
    /// Already cancelled counts as not found.
    pub async fn cancel_by_ordinal_in(
        &self,
        tx: &mut dyn SchedulingTx,
        patient_id: PatientId,
        ordinal: Ordinal,
    ) -> Result<Appointment, SchedulingError> {
        let mut appointment = tx
            .find_by_ordinal(patient_id, ordinal)
            .await?
            .filter(|a| a.status.is_active())
            .ok_or_else(appointment_not_found)?;

        appointment.status = AppointmentStatus::Cancelled;
        tx.save_appointment(&appointment).await?;

        info!("Patient {} appointment #{} cancelled", patient_id, ordinal);
        Ok(appointment)
    }

    pub async fn get_by_ordinal(&self, patient_id: PatientId, ordinal: Ordinal) -> Result<Appointment, SchedulingError> {
        let mut tx = self.store.begin().await?;
        tx.find_by_ordinal(patient_id, ordinal)
            .await?
            .ok_or_else(appointment_not_found)
    }

    pub async fn get(&self, appointment_id: AppointmentId) -> Result<Appointment, SchedulingError> {
        let mut tx = self.store.begin().await?;
        self.get_in(tx.as_mut(), appointment_id).await
    }

    pub async fn get_in(
        &self,
        tx: &mut dyn SchedulingTx,
        appointment_id: AppointmentId,
    ) -> Result<Appointment, SchedulingError> {
        tx.get_appointment(appointment_id)
            .await?
            .ok_or_else(appointment_not_found)
    }

    /// Overwrites the status only. Slot occupancy is left to the caller.
    pub async fn set_status(
        &self,
        appointment_id: AppointmentId,
        status: AppointmentStatus,
    ) -> Result<Appointment, SchedulingError> {
        let mut tx = self.store.begin().await?;
        let updated = self.set_status_in(tx.as_mut(), appointment_id, status).await?;
        tx.commit().await?;
        Ok(updated)
    }

    pub async fn set_status_in(
        &self,
        tx: &mut dyn SchedulingTx,
        appointment_id: AppointmentId,
        status: AppointmentStatus,
    ) -> Result<Appointment, SchedulingError> {
        let mut appointment = self.get_in(tx, appointment_id).await?;
        appointment.status = status;
        tx.save_appointment(&appointment).await?;
        Ok(appointment)
    }

    pub async fn list_for_patient(&self, patient_id: PatientId) -> Result<Vec<Appointment>, SchedulingError> {
        let mut tx = self.store.begin().await?;
        tx.appointments_for_patient(patient_id).await
    }

    pub async fn list_for_provider(&self, provider_id: ProviderId) -> Result<Vec<Appointment>, SchedulingError> {
        let mut tx = self.store.begin().await?;
        tx.appointments_for_provider(provider_id).await
    }

    pub async fn count_by_date(&self) -> Result<Vec<DailyCount>, SchedulingError> {
        let mut tx = self.store.begin().await?;
        tx.active_counts_by_date().await
    }
}
