use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, NaiveTime, Utc};
use sqlx::postgres::{PgPool, PgRow};
use sqlx::{Postgres, Row, Transaction};
use tracing::{debug, warn};

use shared_models::{AppointmentId, Ordinal, PatientId, ProviderId, SlotId, SpecialtyId};

use crate::error::{ConflictReason, SchedulingError};
use crate::models::{Appointment, AppointmentStatus, DailyCount, NewAppointment, NewSlot, Slot, SlotKey};
use crate::store::{SchedulingStore, SchedulingTx};

const UNIQUE_VIOLATION: &str = "23505";

const SLOT_COLUMNS: &str = "id, provider_id, specialty_id, slot_date, slot_time, occupied";
const APPOINTMENT_COLUMNS: &str =
    "id, patient_id, provider_id, specialty_id, appointment_date, appointment_time, ordinal, status, created_at";

impl From<sqlx::Error> for SchedulingError {
    fn from(err: sqlx::Error) -> Self {
        if let sqlx::Error::Database(db_err) = &err {
            if db_err.code().as_deref() == Some(UNIQUE_VIOLATION) {
                let reason = match db_err.constraint() {
                    Some("provider_slots_key") => ConflictReason::DuplicateSlot,
                    Some("appointments_patient_ordinal_key") => ConflictReason::OrdinalRace,
                    _ => ConflictReason::SlotTaken,
                };
                debug!("Unique violation mapped to {:?}", reason);
                return SchedulingError::Conflict(reason);
            }
        }
        SchedulingError::Storage(err.to_string())
    }
}

/// Postgres store over an injected pool. Uniqueness is enforced by the
/// schema constraints, so concurrent writers see `Conflict` instead of
/// overwriting each other.
#[derive(Clone)]
pub struct PgSchedulingStore {
    pool: PgPool,
}

impl PgSchedulingStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl SchedulingStore for PgSchedulingStore {
    async fn begin(&self) -> Result<Box<dyn SchedulingTx>, SchedulingError> {
        let tx = self.pool.begin().await?;
        Ok(Box::new(PgTx { tx }))
    }
}

struct PgTx {
    tx: Transaction<'static, Postgres>,
}

fn slot_from_row(row: &PgRow) -> Result<Slot, SchedulingError> {
    Ok(Slot {
        id: SlotId::new(row.try_get("id")?)?,
        provider_id: ProviderId::new(row.try_get("provider_id")?)?,
        specialty_id: SpecialtyId::new(row.try_get("specialty_id")?)?,
        date: row.try_get::<NaiveDate, _>("slot_date")?,
        time: row.try_get::<NaiveTime, _>("slot_time")?,
        occupied: row.try_get("occupied")?,
    })
}

fn appointment_from_row(row: &PgRow) -> Result<Appointment, SchedulingError> {
    let status: String = row.try_get("status")?;
    let status = status.parse::<AppointmentStatus>().map_err(SchedulingError::Storage)?;

    Ok(Appointment {
        id: AppointmentId::new(row.try_get("id")?)?,
        patient_id: PatientId::new(row.try_get("patient_id")?)?,
        provider_id: ProviderId::new(row.try_get("provider_id")?)?,
        specialty_id: SpecialtyId::new(row.try_get("specialty_id")?)?,
        date: row.try_get::<NaiveDate, _>("appointment_date")?,
        time: row.try_get::<NaiveTime, _>("appointment_time")?,
        ordinal: Ordinal::try_from(i64::from(row.try_get::<i32, _>("ordinal")?))?,
        status,
        created_at: row.try_get::<DateTime<Utc>, _>("created_at")?,
    })
}

fn ordinal_param(ordinal: Ordinal) -> Result<i32, SchedulingError> {
    i32::try_from(ordinal.get()).map_err(|_| SchedulingError::Validation("Ordinal out of range".to_string()))
}

fn collect<T>(rows: Vec<PgRow>, map: fn(&PgRow) -> Result<T, SchedulingError>) -> Result<Vec<T>, SchedulingError> {
    rows.iter().map(map).collect()
}

#[async_trait]
impl SchedulingTx for PgTx {
    async fn insert_slot(&mut self, slot: NewSlot) -> Result<Slot, SchedulingError> {
        let sql = format!(
            "INSERT INTO provider_slots (provider_id, specialty_id, slot_date, slot_time, occupied) \
             VALUES ($1, $2, $3, $4, $5) RETURNING {}",
            SLOT_COLUMNS
        );
        let row = sqlx::query(&sql)
            .bind(slot.provider_id.get())
            .bind(slot.specialty_id.get())
            .bind(slot.date)
            .bind(slot.time)
            .bind(slot.occupied)
            .fetch_one(&mut *self.tx)
            .await?;
        slot_from_row(&row)
    }

    async fn get_slot(&mut self, id: SlotId) -> Result<Option<Slot>, SchedulingError> {
        let sql = format!("SELECT {} FROM provider_slots WHERE id = $1", SLOT_COLUMNS);
        let row = sqlx::query(&sql)
            .bind(id.get())
            .fetch_optional(&mut *self.tx)
            .await?;
        row.as_ref().map(slot_from_row).transpose()
    }

    async fn save_slot(&mut self, slot: &Slot) -> Result<(), SchedulingError> {
        let result = sqlx::query(
            "UPDATE provider_slots \
             SET provider_id = $2, specialty_id = $3, slot_date = $4, slot_time = $5, occupied = $6 \
             WHERE id = $1",
        )
        .bind(slot.id.get())
        .bind(slot.provider_id.get())
        .bind(slot.specialty_id.get())
        .bind(slot.date)
        .bind(slot.time)
        .bind(slot.occupied)
        .execute(&mut *self.tx)
        .await?;

        if result.rows_affected() == 0 {
            return Err(SchedulingError::NotFound("Slot not found".to_string()));
        }
        Ok(())
    }

    async fn set_occupied(&mut self, key: &SlotKey, occupied: bool) -> Result<u64, SchedulingError> {
        let result = sqlx::query(
            "UPDATE provider_slots SET occupied = $4 \
             WHERE provider_id = $1 AND slot_date = $2 AND slot_time = $3",
        )
        .bind(key.provider_id.get())
        .bind(key.date)
        .bind(key.time)
        .bind(occupied)
        .execute(&mut *self.tx)
        .await?;
        Ok(result.rows_affected())
    }

    async fn delete_slots(&mut self, key: &SlotKey) -> Result<u64, SchedulingError> {
        let result = sqlx::query(
            "DELETE FROM provider_slots WHERE provider_id = $1 AND slot_date = $2 AND slot_time = $3",
        )
        .bind(key.provider_id.get())
        .bind(key.date)
        .bind(key.time)
        .execute(&mut *self.tx)
        .await?;
        Ok(result.rows_affected())
    }

    async fn slots_for_day(&mut self, provider_id: ProviderId, date: NaiveDate) -> Result<Vec<Slot>, SchedulingError> {
        let sql = format!(
            "SELECT {} FROM provider_slots WHERE provider_id = $1 AND slot_date = $2 \
             ORDER BY slot_time, specialty_id",
            SLOT_COLUMNS
        );
        let rows = sqlx::query(&sql)
            .bind(provider_id.get())
            .bind(date)
            .fetch_all(&mut *self.tx)
            .await?;
        collect(rows, slot_from_row)
    }

    async fn count_for_patient(&mut self, patient_id: PatientId) -> Result<u32, SchedulingError> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM appointments WHERE patient_id = $1")
            .bind(patient_id.get())
            .fetch_one(&mut *self.tx)
            .await?;
        u32::try_from(count).map_err(|_| SchedulingError::Storage(format!("appointment count {} out of range", count)))
    }

    async fn insert_appointment(&mut self, appointment: NewAppointment) -> Result<Appointment, SchedulingError> {
        let sql = format!(
            "INSERT INTO appointments \
             (patient_id, provider_id, specialty_id, appointment_date, appointment_time, ordinal, status) \
             VALUES ($1, $2, $3, $4, $5, $6, 'active') RETURNING {}",
            APPOINTMENT_COLUMNS
        );
        let row = sqlx::query(&sql)
            .bind(appointment.patient_id.get())
            .bind(appointment.provider_id.get())
            .bind(appointment.specialty_id.get())
            .bind(appointment.date)
            .bind(appointment.time)
            .bind(ordinal_param(appointment.ordinal)?)
            .fetch_one(&mut *self.tx)
            .await?;
        appointment_from_row(&row)
    }

    async fn get_appointment(&mut self, id: AppointmentId) -> Result<Option<Appointment>, SchedulingError> {
        let sql = format!("SELECT {} FROM appointments WHERE id = $1 FOR UPDATE", APPOINTMENT_COLUMNS);
        let row = sqlx::query(&sql)
            .bind(id.get())
            .fetch_optional(&mut *self.tx)
            .await?;
        row.as_ref().map(appointment_from_row).transpose()
    }

    async fn find_by_ordinal(
        &mut self,
        patient_id: PatientId,
        ordinal: Ordinal,
    ) -> Result<Option<Appointment>, SchedulingError> {
        // Row lock: a concurrent cancel of the same ordinal waits for this one
        let sql = format!(
            "SELECT {} FROM appointments WHERE patient_id = $1 AND ordinal = $2 FOR UPDATE",
            APPOINTMENT_COLUMNS
        );
        let row = sqlx::query(&sql)
            .bind(patient_id.get())
            .bind(ordinal_param(ordinal)?)
            .fetch_optional(&mut *self.tx)
            .await?;
        row.as_ref().map(appointment_from_row).transpose()
    }

    async fn find_active_at(&mut self, key: &SlotKey) -> Result<Option<Appointment>, SchedulingError> {
        let sql = format!(
            "SELECT {} FROM appointments \
             WHERE provider_id = $1 AND appointment_date = $2 AND appointment_time = $3 AND status = 'active'",
            APPOINTMENT_COLUMNS
        );
        let row = sqlx::query(&sql)
            .bind(key.provider_id.get())
            .bind(key.date)
            .bind(key.time)
            .fetch_optional(&mut *self.tx)
            .await?;
        row.as_ref().map(appointment_from_row).transpose()
    }

    async fn save_appointment(&mut self, appointment: &Appointment) -> Result<(), SchedulingError> {
        let result = sqlx::query(
            "UPDATE appointments \
             SET provider_id = $2, specialty_id = $3, appointment_date = $4, appointment_time = $5, status = $6 \
             WHERE id = $1",
        )
        .bind(appointment.id.get())
        .bind(appointment.provider_id.get())
        .bind(appointment.specialty_id.get())
        .bind(appointment.date)
        .bind(appointment.time)
        .bind(appointment.status.as_str())
        .execute(&mut *self.tx)
        .await?;

        if result.rows_affected() == 0 {
            return Err(SchedulingError::NotFound("Appointment not found".to_string()));
        }
        Ok(())
    }

    async fn appointments_for_patient(&mut self, patient_id: PatientId) -> Result<Vec<Appointment>, SchedulingError> {
        let sql = format!(
            "SELECT {} FROM appointments WHERE patient_id = $1 ORDER BY ordinal",
            APPOINTMENT_COLUMNS
        );
        let rows = sqlx::query(&sql)
            .bind(patient_id.get())
            .fetch_all(&mut *self.tx)
            .await?;
        collect(rows, appointment_from_row)
    }

    async fn appointments_for_provider(&mut self, provider_id: ProviderId) -> Result<Vec<Appointment>, SchedulingError> {
        let sql = format!(
            "SELECT {} FROM appointments WHERE provider_id = $1 \
             ORDER BY appointment_date, appointment_time, id",
            APPOINTMENT_COLUMNS
        );
        let rows = sqlx::query(&sql)
            .bind(provider_id.get())
            .fetch_all(&mut *self.tx)
            .await?;
        collect(rows, appointment_from_row)
    }

    async fn active_for_day(&mut self, provider_id: ProviderId, date: NaiveDate) -> Result<Vec<Appointment>, SchedulingError> {
        let sql = format!(
            "SELECT {} FROM appointments \
             WHERE provider_id = $1 AND appointment_date = $2 AND status = 'active' \
             ORDER BY appointment_time",
            APPOINTMENT_COLUMNS
        );
        let rows = sqlx::query(&sql)
            .bind(provider_id.get())
            .bind(date)
            .fetch_all(&mut *self.tx)
            .await?;
        collect(rows, appointment_from_row)
    }

    async fn active_counts_by_date(&mut self) -> Result<Vec<DailyCount>, SchedulingError> {
        let rows = sqlx::query(
            "SELECT appointment_date, COUNT(*) AS total FROM appointments \
             WHERE status = 'active' GROUP BY appointment_date ORDER BY appointment_date",
        )
        .fetch_all(&mut *self.tx)
        .await?;

        rows.iter()
            .map(|row| -> Result<DailyCount, SchedulingError> {
                let total: i64 = row.try_get("total")?;
                Ok(DailyCount {
                    date: row.try_get("appointment_date")?,
                    count: u64::try_from(total).unwrap_or_default(),
                })
            })
            .collect()
    }

    async fn commit(self: Box<Self>) -> Result<(), SchedulingError> {
        self.tx.commit().await.map_err(|e| {
            warn!("Scheduling transaction commit failed: {}", e);
            SchedulingError::from(e)
        })
    }
}
