use std::collections::BTreeSet;
use std::sync::Arc;

use chrono::{NaiveDate, NaiveTime, Timelike};
use tracing::{debug, info, warn};

use shared_config::SlotGridConfig;
use shared_models::{ProviderId, SlotId, SpecialtyId};

use crate::error::{ConflictReason, SchedulingError};
use crate::models::{NewSlot, Slot, SlotAction, SlotKey, SlotPatch, SlotState};
use crate::store::{SchedulingStore, SchedulingTx};

/// Occupancy of each provider's daily slot grid.
#[derive(Clone)]
pub struct SlotCatalog {
    store: Arc<dyn SchedulingStore>,
    grid: SlotGridConfig,
}

impl SlotCatalog {
    pub fn new(store: Arc<dyn SchedulingStore>, grid: SlotGridConfig) -> Self {
        Self { store, grid }
    }

    /// Grid times from start through end, every `step_minutes`.
    pub fn grid_times(&self) -> Vec<NaiveTime> {
        let start = self.grid.start.num_seconds_from_midnight() / 60;
        let end = self.grid.end.num_seconds_from_midnight() / 60;
        let step = self.grid.step_minutes.max(1) as usize;

        (start..=end)
            .step_by(step)
            .filter_map(|minute| NaiveTime::from_hms_opt(minute / 60, minute % 60, 0))
            .collect()
    }

    pub async fn register_slot(
        &self,
        provider_id: ProviderId,
        specialty_id: SpecialtyId,
        date: NaiveDate,
        time: NaiveTime,
        state: SlotState,
    ) -> Result<Slot, SchedulingError> {
        let mut tx = self.store.begin().await?;
        let slot = tx
            .insert_slot(NewSlot {
                provider_id,
                specialty_id,
                date,
                time,
                occupied: state.is_occupied(),
            })
            .await?;
        tx.commit().await?;

        info!("Registered slot {} for {}", slot.id, slot.key());
        Ok(slot)
    }

    pub async fn get_slot(&self, id: SlotId) -> Result<Slot, SchedulingError> {
        let mut tx = self.store.begin().await?;
        tx.get_slot(id)
            .await?
            .ok_or_else(|| SchedulingError::NotFound("Slot not found".to_string()))
    }

    pub async fn occupy(&self, key: SlotKey) -> Result<u64, SchedulingError> {
        let mut tx = self.store.begin().await?;
        let affected = self.occupy_in(tx.as_mut(), key).await?;
        tx.commit().await?;
        Ok(affected)
    }

    pub async fn release(&self, key: SlotKey) -> Result<u64, SchedulingError> {
        let mut tx = self.store.begin().await?;
        let affected = self.release_in(tx.as_mut(), key).await?;
        tx.commit().await?;
        Ok(affected)
    }

    /// Marks every slot at `key` occupied. No matching row is not an error.
    pub async fn occupy_in(&self, tx: &mut dyn SchedulingTx, key: SlotKey) -> Result<u64, SchedulingError> {
        let affected = tx.set_occupied(&key, true).await?;
        if affected == 0 {
            debug!("No registered slot to occupy for {}", key);
        }
        Ok(affected)
    }

    pub async fn release_in(&self, tx: &mut dyn SchedulingTx, key: SlotKey) -> Result<u64, SchedulingError> {
        let affected = tx.set_occupied(&key, false).await?;
        if affected == 0 {
            debug!("No registered slot to release for {}", key);
        }
        Ok(affected)
    }

    /// Free times for the day: grid plus registered slots, minus anything
    /// occupied or held by an active appointment.
    pub async fn list_available(
        &self,
        provider_id: ProviderId,
        specialty_id: SpecialtyId,
        date: NaiveDate,
    ) -> Result<Vec<NaiveTime>, SchedulingError> {
        let mut tx = self.store.begin().await?;
        let slots = tx.slots_for_day(provider_id, date).await?;
        let booked = tx.active_for_day(provider_id, date).await?;

        let taken: BTreeSet<NaiveTime> = slots
            .iter()
            .filter(|s| s.occupied)
            .map(|s| s.time)
            .chain(booked.iter().map(|a| a.time))
            .collect();

        let candidates: BTreeSet<NaiveTime> = self
            .grid_times()
            .into_iter()
            .chain(slots.iter().filter(|s| s.specialty_id == specialty_id).map(|s| s.time))
            .collect();

        Ok(candidates.difference(&taken).copied().collect())
    }

    /// Occupied times for the provider and specialty on that day.
    pub async fn list_registered(
        &self,
        provider_id: ProviderId,
        specialty_id: SpecialtyId,
        date: NaiveDate,
    ) -> Result<Vec<NaiveTime>, SchedulingError> {
        let mut tx = self.store.begin().await?;
        let slots = tx.slots_for_day(provider_id, date).await?;
        let booked = tx.active_for_day(provider_id, date).await?;

        let occupied: BTreeSet<NaiveTime> = slots
            .iter()
            .filter(|s| s.occupied && s.specialty_id == specialty_id)
            .map(|s| s.time)
            .chain(booked.iter().filter(|a| a.specialty_id == specialty_id).map(|a| a.time))
            .collect();

        Ok(occupied.into_iter().collect())
    }

    pub async fn update_slot(&self, id: SlotId, patch: SlotPatch) -> Result<Slot, SchedulingError> {
        if patch.is_empty() {
            return Err(SchedulingError::Validation("No slot fields supplied".to_string()));
        }

        let mut tx = self.store.begin().await?;
        let mut slot = tx
            .get_slot(id)
            .await?
            .ok_or_else(|| SchedulingError::NotFound("Slot not found".to_string()))?;

        patch.apply(&mut slot);
        tx.save_slot(&slot).await?;
        tx.commit().await?;

        debug!("Slot {} updated", id);
        Ok(slot)
    }

    /// Applies `action` to every slot at `key`; returns rows touched.
    pub async fn edit_by_key(&self, key: SlotKey, action: SlotAction) -> Result<u64, SchedulingError> {
        let mut tx = self.store.begin().await?;

        let affected = match action {
            SlotAction::Occupy => self.occupy_in(tx.as_mut(), key).await?,
            SlotAction::Release => self.release_in(tx.as_mut(), key).await?,
            SlotAction::Delete => {
                if tx.find_active_at(&key).await?.is_some() {
                    warn!("Refusing to delete slot at {}: active appointment", key);
                    return Err(SchedulingError::Conflict(ConflictReason::SlotInUse));
                }
                tx.delete_slots(&key).await?
            }
        };

        tx.commit().await?;
        Ok(affected)
    }
}
