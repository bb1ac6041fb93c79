use std::sync::Arc;

use notification_queue_cell::Notifier;
use shared_config::AppConfig;

use crate::services::{AppointmentLedger, SchedulingCoordinator, SlotCatalog};
use crate::store::SchedulingStore;

/// Everything the scheduling handlers need, built once at startup.
#[derive(Clone)]
pub struct SchedulingState {
    pub catalog: SlotCatalog,
    pub ledger: AppointmentLedger,
    pub coordinator: SchedulingCoordinator,
}

impl SchedulingState {
    pub fn new(config: &AppConfig, store: Arc<dyn SchedulingStore>, notifier: Arc<dyn Notifier>) -> Self {
        let catalog = SlotCatalog::new(Arc::clone(&store), config.slot_grid.clone());
        let ledger = AppointmentLedger::new(Arc::clone(&store));
        let coordinator = SchedulingCoordinator::new(
            store,
            catalog.clone(),
            ledger.clone(),
            notifier,
            config.booking_max_ordinal_retries,
        );

        Self {
            catalog,
            ledger,
            coordinator,
        }
    }
}
