pub mod coordinator;
pub mod ledger;
pub mod slots;

pub use coordinator::SchedulingCoordinator;
pub use ledger::{AppointmentLedger, LedgerUpdate};
pub use slots::SlotCatalog;
