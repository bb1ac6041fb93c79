pub mod error;
pub mod handlers;
pub mod models;
pub mod router;
pub mod services;
pub mod state;
pub mod store;

pub use error::{ConflictReason, SchedulingError};
pub use models::*;
pub use router::scheduling_routes;
pub use services::*;
pub use state::SchedulingState;
pub use store::{MemorySchedulingStore, PgSchedulingStore, SchedulingStore, SchedulingTx};
