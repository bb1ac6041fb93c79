pub mod postgres;

pub use postgres::{connect, ensure_schema};
