pub mod date;
pub mod test_utils;

pub use date::{format_date, format_slot_time, normalize_date, parse_slot_time, DateError};
