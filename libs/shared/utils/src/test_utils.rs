use std::sync::Arc;

use chrono::{NaiveDate, NaiveTime};

use shared_config::{AppConfig, SlotGridConfig, StorageBackend};

pub struct TestConfig {
    pub slot_grid: SlotGridConfig,
    pub booking_max_ordinal_retries: u32,
    pub notifier_max_attempts: u32,
    pub notifier_backoff_ms: u64,
    pub notifier_webhook_url: Option<String>,
}

impl Default for TestConfig {
    fn default() -> Self {
        Self {
            slot_grid: SlotGridConfig::default(),
            booking_max_ordinal_retries: 3,
            notifier_max_attempts: 3,
            notifier_backoff_ms: 10,
            notifier_webhook_url: None,
        }
    }
}

impl TestConfig {
    pub fn to_app_config(&self) -> AppConfig {
        AppConfig {
            storage_backend: StorageBackend::Memory,
            slot_grid: self.slot_grid.clone(),
            booking_max_ordinal_retries: self.booking_max_ordinal_retries,
            notifier_max_attempts: self.notifier_max_attempts,
            notifier_backoff_ms: self.notifier_backoff_ms,
            notifier_webhook_url: self.notifier_webhook_url.clone(),
            notifier_workers: 1,
            ..AppConfig::default()
        }
    }

    pub fn to_arc(&self) -> Arc<AppConfig> {
        Arc::new(self.to_app_config())
    }
}

/// `YYYY-MM-DD` literal to date; panics on bad input, tests only.
pub fn date(value: &str) -> NaiveDate {
    NaiveDate::parse_from_str(value, "%Y-%m-%d").expect("test date must be YYYY-MM-DD")
}

/// `HH:MM` literal to time; panics on bad input, tests only.
pub fn time(value: &str) -> NaiveTime {
    NaiveTime::parse_from_str(value, "%H:%M").expect("test time must be HH:MM")
}

/// The default grid rendered as strings, handy for availability assertions.
pub fn default_grid_times() -> Vec<String> {
    (8..=16).map(|hour| format!("{:02}:00", hour)).collect()
}
