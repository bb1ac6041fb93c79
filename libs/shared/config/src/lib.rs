use std::env;
use std::str::FromStr;

use chrono::NaiveTime;
use tracing::warn;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StorageBackend {
    Postgres,
    Memory,
}

/// Daily slot grid: every `step_minutes` from `start` through `end` inclusive.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SlotGridConfig {
    pub start: NaiveTime,
    pub end: NaiveTime,
    pub step_minutes: u32,
}

impl Default for SlotGridConfig {
    fn default() -> Self {
        Self {
            start: NaiveTime::from_hms_opt(8, 0, 0).unwrap_or_default(),
            end: NaiveTime::from_hms_opt(16, 0, 0).unwrap_or_default(),
            step_minutes: 60,
        }
    }
}

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub database_url: String,
    pub database_max_connections: u32,
    pub storage_backend: StorageBackend,
    pub redis_url: Option<String>,
    pub notifier_webhook_url: Option<String>,
    pub slot_grid: SlotGridConfig,
    pub booking_max_ordinal_retries: u32,
    pub notifier_max_attempts: u32,
    pub notifier_backoff_ms: u64,
    pub notifier_workers: u32,
    pub server_port: u16,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            database_url: String::new(),
            database_max_connections: 10,
            storage_backend: StorageBackend::Memory,
            redis_url: None,
            notifier_webhook_url: None,
            slot_grid: SlotGridConfig::default(),
            booking_max_ordinal_retries: 3,
            notifier_max_attempts: 5,
            notifier_backoff_ms: 500,
            notifier_workers: 2,
            server_port: 3000,
        }
    }
}

impl AppConfig {
    pub fn from_env() -> Self {
        let defaults = Self::default();
        let default_grid = SlotGridConfig::default();

        let config = Self {
            database_url: env::var("DATABASE_URL")
                .unwrap_or_else(|_| {
                    warn!("DATABASE_URL not set, using empty value");
                    String::new()
                }),
            database_max_connections: parse_var("DATABASE_MAX_CONNECTIONS", defaults.database_max_connections),
            storage_backend: match env::var("STORAGE_BACKEND").as_deref() {
                Ok("memory") => StorageBackend::Memory,
                Ok("postgres") => StorageBackend::Postgres,
                Ok(other) => {
                    warn!("Unknown STORAGE_BACKEND '{}', using postgres", other);
                    StorageBackend::Postgres
                }
                Err(_) => StorageBackend::Postgres,
            },
            redis_url: optional_var("REDIS_URL"),
            notifier_webhook_url: optional_var("NOTIFIER_WEBHOOK_URL"),
            slot_grid: SlotGridConfig {
                start: parse_time_var("SLOT_GRID_START", default_grid.start),
                end: parse_time_var("SLOT_GRID_END", default_grid.end),
                step_minutes: parse_var("SLOT_GRID_STEP_MINUTES", default_grid.step_minutes),
            },
            booking_max_ordinal_retries: parse_var("BOOKING_MAX_ORDINAL_RETRIES", defaults.booking_max_ordinal_retries),
            notifier_max_attempts: parse_var("NOTIFIER_MAX_ATTEMPTS", defaults.notifier_max_attempts),
            notifier_backoff_ms: parse_var("NOTIFIER_BACKOFF_MS", defaults.notifier_backoff_ms),
            notifier_workers: parse_var("NOTIFIER_WORKERS", defaults.notifier_workers),
            server_port: parse_var("SERVER_PORT", defaults.server_port),
        };

        if !config.is_configured() {
            warn!("Application not fully configured - missing environment variables");
        }

        config
    }

    pub fn is_configured(&self) -> bool {
        match self.storage_backend {
            StorageBackend::Postgres => !self.database_url.is_empty(),
            StorageBackend::Memory => true,
        }
    }

    pub fn is_redis_configured(&self) -> bool {
        self.redis_url.as_deref().is_some_and(|url| !url.is_empty())
    }
}

fn optional_var(name: &str) -> Option<String> {
    env::var(name).ok().filter(|value| !value.is_empty())
}

fn parse_var<T: FromStr + Copy + std::fmt::Display>(name: &str, default: T) -> T {
    match env::var(name) {
        Ok(raw) => raw.parse().unwrap_or_else(|_| {
            warn!("{} has invalid value '{}', using default {}", name, raw, default);
            default
        }),
        Err(_) => default,
    }
}

fn parse_time_var(name: &str, default: NaiveTime) -> NaiveTime {
    match env::var(name) {
        Ok(raw) => NaiveTime::parse_from_str(&raw, "%H:%M").unwrap_or_else(|_| {
            warn!("{} must be HH:MM, got '{}', using {}", name, raw, default.format("%H:%M"));
            default
        }),
        Err(_) => default,
    }
}
