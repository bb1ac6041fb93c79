use std::time::Duration;

use anyhow::{anyhow, Result};
use sqlx::postgres::{PgPool, PgPoolOptions};
use tracing::{debug, info};

use shared_config::AppConfig;

const SCHEMA: &[&str] = &[
    r#"
    CREATE TABLE IF NOT EXISTS provider_slots (
        id BIGSERIAL PRIMARY KEY,
        provider_id BIGINT NOT NULL,
        specialty_id BIGINT NOT NULL,
        slot_date DATE NOT NULL,
        slot_time TIME NOT NULL,
        occupied BOOLEAN NOT NULL DEFAULT FALSE,
        CONSTRAINT provider_slots_key UNIQUE (provider_id, specialty_id, slot_date, slot_time)
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS appointments (
        id BIGSERIAL PRIMARY KEY,
        patient_id BIGINT NOT NULL,
        provider_id BIGINT NOT NULL,
        specialty_id BIGINT NOT NULL,
        appointment_date DATE NOT NULL,
        appointment_time TIME NOT NULL,
        ordinal INTEGER NOT NULL,
        status TEXT NOT NULL DEFAULT 'active',
        created_at TIMESTAMPTZ NOT NULL DEFAULT NOW(),
        CONSTRAINT appointments_patient_ordinal_key UNIQUE (patient_id, ordinal),
        CONSTRAINT appointments_status_check CHECK (status IN ('active', 'cancelled'))
    )
    "#,
    r#"
    CREATE UNIQUE INDEX IF NOT EXISTS appointments_active_slot_idx
        ON appointments (provider_id, appointment_date, appointment_time)
        WHERE status = 'active'
    "#,
    r#"
    CREATE INDEX IF NOT EXISTS provider_slots_lookup_idx
        ON provider_slots (provider_id, slot_date, slot_time)
    "#,
];

/// Builds the connection pool shared by every request handler.
pub async fn connect(config: &AppConfig) -> Result<PgPool> {
    if config.database_url.is_empty() {
        return Err(anyhow!("DATABASE_URL is required for the postgres storage backend"));
    }

    let pool = PgPoolOptions::new()
        .max_connections(config.database_max_connections)
        .acquire_timeout(Duration::from_secs(5))
        .connect(&config.database_url)
        .await?;

    info!(
        "Postgres pool ready (max {} connections)",
        config.database_max_connections
    );
    Ok(pool)
}

/// Creates tables and indexes when they are missing.
pub async fn ensure_schema(pool: &PgPool) -> Result<()> {
    for statement in SCHEMA {
        sqlx::query(*statement).execute(pool).await?;
    }
    debug!("Scheduling schema verified");
    Ok(())
}
