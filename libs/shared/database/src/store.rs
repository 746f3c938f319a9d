use std::str::FromStr;
use std::time::Duration;

use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePool, SqlitePoolOptions};
use sqlx::{Sqlite, Transaction};
use tracing::{debug, info};

use shared_config::AppConfig;

use crate::error::StoreError;

/// Type alias for a store transaction checked out from the pool.
pub type StoreTransaction = Transaction<'static, Sqlite>;

/// Handle to the clinic schedule/appointment store.
///
/// One instance is created at startup and injected into every service;
/// there is no process-wide singleton beyond the pool this wraps.
#[derive(Debug, Clone)]
pub struct ScheduleStore {
    pool: SqlitePool,
}

/// Schema is normalized so the store's own constraints carry the booking
/// invariants: `schedule_slots` is keyed by (day, slot_time), and a slot is
/// claimed by writing its `appointment_id` through a guarded update.
const SCHEMA: &[&str] = &[
    r#"
    CREATE TABLE IF NOT EXISTS schedule_days (
        day TEXT PRIMARY KEY,
        published_at TEXT NOT NULL,
        updated_at TEXT NOT NULL
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS appointments (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        day TEXT NOT NULL,
        slot_time TEXT NOT NULL,
        patient_name TEXT NOT NULL,
        patient_phone TEXT NOT NULL,
        patient_email TEXT NOT NULL,
        reason TEXT,
        notes TEXT,
        status TEXT NOT NULL DEFAULT 'confirmed',
        is_regular INTEGER NOT NULL DEFAULT 0,
        regular_patient_id INTEGER,
        created_at TEXT NOT NULL,
        updated_at TEXT NOT NULL
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS schedule_slots (
        day TEXT NOT NULL REFERENCES schedule_days(day),
        slot_time TEXT NOT NULL,
        is_offered INTEGER NOT NULL DEFAULT 1,
        appointment_id INTEGER REFERENCES appointments(id),
        patient_name TEXT,
        PRIMARY KEY (day, slot_time)
    )
    "#,
    r#"
    CREATE INDEX IF NOT EXISTS idx_appointments_day
        ON appointments(day, slot_time)
    "#,
];

impl ScheduleStore {
    /// Connect using the application configuration.
    pub async fn connect(config: &AppConfig) -> Result<Self, StoreError> {
        if config.database_url.is_empty() {
            return Err(StoreError::Config("Database URL is empty".to_string()));
        }
        Self::from_url(&config.database_url).await
    }

    /// Connect directly to a database URL (used by tests).
    pub async fn from_url(db_url: &str) -> Result<Self, StoreError> {
        if db_url.is_empty() {
            return Err(StoreError::Config("Database URL is empty".to_string()));
        }

        let pool = Self::create_pool(db_url).await?;
        Ok(Self { pool })
    }

    async fn create_pool(db_url: &str) -> Result<SqlitePool, StoreError> {
        debug!("Creating database pool for {}", db_url);

        // WAL keeps readers unblocked while a coordinator holds the write
        // lock; the busy timeout bounds how long a second writer waits.
        let options = SqliteConnectOptions::from_str(db_url)
            .map_err(|e| StoreError::Pool(e.to_string()))?
            .create_if_missing(true)
            .journal_mode(SqliteJournalMode::Wal)
            .busy_timeout(Duration::from_secs(5))
            .foreign_keys(true);

        let pool = SqlitePoolOptions::new()
            .max_connections(5)
            .acquire_timeout(Duration::from_secs(3))
            .connect_with(options)
            .await
            .map_err(|e| StoreError::Pool(e.to_string()))?;

        info!("Database pool created successfully");
        Ok(pool)
    }

    /// Create the schedule and appointment tables if they do not exist.
    pub async fn init_schema(&self) -> Result<(), StoreError> {
        debug!("Initializing schedule store schema");

        for statement in SCHEMA {
            sqlx::query(statement).execute(&self.pool).await?;
        }

        info!("Schedule store schema initialized successfully");
        Ok(())
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    /// Begin a transaction; every coordinator runs its read-modify-write
    /// sequence inside exactly one of these.
    pub async fn begin(&self) -> Result<StoreTransaction, StoreError> {
        self.pool
            .begin()
            .await
            .map_err(|e| StoreError::Transaction(e.to_string()))
    }

    pub async fn is_healthy(&self) -> bool {
        sqlx::query("SELECT 1").execute(&self.pool).await.is_ok()
    }
}
