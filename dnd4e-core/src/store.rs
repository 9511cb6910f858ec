//! SQLite store for characters, drafts and compendium data.
//!
//! [`Store`] wraps a connection pool and owns the schema. [`StoreHandle`]
//! opens the store lazily, once, no matter how many callers ask for it at
//! the same time; if opening fails, the next caller tries again from
//! scratch.

use crate::compendium;
use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePool, SqlitePoolOptions};
use sqlx::{Sqlite, Transaction};
use std::str::FromStr;
use thiserror::Error;
use tokio::sync::OnceCell;
use tracing::{debug, info};

/// Errors from store, draft and repository operations.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("{kind} not found: {id}")]
    NotFound { kind: RecordKind, id: String },

    #[error("Storage unavailable: {0}")]
    Unavailable(#[source] sqlx::Error),

    #[error("Transaction failed and was rolled back: {0}")]
    TransactionFailure(#[source] sqlx::Error),

    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Invalid id in storage: {0}")]
    InvalidId(String),
}

impl StoreError {
    pub fn is_not_found(&self) -> bool {
        matches!(self, StoreError::NotFound { .. })
    }

    pub(crate) fn draft_not_found(id: impl ToString) -> Self {
        StoreError::NotFound {
            kind: RecordKind::Draft,
            id: id.to_string(),
        }
    }

    pub(crate) fn character_not_found(id: impl ToString) -> Self {
        StoreError::NotFound {
            kind: RecordKind::Character,
            id: id.to_string(),
        }
    }
}

/// Which kind of record a [`StoreError::NotFound`] refers to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecordKind {
    Draft,
    Character,
}

impl std::fmt::Display for RecordKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RecordKind::Draft => write!(f, "Draft"),
            RecordKind::Character => write!(f, "Character"),
        }
    }
}

// ============================================================================
// Configuration
// ============================================================================

/// Environment variable holding the database URL.
pub const DATABASE_URL_ENV: &str = "DND4E_DATABASE_URL";

/// Environment variable holding the pool size.
pub const MAX_CONNECTIONS_ENV: &str = "DND4E_MAX_CONNECTIONS";

const DEFAULT_DATABASE_URL: &str = "sqlite://dnd4e.db";
const DEFAULT_MAX_CONNECTIONS: u32 = 4;

/// Configuration for opening a store.
#[derive(Debug, Clone)]
pub struct StoreConfig {
    /// SQLite URL, e.g. `sqlite://dnd4e.db` or `sqlite::memory:`.
    pub database_url: String,

    /// Maximum pooled connections.
    pub max_connections: u32,

    /// Use write-ahead logging.
    pub wal: bool,
}

impl StoreConfig {
    pub fn new(database_url: impl Into<String>) -> Self {
        Self {
            database_url: database_url.into(),
            max_connections: DEFAULT_MAX_CONNECTIONS,
            wal: true,
        }
    }

    /// A private in-memory database.
    ///
    /// Every SQLite in-memory connection is its own database, so the pool
    /// is pinned to a single connection that is never recycled.
    pub fn in_memory() -> Self {
        Self {
            database_url: "sqlite::memory:".to_string(),
            max_connections: 1,
            wal: false,
        }
    }

    /// Read configuration from the environment, falling back to defaults.
    pub fn from_env() -> Self {
        let database_url =
            std::env::var(DATABASE_URL_ENV).unwrap_or_else(|_| DEFAULT_DATABASE_URL.to_string());
        let max_connections = std::env::var(MAX_CONNECTIONS_ENV)
            .ok()
            .and_then(|v| v.parse().ok())
            .unwrap_or(DEFAULT_MAX_CONNECTIONS);

        Self::new(database_url).with_max_connections(max_connections)
    }

    pub fn with_max_connections(mut self, max_connections: u32) -> Self {
        self.max_connections = max_connections.max(1);
        self
    }

    pub fn with_wal(mut self, wal: bool) -> Self {
        self.wal = wal;
        self
    }

    fn is_in_memory(&self) -> bool {
        self.database_url.contains(":memory:") || self.database_url.contains("mode=memory")
    }
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self::new(DEFAULT_DATABASE_URL)
    }
}

// ============================================================================
// Store
// ============================================================================

const SCHEMA: &[&str] = &[
    r#"
    CREATE TABLE IF NOT EXISTS meta (
        key TEXT PRIMARY KEY,
        value TEXT
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS characters (
        id TEXT PRIMARY KEY,
        name TEXT,
        level INTEGER,
        race TEXT,
        class TEXT,
        data TEXT
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS character_drafts (
        id TEXT PRIMARY KEY,
        step INTEGER DEFAULT 1,
        data TEXT
    )
    "#,
];

/// An open, initialised store.
///
/// Cheap to clone; clones share the connection pool.
#[derive(Debug, Clone)]
pub struct Store {
    pool: SqlitePool,
}

impl Store {
    /// Connect, verify the connection, create the schema and seed the
    /// compendium.
    ///
    /// Any failure before seeding is reported as [`StoreError::Unavailable`].
    /// Seeding failures are logged and do not fail the open.
    pub async fn open(config: &StoreConfig) -> Result<Self, StoreError> {
        info!(url = %config.database_url, "Opening character store");

        let mut options = SqliteConnectOptions::from_str(&config.database_url)
            .map_err(StoreError::Unavailable)?
            .create_if_missing(true)
            .foreign_keys(true);
        if config.wal && !config.is_in_memory() {
            options = options.journal_mode(SqliteJournalMode::Wal);
        }

        let mut pool_options = SqlitePoolOptions::new().max_connections(config.max_connections);
        if config.is_in_memory() {
            pool_options = pool_options
                .max_connections(1)
                .min_connections(1)
                .idle_timeout(None)
                .max_lifetime(None);
        }

        let pool = pool_options
            .connect_with(options)
            .await
            .map_err(StoreError::Unavailable)?;

        sqlx::query("SELECT 1")
            .execute(&pool)
            .await
            .map_err(StoreError::Unavailable)?;

        let store = Self { pool };
        store.migrate().await.map_err(StoreError::Unavailable)?;
        compendium::seed_compendium(&store).await;

        Ok(store)
    }

    /// Open a fresh in-memory store.
    pub async fn open_in_memory() -> Result<Self, StoreError> {
        Self::open(&StoreConfig::in_memory()).await
    }

    async fn migrate(&self) -> Result<(), sqlx::Error> {
        debug!("Creating tables");
        for statement in SCHEMA.iter().chain(compendium::SCHEMA) {
            sqlx::query(statement).execute(&self.pool).await?;
        }
        Ok(())
    }

    /// The underlying pool, for single-statement queries.
    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    /// Start a transaction. Dropping it without committing rolls back.
    pub async fn begin(&self) -> Result<Transaction<'static, Sqlite>, StoreError> {
        Ok(self.pool.begin().await?)
    }

    /// Close the pool, waiting for connections to be returned.
    pub async fn close(&self) {
        self.pool.close().await;
    }
}

// ============================================================================
// Lazy Handle
// ============================================================================

/// Lazily opened store shared by everything that needs persistence.
///
/// Pass one handle (or clones of the [`Store`] it yields) explicitly to the
/// draft manager and repository instead of reaching for global state.
#[derive(Debug)]
pub struct StoreHandle {
    config: StoreConfig,
    cell: OnceCell<Store>,
}

impl StoreHandle {
    pub fn new(config: StoreConfig) -> Self {
        Self {
            config,
            cell: OnceCell::new(),
        }
    }

    pub fn from_env() -> Self {
        Self::new(StoreConfig::from_env())
    }

    pub fn config(&self) -> &StoreConfig {
        &self.config
    }

    /// Get the store, opening it on first use.
    ///
    /// Concurrent first callers share one open attempt. A failed attempt
    /// leaves the handle empty, so a later call opens again.
    pub async fn store(&self) -> Result<Store, StoreError> {
        self.cell
            .get_or_try_init(|| Store::open(&self.config))
            .await
            .cloned()
    }

    pub fn is_open(&self) -> bool {
        self.cell.initialized()
    }
}
