//! Database operations over `SQLite`.
//!
//! # Databases
//!
//! - main (`DATABASE_URL`): `users`, `tickets`, `configuracion`, `sessions`
//! - catalog (`CATALOG_DATABASE_URL`): `negocios`, `productos`, `sucursales`,
//!   `ofertas`, `precios_historial`, `categorias`
//!
//! Both may live in the same file. Schemas are applied idempotently with
//! `CREATE TABLE IF NOT EXISTS` on server start and by `bt-cli migrate`.

pub mod catalog;
pub mod schema;
pub mod settings;
pub mod tickets;
pub mod users;

use std::str::FromStr;
use std::time::Duration;

use secrecy::{ExposeSecret, SecretString};
use sqlx::SqlitePool;
use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions};
use thiserror::Error;

pub use catalog::CatalogRepository;
pub use schema::{init_catalog_schema, init_ticket_schema};
pub use settings::SettingsRepository;
pub use tickets::TicketRepository;
pub use users::UserRepository;

/// Errors that can occur during repository operations.
#[derive(Debug, Error)]
pub enum RepositoryError {
    /// Database error from sqlx.
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    /// Data in the database is corrupted or invalid.
    #[error("data corruption: {0}")]
    DataCorruption(String),

    /// Requested entity was not found.
    #[error("not found")]
    NotFound,

    /// Constraint violation (e.g., unique email).
    #[error("constraint violation: {0}")]
    Conflict(String),
}

/// Map a unique-constraint violation to `Conflict`, anything else to `Database`.
pub(crate) fn conflict_on_unique(e: sqlx::Error, what: &str) -> RepositoryError {
    if let sqlx::Error::Database(ref db_err) = e
        && db_err.is_unique_violation()
    {
        return RepositoryError::Conflict(format!("{what} already exists"));
    }
    RepositoryError::Database(e)
}

/// Create a `SQLite` connection pool.
///
/// The database file is created if missing and foreign keys are enforced.
/// In-memory URLs get a single long-lived connection, since every new
/// connection to `:memory:` would otherwise open an empty database.
///
/// # Errors
///
/// Returns `sqlx::Error` if the URL is malformed or the connection cannot
/// be established.
pub async fn create_pool(database_url: &SecretString) -> Result<SqlitePool, sqlx::Error> {
    let url = database_url.expose_secret();
    let in_memory = url.contains(":memory:") || url.contains("mode=memory");

    let mut options = SqliteConnectOptions::from_str(url)?
        .create_if_missing(true)
        .foreign_keys(true)
        .busy_timeout(Duration::from_secs(5));
    if !in_memory {
        options = options.journal_mode(SqliteJournalMode::Wal);
    }

    let pool_options = if in_memory {
        SqlitePoolOptions::new()
            .max_connections(1)
            .min_connections(1)
            .idle_timeout(None)
            .max_lifetime(None)
    } else {
        SqlitePoolOptions::new()
            .max_connections(10)
            .min_connections(1)
    };

    pool_options
        .acquire_timeout(Duration::from_secs(10))
        .connect_with(options)
        .await
}
