//! Subcommand implementations.

pub mod migrate;
pub mod seed;
pub mod user;

use secrecy::SecretString;
use sqlx::SqlitePool;
use thiserror::Error;

use belgrano_tickets::db::{self, RepositoryError};
use belgrano_tickets::services::auth::AuthError;

/// Errors that can occur while running a command.
#[derive(Debug, Error)]
pub enum CliError {
    /// Database connection or schema error.
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    /// Repository error.
    #[error("Repository error: {0}")]
    Repository(#[from] RepositoryError),

    /// Hashing or account validation error.
    #[error("Account error: {0}")]
    Auth(#[from] AuthError),

    /// Invalid role.
    #[error("Invalid role: {0}. Valid roles: admin, flota")]
    InvalidRole(String),

    /// A user with this username or email exists.
    #[error("User already exists: {0}")]
    UserExists(String),
}

/// Read a database URL from the environment, falling back to `default`.
fn database_url(key: &str, default: &str) -> SecretString {
    SecretString::from(std::env::var(key).unwrap_or_else(|_| default.to_owned()))
}

/// Connect to the tickets/users database.
pub(crate) async fn tickets_pool() -> Result<SqlitePool, CliError> {
    dotenvy::dotenv().ok();
    tracing::info!("Connecting to tickets database...");
    Ok(db::create_pool(&database_url("DATABASE_URL", "sqlite://tickets.db")).await?)
}

/// Connect to the catalog database.
pub(crate) async fn catalog_pool() -> Result<SqlitePool, CliError> {
    dotenvy::dotenv().ok();
    tracing::info!("Connecting to catalog database...");
    Ok(db::create_pool(&database_url(
        "CATALOG_DATABASE_URL",
        "sqlite://belgrano_ahorro.db",
    ))
    .await?)
}
