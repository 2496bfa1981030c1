//! Schema setup.
//!
//! Runs the same idempotent `CREATE TABLE IF NOT EXISTS` statements the
//! server applies on startup, so it is safe to run against a live database.

use belgrano_tickets::db::{init_catalog_schema, init_ticket_schema};

use super::{CliError, catalog_pool, tickets_pool};

/// Apply the ticket and catalog schemas.
///
/// # Errors
///
/// Returns `CliError::Database` if a connection or statement fails.
pub async fn run() -> Result<(), CliError> {
    let pool = tickets_pool().await?;
    tracing::info!("Applying ticket schema...");
    init_ticket_schema(&pool).await?;

    let catalog = catalog_pool().await?;
    tracing::info!("Applying catalog schema...");
    init_catalog_schema(&catalog).await?;

    tracing::info!("Schemas up to date");
    Ok(())
}
