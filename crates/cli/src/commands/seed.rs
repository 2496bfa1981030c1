//! Default account maintenance.

use belgrano_tickets::db::init_ticket_schema;
use belgrano_tickets::services::seed::{
    reset_default_credentials, seed_default_settings, seed_default_users,
};

use super::{CliError, tickets_pool};

/// Create the default accounts if the users table is empty, plus any
/// missing default settings.
///
/// # Errors
///
/// Returns an error if the database is unreachable or an insert fails.
pub async fn default_users() -> Result<(), CliError> {
    let pool = tickets_pool().await?;
    init_ticket_schema(&pool).await?;

    match seed_default_users(&pool).await? {
        0 => tracing::info!("Users already exist, nothing to seed"),
        created => tracing::info!(created, "Default accounts created"),
    }
    let settings = seed_default_settings(&pool).await?;
    tracing::info!(created = settings, "Default settings checked");
    Ok(())
}

/// Restore the default accounts' passwords and reactivate them.
///
/// # Errors
///
/// Returns an error if the database is unreachable or an update fails.
pub async fn reset_credentials() -> Result<(), CliError> {
    let pool = tickets_pool().await?;
    init_ticket_schema(&pool).await?;

    let report = reset_default_credentials(&pool).await?;
    tracing::info!(
        updated = report.updated,
        created = report.created,
        "Default credentials reset"
    );
    Ok(())
}
