//! Panel user management.

use rand::{Rng, distr::Alphanumeric};

use belgrano_tickets::db::users::NewUser;
use belgrano_tickets::db::{RepositoryError, UserRepository, init_ticket_schema};
use belgrano_tickets::services::auth::{hash_password, validate_password};
use belgrano_tickets_core::{Email, Role, UserId};

use super::{CliError, tickets_pool};

const GENERATED_PASSWORD_LENGTH: usize = 12;

fn generate_password() -> String {
    rand::rng()
        .sample_iter(&Alphanumeric)
        .take(GENERATED_PASSWORD_LENGTH)
        .map(char::from)
        .collect()
}

/// Create a new active panel user.
///
/// When `password` is `None` a random one is generated and logged once.
///
/// # Errors
///
/// Returns `CliError::InvalidRole` for an unknown role,
/// `CliError::Auth` for a bad email or a short password, and
/// `CliError::UserExists` if the username or email is taken.
pub async fn create(
    username: &str,
    email: &str,
    nombre: &str,
    role: &str,
    password: Option<String>,
) -> Result<UserId, CliError> {
    let role: Role = role
        .parse()
        .map_err(|_| CliError::InvalidRole(role.to_owned()))?;
    let email = Email::parse(email).map_err(belgrano_tickets::services::AuthError::from)?;

    let generated = password.is_none();
    let password = password.unwrap_or_else(generate_password);
    validate_password(&password)?;

    let pool = tickets_pool().await?;
    init_ticket_schema(&pool).await?;

    tracing::info!("Creating user: {} <{}> ({})", username, email, role);
    let user = UserRepository::new(&pool)
        .create(&NewUser {
            username: username.to_owned(),
            email,
            password_hash: hash_password(&password)?,
            role,
            nombre: nombre.to_owned(),
            activo: true,
        })
        .await
        .map_err(|e| match e {
            RepositoryError::Conflict(_) => CliError::UserExists(username.to_owned()),
            other => CliError::Repository(other),
        })?;

    tracing::info!("User created! ID: {}, Username: {}", user.id, user.username);
    if generated {
        tracing::info!("Generated password: {password}");
        tracing::warn!("Share it securely; it is not shown again.");
    }
    Ok(user.id)
}
