//! Default accounts and settings.
//!
//! A fresh database gets one administrator and five couriers so the panel
//! is usable right after deployment. `reset_default_credentials` restores
//! their known passwords.

use sqlx::SqlitePool;
use tracing::info;

use belgrano_tickets_core::{Email, Role};

use super::auth::{AuthError, hash_password};
use crate::db::{RepositoryError, SettingsRepository, UserRepository};
use crate::db::users::{NewUser, UserChanges};

/// One built-in account.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DefaultAccount {
    pub username: String,
    pub email: String,
    pub password: &'static str,
    pub nombre: String,
    pub role: Role,
}

/// Number of built-in courier accounts.
pub const DEFAULT_COURIERS: u32 = 5;

/// The administrator followed by `repartidor1..=5`.
#[must_use]
pub fn default_accounts() -> Vec<DefaultAccount> {
    let admin = DefaultAccount {
        username: "admin".to_string(),
        email: "admin@belgranoahorro.com".to_string(),
        password: "admin123",
        nombre: "Administrador Principal".to_string(),
        role: Role::Admin,
    };
    let couriers = (1..=DEFAULT_COURIERS).map(|n| DefaultAccount {
        username: format!("repartidor{n}"),
        email: format!("repartidor{n}@belgranoahorro.com"),
        password: "flota123",
        nombre: format!("Repartidor {n}"),
        role: Role::Flota,
    });
    std::iter::once(admin).chain(couriers).collect()
}

/// Create the default accounts if the users table is empty.
///
/// Returns the number of accounts created.
///
/// # Errors
///
/// Returns `AuthError::Repository` if the database fails.
pub async fn seed_default_users(pool: &SqlitePool) -> Result<usize, AuthError> {
    let users = UserRepository::new(pool);
    if users.count().await? > 0 {
        return Ok(0);
    }

    let accounts = default_accounts();
    for account in &accounts {
        users
            .create(&NewUser {
                username: account.username.clone(),
                email: Email::parse(&account.email)?,
                password_hash: hash_password(account.password)?,
                role: account.role,
                nombre: account.nombre.clone(),
                activo: true,
            })
            .await?;
    }
    info!(count = accounts.len(), "Default users created");
    Ok(accounts.len())
}

/// Outcome of [`reset_default_credentials`].
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct ResetReport {
    pub updated: usize,
    pub created: usize,
}

/// Re-hash and reactivate every default account, creating missing ones.
///
/// # Errors
///
/// Returns `AuthError::Repository` if the database fails, including a
/// username collision with a different account.
pub async fn reset_default_credentials(pool: &SqlitePool) -> Result<ResetReport, AuthError> {
    let users = UserRepository::new(pool);
    let mut report = ResetReport::default();

    for account in default_accounts() {
        let email = Email::parse(&account.email)?;
        let hash = hash_password(account.password)?;

        if let Some(existing) = users.get_by_email(&email).await? {
            users
                .update(
                    existing.id,
                    &UserChanges {
                        username: existing.username,
                        email: existing.email,
                        role: existing.role,
                        nombre: existing.nombre,
                        activo: true,
                    },
                )
                .await?;
            users.set_password_hash(existing.id, &hash).await?;
            info!(email = %email, "Default account reset");
            report.updated += 1;
        } else {
            users
                .create(&NewUser {
                    username: account.username,
                    email: email.clone(),
                    password_hash: hash,
                    role: account.role,
                    nombre: account.nombre,
                    activo: true,
                })
                .await?;
            info!(email = %email, "Default account created");
            report.created += 1;
        }
    }

    Ok(report)
}

/// Settings written on first start: key, value, description.
pub const DEFAULT_SETTINGS: [(&str, &str, &str); 2] = [
    ("sistema_nombre", "Belgrano Tickets", "Nombre del sistema"),
    ("version", env!("CARGO_PKG_VERSION"), "Versión del sistema"),
];

/// Insert the default settings that are missing. Existing values are
/// never overwritten.
///
/// Returns the number of settings created.
///
/// # Errors
///
/// Returns `RepositoryError::Database` if the database fails.
pub async fn seed_default_settings(pool: &SqlitePool) -> Result<usize, RepositoryError> {
    let settings = SettingsRepository::new(pool);
    let mut created = 0;
    for (clave, valor, descripcion) in DEFAULT_SETTINGS {
        if settings.get(clave).await?.is_none() {
            settings.set(clave, valor, Some(descripcion)).await?;
            created += 1;
        }
    }
    if created > 0 {
        info!(count = created, "Default settings created");
    }
    Ok(created)
}
