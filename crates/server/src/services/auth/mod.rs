//! Authentication service.
//!
//! Password login for panel users. Stored hashes are tagged by scheme
//! (see [`PasswordScheme`]); hashes in an older scheme are rewritten with
//! Argon2 after the first successful login.

mod error;
mod legacy;

pub use error::AuthError;

use argon2::{
    Argon2,
    password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString, rand_core::OsRng},
};
use sqlx::SqlitePool;
use tracing::{info, warn};

use belgrano_tickets_core::{Email, PasswordScheme, UserId};

use crate::db::UserRepository;
use crate::models::User;

/// Minimum password length.
pub const MIN_PASSWORD_LENGTH: usize = 6;

/// Authentication service.
pub struct AuthService<'a> {
    users: UserRepository<'a>,
}

impl<'a> AuthService<'a> {
    /// Create a new authentication service.
    #[must_use]
    pub const fn new(pool: &'a SqlitePool) -> Self {
        Self {
            users: UserRepository::new(pool),
        }
    }

    /// Login with email and password.
    ///
    /// A successful login against a legacy hash replaces it with an Argon2
    /// hash. Failing to persist the new hash does not fail the login.
    ///
    /// # Errors
    ///
    /// Returns `AuthError::InvalidCredentials` if the email is unknown or the
    /// password is wrong.
    /// Returns `AuthError::InactiveUser` if the account is disabled.
    pub async fn login(&self, email: &str, password: &str) -> Result<User, AuthError> {
        let email = Email::parse(email).map_err(|_| AuthError::InvalidCredentials)?;

        let credentials = self
            .users
            .get_credentials(&email)
            .await?
            .ok_or(AuthError::InvalidCredentials)?;

        if !verify_password(password, &credentials.password_hash) {
            return Err(AuthError::InvalidCredentials);
        }
        if !credentials.user.activo {
            return Err(AuthError::InactiveUser);
        }

        self.migrate_hash(credentials.user.id, &credentials.password_hash, password)
            .await;

        Ok(credentials.user)
    }

    /// Change a user's password after checking the current one.
    ///
    /// # Errors
    ///
    /// Returns `AuthError::InvalidCredentials` if `current` is wrong.
    /// Returns `AuthError::PasswordMismatch` if `new` and `confirm` differ.
    /// Returns `AuthError::WeakPassword` if `new` is too short.
    pub async fn change_password(
        &self,
        user: UserId,
        current: &str,
        new: &str,
        confirm: &str,
    ) -> Result<(), AuthError> {
        let stored = self.users.get_password_hash(user).await?;
        if !verify_password(current, &stored) {
            return Err(AuthError::InvalidCredentials);
        }
        if new != confirm {
            return Err(AuthError::PasswordMismatch);
        }
        validate_password(new)?;

        let hash = hash_password(new)?;
        self.users.set_password_hash(user, &hash).await?;
        info!(user_id = %user, "Password changed");
        Ok(())
    }

    async fn migrate_hash(&self, user: UserId, stored: &str, password: &str) {
        let scheme = PasswordScheme::detect(stored);
        if !scheme.needs_rehash() {
            return;
        }

        let Ok(new_hash) = hash_password(password) else {
            warn!(user_id = %user, "Could not re-hash legacy password");
            return;
        };
        match self.users.replace_password_hash(user, stored, &new_hash).await {
            Ok(true) => info!(user_id = %user, from = ?scheme, "Password hash migrated"),
            Ok(false) => {}
            Err(e) => warn!(user_id = %user, error = %e, "Failed to persist migrated hash"),
        }
    }
}

/// Check a password against minimum requirements.
///
/// # Errors
///
/// Returns `AuthError::WeakPassword` if the password is too short.
pub fn validate_password(password: &str) -> Result<(), AuthError> {
    if password.chars().count() < MIN_PASSWORD_LENGTH {
        return Err(AuthError::WeakPassword(format!(
            "La contraseña debe tener al menos {MIN_PASSWORD_LENGTH} caracteres"
        )));
    }
    Ok(())
}

/// Hash a password with the current scheme (Argon2id, PHC string).
///
/// # Errors
///
/// Returns `AuthError::PasswordHash` if hashing fails.
pub fn hash_password(password: &str) -> Result<String, AuthError> {
    let salt = SaltString::generate(&mut OsRng);
    let argon2 = Argon2::default();

    argon2
        .hash_password(password.as_bytes(), &salt)
        .map(|hash| hash.to_string())
        .map_err(|_| AuthError::PasswordHash)
}

/// Verify a password against a stored hash of any supported scheme.
///
/// Never errors: every failure is a mismatch.
#[must_use]
pub fn verify_password(password: &str, stored: &str) -> bool {
    match PasswordScheme::detect(stored) {
        PasswordScheme::Argon2 => PasswordHash::new(stored).is_ok_and(|parsed| {
            Argon2::default()
                .verify_password(password.as_bytes(), &parsed)
                .is_ok()
        }),
        PasswordScheme::WerkzeugPbkdf2 => legacy::verify_pbkdf2(password, stored),
        PasswordScheme::LegacyScrypt => legacy::verify_scrypt(password, stored),
        PasswordScheme::Unknown => false,
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::db::users::NewUser;
    use crate::db::{create_pool, init_ticket_schema};
    use belgrano_tickets_core::Role;
    use secrecy::SecretString;

    // scrypt("password", "NaCl", N=1024, r=8, p=16, dkLen=64)
    const LEGACY: &str = "scrypt:1024:8:16$4e61436c$\
        fdbabe1c9d3472007856e7190d01e9fe7c6ad7cbc8237830e77376634b373162\
        2eaf30d92e22a3886ff109279d9830dac727afb94a83ee6d8360cbdfa2cc0640";

    // Werkzeug generate_password_hash("admin123", "pbkdf2:sha256:1000").
    const WERKZEUG_PBKDF2: &str = "pbkdf2:sha256:1000$kQj0iJuTnxaw4V5j$\
        5a0dddf9259d7f4926a2e0163b96e9caf54582f41b2740e96ef81da28de86e69";

    async fn setup(hash: &str, activo: bool) -> SqlitePool {
        let pool = create_pool(&SecretString::from("sqlite::memory:"))
            .await
            .unwrap();
        init_ticket_schema(&pool).await.unwrap();
        UserRepository::new(&pool)
            .create(&NewUser {
                username: "admin".to_string(),
                email: Email::parse("admin@belgranoahorro.com").unwrap(),
                password_hash: hash.to_string(),
                role: Role::Admin,
                nombre: "Administrador Principal".to_string(),
                activo,
            })
            .await
            .unwrap();
        pool
    }

    #[test]
    fn test_hash_and_verify() {
        let hash = hash_password("admin123").unwrap();
        assert_eq!(PasswordScheme::detect(&hash), PasswordScheme::Argon2);
        assert!(verify_password("admin123", &hash));
        assert!(!verify_password("admin124", &hash));
        assert!(!verify_password("admin123", "$argon2id$garbage"));
        assert!(!verify_password("admin123", "plaintext"));
    }

    #[test]
    fn test_validate_password_counts_chars() {
        assert!(validate_password("abcde").is_err());
        assert!(validate_password("ñandú!").is_ok());
    }

    #[tokio::test]
    async fn test_login_wrong_password_and_unknown_email() {
        let pool = setup(&hash_password("admin123").unwrap(), true).await;
        let auth = AuthService::new(&pool);

        assert!(matches!(
            auth.login("admin@belgranoahorro.com", "nope").await,
            Err(AuthError::InvalidCredentials)
        ));
        assert!(matches!(
            auth.login("otro@belgranoahorro.com", "admin123").await,
            Err(AuthError::InvalidCredentials)
        ));
        assert!(matches!(
            auth.login("not-an-email", "admin123").await,
            Err(AuthError::InvalidCredentials)
        ));
    }

    #[tokio::test]
    async fn test_login_inactive_user() {
        let pool = setup(&hash_password("admin123").unwrap(), false).await;
        let auth = AuthService::new(&pool);
        assert!(matches!(
            auth.login("admin@belgranoahorro.com", "admin123").await,
            Err(AuthError::InactiveUser)
        ));
    }

    #[tokio::test]
    async fn test_legacy_login_rehashes_once() {
        let pool = setup(LEGACY, true).await;
        let auth = AuthService::new(&pool);
        let users = UserRepository::new(&pool);

        let user = auth
            .login("admin@belgranoahorro.com", "password")
            .await
            .unwrap();
        let migrated = users.get_password_hash(user.id).await.unwrap();
        assert_eq!(PasswordScheme::detect(&migrated), PasswordScheme::Argon2);

        auth.login("admin@belgranoahorro.com", "password")
            .await
            .unwrap();
        assert_eq!(users.get_password_hash(user.id).await.unwrap(), migrated);
    }

    #[tokio::test]
    async fn test_werkzeug_pbkdf2_login_rehashes_once() {
        let pool = setup(WERKZEUG_PBKDF2, true).await;
        let auth = AuthService::new(&pool);
        let users = UserRepository::new(&pool);

        assert!(matches!(
            auth.login("admin@belgranoahorro.com", "admin124").await,
            Err(AuthError::InvalidCredentials)
        ));
        let user = auth
            .login("admin@belgranoahorro.com", "admin123")
            .await
            .unwrap();
        let migrated = users.get_password_hash(user.id).await.unwrap();
        assert_eq!(PasswordScheme::detect(&migrated), PasswordScheme::Argon2);

        auth.login("admin@belgranoahorro.com", "admin123")
            .await
            .unwrap();
        assert_eq!(users.get_password_hash(user.id).await.unwrap(), migrated);
    }

    #[tokio::test]
    async fn test_change_password() {
        let pool = setup(&hash_password("admin123").unwrap(), true).await;
        let auth = AuthService::new(&pool);
        let user = auth
            .login("admin@belgranoahorro.com", "admin123")
            .await
            .unwrap();

        assert!(matches!(
            auth.change_password(user.id, "wrong", "nueva123", "nueva123").await,
            Err(AuthError::InvalidCredentials)
        ));
        assert!(matches!(
            auth.change_password(user.id, "admin123", "nueva123", "nueva124").await,
            Err(AuthError::PasswordMismatch)
        ));
        assert!(matches!(
            auth.change_password(user.id, "admin123", "abc", "abc").await,
            Err(AuthError::WeakPassword(_))
        ));

        auth.change_password(user.id, "admin123", "nueva123", "nueva123")
            .await
            .unwrap();
        assert!(auth.login("admin@belgranoahorro.com", "nueva123").await.is_ok());
    }
}
