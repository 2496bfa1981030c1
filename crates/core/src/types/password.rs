//! Stored password hash schemes.

use serde::{Deserialize, Serialize};

/// The scheme a stored password hash was produced with.
///
/// Detected from the hash string's prefix. Verification dispatches on this
/// tag, and any scheme other than [`PasswordScheme::CURRENT`] is rewritten
/// after the next successful login.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PasswordScheme {
    /// PHC-formatted Argon2 hash (`$argon2id$v=19$...`).
    Argon2,
    /// Werkzeug `pbkdf2:<digest>:<iterations>$salt$digest_hex`.
    WerkzeugPbkdf2,
    /// `scrypt:N:r:p$salt$digest_hex`. The salt is either Werkzeug's plain
    /// text or the older hex encoding.
    LegacyScrypt,
    /// Anything else. Never verifies.
    Unknown,
}

impl PasswordScheme {
    /// Scheme used for every newly written hash.
    pub const CURRENT: Self = Self::Argon2;

    /// Identify the scheme of a stored hash.
    #[must_use]
    pub fn detect(stored_hash: &str) -> Self {
        if stored_hash.starts_with("$argon2") {
            Self::Argon2
        } else if stored_hash.starts_with("pbkdf2:") {
            Self::WerkzeugPbkdf2
        } else if stored_hash.starts_with("scrypt:") {
            Self::LegacyScrypt
        } else {
            Self::Unknown
        }
    }

    /// Whether hashes in this scheme should be replaced after login.
    #[must_use]
    pub fn needs_rehash(self) -> bool {
        self != Self::CURRENT
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_detect() {
        assert_eq!(
            PasswordScheme::detect("$argon2id$v=19$m=19456,t=2,p=1$abc$def"),
            PasswordScheme::Argon2
        );
        assert_eq!(
            PasswordScheme::detect("scrypt:32768:8:1$73616c74$00ff"),
            PasswordScheme::LegacyScrypt
        );
        assert_eq!(
            PasswordScheme::detect("pbkdf2:sha256:260000$x$y"),
            PasswordScheme::WerkzeugPbkdf2
        );
        assert_eq!(
            PasswordScheme::detect("md5$x$y"),
            PasswordScheme::Unknown
        );
        assert_eq!(PasswordScheme::detect(""), PasswordScheme::Unknown);
    }

    #[test]
    fn test_needs_rehash() {
        assert!(!PasswordScheme::Argon2.needs_rehash());
        assert!(PasswordScheme::LegacyScrypt.needs_rehash());
        assert!(PasswordScheme::WerkzeugPbkdf2.needs_rehash());
    }
}
