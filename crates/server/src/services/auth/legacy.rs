//! Verification of hashes written before Argon2.
//!
//! - `scrypt:N:r:p$salt$digest_hex`. Werkzeug keeps the salt as plain text,
//!   older rows hex-encode it. A salt that decodes as hex is tried both ways.
//! - `pbkdf2:<sha256|sha512>:<iterations>$salt$digest_hex`, as written by
//!   Werkzeug's `generate_password_hash`. The salt is plain text.
//!
//! Malformed hashes, unsupported parameters and derivation failures all count
//! as a mismatch.

use scrypt::Params;
use sha2::{Sha256, Sha512};
use subtle::ConstantTimeEq;

/// Largest accepted `log2(N)`. Stored hashes were written with N = 2^15.
const MAX_LOG_N: u8 = 20;

/// Upper bound on PBKDF2 rounds. Werkzeug 3 writes 600 000 to 1 000 000.
const MAX_PBKDF2_ITERATIONS: u32 = 5_000_000;

/// Split `<params>$<salt>$<digest_hex>` and decode the digest.
fn split_hash(rest: &str) -> Option<(&str, &str, Vec<u8>)> {
    let mut parts = rest.split('$');
    let (params, salt, digest_hex) = (parts.next()?, parts.next()?, parts.next()?);
    if parts.next().is_some() {
        return None;
    }
    let digest = hex::decode(digest_hex).ok()?;
    if digest.is_empty() {
        return None;
    }
    Some((params, salt, digest))
}

/// Parsed `scrypt:` hash.
#[derive(Debug, PartialEq, Eq)]
struct ScryptHash<'a> {
    log_n: u8,
    r: u32,
    p: u32,
    salt: &'a str,
    digest: Vec<u8>,
}

impl<'a> ScryptHash<'a> {
    fn parse(stored: &'a str) -> Option<Self> {
        let (params, salt, digest) = split_hash(stored.strip_prefix("scrypt:")?)?;

        let mut costs = params.split(':');
        let n: u64 = costs.next()?.parse().ok()?;
        let r: u32 = costs.next()?.parse().ok()?;
        let p: u32 = costs.next()?.parse().ok()?;
        if costs.next().is_some() || n < 2 || !n.is_power_of_two() {
            return None;
        }
        let log_n = u8::try_from(n.trailing_zeros()).ok()?;
        if log_n > MAX_LOG_N {
            return None;
        }

        Some(Self {
            log_n,
            r,
            p,
            salt,
            digest,
        })
    }

    /// Salt byte strings to try: hex-decoded first, then the raw text.
    fn salts(&self) -> Vec<Vec<u8>> {
        let mut salts = Vec::with_capacity(2);
        if let Ok(decoded) = hex::decode(self.salt) {
            salts.push(decoded);
        }
        salts.push(self.salt.as_bytes().to_vec());
        salts
    }
}

/// Check `password` against a `scrypt:` hash.
pub fn verify_scrypt(password: &str, stored: &str) -> bool {
    let Some(hash) = ScryptHash::parse(stored) else {
        tracing::debug!("unparseable scrypt hash");
        return false;
    };
    let Ok(params) = Params::new(hash.log_n, hash.r, hash.p, Params::RECOMMENDED_LEN) else {
        tracing::debug!(log_n = hash.log_n, r = hash.r, p = hash.p, "invalid scrypt parameters");
        return false;
    };

    let mut derived = vec![0u8; hash.digest.len()];
    hash.salts().iter().any(|salt| {
        scrypt::scrypt(password.as_bytes(), salt, &params, &mut derived).is_ok()
            && bool::from(derived.ct_eq(&hash.digest))
    })
}

/// HMAC digest named in a `pbkdf2:` hash.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Pbkdf2Digest {
    Sha256,
    Sha512,
}

/// Parsed Werkzeug `pbkdf2:` hash.
#[derive(Debug, PartialEq, Eq)]
struct Pbkdf2Hash<'a> {
    digest_kind: Pbkdf2Digest,
    iterations: u32,
    salt: &'a str,
    digest: Vec<u8>,
}

impl<'a> Pbkdf2Hash<'a> {
    fn parse(stored: &'a str) -> Option<Self> {
        let (params, salt, digest) = split_hash(stored.strip_prefix("pbkdf2:")?)?;

        let mut method = params.split(':');
        let digest_kind = match method.next()? {
            "sha256" => Pbkdf2Digest::Sha256,
            "sha512" => Pbkdf2Digest::Sha512,
            _ => return None,
        };
        let iterations: u32 = method.next()?.parse().ok()?;
        if method.next().is_some() || iterations == 0 || iterations > MAX_PBKDF2_ITERATIONS {
            return None;
        }

        Some(Self {
            digest_kind,
            iterations,
            salt,
            digest,
        })
    }
}

/// Check `password` against a Werkzeug `pbkdf2:` hash.
pub fn verify_pbkdf2(password: &str, stored: &str) -> bool {
    let Some(hash) = Pbkdf2Hash::parse(stored) else {
        tracing::debug!("unparseable pbkdf2 hash");
        return false;
    };

    let mut derived = vec![0u8; hash.digest.len()];
    let (password, salt) = (password.as_bytes(), hash.salt.as_bytes());
    match hash.digest_kind {
        Pbkdf2Digest::Sha256 => {
            pbkdf2::pbkdf2_hmac::<Sha256>(password, salt, hash.iterations, &mut derived);
        }
        Pbkdf2Digest::Sha512 => {
            pbkdf2::pbkdf2_hmac::<Sha512>(password, salt, hash.iterations, &mut derived);
        }
    }
    derived.ct_eq(&hash.digest).into()
}
