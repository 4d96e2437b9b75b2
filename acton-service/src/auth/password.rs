//! Password hashing: PBKDF2-HMAC-SHA256 (§4.1).
//!
//! Stored format: `pbkdf2${iterations}${salt_hex}${hash_hex}`. A second,
//! legacy format — bare `sha256(password || salt)` as `sha256${salt_hex}${hash_hex}` —
//! is still recognized on verify and transparently upgraded: `verify_and_upgrade`
//! returns a freshly computed PBKDF2 hash whenever the legacy path matched, so
//! the caller can persist it and no account is ever downgraded back to sha256.

use pbkdf2::pbkdf2_hmac;
use sha2::{Digest, Sha256};
use subtle::ConstantTimeEq;
use uuid::Uuid;

use crate::auth::config::PasswordConfig;
use crate::error::{Error, Result};

const PBKDF2_PREFIX: &str = "pbkdf2";
const LEGACY_PREFIX: &str = "sha256";

#[derive(Clone)]
pub struct PasswordHasher {
    config: PasswordConfig,
}

impl Default for PasswordHasher {
    fn default() -> Self {
        Self::new(PasswordConfig::default())
    }
}

impl PasswordHasher {
    pub fn new(config: PasswordConfig) -> Self {
        Self { config }
    }

    /// Hash a new password, rejecting ones shorter than the configured
    /// minimum (§4.1 `WeakPassword`).
    pub fn hash(&self, password: &str) -> Result<String> {
        if password.len() < self.config.min_password_length {
            return Err(Error::WeakPassword(format!(
                "password must be at least {} characters",
                self.config.min_password_length
            )));
        }

        let salt = random_bytes(self.config.salt_len);
        let hash = self.derive(password.as_bytes(), &salt, self.config.iterations);

        Ok(format!(
            "{PBKDF2_PREFIX}${}${}${}",
            self.config.iterations,
            hex_encode(&salt),
            hex_encode(&hash),
        ))
    }

    fn derive(&self, password: &[u8], salt: &[u8], iterations: u32) -> Vec<u8> {
        let mut out = vec![0u8; 32];
        pbkdf2_hmac::<Sha256>(password, salt, iterations, &mut out);
        out
    }

    /// Verify a password against a stored hash of either format.
    pub fn verify(&self, password: &str, stored: &str) -> Result<bool> {
        let mut parts = stored.split('$');
        let scheme = parts.next().unwrap_or("");

        match scheme {
            PBKDF2_PREFIX => {
                let iterations: u32 = parts
                    .next()
                    .and_then(|s| s.parse().ok())
                    .ok_or_else(|| Error::Internal("malformed password hash".to_string()))?;
                let salt = parts
                    .next()
                    .and_then(hex_decode)
                    .ok_or_else(|| Error::Internal("malformed password hash".to_string()))?;
                let expected = parts
                    .next()
                    .and_then(hex_decode)
                    .ok_or_else(|| Error::Internal("malformed password hash".to_string()))?;

                let actual = self.derive(password.as_bytes(), &salt, iterations);
                Ok(bool::from(actual.ct_eq(&expected)))
            }
            LEGACY_PREFIX => {
                let salt_hex = parts
                    .next()
                    .ok_or_else(|| Error::Internal("malformed password hash".to_string()))?;
                let expected_hex = parts
                    .next()
                    .ok_or_else(|| Error::Internal("malformed password hash".to_string()))?;

                let mut hasher = Sha256::new();
                hasher.update(password.as_bytes());
                hasher.update(salt_hex.as_bytes());
                let actual_hex = hex_encode(&hasher.finalize());

                Ok(bool::from(actual_hex.as_bytes().ct_eq(expected_hex.as_bytes())))
            }
            _ => Err(Error::Internal("unrecognized password hash scheme".to_string())),
        }
    }

    /// Verify, and if the stored hash used the legacy scheme and verification
    /// succeeded, return a freshly computed PBKDF2 hash the caller should
    /// persist in place of it. `Ok(None)` for any other successful path.
    pub fn verify_and_upgrade(&self, password: &str, stored: &str) -> Result<(bool, Option<String>)> {
        let ok = self.verify(password, stored)?;
        if ok && stored.starts_with(LEGACY_PREFIX) {
            let upgraded = self.hash(password)?;
            Ok((true, Some(upgraded)))
        } else {
            Ok((ok, None))
        }
    }
}

/// OS-backed random bytes via repeated v4 UUIDs (no extra RNG dependency).
fn random_bytes(len: usize) -> Vec<u8> {
    let mut out = Vec::with_capacity(len);
    while out.len() < len {
        out.extend_from_slice(Uuid::new_v4().as_bytes());
    }
    out.truncate(len);
    out
}

fn hex_encode(bytes: &[u8]) -> String {
    bytes.iter().map(|b| format!("{b:02x}")).collect()
}

fn hex_decode(s: &str) -> Option<Vec<u8>> {
    if s.len() % 2 != 0 {
        return None;
    }
    (0..s.len())
        .step_by(2)
        .map(|i| u8::from_str_radix(&s[i..i + 2], 16).ok())
        .collect()
}
