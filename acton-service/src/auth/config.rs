//! Authentication configuration: password hashing cost and API key sizing.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuthConfig {
    #[serde(default)]
    pub password: PasswordConfig,
    #[serde(default)]
    pub api_keys: ApiKeyConfig,
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            password: PasswordConfig::default(),
            api_keys: ApiKeyConfig::default(),
        }
    }
}

/// PBKDF2-HMAC-SHA256 password hashing parameters (§4.1). Iteration count
/// should only ever increase; lowering it weakens every hash stored under
/// the new default going forward, not just new ones.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PasswordConfig {
    #[serde(default = "default_iterations")]
    pub iterations: u32,
    #[serde(default = "default_salt_len")]
    pub salt_len: usize,
    #[serde(default = "default_min_password_length")]
    pub min_password_length: usize,
}

impl Default for PasswordConfig {
    fn default() -> Self {
        Self {
            iterations: default_iterations(),
            salt_len: default_salt_len(),
            min_password_length: default_min_password_length(),
        }
    }
}

fn default_iterations() -> u32 {
    100_000
}
fn default_salt_len() -> usize {
    16
}
fn default_min_password_length() -> usize {
    8
}

/// API key generation defaults (§3/§4.1).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiKeyConfig {
    #[serde(default = "default_key_prefix")]
    pub prefix: String,
    #[serde(default = "default_key_random_len")]
    pub random_len: usize,
}

impl Default for ApiKeyConfig {
    fn default() -> Self {
        Self {
            prefix: default_key_prefix(),
            random_len: default_key_random_len(),
        }
    }
}

fn default_key_prefix() -> String {
    "ak".to_string()
}
fn default_key_random_len() -> usize {
    32
}
