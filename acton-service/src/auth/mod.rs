//! Authentication: password hashing, API keys, and JWT issuance (§3/§4.1).
//!
//! Token *validation* lives in [`crate::middleware::jwt`] since it runs as
//! request middleware; this module is everything upstream of that — hashing
//! a registration password, minting a fresh access/refresh pair at login.

pub mod api_keys;
pub mod config;
pub mod password;
pub mod tokens;
pub mod users;

pub use api_keys::{ApiKey, ApiKeyGenerator, ApiKeyStore};
pub use config::{ApiKeyConfig, AuthConfig, PasswordConfig};
pub use password::PasswordHasher;
pub use tokens::{JwtGenerator, RefreshTokenData, RefreshTokenStorage, TokenPair};
pub use users::{User, UserStore};
