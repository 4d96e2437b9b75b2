//! JWT issuance: HS256 only (§4.1). Mirrors the `Claims` shape the
//! validator in `middleware::jwt` decodes, so a token this generator issues
//! round-trips through that middleware unchanged.

use jsonwebtoken::{encode, EncodingKey, Header};

use crate::config::JwtConfig;
use crate::error::{Error, Result};
use crate::middleware::jwt::Claims;

/// A freshly issued access/refresh token pair.
#[derive(Debug, Clone)]
pub struct TokenPair {
    pub access_token: String,
    pub refresh_token: String,
    pub expires_in_secs: i64,
}

pub struct JwtGenerator {
    secret: String,
    issuer: Option<String>,
    audience: Option<String>,
    access_token_ttl_secs: i64,
}

impl JwtGenerator {
    pub fn new(config: &JwtConfig) -> Self {
        Self {
            secret: config.secret.clone(),
            issuer: config.issuer.clone(),
            audience: config.audience.clone(),
            access_token_ttl_secs: config.access_token_ttl_secs,
        }
    }

    /// Issue an access token for `sub` (`"user:<id>"` or `"client:<id>"`)
    /// with the given roles/permissions, expiring `access_token_ttl_secs`
    /// from `now_ms`.
    pub fn generate_access_token(
        &self,
        sub: &str,
        email: Option<String>,
        username: Option<String>,
        roles: Vec<String>,
        perms: Vec<String>,
        now_ms: i64,
    ) -> Result<String> {
        let now_secs = now_ms / 1000;
        let claims = Claims {
            sub: sub.to_string(),
            email,
            username,
            roles,
            perms,
            exp: now_secs + self.access_token_ttl_secs,
            iat: Some(now_secs),
            jti: Some(uuid::Uuid::new_v4().to_string()),
            iss: self.issuer.clone(),
            aud: self.audience.clone(),
        };

        encode(
            &Header::default(),
            &claims,
            &EncodingKey::from_secret(self.secret.as_bytes()),
        )
        .map_err(Error::from)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn generates_a_decodable_token() {
        let config = JwtConfig {
            secret: "test-secret".to_string(),
            issuer: None,
            audience: None,
            access_token_ttl_secs: 3600,
        };
        let generator = JwtGenerator::new(&config);
        let token = generator
            .generate_access_token("user:1", None, None, vec!["admin".to_string()], vec![], 0)
            .unwrap();
        assert!(!token.is_empty());
    }
}
