//! JWT validation middleware: HS256 only (§4.1 narrows the edge gateway to a
//! single shared-secret algorithm — no key files to manage at this layer).

use axum::{
    body::Body,
    extract::{Request, State},
    http::HeaderMap,
    middleware::Next,
    response::Response,
};
use jsonwebtoken::{decode, Algorithm, DecodingKey, Validation};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use crate::{config::JwtConfig, error::Error};

/// JWT claims, shared between the validator (here) and the generator
/// (`auth::tokens::jwt_generator`).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    pub sub: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub username: Option<String>,
    #[serde(default)]
    pub roles: Vec<String>,
    #[serde(default)]
    pub perms: Vec<String>,
    pub exp: i64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub iat: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub jti: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub iss: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub aud: Option<String>,
}

impl Claims {
    pub fn has_role(&self, role: &str) -> bool {
        self.roles.iter().any(|r| r == role)
    }

    pub fn has_permission(&self, perm: &str) -> bool {
        self.perms.iter().any(|p| p == perm)
    }

    pub fn has_role_and_permission(&self, role: &str, perm: &str) -> bool {
        self.has_role(role) && self.has_permission(perm)
    }

    pub fn is_user(&self) -> bool {
        self.sub.starts_with("user:")
    }

    pub fn is_client(&self) -> bool {
        self.sub.starts_with("client:")
    }

    pub fn user_id(&self) -> Option<&str> {
        if self.is_user() {
            self.sub.strip_prefix("user:")
        } else {
            None
        }
    }

    pub fn client_id(&self) -> Option<&str> {
        if self.is_client() {
            self.sub.strip_prefix("client:")
        } else {
            None
        }
    }
}

/// JWT validation state, shared behind an `Arc` in `AppState`.
#[derive(Clone)]
pub struct JwtAuth {
    decoding_key: Arc<DecodingKey>,
    validation: Validation,
}

impl JwtAuth {
    pub fn new(config: &JwtConfig) -> Self {
        let decoding_key = DecodingKey::from_secret(config.secret.as_bytes());

        let mut validation = Validation::new(Algorithm::HS256);
        if let Some(issuer) = &config.issuer {
            validation.set_issuer(&[issuer]);
        }
        if let Some(audience) = &config.audience {
            validation.set_audience(&[audience]);
        }

        Self {
            decoding_key: Arc::new(decoding_key),
            validation,
        }
    }

    pub fn validate_token(&self, token: &str) -> Result<Claims, Error> {
        let token_data = decode::<Claims>(token, &self.decoding_key, &self.validation)?;
        Ok(token_data.claims)
    }

    pub fn extract_token(headers: &HeaderMap) -> Result<String, Error> {
        let auth_header = headers
            .get("Authorization")
            .and_then(|v| v.to_str().ok())
            .ok_or_else(|| Error::Unauthorized("missing Authorization header".to_string()))?;

        auth_header
            .strip_prefix("Bearer ")
            .map(str::to_string)
            .ok_or_else(|| Error::Unauthorized("invalid Authorization header format".to_string()))
    }

    /// Validate the bearer token and inject `Claims` into the request
    /// extensions for downstream handlers.
    pub async fn middleware(
        State(auth): State<Self>,
        mut request: Request<Body>,
        next: Next,
    ) -> Result<Response, Error> {
        let token = Self::extract_token(request.headers())?;
        let claims = auth.validate_token(&token)?;
        request.extensions_mut().insert(claims);
        Ok(next.run(request).await)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use jsonwebtoken::{encode, EncodingKey, Header};

    fn config() -> JwtConfig {
        JwtConfig {
            secret: "test-secret".to_string(),
            issuer: None,
            audience: None,
            access_token_ttl_secs: 3600,
        }
    }

    fn token(auth: &JwtAuth, secret: &str, exp: i64) -> String {
        let claims = Claims {
            sub: "user:1".to_string(),
            email: None,
            username: None,
            roles: vec!["admin".to_string()],
            perms: vec![],
            exp,
            iat: Some(0),
            jti: None,
            iss: None,
            aud: None,
        };
        let _ = auth;
        encode(&Header::new(Algorithm::HS256), &claims, &EncodingKey::from_secret(secret.as_bytes())).unwrap()
    }

    #[test]
    fn valid_token_decodes_to_matching_claims() {
        let auth = JwtAuth::new(&config());
        let jwt = token(&auth, "test-secret", 9_999_999_999);
        let claims = auth.validate_token(&jwt).unwrap();
        assert_eq!(claims.sub, "user:1");
        assert!(claims.has_role("admin"));
    }

    #[test]
    fn token_signed_with_wrong_secret_is_rejected() {
        let auth = JwtAuth::new(&config());
        let jwt = token(&auth, "wrong-secret", 9_999_999_999);
        assert!(auth.validate_token(&jwt).is_err());
    }

    #[test]
    fn expired_token_is_rejected() {
        let auth = JwtAuth::new(&config());
        let jwt = token(&auth, "test-secret", 0);
        assert!(auth.validate_token(&jwt).is_err());
    }

    #[test]
    fn claims_user_vs_client_detection() {
        let claims = Claims {
            sub: "client:abc".to_string(),
            email: None,
            username: None,
            roles: vec![],
            perms: vec![],
            exp: 0,
            iat: None,
            jti: None,
            iss: None,
            aud: None,
        };
        assert!(claims.is_client());
        assert_eq!(claims.client_id(), Some("abc"));
        assert_eq!(claims.user_id(), None);
    }
}
