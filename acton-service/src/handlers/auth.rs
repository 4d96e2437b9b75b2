//! `POST /v1/auth/{register,login,refresh,logout}` (§3/§4.1/§6).
//! `register`/`login`/`refresh` are public (the gateway has no credential to
//! check yet); `logout` runs behind the gateway's auth middleware like any
//! other protected route.

use std::collections::HashMap;

use axum::{
    extract::State,
    http::{header, HeaderMap, StatusCode},
    Extension, Json,
};
use serde::{Deserialize, Serialize};

use crate::auth::tokens::refresh as refresh_tokens;
use crate::auth::tokens::RefreshTokenData;
use crate::error::{Error, Result};
use crate::middleware::gateway::AuthContext;
use crate::signal::{Signal, SignalType};
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct RegisterRequest {
    pub email: String,
    pub name: String,
    pub password: String,
}

#[derive(Debug, Serialize)]
pub struct RegisterResponse {
    pub id: String,
    pub email: String,
}

pub async fn register(
    State(state): State<AppState>,
    Json(body): Json<RegisterRequest>,
) -> Result<(StatusCode, Json<RegisterResponse>)> {
    if !body.email.contains('@') {
        return Err(Error::InvalidEmail(body.email));
    }
    let now_ms = chrono::Utc::now().timestamp_millis();
    let password_hash = state.password_hasher.hash(&body.password)?;
    let user = state.users.register(body.email, body.name, password_hash, now_ms)?;

    Ok((
        StatusCode::CREATED,
        Json(RegisterResponse {
            id: user.id,
            email: user.email,
        }),
    ))
}

#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

#[derive(Debug, Serialize)]
pub struct TokenResponse {
    pub access_token: String,
    pub refresh_token: String,
    pub token_type: &'static str,
    pub expires_in: i64,
}

fn session_cookie(state: &AppState, session_id: &str) -> String {
    let secure = if state.config.service.environment == "production" {
        "; Secure"
    } else {
        ""
    };
    format!(
        "{}={}; Path=/; HttpOnly; SameSite=Lax; Max-Age={}{}",
        state.config.session.cookie_name, session_id, state.config.session.ttl_secs, secure
    )
}

fn cleared_session_cookie(state: &AppState) -> String {
    format!("{}=; Path=/; HttpOnly; SameSite=Lax; Max-Age=0", state.config.session.cookie_name)
}

pub async fn login(
    State(state): State<AppState>,
    Json(body): Json<LoginRequest>,
) -> Result<(HeaderMap, Json<TokenResponse>)> {
    let now_ms = chrono::Utc::now().timestamp_millis();

    let user = match state.users.by_email(&body.email) {
        Some(user) => user,
        None => {
            state.bus.publish(Signal::new(
                SignalType::AuthFailed,
                body.email.clone(),
                "AI",
                now_ms,
                HashMap::new(),
            ));
            return Err(Error::InvalidCredentials);
        }
    };

    let (verified, upgraded_hash) = state.password_hasher.verify_and_upgrade(&body.password, &user.password_hash)?;
    if !verified {
        state.bus.publish(Signal::new(
            SignalType::AuthFailed,
            user.email.clone(),
            "AI",
            now_ms,
            HashMap::new(),
        ));
        return Err(Error::InvalidCredentials);
    }
    if let Some(upgraded_hash) = upgraded_hash {
        state.users.update_password_hash(&user.email, upgraded_hash);
    }

    let sub = format!("user:{}", user.id);
    let access_token = state.jwt_generator.generate_access_token(
        &sub,
        Some(user.email.clone()),
        Some(user.name.clone()),
        vec![user.role.clone()],
        vec![],
        now_ms,
    )?;

    let (raw_refresh, refresh_hash) = refresh_tokens::generate();
    state.refresh_tokens.store(
        refresh_hash.clone(),
        RefreshTokenData {
            user_id: user.id.clone(),
            expires_ms: now_ms + state.config.session.refresh_ttl_secs * 1000,
            created_ms: now_ms,
        },
    );

    let session = state.sessions.create(user.id.clone(), refresh_hash, now_ms).await;

    state.bus.publish(Signal::new(SignalType::AuthLogin, sub, "AI", now_ms, HashMap::new()));

    let mut headers = HeaderMap::new();
    headers.insert(
        header::SET_COOKIE,
        session_cookie(&state, &session.session_id)
            .parse()
            .map_err(|_| Error::Internal("failed to build session cookie".to_string()))?,
    );

    Ok((
        headers,
        Json(TokenResponse {
            access_token,
            refresh_token: raw_refresh,
            token_type: "Bearer",
            expires_in: state.config.jwt.access_token_ttl_secs,
        }),
    ))
}

#[derive(Debug, Deserialize)]
pub struct RefreshRequest {
    pub refresh_token: String,
}

pub async fn refresh(
    State(state): State<AppState>,
    Json(body): Json<RefreshRequest>,
) -> Result<Json<TokenResponse>> {
    let now_ms = chrono::Utc::now().timestamp_millis();
    let data = state.refresh_tokens.redeem(&body.refresh_token, now_ms)?;

    let user = state
        .users
        .by_id(&data.user_id)
        .ok_or_else(|| Error::Unauthorized("refresh token references an unknown user".to_string()))?;

    let sub = format!("user:{}", user.id);
    let access_token = state.jwt_generator.generate_access_token(
        &sub,
        Some(user.email.clone()),
        Some(user.name.clone()),
        vec![user.role.clone()],
        vec![],
        now_ms,
    )?;

    let (raw_refresh, refresh_hash) = refresh_tokens::generate();
    state.refresh_tokens.store(
        refresh_hash,
        RefreshTokenData {
            user_id: user.id,
            expires_ms: now_ms + state.config.session.refresh_ttl_secs * 1000,
            created_ms: now_ms,
        },
    );

    Ok(Json(TokenResponse {
        access_token,
        refresh_token: raw_refresh,
        token_type: "Bearer",
        expires_in: state.config.jwt.access_token_ttl_secs,
    }))
}

pub async fn logout(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    headers: HeaderMap,
) -> Result<(HeaderMap, StatusCode)> {
    if let AuthContext::Session { .. } = &auth {
        let cookies = headers
            .get(header::COOKIE)
            .and_then(|v| v.to_str().ok())
            .unwrap_or("");
        for pair in cookies.split(';') {
            if let Some((name, value)) = pair.trim().split_once('=') {
                if name.trim() == state.config.session.cookie_name {
                    state.sessions.delete(value.trim()).await;
                }
            }
        }
    }

    let mut response_headers = HeaderMap::new();
    response_headers.insert(
        header::SET_COOKIE,
        cleared_session_cookie(&state)
            .parse()
            .map_err(|_| Error::Internal("failed to clear session cookie".to_string()))?,
    );

    Ok((response_headers, StatusCode::NO_CONTENT))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::fixtures::test_state;

    #[tokio::test]
    async fn register_then_login_yields_a_usable_token_pair() {
        let (state, runtime, _dir) = test_state().await;

        let (status, Json(registered)) = register(
            State(state.clone()),
            Json(RegisterRequest {
                email: "a@example.com".to_string(),
                name: "A".to_string(),
                password: "hunter22".to_string(),
            }),
        )
        .await
        .unwrap();
        assert_eq!(status, StatusCode::CREATED);
        assert_eq!(registered.email, "a@example.com");

        let (_headers, Json(tokens)) = login(
            State(state.clone()),
            Json(LoginRequest {
                email: "a@example.com".to_string(),
                password: "hunter22".to_string(),
            }),
        )
        .await
        .unwrap();
        assert!(!tokens.access_token.is_empty());
        assert!(!tokens.refresh_token.is_empty());

        let claims = state.jwt_auth.validate_token(&tokens.access_token).unwrap();
        assert_eq!(claims.sub, format!("user:{}", registered.id));

        runtime.shutdown_all().await.ok();
    }

    #[tokio::test]
    async fn login_with_wrong_password_is_rejected() {
        let (state, runtime, _dir) = test_state().await;
        register(
            State(state.clone()),
            Json(RegisterRequest {
                email: "a@example.com".to_string(),
                name: "A".to_string(),
                password: "correct-horse".to_string(),
            }),
        )
        .await
        .unwrap();

        let result = login(
            State(state),
            Json(LoginRequest {
                email: "a@example.com".to_string(),
                password: "wrong".to_string(),
            }),
        )
        .await;

        assert!(matches!(result, Err(Error::InvalidCredentials)));
        runtime.shutdown_all().await.ok();
    }

    #[tokio::test]
    async fn refresh_token_rotates_into_a_new_access_token() {
        let (state, runtime, _dir) = test_state().await;
        register(
            State(state.clone()),
            Json(RegisterRequest {
                email: "a@example.com".to_string(),
                name: "A".to_string(),
                password: "hunter22".to_string(),
            }),
        )
        .await
        .unwrap();
        let (_headers, Json(tokens)) = login(
            State(state.clone()),
            Json(LoginRequest {
                email: "a@example.com".to_string(),
                password: "hunter22".to_string(),
            }),
        )
        .await
        .unwrap();

        let Json(refreshed) = refresh(
            State(state),
            Json(RefreshRequest {
                refresh_token: tokens.refresh_token,
            }),
        )
        .await
        .unwrap();

        assert!(!refreshed.access_token.is_empty());
        runtime.shutdown_all().await.ok();
    }

    #[tokio::test]
    async fn duplicate_registration_is_rejected() {
        let (state, runtime, _dir) = test_state().await;
        let body = || {
            Json(RegisterRequest {
                email: "a@example.com".to_string(),
                name: "A".to_string(),
                password: "hunter22".to_string(),
            })
        };
        register(State(state.clone()), body()).await.unwrap();
        let result = register(State(state), body()).await;
        assert!(result.is_err());
        runtime.shutdown_all().await.ok();
    }
}
