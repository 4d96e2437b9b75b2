//! Assembles the gateway's `axum::Router`: every wire-level route (§6)
//! wired to its handler, with the gateway's own state-dependent middleware
//! (CORS, auth + rate limiting) layered on before the state is bound.
//! State-independent concerns -- compression, tracing, panic recovery,
//! request-id propagation -- are layered afterward by [`crate::server`].

use axum::{
    routing::{get, post},
    Router,
};

use crate::handlers;
use crate::middleware;
use crate::state::AppState;

/// Build the full router: public auth/health/webhook/websocket routes,
/// bearer/session-protected `/v1/*` routes, and a catch-all proxy fallback
/// for anything that maps to an origin pool but has no named handler here
/// (§4.1/§6).
pub fn build_router(state: AppState) -> Router {
    let router = Router::new()
        .route("/health", get(handlers::health::health))
        .route("/v1/status", get(handlers::health::status))
        .route("/v1/auth/register", post(handlers::auth::register))
        .route("/v1/auth/login", post(handlers::auth::login))
        .route("/v1/auth/refresh", post(handlers::auth::refresh))
        .route("/v1/auth/logout", post(handlers::auth::logout))
        .route("/v1/route", post(handlers::route::route))
        .route("/v1/signals", get(handlers::signals::list).post(handlers::signals::publish))
        .route("/v1/webhooks/{provider}", post(handlers::webhooks::intake))
        .route("/v1/ws", get(handlers::websocket::upgrade))
        .fallback(handlers::proxy::forward)
        .layer(axum::middleware::from_fn_with_state(
            state.clone(),
            middleware::authenticate_layer,
        ))
        .layer(axum::middleware::from_fn_with_state(state.clone(), middleware::cors_layer));

    let router = middleware::apply_security_headers(router, &state.config.security_headers, true);

    router.with_state(state)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;
    use tower::ServiceExt;

    async fn test_state() -> AppState {
        let dir = tempfile::tempdir().unwrap();
        let registry_path = dir.path().join("registry.toml");
        std::fs::write(
            &registry_path,
            r#"
default_org = "AI"

[orgs.AI]
name = "Artificial Intelligence"
status = "active"
[orgs.AI.services.router]
endpoint = "http://ai-router.internal"
default = true
"#,
        )
        .unwrap();

        let mut config = Config::default();
        config.registry.path = registry_path;
        let (state, _runtime) = AppState::build(config).await.unwrap();
        state
    }

    #[tokio::test]
    async fn health_is_reachable_without_credentials() {
        let state = test_state().await;
        let app = build_router(state);
        let response = app
            .oneshot(
                axum::http::Request::builder()
                    .uri("/health")
                    .body(axum::body::Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), axum::http::StatusCode::OK);
    }

    #[tokio::test]
    async fn protected_route_without_credential_is_unauthorized() {
        let state = test_state().await;
        let app = build_router(state);
        let response = app
            .oneshot(
                axum::http::Request::builder()
                    .method("POST")
                    .uri("/v1/route")
                    .header("content-type", "application/json")
                    .body(axum::body::Body::from(r#"{"query":"hello"}"#))
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), axum::http::StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn preflight_options_returns_no_content() {
        let state = test_state().await;
        let app = build_router(state);
        let response = app
            .oneshot(
                axum::http::Request::builder()
                    .method("OPTIONS")
                    .uri("/v1/route")
                    .header("origin", "https://app.example.com")
                    .body(axum::body::Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), axum::http::StatusCode::NO_CONTENT);
    }
}
