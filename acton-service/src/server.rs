//! HTTP server: binds the listener, layers the state-independent middleware
//! stack on top of the router [`crate::service_builder::build_router`]
//! assembles, and serves with graceful shutdown.

use std::any::Any;
use std::net::SocketAddr;
use std::time::Duration;

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::{Json, Router};
use tokio::net::TcpListener;
use tokio::signal;
use tower_http::{
    catch_panic::CatchPanicLayer,
    compression::CompressionLayer,
    limit::RequestBodyLimitLayer,
    timeout::TimeoutLayer,
    trace::{DefaultMakeSpan, DefaultOnResponse, TraceLayer},
};
use uuid::Uuid;

use crate::{
    config::Config,
    error::Result,
    middleware::{request_id_layer, request_id_propagation_layer, sensitive_headers_layer},
};

/// Owns the bound configuration for one serving run.
pub struct Server {
    config: Config,
}

impl Server {
    pub fn new(config: Config) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Serve `app` (already built by [`crate::service_builder::build_router`])
    /// until a shutdown signal arrives.
    pub async fn serve(self, app: Router) -> Result<()> {
        let addr = SocketAddr::from(([0, 0, 0, 0], self.config.service.port));

        tracing::info!(name = %self.config.service.name, %addr, "starting gateway");

        let body_limit = self.config.timeouts.body_limit_bytes;
        let request_timeout = Duration::from_secs(self.config.timeouts.request_timeout_secs);

        let app = app
            .layer(CompressionLayer::new())
            .layer(TimeoutLayer::with_status_code(StatusCode::REQUEST_TIMEOUT, request_timeout))
            .layer(RequestBodyLimitLayer::new(body_limit))
            .layer(
                TraceLayer::new_for_http()
                    .make_span_with(DefaultMakeSpan::new().include_headers(true))
                    .on_response(DefaultOnResponse::new().include_headers(true)),
            )
            .layer(sensitive_headers_layer())
            .layer(request_id_propagation_layer())
            .layer(request_id_layer())
            .layer(CatchPanicLayer::custom(handle_panic));

        let listener = TcpListener::bind(&addr).await?;
        tracing::info!(%addr, "gateway listening");

        axum::serve(listener, app).with_graceful_shutdown(shutdown_signal()).await?;

        tracing::info!("gateway shutdown complete");
        Ok(())
    }
}

/// Converts a caught panic into the response shape the error taxonomy
/// requires (§4.1, §7): the client never sees the panic payload, only a
/// correlatable `request_id`. The payload itself goes to the trace log --
/// `tower_http::catch_panic` hands back only the panic value, not the
/// originating request, so this can't append to the audit store directly;
/// the ambient tracing subscriber is this boundary's equivalent.
fn handle_panic(err: Box<dyn Any + Send + 'static>) -> Response {
    let request_id = Uuid::new_v4().to_string();
    let message = if let Some(s) = err.downcast_ref::<String>() {
        s.as_str()
    } else if let Some(s) = err.downcast_ref::<&str>() {
        s
    } else {
        "unknown panic"
    };

    tracing::error!(request_id = %request_id, panic = %message, "panic caught at gateway boundary");

    (
        StatusCode::INTERNAL_SERVER_ERROR,
        Json(serde_json::json!({ "error": "internal_error", "request_id": request_id })),
    )
        .into_response()
}

/// Wait for SIGINT or (on unix) SIGTERM before returning, so
/// `axum::serve`'s graceful shutdown can drain in-flight requests.
async fn shutdown_signal() {
    let ctrl_c = async {
        signal::ctrl_c().await.expect("failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => tracing::info!("received SIGINT, starting graceful shutdown"),
        _ = terminate => tracing::info!("received SIGTERM, starting graceful shutdown"),
    }
}
