//! CORS policy (§4.1): the request origin is echoed back when it's in the
//! configured allow-list; otherwise the response carries the first
//! allow-listed origin rather than rejecting the request outright.
//! Preflight `OPTIONS` short-circuits with `204` and the same headers.

use axum::{
    body::Body,
    extract::{Request, State},
    http::{header, HeaderValue, Method, StatusCode},
    middleware::Next,
    response::{IntoResponse, Response},
};

use crate::config::CorsConfig;
use crate::state::AppState;

fn allow_origin_for(config: &CorsConfig, requested: Option<&str>) -> Option<String> {
    if let Some(origin) = requested {
        if config.allowed_origins.iter().any(|o| o == origin) {
            return Some(origin.to_string());
        }
    }
    config.allowed_origins.first().cloned()
}

fn apply_cors_headers(response: &mut Response, config: &CorsConfig, requested: Option<&str>) {
    let Some(allowed) = allow_origin_for(config, requested) else {
        return;
    };
    if let Ok(value) = HeaderValue::from_str(&allowed) {
        response.headers_mut().insert(header::ACCESS_CONTROL_ALLOW_ORIGIN, value);
    }
    response.headers_mut().insert(
        header::ACCESS_CONTROL_ALLOW_METHODS,
        HeaderValue::from_static("GET, POST, PUT, PATCH, DELETE, OPTIONS"),
    );
    response.headers_mut().insert(
        header::ACCESS_CONTROL_ALLOW_HEADERS,
        HeaderValue::from_static("authorization, content-type, x-api-key"),
    );
    response
        .headers_mut()
        .insert(header::ACCESS_CONTROL_ALLOW_CREDENTIALS, HeaderValue::from_static("true"));
}

pub async fn cors_layer(State(state): State<AppState>, request: Request<Body>, next: Next) -> Response {
    let requested_origin = request
        .headers()
        .get(header::ORIGIN)
        .and_then(|v| v.to_str().ok())
        .map(str::to_string);

    if request.method() == Method::OPTIONS {
        let mut response = StatusCode::NO_CONTENT.into_response();
        apply_cors_headers(&mut response, &state.config.cors, requested_origin.as_deref());
        return response;
    }

    let mut response = next.run(request).await;
    apply_cors_headers(&mut response, &state.config.cors, requested_origin.as_deref());
    response
}
