//! Per-client-IP admission limiting.
//!
//! Fails closed: if the limiter can't answer, the request is refused.

use std::net::SocketAddr;

use axum::{
    Json,
    extract::{ConnectInfo, Request, State},
    http::StatusCode,
    middleware::Next,
    response::{IntoResponse, Response},
};

use crate::state::AppState;

pub fn limiter_key(ip: &str) -> String {
    format!("ip-limiter:{}", ip)
}

pub async fn limit_by_ip(State(state): State<AppState>, request: Request, next: Next) -> Response {
    let ip = request
        .extensions()
        .get::<ConnectInfo<SocketAddr>>()
        .map(|ConnectInfo(addr)| addr.ip().to_string())
        .unwrap_or_else(|| "unknown".to_string());

    match state.stores.http_limiter.limit(&limiter_key(&ip)).await {
        Ok(false) => next.run(request).await,
        Ok(true) => {
            tracing::warn!(%ip, "request rate limited");
            reject(StatusCode::TOO_MANY_REQUESTS, "Too many requests")
        }
        Err(e) => {
            tracing::error!(%ip, error = %e, "rate limiter unavailable, refusing request");
            reject(StatusCode::SERVICE_UNAVAILABLE, "Service temporarily unavailable")
        }
    }
}

fn reject(status: StatusCode, message: &'static str) -> Response {
    (status, Json(serde_json::json!({ "error": message }))).into_response()
}
