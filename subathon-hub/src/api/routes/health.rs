//! Health check route.

use axum::{Router, routing::get};

use crate::api::server::AppState;

pub fn router() -> Router<AppState> {
    Router::new().route("/health", get(health_check))
}

/// Liveness check; the body is always `ok`.
async fn health_check() -> &'static str {
    "ok"
}
