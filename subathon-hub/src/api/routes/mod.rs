//! API route modules.

pub mod health;
pub mod status;
pub mod ws;

use axum::Router;

use crate::api::server::AppState;

/// Create the router: fixed HTTP endpoints, with every other path serving the
/// subscriber feed.
pub fn create_router(state: AppState) -> Router {
    Router::new()
        .merge(health::router())
        .merge(status::router())
        .fallback(ws::subscribe_or_banner)
        .with_state(state)
}
