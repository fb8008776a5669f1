//! Status route.

use axum::{Json, Router, extract::State, routing::get};

use crate::api::server::AppState;
use crate::services::HubStatus;

pub fn router() -> Router<AppState> {
    Router::new().route("/status", get(status))
}

/// Current identities and countdown value.
async fn status(State(state): State<AppState>) -> Json<HubStatus> {
    Json(state.services.status())
}
