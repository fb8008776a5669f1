//! HTTP and WebSocket surface.

pub mod routes;
pub mod server;

pub use server::{ApiServer, ApiServerConfig, AppState};
