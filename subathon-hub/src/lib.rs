//! subathon-hub library crate.
//!
//! A single shared countdown whose value is driven by TikTok and Kick
//! monetization events plus operator adjustments, streamed to every connected
//! viewer over WebSocket.

pub mod api;
pub mod broadcaster;
pub mod config;
pub mod error;
pub mod logging;
pub mod platform;
pub mod services;
pub mod timer;

pub use error::{Error, Result};
