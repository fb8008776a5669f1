//! Service layer module.
//!
//! Wires the timer, the broadcaster and both platform adapters together and
//! owns their lifecycle.

pub mod container;

pub use container::{HubStatus, ServiceContainer};
