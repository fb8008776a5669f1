//! Platform adapters: connection lifecycle plus event conversion.

mod adapter;
mod conversion;
#[cfg(any(test, feature = "testing"))]
pub mod testing;

pub use adapter::{AdapterStatus, PlatformAdapter};
pub use conversion::{Platform, PlatformRates};
