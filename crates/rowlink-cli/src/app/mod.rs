//! Binary-side wiring: configuration, telemetry, the Google lookup client,
//! and the cache backends.

pub mod cache;
pub mod config;
pub mod google;
pub mod telemetry;
