#![allow(clippy::must_use_candidate)]

pub mod cors;
mod env;
mod loader;
pub mod server;
pub mod stt;
pub mod telemetry;

use serde::Deserialize;

pub use cors::*;
pub use loader::{ALLOWED_ORIGINS_VAR, FALLBACK_API_KEY_VAR, PROVIDER_API_KEY_VAR};
pub use server::*;
pub use stt::*;
pub use telemetry::*;

/// Top-level Murmur configuration
///
/// Built once at startup and treated as immutable afterwards.
#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Config {
    /// Server configuration
    #[serde(default)]
    pub server: ServerConfig,
    /// Upload relay and provider configuration
    #[serde(default)]
    pub stt: SttConfig,
    /// Logging configuration
    #[serde(default)]
    pub telemetry: TelemetryConfig,
}
