//! Relay configurations assembled in code

use std::net::SocketAddr;

use murmur_config::{
    AnyOrArray, Config, CorsConfig, ExtraFilePolicy, ServerConfig, SttConfig, TelemetryConfig,
};
use secrecy::SecretString;

/// Fluent builder over [`Config`], starting from a loopback listener
pub struct ConfigBuilder {
    config: Config,
}

impl ConfigBuilder {
    /// Create a new builder with minimal defaults and no provider credential
    pub fn new() -> Self {
        Self {
            config: Config {
                server: ServerConfig {
                    listen_address: Some(SocketAddr::from(([127, 0, 0, 1], 0))),
                    ..ServerConfig::default()
                },
                stt: SttConfig::default(),
                telemetry: TelemetryConfig::default(),
            },
        }
    }

    /// Point the relay at a mock provider with a test credential
    pub fn with_provider(mut self, base_url: &str) -> Self {
        self.config.stt.api_key = Some(SecretString::from("test-key"));
        self.config.stt.base_url = base_url.to_owned();
        self
    }

    /// Set the upload deadline, e.g. `"300ms"`
    pub fn with_timeout(mut self, timeout: &str) -> Self {
        self.config.stt.timeout = timeout.to_owned();
        self
    }

    /// Restrict CORS to the given origins
    pub fn with_origins(mut self, origins: &[&str]) -> Self {
        self.config.server.cors = CorsConfig {
            origins: AnyOrArray::List(origins.iter().map(|o| (*o).to_owned()).collect()),
            ..CorsConfig::default()
        };
        self
    }

    /// Set the handling of extra file parts
    pub fn with_extra_files(mut self, policy: ExtraFilePolicy) -> Self {
        self.config.stt.extra_files = policy;
        self
    }

    /// Turn off the liveness route
    pub fn without_health(mut self) -> Self {
        self.config.server.health.enabled = false;
        self
    }

    pub fn build(self) -> Config {
        self.config
    }
}
