use std::net::{IpAddr, Ipv4Addr, SocketAddr};

use axum::{Router, http::StatusCode, routing::get};
use murmur_config::Config;
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;
use tower_http::trace::TraceLayer;

/// Default listen address when none is configured
pub const DEFAULT_LISTEN_ADDRESS: SocketAddr = SocketAddr::new(IpAddr::V4(Ipv4Addr::UNSPECIFIED), 3000);

/// HTTP front of the relay: health probe, upload endpoint, request tracing
pub struct Server {
    router: Router,
    listen_address: SocketAddr,
}

impl Server {
    /// Assemble routes and layers from configuration
    ///
    /// # Errors
    ///
    /// Returns an error if the upload relay cannot be built
    pub fn new(config: &Config) -> anyhow::Result<Self> {
        let listen_address = config.server.listen_address.unwrap_or(DEFAULT_LISTEN_ADDRESS);

        let relay = stt::build_relay(config)?;

        let mut app = Router::new();

        // Health check
        if config.server.health.enabled {
            app = app.route(&config.server.health.path, get(health));
        }

        // Upload relay; applies its own CORS headers on every response
        app = app.merge(stt::endpoint_router().with_state(relay));

        // Tracing
        app = app.layer(TraceLayer::new_for_http());

        Ok(Self {
            router: app,
            listen_address,
        })
    }

    #[must_use]
    pub const fn listen_address(&self) -> SocketAddr {
        self.listen_address
    }

    /// Router with every route and layer applied, for callers that drive it themselves
    #[must_use]
    pub fn into_router(self) -> Router {
        self.router
    }

    /// Bind the configured address and serve until `shutdown` fires
    ///
    /// # Errors
    ///
    /// Returns an error if the address cannot be bound or serving fails
    pub async fn serve(self, shutdown: CancellationToken) -> anyhow::Result<()> {
        let listener = TcpListener::bind(self.listen_address).await?;
        self.serve_with(listener, shutdown).await
    }

    /// Serve on an already bound listener until `shutdown` fires
    ///
    /// Open connections, including uploads still streaming, are drained
    /// before this returns.
    ///
    /// # Errors
    ///
    /// Returns an error if serving fails
    pub async fn serve_with(self, listener: TcpListener, shutdown: CancellationToken) -> anyhow::Result<()> {
        tracing::info!(local_addr = %listener.local_addr()?, "relay listening");

        axum::serve(listener, self.router)
            .with_graceful_shutdown(async move {
                shutdown.cancelled().await;
                tracing::info!("shutdown requested, draining open uploads");
            })
            .await?;

        Ok(())
    }
}

/// Liveness probe; does not touch the provider
async fn health() -> (StatusCode, &'static str) {
    (StatusCode::OK, "ok")
}
