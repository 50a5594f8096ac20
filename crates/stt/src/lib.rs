#![allow(
    clippy::must_use_candidate,
    clippy::missing_errors_doc,
    clippy::missing_const_for_fn,
    clippy::module_name_repetitions
)]

mod cors;
mod egress;
mod error;
mod http_client;
mod ingress;
mod provider;
mod relay;
mod request;
mod response;
mod types;

use std::sync::Arc;

use axum::{
    Router,
    extract::{DefaultBodyLimit, Request, State},
    response::{IntoResponse, Response},
    routing::any,
};

use relay::RelayBuilder;

pub use cors::CorsPolicy;
pub use error::{RelayError, Result};
pub use relay::Relay;
pub use request::RequestContext;
pub use response::{ProviderResponse, RelayResponse};
pub use types::{ExtraFilePolicy, FormFields, UploadSettings};

/// Path of the upload endpoint
pub const TRANSCRIPTIONS_PATH: &str = "/v1/audio/transcriptions";

/// Build the upload relay from configuration
///
/// # Errors
///
/// Returns an error if the relay fails to initialize
pub fn build_relay(config: &murmur_config::Config) -> anyhow::Result<Arc<Relay>> {
    let relay = Arc::new(
        RelayBuilder::new(config)
            .build()
            .map_err(|e| anyhow::anyhow!("Failed to initialize upload relay: {e}"))?,
    );
    Ok(relay)
}

/// Create the endpoint router for uploads
///
/// Every method is routed to the relay so that preflight and rejection
/// responses carry the relay's own status codes and CORS headers. Uploads
/// are streamed, so the default body size limit is lifted.
pub fn endpoint_router() -> Router<Arc<Relay>> {
    Router::new()
        .route(TRANSCRIPTIONS_PATH, any(transcribe))
        .layer(DefaultBodyLimit::disable())
}

/// Handle upload endpoint requests
async fn transcribe(State(relay): State<Arc<Relay>>, request: Request) -> Response {
    let context = RequestContext::new(request);
    let origin = context.origin().cloned();

    tracing::debug!(method = %context.method(), "upload endpoint called");

    let mut response = match relay.handle(context).await {
        Ok(response) => response.into_response(),
        Err(error) => error.into_response(),
    };

    relay.cors().apply(origin.as_ref(), response.headers_mut());

    response
}
