use std::time::Duration;

use axum::http::Method;
use tokio::time::{Instant, timeout_at};

use crate::{
    cors::CorsPolicy,
    egress::OutboundRequest,
    error::{RelayError, Result},
    http_client::http_client,
    ingress::{IngressReader, ParsedUpload},
    provider::{TranscriptionProvider, whisper::WhisperProvider},
    request::RequestContext,
    response::RelayResponse,
    types::UploadSettings,
};

/// Name the configured provider is logged under
const PROVIDER_NAME: &str = "whisper";

/// Streams browser uploads to the transcription provider
pub struct Relay {
    provider: Option<Box<dyn TranscriptionProvider>>,
    cors: CorsPolicy,
    settings: UploadSettings,
}

impl Relay {
    pub fn cors(&self) -> &CorsPolicy {
        &self.cors
    }

    /// Handle one call to the upload endpoint
    ///
    /// Checks run in a fixed order (method, credential, content type) and
    /// none of them reads the body. The deadline starts once they pass and
    /// covers reading the upload, the provider exchange and its response.
    pub async fn handle(&self, context: RequestContext) -> Result<RelayResponse> {
        let method = context.method();

        if *method == Method::OPTIONS {
            return Ok(RelayResponse::preflight());
        }

        if *method != Method::POST {
            return Err(RelayError::UnsupportedMethod(method.clone()));
        }

        let Some(provider) = self.provider.as_deref() else {
            tracing::error!("rejecting upload: no provider credential configured");
            return Err(RelayError::MissingCredential);
        };

        let boundary = context.multipart_boundary()?;

        let deadline = Instant::now() + self.settings.timeout;
        let multipart = context.into_multipart(boundary);

        let reader = IngressReader::spawn(multipart, self.settings.pipe_capacity, self.settings.extra_files);

        let parsed = timeout_at(deadline, reader.parse(&self.settings.default_filename))
            .await
            .map_err(|_| {
                tracing::warn!("upload deadline passed before a file part arrived");
                RelayError::UpstreamTimeout(self.settings.timeout)
            })??;

        let ParsedUpload::OneFile { fields, file } = parsed else {
            tracing::debug!("upload has no file part, provider not called");
            return Err(RelayError::MissingFile);
        };

        tracing::debug!(
            filename = %file.filename,
            content_type = file.content_type.as_deref().unwrap_or_default(),
            fields = fields.len(),
            "forwarding upload"
        );

        let request = OutboundRequest::new(&self.settings.model, &fields, file);

        self.forward(provider, request, deadline).await
    }

    async fn forward(
        &self,
        provider: &dyn TranscriptionProvider,
        request: OutboundRequest,
        deadline: Instant,
    ) -> Result<RelayResponse> {
        let started = Instant::now();
        let fault = request.fault();

        let outcome = timeout_at(deadline, provider.transcribe(request)).await;
        let elapsed_ms = elapsed_ms(started.elapsed());

        let response = match outcome {
            Ok(Ok(response)) => response,
            Ok(Err(error)) => {
                // A broken inbound upload surfaces here as a failed outbound body
                let error = fault.get().unwrap_or(error);

                tracing::warn!(provider = provider.name(), elapsed_ms, "upload failed: {error}");
                return Err(error);
            }
            Err(_) => {
                let error = fault
                    .get()
                    .unwrap_or(RelayError::UpstreamTimeout(self.settings.timeout));

                tracing::warn!(provider = provider.name(), elapsed_ms, "upload failed: {error}");
                return Err(error);
            }
        };

        let status = response.status;

        match response.into_relay() {
            Ok(relayed) => {
                tracing::info!(provider = provider.name(), %status, elapsed_ms, "transcription relayed");
                Ok(relayed)
            }
            Err(error) => {
                tracing::warn!(provider = provider.name(), %status, elapsed_ms, "provider returned an error: {error}");
                Err(error)
            }
        }
    }
}

fn elapsed_ms(elapsed: Duration) -> u64 {
    u64::try_from(elapsed.as_millis()).unwrap_or(u64::MAX)
}

/// Builder for constructing the relay from configuration
pub(crate) struct RelayBuilder<'a> {
    config: &'a murmur_config::Config,
}

impl<'a> RelayBuilder<'a> {
    pub fn new(config: &'a murmur_config::Config) -> Self {
        Self { config }
    }

    pub fn build(self) -> anyhow::Result<Relay> {
        let stt = &self.config.stt;

        let settings = UploadSettings {
            model: stt.model.clone(),
            default_filename: stt.default_filename.clone(),
            pipe_capacity: stt.pipe_capacity,
            timeout: stt.timeout_duration()?,
            extra_files: stt.extra_files,
        };

        let provider: Option<Box<dyn TranscriptionProvider>> = match &stt.api_key {
            Some(api_key) => {
                let client = http_client().map_err(|e| anyhow::anyhow!("failed to build HTTP client: {e}"))?;

                Some(Box::new(WhisperProvider::new(
                    PROVIDER_NAME,
                    client,
                    api_key.clone(),
                    &stt.base_url,
                )))
            }
            None => {
                tracing::warn!("no provider credential configured, uploads will be rejected");
                None
            }
        };

        tracing::debug!(
            base_url = %stt.base_url,
            model = %settings.model,
            timeout = ?settings.timeout,
            pipe_capacity = settings.pipe_capacity,
            "upload relay initialized"
        );

        Ok(Relay {
            provider,
            cors: CorsPolicy::from_config(&self.config.server.cors),
            settings,
        })
    }
}
