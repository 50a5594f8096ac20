use async_trait::async_trait;
use axum::http::header;
use reqwest::Client;
use secrecy::{ExposeSecret, SecretString};

use crate::{
    egress::OutboundRequest,
    error::{RelayError, Result},
    response::ProviderResponse,
};

use super::TranscriptionProvider;

/// `OpenAI`-compatible transcription endpoint
pub(crate) struct WhisperProvider {
    client: Client,
    url: String,
    api_key: SecretString,
    name: String,
}

impl WhisperProvider {
    pub fn new(name: impl Into<String>, client: Client, api_key: SecretString, base_url: &str) -> Self {
        Self {
            client,
            url: format!("{}/audio/transcriptions", base_url.trim_end_matches('/')),
            api_key,
            name: name.into(),
        }
    }
}

#[async_trait]
impl TranscriptionProvider for WhisperProvider {
    async fn transcribe(&self, request: OutboundRequest) -> Result<ProviderResponse> {
        tracing::debug!(
            provider = %self.name,
            url = %self.url,
            model = %request.model,
            filename = %request.filename,
            "starting provider upload"
        );

        let form = request.into_form()?;

        let response = self
            .client
            .post(&self.url)
            .bearer_auth(self.api_key.expose_secret())
            .multipart(form)
            .send()
            .await
            .map_err(|e| {
                tracing::debug!(provider = %self.name, "provider request failed: {e}");
                transport_error(&e)
            })?;

        let status = response.status();
        let content_type = response.headers().get(header::CONTENT_TYPE).cloned();

        let body = response.bytes().await.map_err(|e| {
            tracing::debug!(provider = %self.name, %status, "failed to read provider response: {e}");
            transport_error(&e)
        })?;

        Ok(ProviderResponse {
            status,
            content_type,
            body,
        })
    }

    fn name(&self) -> &str {
        &self.name
    }
}

fn transport_error(error: &reqwest::Error) -> RelayError {
    let message = if error.is_connect() {
        "Failed to connect to transcription provider".to_owned()
    } else {
        format!("Transcription provider request failed: {error}")
    };

    RelayError::UpstreamError { status: None, message }
}
