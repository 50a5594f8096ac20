pub(crate) mod whisper;

use async_trait::async_trait;

use crate::{egress::OutboundRequest, error::Result, response::ProviderResponse};

/// Trait for transcription provider implementations
#[async_trait]
pub(crate) trait TranscriptionProvider: Send + Sync {
    /// Send one upload and return the provider's answer, whatever its status
    ///
    /// Only failures to get an answer at all are errors.
    async fn transcribe(&self, request: OutboundRequest) -> Result<ProviderResponse>;

    /// Get the provider name
    fn name(&self) -> &str;
}
