use axum::{
    body::Body,
    http::{HeaderValue, StatusCode, header},
    response::{IntoResponse, Response},
};
use bytes::Bytes;
use serde::Deserialize;

use crate::error::{RelayError, Result};

/// Message used when a provider error body carries nothing readable
const GENERIC_PROVIDER_ERROR: &str = "Transcription provider returned an error";

/// Raw answer from a transcription provider
#[derive(Debug, Clone)]
pub struct ProviderResponse {
    pub status: StatusCode,
    pub content_type: Option<HeaderValue>,
    pub body: Bytes,
}

impl ProviderResponse {
    /// Pass a success through untouched, turn anything else into an error
    pub fn into_relay(self) -> Result<RelayResponse> {
        if self.status.is_success() {
            return Ok(RelayResponse {
                status: self.status,
                content_type: self.content_type,
                body: self.body,
            });
        }

        Err(RelayError::UpstreamError {
            status: Some(self.status),
            message: provider_error_message(&self.body),
        })
    }
}

/// Successful relay outcome, sent back to the client as is
#[derive(Debug, Clone)]
pub struct RelayResponse {
    status: StatusCode,
    content_type: Option<HeaderValue>,
    body: Bytes,
}

impl RelayResponse {
    /// Empty answer to a CORS preflight
    pub fn preflight() -> Self {
        Self {
            status: StatusCode::NO_CONTENT,
            content_type: None,
            body: Bytes::new(),
        }
    }

    pub fn status(&self) -> StatusCode {
        self.status
    }

    pub fn body(&self) -> &Bytes {
        &self.body
    }
}

impl IntoResponse for RelayResponse {
    fn into_response(self) -> Response {
        let mut response = Response::new(Body::from(self.body));
        *response.status_mut() = self.status;

        if let Some(content_type) = self.content_type {
            response.headers_mut().insert(header::CONTENT_TYPE, content_type);
        }

        response
    }
}

#[derive(Deserialize)]
#[serde(untagged)]
enum ErrorPayload {
    Nested { error: NestedError },
    Flat { error: String },
    Message { message: String },
}

#[derive(Deserialize)]
struct NestedError {
    message: String,
}

/// Pull a human readable message out of a provider error body
///
/// Understands `{"error": {"message": ..}}`, `{"error": ".."}` and
/// `{"message": ..}`; otherwise falls back to the raw text.
pub(crate) fn provider_error_message(body: &[u8]) -> String {
    let message = match serde_json::from_slice::<ErrorPayload>(body) {
        Ok(ErrorPayload::Nested { error }) => error.message,
        Ok(ErrorPayload::Flat { error }) => error,
        Ok(ErrorPayload::Message { message }) => message,
        Err(_) => String::from_utf8_lossy(body).into_owned(),
    };

    let message = message.trim();

    if message.is_empty() {
        GENERIC_PROVIDER_ERROR.to_owned()
    } else {
        message.to_owned()
    }
}
