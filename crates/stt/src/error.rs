use std::time::Duration;

use axum::{
    Json,
    http::{HeaderValue, Method, StatusCode, header},
    response::{IntoResponse, Response},
};
use serde::Serialize;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, RelayError>;

/// Methods accepted on the upload endpoint, as advertised in `Allow`
pub(crate) const ALLOWED_METHODS: &str = "POST, OPTIONS";

/// Upload relay errors with their HTTP status codes
///
/// Every variant is terminal for the request it occurred in.
#[derive(Debug, Clone, Error)]
pub enum RelayError {
    /// Request method other than POST or OPTIONS
    #[error("Method {0} is not allowed, expected POST or OPTIONS")]
    UnsupportedMethod(Method),

    /// No provider credential configured for this process
    #[error("Transcription provider credential is not configured")]
    MissingCredential,

    /// Missing or non-multipart Content-Type, or no boundary
    #[error("Unsupported Content-Type, expected: 'Content-Type: multipart/form-data; boundary=...'")]
    BadContentType,

    /// Multipart body ended without a file part
    #[error("Missing file part in multipart form")]
    MissingFile,

    /// Broken multipart framing or a rejected part
    #[error("Malformed upload: {0}")]
    MalformedUpload(String),

    /// Inbound connection failed before the upload was fully read
    #[error("Client disconnected before the upload completed: {0}")]
    ClientDisconnected(String),

    /// Provider did not answer within the upload deadline
    #[error("Transcription provider did not respond within {}s", .0.as_secs_f64())]
    UpstreamTimeout(Duration),

    /// Provider answered with a non-success status, or could not be reached
    ///
    /// `status` is `None` when no response was received at all.
    #[error("{message}")]
    UpstreamError { status: Option<StatusCode>, message: String },

    /// Internal server error
    /// If Some(message), the message is safe to show
    /// If None, it's an internal error and should not leak details
    #[error("Internal server error")]
    InternalError(Option<String>),
}

impl RelayError {
    /// Get the appropriate HTTP status code for this error
    pub fn status_code(&self) -> StatusCode {
        match self {
            Self::UnsupportedMethod(_) => StatusCode::METHOD_NOT_ALLOWED,
            Self::BadContentType | Self::MissingFile | Self::MalformedUpload(_) | Self::ClientDisconnected(_) => {
                StatusCode::BAD_REQUEST
            }
            Self::UpstreamTimeout(_) => StatusCode::GATEWAY_TIMEOUT,
            Self::UpstreamError { status, .. } => status.unwrap_or(StatusCode::BAD_GATEWAY),
            Self::MissingCredential | Self::InternalError(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Get the error type string for the response
    pub fn error_type(&self) -> &str {
        match self {
            Self::UnsupportedMethod(_) => "unsupported_method",
            Self::MissingCredential => "missing_credential",
            Self::BadContentType => "bad_content_type",
            Self::MissingFile => "missing_file",
            Self::MalformedUpload(_) => "malformed_upload",
            Self::ClientDisconnected(_) => "client_disconnected",
            Self::UpstreamTimeout(_) => "upstream_timeout",
            Self::UpstreamError { .. } => "upstream_error",
            Self::InternalError(_) => "internal_error",
        }
    }

    /// Message that is safe to expose to API consumers
    pub fn client_message(&self) -> String {
        match self {
            Self::InternalError(Some(message)) => message.clone(),
            Self::InternalError(None) => "Internal server error".to_owned(),
            _ => self.to_string(),
        }
    }
}

/// Error body returned on every failure path
#[derive(Debug, Serialize)]
struct ErrorResponse {
    error: String,
    r#type: String,
}

impl IntoResponse for RelayError {
    fn into_response(self) -> Response {
        let status = self.status_code();

        let body = ErrorResponse {
            error: self.client_message(),
            r#type: self.error_type().to_owned(),
        };

        let mut response = (status, Json(body)).into_response();

        if matches!(self, Self::UnsupportedMethod(_)) {
            response
                .headers_mut()
                .insert(header::ALLOW, HeaderValue::from_static(ALLOWED_METHODS));
        }

        response
    }
}
