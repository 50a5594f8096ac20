use axum::{
    body::Body,
    http::{self, HeaderValue, Method},
};
use multer::Multipart;

use crate::error::{RelayError, Result};

/// Inbound upload request, owned by the relay for the duration of one call
///
/// The body is not touched until [`RequestContext::into_multipart`] is called,
/// so every header check can fail fast without reading any upload bytes.
#[derive(Debug)]
pub struct RequestContext {
    pub parts: http::request::Parts,
    body: Body,
}

impl RequestContext {
    pub fn new(request: http::Request<Body>) -> Self {
        let (parts, body) = request.into_parts();
        Self { parts, body }
    }

    pub const fn method(&self) -> &Method {
        &self.parts.method
    }

    /// `Origin` header of the caller, if any
    pub fn origin(&self) -> Option<&HeaderValue> {
        self.parts.headers.get(http::header::ORIGIN)
    }

    /// Multipart boundary declared by the `Content-Type` header
    pub fn multipart_boundary(&self) -> Result<String> {
        self.parts
            .headers
            .get(http::header::CONTENT_TYPE)
            .and_then(|value| value.to_str().ok())
            .and_then(multipart_boundary)
            .ok_or(RelayError::BadContentType)
    }

    /// Hand the body to a streaming multipart decoder
    ///
    /// Nothing is read yet; parts are pulled as the decoder is polled. The
    /// decoder applies no size limit.
    pub fn into_multipart(self, boundary: String) -> Multipart<'static> {
        Multipart::new(self.body.into_data_stream(), boundary)
    }
}

impl From<http::Request<Body>> for RequestContext {
    fn from(request: http::Request<Body>) -> Self {
        Self::new(request)
    }
}

/// Extract the boundary from a `multipart/form-data` content type
///
/// Returns `None` for any other media type or when the boundary parameter is
/// missing or empty.
pub(crate) fn multipart_boundary(content_type: &str) -> Option<String> {
    multer::parse_boundary(content_type)
        .ok()
        .filter(|boundary| !boundary.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn boundary_from_plain_content_type() {
        assert_eq!(
            multipart_boundary("multipart/form-data; boundary=----abc123").as_deref(),
            Some("----abc123")
        );
    }

    #[test]
    fn boundary_is_unquoted_and_media_type_case_insensitive() {
        assert_eq!(
            multipart_boundary("Multipart/Form-Data; charset=utf-8; boundary=\"xyz\"").as_deref(),
            Some("xyz")
        );
    }

    #[test]
    fn other_media_types_are_rejected() {
        assert_eq!(multipart_boundary("application/json"), None);
        assert_eq!(multipart_boundary("multipart/mixed; boundary=abc"), None);
        assert_eq!(multipart_boundary("text/plain"), None);
    }

    #[test]
    fn missing_or_empty_boundary_is_rejected() {
        assert_eq!(multipart_boundary("multipart/form-data"), None);
        assert_eq!(multipart_boundary("multipart/form-data; boundary="), None);
        assert_eq!(multipart_boundary("multipart/form-data; boundary=\"\""), None);
    }

    #[test]
    fn context_reports_bad_content_type() {
        let request = http::Request::builder()
            .method(Method::POST)
            .header(http::header::CONTENT_TYPE, "application/json")
            .body(Body::empty())
            .unwrap();

        let context = RequestContext::new(request);

        assert!(matches!(context.multipart_boundary(), Err(RelayError::BadContentType)));
    }

    #[test]
    fn context_without_content_type_is_rejected() {
        let request = http::Request::builder().method(Method::POST).body(Body::empty()).unwrap();

        assert!(matches!(
            RequestContext::new(request).multipart_boundary(),
            Err(RelayError::BadContentType)
        ));
    }
}
