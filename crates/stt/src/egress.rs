//! Outbound provider request
//!
//! The provider form is built with `reqwest::multipart`. Its file part is a
//! stream fed by the inbound reader, so file bytes leave as soon as they
//! arrive and the form only closes once the inbound body has been read to
//! its end.

use std::sync::{Arc, OnceLock};

use bytes::Bytes;
use futures::{Stream, stream};
use reqwest::multipart::{Form, Part};

use crate::{
    error::{RelayError, Result},
    ingress::{FileAttachment, FileBody, PartEvent, reader_stopped},
    types::FormFields,
};

/// Content type of the file part when the client did not declare one
pub(crate) const DEFAULT_FILE_CONTENT_TYPE: &str = "application/octet-stream";

/// Field name the provider expects the audio under
const FILE_FIELD: &str = "file";

/// First ingress failure seen while streaming the outbound body
///
/// The HTTP client only reports that the body stream failed; the slot keeps
/// the original error so it can be reported instead of a transport error.
#[derive(Debug, Clone, Default)]
pub(crate) struct IngressFault(Arc<OnceLock<RelayError>>);

impl IngressFault {
    fn record(&self, error: RelayError) -> RelayError {
        let _ = self.0.set(error.clone());
        error
    }

    pub fn get(&self) -> Option<RelayError> {
        self.0.get().cloned()
    }
}

/// Provider upload bound to a live inbound file
pub(crate) struct OutboundRequest {
    pub model: String,
    /// Forwarded fields, in the order they are sent
    pub fields: Vec<(String, String)>,
    pub filename: String,
    pub content_type: String,
    /// File bytes, streamed from the inbound upload
    pub file: reqwest::Body,
    fault: IngressFault,
}

impl OutboundRequest {
    /// Only fields collected before the file part are forwarded. Parts after
    /// it are drained by the file stream but never sent.
    pub fn new(model: &str, fields: &FormFields, file: FileAttachment) -> Self {
        let fault = IngressFault::default();

        Self {
            model: model.to_owned(),
            fields: fields
                .forwarded()
                .map(|(name, value)| (name.to_owned(), value.to_owned()))
                .collect(),
            filename: file.filename,
            content_type: file
                .content_type
                .unwrap_or_else(|| DEFAULT_FILE_CONTENT_TYPE.to_owned()),
            file: reqwest::Body::wrap_stream(file_stream(file.body, fault.clone())),
            fault,
        }
    }

    /// Handle on the ingress failure slot, shared with the file stream
    pub fn fault(&self) -> IngressFault {
        self.fault.clone()
    }

    /// Multipart form for the provider: model, forwarded fields, then the file
    pub fn into_form(self) -> Result<Form> {
        let file = Part::stream(self.file)
            .file_name(self.filename)
            .mime_str(&self.content_type)
            .map_err(|e| RelayError::MalformedUpload(format!("Invalid file content type: {e}")))?;

        let form = self
            .fields
            .into_iter()
            .fold(Form::new().text("model", self.model), |form, (name, value)| {
                form.text(name, value)
            });

        Ok(form.part(FILE_FIELD, file))
    }
}

/// File bytes of the inbound upload as a body stream
///
/// The stream ends once the reader has consumed the whole inbound body, and
/// fails (recording the error in `fault`) if the reader reports a failure.
fn file_stream(body: FileBody, fault: IngressFault) -> impl Stream<Item = Result<Bytes>> + Send + 'static {
    stream::unfold(Some((body, fault)), |state| async move {
        let (mut body, fault) = state?;

        loop {
            match body.next_event().await {
                Some(PartEvent::Chunk(chunk)) => return Some((Ok(chunk), Some((body, fault)))),
                Some(PartEvent::Field { name, .. }) => {
                    tracing::debug!(field = %name, "field after the file part is not forwarded");
                }
                Some(PartEvent::FileStart { .. } | PartEvent::FileEnd) => {}
                Some(PartEvent::Finished {
                    file_bytes,
                    discarded_files,
                }) => {
                    tracing::debug!(file_bytes, discarded_files, "outbound file complete");
                    return None;
                }
                Some(PartEvent::Failed(error)) => return Some((Err(fault.record(error)), None)),
                None => return Some((Err(fault.record(reader_stopped())), None)),
            }
        }
    })
}
