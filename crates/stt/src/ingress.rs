//! Inbound multipart reader
//!
//! The request body is decoded by a spawned reader task that owns the
//! multipart stream. It reports what it finds as [`PartEvent`]s over a
//! bounded channel. File bytes are only pulled from the client while the
//! channel has room, so a slow provider upload stalls the inbound read
//! instead of growing a buffer.

use bytes::Bytes;
use multer::{Field, Multipart};
use tokio::sync::mpsc;
use tokio_util::task::AbortOnDropHandle;

use crate::{
    error::{RelayError, Result},
    types::{ExtraFilePolicy, FormFields},
};

/// What the reader task observed in the inbound body, in order
#[derive(Debug)]
pub(crate) enum PartEvent {
    /// A text part
    Field { name: String, value: String },
    /// Start of the first file part; only ever sent once
    FileStart {
        filename: String,
        content_type: Option<String>,
    },
    /// Next slice of the first file part
    Chunk(Bytes),
    /// The first file part is complete
    FileEnd,
    /// The body ended cleanly
    Finished { file_bytes: usize, discarded_files: usize },
    /// The body could not be read to the end
    Failed(RelayError),
}

/// Result of reading an upload up to its first file part
#[derive(Debug)]
pub(crate) enum ParsedUpload {
    /// The body ended without any file part
    NoFile,
    /// The first file part, still unread
    ///
    /// Parts after it are drained through the file's body once the file
    /// bytes have been consumed.
    OneFile { fields: FormFields, file: FileAttachment },
}

/// The file part chosen for forwarding
#[derive(Debug)]
pub(crate) struct FileAttachment {
    pub filename: String,
    pub content_type: Option<String>,
    pub body: FileBody,
}

/// Live handle on the rest of the inbound body
///
/// Dropping it aborts the reader task and with it the inbound read.
#[derive(Debug)]
pub(crate) struct FileBody {
    events: mpsc::Receiver<PartEvent>,
    _reader: AbortOnDropHandle<()>,
}

impl FileBody {
    /// Wait for the next event from the reader
    ///
    /// `None` means the reader stopped without reporting an outcome.
    pub async fn next_event(&mut self) -> Option<PartEvent> {
        self.events.recv().await
    }
}

/// Consumer side of a running reader task
pub(crate) struct IngressReader {
    events: mpsc::Receiver<PartEvent>,
    task: AbortOnDropHandle<()>,
}

impl IngressReader {
    /// Start decoding `multipart` in a background task
    ///
    /// `capacity` bounds the number of events, and therefore file chunks,
    /// buffered between the reader and its consumer.
    pub fn spawn(multipart: Multipart<'static>, capacity: usize, extra_files: ExtraFilePolicy) -> Self {
        let (sender, events) = mpsc::channel(capacity.max(1));

        let reader = PartReader {
            events: sender,
            extra_files,
            file_bytes: 0,
            discarded_files: 0,
        };

        let task = AbortOnDropHandle::new(tokio::spawn(reader.run(multipart)));

        Self { events, task }
    }

    /// Collect form fields until the first file part is reached
    ///
    /// The file itself is not read; it is returned as a live [`FileBody`].
    pub async fn parse(mut self, default_filename: &str) -> Result<ParsedUpload> {
        let mut fields = FormFields::default();

        loop {
            let event = self.events.recv().await;

            match event {
                Some(PartEvent::Field { name, value }) => fields.insert(name, value),
                Some(PartEvent::FileStart { filename, content_type }) => {
                    let filename = if filename.trim().is_empty() {
                        default_filename.to_owned()
                    } else {
                        filename
                    };

                    let file = FileAttachment {
                        filename,
                        content_type,
                        body: FileBody {
                            events: self.events,
                            _reader: self.task,
                        },
                    };

                    return Ok(ParsedUpload::OneFile { fields, file });
                }
                Some(PartEvent::Finished { .. }) => return Ok(ParsedUpload::NoFile),
                Some(PartEvent::Failed(error)) => return Err(error),
                Some(PartEvent::Chunk(_) | PartEvent::FileEnd) => {}
                None => return Err(reader_stopped()),
            }
        }
    }
}

/// Error for a reader task that vanished without reporting an outcome
pub(crate) fn reader_stopped() -> RelayError {
    RelayError::InternalError(Some("Upload reader stopped unexpectedly".to_owned()))
}

/// Why the reader stopped early
enum Stop {
    /// The consumer dropped its end of the channel
    Abandoned,
    /// The inbound body could not be decoded
    Failed(RelayError),
}

impl From<RelayError> for Stop {
    fn from(error: RelayError) -> Self {
        Self::Failed(error)
    }
}

struct PartReader {
    events: mpsc::Sender<PartEvent>,
    extra_files: ExtraFilePolicy,
    file_bytes: usize,
    discarded_files: usize,
}

impl PartReader {
    async fn run(mut self, mut multipart: Multipart<'static>) {
        match self.pump(&mut multipart).await {
            Ok(()) => {
                tracing::debug!(
                    file_bytes = self.file_bytes,
                    discarded_files = self.discarded_files,
                    "inbound upload read completely"
                );

                let finished = PartEvent::Finished {
                    file_bytes: self.file_bytes,
                    discarded_files: self.discarded_files,
                };

                // The consumer may be gone already; nothing left to do then
                let _ = self.events.send(finished).await;
            }
            Err(Stop::Abandoned) => {
                tracing::debug!(file_bytes = self.file_bytes, "upload consumer closed, stopping inbound read");
            }
            Err(Stop::Failed(error)) => {
                tracing::debug!(file_bytes = self.file_bytes, "inbound upload failed: {error}");
                let _ = self.events.send(PartEvent::Failed(error)).await;
            }
        }
    }

    async fn pump(&mut self, multipart: &mut Multipart<'static>) -> std::result::Result<(), Stop> {
        let mut file_seen = false;

        while let Some(mut field) = multipart.next_field().await.map_err(ingress_error)? {
            let name = field.name().unwrap_or_default().to_owned();

            match field.file_name().map(str::to_owned) {
                Some(filename) if !file_seen => {
                    file_seen = true;

                    let content_type = field.content_type().map(ToString::to_string);
                    self.emit(PartEvent::FileStart { filename, content_type }).await?;
                    self.forward_file(&mut field).await?;
                    self.emit(PartEvent::FileEnd).await?;
                }
                Some(filename) => self.skip_file(&mut field, &filename).await?,
                None => {
                    let value = field.text().await.map_err(ingress_error)?;
                    self.emit(PartEvent::Field { name, value }).await?;
                }
            }
        }

        Ok(())
    }

    async fn forward_file(&mut self, field: &mut Field<'static>) -> std::result::Result<(), Stop> {
        while let Some(chunk) = field.chunk().await.map_err(ingress_error)? {
            if chunk.is_empty() {
                continue;
            }

            self.file_bytes = self.file_bytes.saturating_add(chunk.len());
            self.emit(PartEvent::Chunk(chunk)).await?;
        }

        Ok(())
    }

    async fn skip_file(&mut self, field: &mut Field<'static>, filename: &str) -> std::result::Result<(), Stop> {
        if self.extra_files == ExtraFilePolicy::Reject {
            return Err(RelayError::MalformedUpload(format!(
                "only one file part is accepted, found another one ('{filename}')"
            ))
            .into());
        }

        while field.chunk().await.map_err(ingress_error)?.is_some() {}

        self.discarded_files += 1;
        tracing::debug!(filename, "discarded extra file part");

        Ok(())
    }

    async fn emit(&self, event: PartEvent) -> std::result::Result<(), Stop> {
        self.events.send(event).await.map_err(|_| Stop::Abandoned)
    }
}

/// Classify a decoder failure
///
/// A failure to read the underlying body (connection reset, aborted upload)
/// is a disconnect; everything else is broken framing.
fn ingress_error(error: multer::Error) -> RelayError {
    match error {
        multer::Error::StreamReadFailed(source) => RelayError::ClientDisconnected(source.to_string()),
        other => RelayError::MalformedUpload(other.to_string()),
    }
}
