//! Mock transcription provider for integration tests
//!
//! Accepts `OpenAI`-style multipart uploads, records what arrived and answers
//! with a configurable reply.

use std::{
    net::SocketAddr,
    sync::{
        Arc, Mutex,
        atomic::{AtomicU32, Ordering},
    },
    time::Duration,
};

use axum::{
    Router,
    extract::{DefaultBodyLimit, Multipart, State},
    http::{HeaderMap, StatusCode, header},
    response::{IntoResponse, Response},
    routing,
};
use sha2::{Digest, Sha256};
use tokio_util::sync::CancellationToken;

/// Canned answer returned by the mock
#[derive(Debug, Clone)]
pub struct Reply {
    pub status: StatusCode,
    pub content_type: &'static str,
    pub body: String,
    /// Pause after the upload has been read, before answering
    pub delay: Duration,
}

impl Default for Reply {
    fn default() -> Self {
        Self {
            status: StatusCode::OK,
            content_type: "application/json",
            body: r#"{"text":"hello from the mock"}"#.to_owned(),
            delay: Duration::ZERO,
        }
    }
}

/// What the mock saw in one upload
#[derive(Debug, Clone, Default)]
pub struct ReceivedUpload {
    pub authorization: Option<String>,
    /// Text parts in arrival order, repeats included
    pub fields: Vec<(String, String)>,
    pub file_field: Option<String>,
    pub file_name: Option<String>,
    pub file_content_type: Option<String>,
    pub file_len: usize,
    pub file_sha256: Option<String>,
    pub file_count: usize,
    /// Whether the multipart body was read to its closing boundary
    pub complete: bool,
}

impl ReceivedUpload {
    /// Value of the text part `name`, if it was sent exactly once
    pub fn field(&self, name: &str) -> Option<&str> {
        let mut values = self.fields.iter().filter(|(n, _)| n == name);
        let (_, value) = values.next()?;

        assert!(values.next().is_none(), "field {name} was sent more than once");
        Some(value)
    }
}

/// Mock provider that records uploads and returns a fixed reply
pub struct MockProvider {
    addr: SocketAddr,
    shutdown: CancellationToken,
    state: Arc<MockState>,
}

struct MockState {
    request_count: AtomicU32,
    reply: Reply,
    last_upload: Mutex<Option<ReceivedUpload>>,
}

impl MockProvider {
    /// Start a mock that answers every upload with a 200 JSON transcript
    pub async fn start() -> anyhow::Result<Self> {
        Self::start_with_reply(Reply::default()).await
    }

    /// Start a mock with a custom reply
    pub async fn start_with_reply(reply: Reply) -> anyhow::Result<Self> {
        let state = Arc::new(MockState {
            request_count: AtomicU32::new(0),
            reply,
            last_upload: Mutex::new(None),
        });

        let app = Router::new()
            .route("/v1/audio/transcriptions", routing::post(handle_transcription))
            .layer(DefaultBodyLimit::disable())
            .with_state(Arc::clone(&state));

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await?;
        let addr = listener.local_addr()?;
        let shutdown = CancellationToken::new();
        let shutdown_clone = shutdown.clone();

        tokio::spawn(async move {
            axum::serve(listener, app)
                .with_graceful_shutdown(async move {
                    shutdown_clone.cancelled().await;
                })
                .await
                .ok();
        });

        Ok(Self { addr, shutdown, state })
    }

    /// Base URL for configuring the mock as the provider
    ///
    /// Includes `/v1` since the relay appends `/audio/transcriptions`
    pub fn base_url(&self) -> String {
        format!("http://{}/v1", self.addr)
    }

    /// Number of uploads received
    pub fn request_count(&self) -> u32 {
        self.state.request_count.load(Ordering::Relaxed)
    }

    /// The most recent upload, if any
    pub fn last_upload(&self) -> Option<ReceivedUpload> {
        self.state.last_upload.lock().unwrap().clone()
    }
}

impl Drop for MockProvider {
    fn drop(&mut self) {
        self.shutdown.cancel();
    }
}

async fn handle_transcription(
    State(state): State<Arc<MockState>>,
    headers: HeaderMap,
    mut multipart: Multipart,
) -> Response {
    state.request_count.fetch_add(1, Ordering::Relaxed);

    let mut upload = ReceivedUpload {
        authorization: headers
            .get(header::AUTHORIZATION)
            .and_then(|v| v.to_str().ok())
            .map(str::to_owned),
        ..ReceivedUpload::default()
    };

    loop {
        let mut field = match multipart.next_field().await {
            Ok(Some(field)) => field,
            Ok(None) => {
                upload.complete = true;
                break;
            }
            Err(_) => break,
        };

        let name = field.name().unwrap_or_default().to_owned();

        if let Some(file_name) = field.file_name().map(str::to_owned) {
            upload.file_count += 1;
            upload.file_field = Some(name);
            upload.file_name = Some(file_name);
            upload.file_content_type = field.content_type().map(str::to_owned);

            let mut hasher = Sha256::new();
            let mut len = 0;

            while let Ok(Some(chunk)) = field.chunk().await {
                hasher.update(&chunk);
                len += chunk.len();
            }

            upload.file_len = len;
            upload.file_sha256 = Some(format!("{:x}", hasher.finalize()));
        } else if let Ok(value) = field.text().await {
            upload.fields.push((name, value));
        }
    }

    *state.last_upload.lock().unwrap() = Some(upload);

    tokio::time::sleep(state.reply.delay).await;

    (
        state.reply.status,
        [(header::CONTENT_TYPE, state.reply.content_type)],
        state.reply.body.clone(),
    )
        .into_response()
}

/// Hex SHA-256 of `data`, for comparing with [`ReceivedUpload::file_sha256`]
pub fn sha256_hex(data: &[u8]) -> String {
    format!("{:x}", Sha256::digest(data))
}
