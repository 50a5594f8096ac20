use std::time::Duration;

use secrecy::SecretString;
use serde::Deserialize;

/// Default provider endpoint (`OpenAI`-compatible transcription API)
pub const DEFAULT_BASE_URL: &str = "https://api.openai.com/v1";

/// Upload relay configuration
#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SttConfig {
    /// Provider credential, sent as a bearer token
    ///
    /// Optional at startup: when absent every upload fails with a
    /// missing-credential error instead of the process refusing to start.
    #[serde(default)]
    pub api_key: Option<SecretString>,
    /// Provider base URL; `/audio/transcriptions` is appended
    #[serde(default = "default_base_url")]
    pub base_url: String,
    /// Model identifier sent with every upload
    #[serde(default = "default_model")]
    pub model: String,
    /// Deadline for a single upload, e.g. `"120s"` or `"2m"`
    #[serde(default = "default_timeout")]
    pub timeout: String,
    /// Filename used when the client sends a file part without one
    #[serde(default = "default_filename")]
    pub default_filename: String,
    /// Number of chunks buffered between the inbound reader and the provider upload
    #[serde(default = "default_pipe_capacity")]
    pub pipe_capacity: usize,
    /// What to do with file parts after the first one
    #[serde(default)]
    pub extra_files: ExtraFilePolicy,
}

impl Default for SttConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            base_url: default_base_url(),
            model: default_model(),
            timeout: default_timeout(),
            default_filename: default_filename(),
            pipe_capacity: default_pipe_capacity(),
            extra_files: ExtraFilePolicy::default(),
        }
    }
}

impl SttConfig {
    /// Parse the configured upload deadline
    ///
    /// # Errors
    ///
    /// Returns an error if the value is not a valid duration string
    pub fn timeout_duration(&self) -> anyhow::Result<Duration> {
        duration_str::parse(&self.timeout).map_err(|e| anyhow::anyhow!("invalid stt.timeout '{}': {e}", self.timeout))
    }
}

/// Handling of file parts that follow the first one in an upload
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExtraFilePolicy {
    /// Drain and drop them; only the first file is forwarded
    #[default]
    Discard,
    /// Fail the upload as malformed
    Reject,
}

fn default_base_url() -> String {
    DEFAULT_BASE_URL.to_owned()
}

fn default_model() -> String {
    "whisper-1".to_owned()
}

fn default_timeout() -> String {
    "120s".to_owned()
}

fn default_filename() -> String {
    "recording.webm".to_owned()
}

#[allow(clippy::missing_const_for_fn)]
fn default_pipe_capacity() -> usize {
    16
}
