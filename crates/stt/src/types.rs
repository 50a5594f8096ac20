use std::{collections::BTreeMap, time::Duration};

pub use murmur_config::ExtraFilePolicy;

/// Optional provider parameters forwarded when the client sends them
pub(crate) const FORWARDED_FIELDS: [&str; 4] = ["language", "prompt", "response_format", "temperature"];

/// Whether a client form field is passed on to the provider
pub(crate) fn is_forwarded(name: &str) -> bool {
    FORWARDED_FIELDS.contains(&name)
}

/// Text fields of an upload, keyed by field name
///
/// A repeated field keeps its last value.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FormFields(BTreeMap<String, String>);

impl FormFields {
    pub fn insert(&mut self, name: impl Into<String>, value: impl Into<String>) {
        self.0.insert(name.into(), value.into());
    }

    pub fn get(&self, name: &str) -> Option<&str> {
        self.0.get(name).map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Fields the provider accepts, in a stable order
    pub fn forwarded(&self) -> impl Iterator<Item = (&str, &str)> {
        self.0
            .iter()
            .filter(|(name, _)| is_forwarded(name))
            .map(|(name, value)| (name.as_str(), value.as_str()))
    }
}

/// Per-upload settings resolved from configuration at startup
#[derive(Debug, Clone)]
pub struct UploadSettings {
    /// Model identifier sent with every upload
    pub model: String,
    /// Filename used when the client omits one
    pub default_filename: String,
    /// Chunks buffered between inbound reader and outbound body
    pub pipe_capacity: usize,
    /// Deadline covering upload, provider processing and response
    pub timeout: Duration,
    /// Handling of additional file parts
    pub extra_files: ExtraFilePolicy,
}
