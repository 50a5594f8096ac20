use serde::Deserialize;

/// Cross-origin policy for the upload endpoint
///
/// Allowed methods are fixed by the relay (`POST, OPTIONS`) and are therefore
/// not configurable here.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct CorsConfig {
    /// Origins allowed to call the relay (`"*"` or an explicit list)
    #[serde(default)]
    pub origins: AnyOrArray,
    /// Request headers allowed on preflight (`"*"` or an explicit list)
    #[serde(default = "default_headers")]
    pub headers: AnyOrArray,
    /// Response headers exposed to the browser
    #[serde(default)]
    pub expose_headers: Vec<String>,
    /// Allow credentials
    #[serde(default)]
    pub credentials: bool,
    /// Preflight cache lifetime in seconds
    #[serde(default)]
    pub max_age: Option<u64>,
}

fn default_headers() -> AnyOrArray {
    AnyOrArray::List(vec!["content-type".to_owned(), "authorization".to_owned()])
}

impl Default for CorsConfig {
    fn default() -> Self {
        Self {
            origins: AnyOrArray::Any,
            headers: default_headers(),
            expose_headers: Vec::new(),
            credentials: false,
            max_age: None,
        }
    }
}

/// Either a wildcard `"*"` or an explicit list of values
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum AnyOrArray {
    /// Match any value
    #[default]
    Any,
    /// Explicit list
    List(Vec<String>),
}

impl AnyOrArray {
    /// Parse a comma-separated list such as `https://a.example, https://b.example`
    ///
    /// Blank entries are skipped. A lone `*` entry, or an input with no entries
    /// at all, yields [`AnyOrArray::Any`].
    pub fn from_comma_list(raw: &str) -> Self {
        let values: Vec<String> = raw
            .split(',')
            .map(str::trim)
            .filter(|value| !value.is_empty())
            .map(str::to_owned)
            .collect();

        if values.is_empty() {
            Self::Any
        } else {
            Self::from_values(values)
        }
    }

    /// A `*` anywhere in the list widens it to [`AnyOrArray::Any`]
    fn from_values(values: Vec<String>) -> Self {
        if values.iter().any(|value| value == "*") {
            Self::Any
        } else {
            Self::List(values)
        }
    }
}

impl<'de> Deserialize<'de> for AnyOrArray {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        // `"*"`, a single value, or an array of values
        #[derive(Deserialize)]
        #[serde(untagged)]
        enum Raw {
            One(String),
            Many(Vec<String>),
        }

        let values = match Raw::deserialize(deserializer)? {
            Raw::One(value) => vec![value],
            Raw::Many(values) => values,
        };

        Ok(Self::from_values(values))
    }
}
