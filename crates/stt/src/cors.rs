use axum::http::{HeaderMap, HeaderName, HeaderValue, header};
use murmur_config::{AnyOrArray, CorsConfig};

use crate::error::ALLOWED_METHODS;

/// Cross-origin headers attached to every upload endpoint response
///
/// Success, preflight and every error path go through [`CorsPolicy::apply`],
/// so a browser always sees the headers it needs to read the outcome.
#[derive(Debug, Clone)]
pub struct CorsPolicy {
    origins: Origins,
    allow_headers: HeaderValue,
    expose_headers: Option<HeaderValue>,
    max_age: Option<HeaderValue>,
    credentials: bool,
}

#[derive(Debug, Clone)]
enum Origins {
    Any,
    List(Vec<HeaderValue>),
}

impl CorsPolicy {
    /// Build the policy from configuration
    ///
    /// Entries that are not valid header values are skipped.
    pub fn from_config(config: &CorsConfig) -> Self {
        // Origins
        let origins = match &config.origins {
            AnyOrArray::Any => Origins::Any,
            AnyOrArray::List(origins) => Origins::List(origins.iter().filter_map(|o| o.parse().ok()).collect()),
        };

        // Headers
        let allow_headers = match &config.headers {
            AnyOrArray::Any => HeaderValue::from_static("*"),
            AnyOrArray::List(headers) => {
                join_header_names(headers).unwrap_or_else(|| HeaderValue::from_static("content-type"))
            }
        };

        // Expose headers
        let expose_headers = join_header_names(&config.expose_headers);

        // Max age
        let max_age = config.max_age.map(HeaderValue::from);

        Self {
            origins,
            allow_headers,
            expose_headers,
            max_age,
            credentials: config.credentials,
        }
    }

    /// Write the CORS headers for a caller with the given `Origin`
    ///
    /// With an explicit allow-list the origin is echoed only when listed;
    /// unlisted or absent origins get no `Access-Control-Allow-Origin` at all.
    pub fn apply(&self, origin: Option<&HeaderValue>, headers: &mut HeaderMap) {
        match &self.origins {
            Origins::Any => {
                // A wildcard is not honoured by browsers on credentialed requests
                let allow_origin = match origin {
                    Some(origin) if self.credentials => origin.clone(),
                    _ => HeaderValue::from_static("*"),
                };

                headers.insert(header::ACCESS_CONTROL_ALLOW_ORIGIN, allow_origin);
            }
            Origins::List(allowed) => {
                if let Some(origin) = origin.filter(|origin| allowed.contains(*origin)) {
                    headers.insert(header::ACCESS_CONTROL_ALLOW_ORIGIN, origin.clone());
                }

                headers.append(header::VARY, HeaderValue::from_static("origin"));
            }
        }

        headers.insert(
            header::ACCESS_CONTROL_ALLOW_METHODS,
            HeaderValue::from_static(ALLOWED_METHODS),
        );
        headers.insert(header::ACCESS_CONTROL_ALLOW_HEADERS, self.allow_headers.clone());

        if let Some(expose) = &self.expose_headers {
            headers.insert(header::ACCESS_CONTROL_EXPOSE_HEADERS, expose.clone());
        }

        if let Some(max_age) = &self.max_age {
            headers.insert(header::ACCESS_CONTROL_MAX_AGE, max_age.clone());
        }

        if self.credentials {
            headers.insert(
                header::ACCESS_CONTROL_ALLOW_CREDENTIALS,
                HeaderValue::from_static("true"),
            );
        }
    }
}

impl Default for CorsPolicy {
    fn default() -> Self {
        Self::from_config(&CorsConfig::default())
    }
}

/// Join valid header names into one comma-separated value
fn join_header_names(names: &[String]) -> Option<HeaderValue> {
    let names: Vec<String> = names
        .iter()
        .filter_map(|name| name.parse::<HeaderName>().ok())
        .map(|name| name.as_str().to_owned())
        .collect();

    if names.is_empty() {
        return None;
    }

    HeaderValue::from_str(&names.join(", ")).ok()
}
