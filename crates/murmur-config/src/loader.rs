use std::path::Path;

use secrecy::{ExposeSecret, SecretString};

use crate::{AnyOrArray, Config};

/// Environment variable holding the provider credential
pub const PROVIDER_API_KEY_VAR: &str = "MURMUR_PROVIDER_API_KEY";

/// Credential variable consulted when [`PROVIDER_API_KEY_VAR`] is unset
pub const FALLBACK_API_KEY_VAR: &str = "OPENAI_API_KEY";

/// Comma-separated CORS origin allow-list
pub const ALLOWED_ORIGINS_VAR: &str = "MURMUR_ALLOWED_ORIGINS";

impl Config {
    /// Load configuration from a TOML file
    ///
    /// Reads the file, expands `{{ env.VAR }}` placeholders, applies the
    /// credential and origin environment overrides, then validates.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read, environment variable
    /// expansion fails, TOML parsing fails, or validation fails
    pub fn load(path: &Path) -> anyhow::Result<Self> {
        let raw = std::fs::read_to_string(path)
            .map_err(|e| anyhow::anyhow!("failed to read config file {}: {e}", path.display()))?;

        let mut config = Self::parse(&raw)?;
        config.apply_env_overrides();
        config.validate()?;

        Ok(config)
    }

    /// Build configuration from defaults and the process environment only
    ///
    /// # Errors
    ///
    /// Returns an error if the resulting configuration fails validation
    pub fn from_env() -> anyhow::Result<Self> {
        let mut config = Self::default();
        config.apply_env_overrides();
        config.validate()?;

        Ok(config)
    }

    /// Parse configuration text after expanding environment placeholders
    ///
    /// # Errors
    ///
    /// Returns an error if expansion or TOML parsing fails
    pub fn parse(raw: &str) -> anyhow::Result<Self> {
        let expanded =
            crate::env::expand_env(raw).map_err(|e| anyhow::anyhow!("config variable expansion failed: {e}"))?;

        toml::from_str(&expanded).map_err(|e| anyhow::anyhow!("failed to parse config: {e}"))
    }

    /// Layer the credential and origin allow-list environment variables over this config
    ///
    /// Set variables win over file values. An empty credential is treated as absent.
    pub fn apply_env_overrides(&mut self) {
        let api_key = env_value(PROVIDER_API_KEY_VAR).or_else(|| env_value(FALLBACK_API_KEY_VAR));

        if let Some(api_key) = api_key {
            self.stt.api_key = Some(SecretString::from(api_key));
        }

        if self
            .stt
            .api_key
            .as_ref()
            .is_some_and(|key| key.expose_secret().trim().is_empty())
        {
            self.stt.api_key = None;
        }

        if let Some(origins) = env_value(ALLOWED_ORIGINS_VAR) {
            self.server.cors.origins = AnyOrArray::from_comma_list(&origins);
        }
    }

    /// Validate that the configuration is internally consistent
    ///
    /// A missing credential is not a validation failure; it is reported per request.
    ///
    /// # Errors
    ///
    /// Returns an error if any relay setting is out of range
    pub fn validate(&self) -> anyhow::Result<()> {
        self.validate_stt_config()?;
        self.validate_health_config()?;
        Ok(())
    }

    fn validate_stt_config(&self) -> anyhow::Result<()> {
        let stt = &self.stt;

        if stt.model.trim().is_empty() {
            anyhow::bail!("stt.model must not be empty");
        }

        if stt.default_filename.trim().is_empty() {
            anyhow::bail!("stt.default_filename must not be empty");
        }

        if stt.pipe_capacity == 0 {
            anyhow::bail!("stt.pipe_capacity must be greater than 0");
        }

        if stt.timeout_duration()?.is_zero() {
            anyhow::bail!("stt.timeout must be greater than 0");
        }

        let base_url =
            url::Url::parse(&stt.base_url).map_err(|e| anyhow::anyhow!("invalid stt.base_url '{}': {e}", stt.base_url))?;

        if !matches!(base_url.scheme(), "http" | "https") {
            anyhow::bail!("stt.base_url must use http or https, got '{}'", base_url.scheme());
        }

        Ok(())
    }

    fn validate_health_config(&self) -> anyhow::Result<()> {
        let health = &self.server.health;

        if health.enabled && !health.path.starts_with('/') {
            anyhow::bail!("server.health.path must start with '/'");
        }

        Ok(())
    }
}

fn env_value(name: &str) -> Option<String> {
    std::env::var(name).ok().filter(|value| !value.trim().is_empty())
}

#[cfg(test)]
mod tests {
    use secrecy::ExposeSecret;

    use super::*;

    const ENV_VARS: [&str; 3] = [PROVIDER_API_KEY_VAR, FALLBACK_API_KEY_VAR, ALLOWED_ORIGINS_VAR];

    fn without_env<R>(f: impl FnOnce() -> R) -> R {
        temp_env::with_vars_unset(ENV_VARS, f)
    }

    #[test]
    fn parse_full_file() {
        let config = without_env(|| {
            Config::parse(
                r#"
                [server]
                listen_address = "127.0.0.1:8080"

                [server.cors]
                origins = ["https://a.example"]

                [stt]
                api_key = "sk-file"
                model = "whisper-1"
                timeout = "30s"

                [telemetry]
                filter = "debug"
                format = "json"
                "#,
            )
            .unwrap()
        });

        assert_eq!(config.server.listen_address, Some("127.0.0.1:8080".parse().unwrap()));
        assert_eq!(
            config.server.cors.origins,
            AnyOrArray::List(vec!["https://a.example".to_owned()])
        );
        assert_eq!(config.stt.api_key.as_ref().unwrap().expose_secret(), "sk-file");
        assert_eq!(config.telemetry.format, crate::LogFormat::Json);
    }

    #[test]
    fn parse_expands_placeholders() {
        temp_env::with_var("MURMUR_TEST_FILE_KEY", Some("sk-expanded"), || {
            let config = Config::parse("[stt]\napi_key = \"{{ env.MURMUR_TEST_FILE_KEY }}\"").unwrap();
            assert_eq!(config.stt.api_key.as_ref().unwrap().expose_secret(), "sk-expanded");
        });
    }

    #[test]
    fn unknown_section_is_rejected() {
        let err = Config::parse("[llm]\nenabled = true").unwrap_err();
        assert!(err.to_string().contains("failed to parse config"));
    }

    #[test]
    fn from_env_reads_credential_and_origins() {
        let vars = [
            (PROVIDER_API_KEY_VAR, Some("sk-env")),
            (FALLBACK_API_KEY_VAR, None),
            (ALLOWED_ORIGINS_VAR, Some("https://a.example,https://b.example")),
        ];

        temp_env::with_vars(vars, || {
            let config = Config::from_env().unwrap();

            assert_eq!(config.stt.api_key.as_ref().unwrap().expose_secret(), "sk-env");
            assert_eq!(
                config.server.cors.origins,
                AnyOrArray::List(vec!["https://a.example".to_owned(), "https://b.example".to_owned()])
            );

            // Same allowed headers as a config file that leaves them out
            let from_file = Config::parse("").unwrap();
            assert_eq!(config.server.cors.headers, from_file.server.cors.headers);
        });
    }

    #[test]
    fn fallback_credential_is_used() {
        let vars = [
            (PROVIDER_API_KEY_VAR, None),
            (FALLBACK_API_KEY_VAR, Some("sk-openai")),
            (ALLOWED_ORIGINS_VAR, None),
        ];

        temp_env::with_vars(vars, || {
            let config = Config::from_env().unwrap();

            assert_eq!(config.stt.api_key.as_ref().unwrap().expose_secret(), "sk-openai");
            assert_eq!(config.server.cors.origins, AnyOrArray::Any);
        });
    }

    #[test]
    fn missing_credential_is_not_a_startup_error() {
        let config = without_env(|| Config::from_env().unwrap());
        assert!(config.stt.api_key.is_none());
    }

    #[test]
    fn blank_file_credential_counts_as_missing() {
        let config = without_env(|| {
            let mut config = Config::parse("[stt]\napi_key = \"  \"").unwrap();
            config.apply_env_overrides();
            config
        });

        assert!(config.stt.api_key.is_none());
    }

    #[test]
    fn env_credential_overrides_file() {
        let vars = [
            (PROVIDER_API_KEY_VAR, Some("sk-env")),
            (FALLBACK_API_KEY_VAR, None),
            (ALLOWED_ORIGINS_VAR, None),
        ];

        temp_env::with_vars(vars, || {
            let mut config = Config::parse("[stt]\napi_key = \"sk-file\"").unwrap();
            config.apply_env_overrides();
            assert_eq!(config.stt.api_key.as_ref().unwrap().expose_secret(), "sk-env");
        });
    }

    #[test]
    fn validate_rejects_zero_pipe_capacity() {
        let config = Config::parse("[stt]\npipe_capacity = 0").unwrap();
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("pipe_capacity"));
    }

    #[test]
    fn validate_rejects_zero_timeout() {
        let config = Config::parse("[stt]\ntimeout = \"0s\"").unwrap();
        assert!(config.validate().is_err());
    }

    #[test]
    fn validate_rejects_non_http_base_url() {
        let config = Config::parse("[stt]\nbase_url = \"ftp://example.com\"").unwrap();
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("http or https"));
    }

    #[test]
    fn validate_rejects_relative_health_path() {
        let config = Config::parse("[server.health]\npath = \"health\"").unwrap();
        assert!(config.validate().is_err());
    }
}
