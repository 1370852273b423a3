//! Client configuration: API endpoint, timeouts and retry tuning, with
//! optional runtime overrides so a deployment can point at another API
//! without rebuilding. Configuration values are public; do not store secrets
//! here.

use std::time::Duration;

pub const DEFAULT_API_BASE_URL: &str = "http://localhost:8082/api/v1/mvp";

#[derive(Clone, Debug)]
pub struct AppConfig {
    pub api_base_url: String,
    /// Deadline enforced by the transport on every call.
    pub timeout: Duration,
    /// Deadline for the token refresh call.
    pub refresh_timeout: Duration,
    pub retry_attempts: u32,
    /// Base of the exponential backoff.
    pub retry_delay: Duration,
    /// Minimum time a loading toast stays on screen.
    pub loading_min_duration: Duration,
    /// Adds the request log stage to the standard pipeline.
    pub debug: bool,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            api_base_url: DEFAULT_API_BASE_URL.to_string(),
            timeout: Duration::from_secs(30),
            refresh_timeout: Duration::from_secs(10),
            retry_attempts: 3,
            retry_delay: Duration::from_millis(1_000),
            loading_min_duration: Duration::from_millis(500),
            debug: false,
        }
    }
}

impl AppConfig {
    /// Defaults plus whatever the runtime provides.
    #[must_use]
    pub fn load(runtime: RuntimeConfig) -> Self {
        let mut config = Self::default();
        apply_runtime_overrides(&mut config, runtime);
        config
    }

    /// The refresh endpoint lives beside the MVP routes:
    /// `.../api/v1/mvp` refreshes at `.../api/v1/token/refresh/`.
    #[must_use]
    pub fn refresh_url(&self) -> String {
        let base = self.api_base_url.trim().trim_end_matches('/');
        let base = base.strip_suffix("/mvp").unwrap_or(base);
        format!("{base}/token/refresh/")
    }

    /// Joins a relative API path onto the configured base.
    #[must_use]
    pub fn url_for(&self, path: &str) -> String {
        build_url_with_base(&self.api_base_url, path)
    }
}

/// Builds a URL from an explicit base URL and the provided path.
#[must_use]
pub fn build_url_with_base(base_url: &str, path: &str) -> String {
    let base = base_url.trim().trim_end_matches('/');
    let path = path.trim();

    if path.starts_with("http://") || path.starts_with("https://") || base.is_empty() {
        path.to_string()
    } else {
        format!("{}/{}", base, path.trim_start_matches('/'))
    }
}

/// Values supplied at runtime (CLI flags, environment). Blank strings are
/// treated as absent.
#[derive(Debug, Default)]
pub struct RuntimeConfig {
    pub api_base_url: Option<String>,
    pub timeout: Option<Duration>,
    pub retry_attempts: Option<u32>,
    pub retry_delay: Option<Duration>,
    pub debug: Option<bool>,
}

impl RuntimeConfig {
    #[must_use]
    pub fn with_api_base_url(mut self, value: &str) -> Self {
        self.api_base_url = normalize_runtime_value(value);
        self
    }
}

pub fn apply_runtime_overrides(config: &mut AppConfig, runtime: RuntimeConfig) {
    if let Some(value) = runtime.api_base_url {
        config.api_base_url = value;
    }
    if let Some(value) = runtime.timeout {
        config.timeout = value;
    }
    if let Some(value) = runtime.retry_attempts {
        config.retry_attempts = value;
    }
    if let Some(value) = runtime.retry_delay {
        config.retry_delay = value;
    }
    if let Some(value) = runtime.debug {
        config.debug = value;
    }
}

#[must_use]
pub fn normalize_runtime_value(value: &str) -> Option<String> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        None
    } else {
        Some(trimmed.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn normalize_runtime_value_trims_and_rejects_empty() {
        assert_eq!(normalize_runtime_value(""), None);
        assert_eq!(normalize_runtime_value("   "), None);
        assert_eq!(
            normalize_runtime_value("  https://api.multibpo.com.br "),
            Some("https://api.multibpo.com.br".to_string())
        );
    }

    #[test]
    fn apply_runtime_overrides_ignores_empty_values() {
        let config = AppConfig::load(RuntimeConfig::default().with_api_base_url("  "));
        assert_eq!(config.api_base_url, DEFAULT_API_BASE_URL);
        assert_eq!(config.retry_attempts, 3);
        assert_eq!(config.timeout, Duration::from_secs(30));
    }

    #[test]
    fn apply_runtime_overrides_overwrites_when_present() {
        let runtime = RuntimeConfig {
            timeout: Some(Duration::from_secs(5)),
            retry_attempts: Some(1),
            retry_delay: Some(Duration::from_millis(10)),
            debug: Some(true),
            ..RuntimeConfig::default()
        }
        .with_api_base_url("https://api.override/api/v1/mvp");

        let config = AppConfig::load(runtime);

        assert_eq!(config.api_base_url, "https://api.override/api/v1/mvp");
        assert_eq!(config.timeout, Duration::from_secs(5));
        assert_eq!(config.retry_attempts, 1);
        assert_eq!(config.retry_delay, Duration::from_millis(10));
        assert!(config.debug);
    }

    #[test]
    fn refresh_url_drops_mvp_segment() {
        let mut config = AppConfig::default();
        assert_eq!(
            config.refresh_url(),
            "http://localhost:8082/api/v1/token/refresh/"
        );

        config.api_base_url = "http://127.0.0.1:9000/".to_string();
        assert_eq!(config.refresh_url(), "http://127.0.0.1:9000/token/refresh/");
    }

    #[test]
    fn build_url_joins_segments() {
        assert_eq!(
            build_url_with_base("http://host/api/v1/mvp/", "/login/"),
            "http://host/api/v1/mvp/login/"
        );
        assert_eq!(build_url_with_base("", "profile/"), "profile/");
        assert_eq!(
            build_url_with_base("http://host", "https://other/x"),
            "https://other/x"
        );
    }
}
