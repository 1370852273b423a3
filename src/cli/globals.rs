use crate::{
    cli::terminal::TerminalRenderer,
    config::{AppConfig, RuntimeConfig},
    context::{AppContext, Environment},
    errors::ApiError,
    guard::{GuardConfig, MemoryNavigator},
    session::FileStorage,
};
use std::{path::PathBuf, sync::Arc, time::Duration};

/// Settings shared by every command that talks to the API.
#[derive(Clone, Debug)]
pub struct GlobalArgs {
    pub api_base_url: String,
    pub timeout: Duration,
    pub retry_attempts: u32,
    pub state_file: PathBuf,
    /// Log every request, set from `-vvv` and above.
    pub debug: bool,
}

impl GlobalArgs {
    #[must_use]
    pub fn new(api_base_url: String, state_file: PathBuf) -> Self {
        let defaults = AppConfig::default();
        Self {
            api_base_url,
            timeout: defaults.timeout,
            retry_attempts: defaults.retry_attempts,
            state_file,
            debug: defaults.debug,
        }
    }

    #[must_use]
    pub fn config(&self) -> AppConfig {
        AppConfig::load(RuntimeConfig {
            timeout: Some(self.timeout),
            retry_attempts: Some(self.retry_attempts),
            debug: Some(self.debug),
            ..RuntimeConfig::default().with_api_base_url(&self.api_base_url)
        })
    }

    /// Builds the application context on top of the session file, starting
    /// navigation at `path`. A single command never lives long enough to need
    /// the periodic expiry check.
    ///
    /// # Errors
    /// Returns an error if the HTTP client cannot be built.
    pub fn context(&self, path: &str) -> Result<AppContext, ApiError> {
        let environment = Environment {
            storage: Arc::new(FileStorage::new(&self.state_file)),
            renderer: Arc::new(TerminalRenderer),
            navigator: Arc::new(MemoryNavigator::at(path)),
        };

        AppContext::new(
            self.config(),
            environment,
            GuardConfig {
                enable_periodic_check: false,
                ..GuardConfig::default()
            },
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_global_args() {
        let mut args = GlobalArgs::new(
            "https://api.multibpo.com.br/api/v1/mvp".to_string(),
            PathBuf::from("/tmp/multibpo-session.json"),
        );
        assert_eq!(args.timeout, Duration::from_secs(30));
        assert_eq!(args.retry_attempts, 3);

        assert!(!args.debug);

        args.retry_attempts = 1;
        args.timeout = Duration::from_secs(5);
        args.debug = true;
        let config = args.config();
        assert!(config.debug);
        assert_eq!(config.api_base_url, "https://api.multibpo.com.br/api/v1/mvp");
        assert_eq!(config.retry_attempts, 1);
        assert_eq!(config.timeout, Duration::from_secs(5));
        assert_eq!(
            config.refresh_url(),
            "https://api.multibpo.com.br/api/v1/token/refresh/"
        );
    }

    #[test]
    fn blank_base_url_keeps_default() {
        let args = GlobalArgs::new("  ".to_string(), PathBuf::from("session.json"));
        assert_eq!(args.config().api_base_url, crate::config::DEFAULT_API_BASE_URL);
    }
}
