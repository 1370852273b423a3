//! Wires the client components once so callers pass one object around
//! instead of reaching for globals.

use crate::{
    api::ApiClient,
    config::AppConfig,
    errors::ApiError,
    guard::{GuardConfig, MemoryNavigator, Navigator, RouteGuard},
    notify::{LogRenderer, NotificationCenter, NotificationConfig, ToastRenderer},
    session::{MemoryStorage, SessionStore, Storage},
    validate::{FieldValidator, FormHost, ValidatorConfig},
};
use std::sync::Arc;
use tracing::debug;

/// Host capabilities the components run on.
pub struct Environment {
    pub storage: Arc<dyn Storage>,
    pub renderer: Arc<dyn ToastRenderer>,
    pub navigator: Arc<dyn Navigator>,
}

impl Environment {
    /// Memory storage, toasts to the log, navigation starting at `path`.
    #[must_use]
    pub fn in_memory(path: &str) -> Self {
        Self {
            storage: Arc::new(MemoryStorage::new()),
            renderer: Arc::new(LogRenderer),
            navigator: Arc::new(MemoryNavigator::at(path)),
        }
    }
}

pub struct AppContext {
    pub config: AppConfig,
    pub session: SessionStore,
    pub notifications: NotificationCenter,
    pub client: ApiClient,
    pub guard: RouteGuard<ApiClient>,
}

impl AppContext {
    /// # Errors
    /// Returns an error if the HTTP client cannot be built.
    pub fn new(
        config: AppConfig,
        environment: Environment,
        guard_config: GuardConfig,
    ) -> Result<Self, ApiError> {
        let session = SessionStore::new(environment.storage);
        let notifications =
            NotificationCenter::new(NotificationConfig::default(), environment.renderer);

        let client = ApiClient::builder(config.clone(), session.clone())
            .notifications(notifications.clone())
            .build()?;

        let guard = RouteGuard::builder(session.clone(), client.clone(), environment.navigator)
            .config(guard_config)
            .notifications(notifications.clone())
            .build();

        debug!(api = %config.api_base_url, "application context ready");

        Ok(Self {
            config,
            session,
            notifications,
            client,
            guard,
        })
    }

    /// A validator for one form, sharing nothing with other forms.
    #[must_use]
    pub fn field_validator(&self, host: Arc<dyn FormHost>) -> FieldValidator {
        FieldValidator::new(host, ValidatorConfig::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        guard::Protection,
        session::{Storage, ACCESS_TOKEN_KEY},
        validate::Form,
    };

    #[tokio::test]
    async fn components_share_one_session() -> Result<(), ApiError> {
        let environment = Environment::in_memory("/dashboard");
        let storage = Arc::clone(&environment.storage);
        let context = AppContext::new(AppConfig::default(), environment, GuardConfig::default())?;

        storage.set_item(ACCESS_TOKEN_KEY, "not-a-jwt")?;
        assert!(context.session.access_token()?.is_some());
        assert!(!context.client.is_authenticated());

        let decision = context.guard.check_route_access("/dashboard").await;
        assert_eq!(decision.rule.protection, Protection::Authenticated);
        assert_eq!(decision.redirect_to.as_deref(), Some("/login"));
        assert_eq!(storage.get_item(ACCESS_TOKEN_KEY)?, None);
        Ok(())
    }

    #[test]
    fn validators_are_per_form() -> Result<(), ApiError> {
        let context =
            AppContext::new(AppConfig::default(), Environment::in_memory("/"), GuardConfig::default())?;
        let form = Arc::new(Form::new());
        form.add_field("email", Some("login-form"));

        let validator = context.field_validator(form);
        validator.setup_login_form();
        assert!(!validator.validate_form(Some("login-form")));
        Ok(())
    }
}
