//! Route guard: decides whether a path may be shown for the current session.
//!
//! The guard reads the tokens from the [`SessionStore`], refreshes them
//! through a [`SessionBackend`] when they expire, polls expiry in the
//! background and treats the removal of the access token by another tab as a
//! logout. Navigation happens through a [`Navigator`].

mod rules;

pub use self::rules::{Protection, RouteRule, RouteTable};

use crate::{
    errors::{self, ApiError},
    notify::{NotificationCenter, ShowOptions},
    session::{token, SessionStore, User, ACCESS_TOKEN_KEY},
};
use chrono::{DateTime, Utc};
use secrecy::ExposeSecret;
use std::{
    future::Future,
    sync::{Arc, Mutex, MutexGuard, PoisonError, Weak},
    time::Duration,
};
use tokio::{
    runtime::Handle,
    sync::broadcast::error::RecvError,
    task::JoinHandle,
    time::{interval, sleep, MissedTickBehavior},
};
use tracing::{debug, error, info, instrument, warn};

const SESSION_EXPIRED_MESSAGE: &str = "Sua sessão expirou. Faça login novamente.";
const REMOTE_LOGOUT_MESSAGE: &str = "Você foi deslogado em outra aba.";
const DENIED_TOAST_DURATION: Duration = Duration::from_millis(4_000);
const EXPIRED_TOAST_DURATION: Duration = Duration::from_millis(6_000);
const REMOTE_LOGOUT_TOAST_DURATION: Duration = Duration::from_millis(3_000);
const REMOTE_LOGOUT_REDIRECT_DELAY: Duration = Duration::from_millis(2_000);
const LOGOUT_TOAST_DURATION: Duration = Duration::from_millis(3_000);
const LOGOUT_REDIRECT_DELAY: Duration = Duration::from_millis(1_000);
const EXPIRED_REDIRECT_DELAY: Duration = Duration::from_millis(2_000);

/// Token operations the guard needs from the API.
pub trait SessionBackend: Send + Sync + 'static {
    /// Exchanges the stored refresh token for a new access token and stores
    /// it.
    fn refresh(&self) -> impl Future<Output = Result<(), ApiError>> + Send;

    /// Invalidates a refresh token on the server.
    fn revoke(&self, refresh_token: &str) -> impl Future<Output = Result<(), ApiError>> + Send;
}

/// The browser location bar.
pub trait Navigator: Send + Sync {
    fn current_path(&self) -> String;

    fn navigate(&self, to: &str);
}

/// Keeps the current path and every navigation in memory.
#[derive(Debug, Default)]
pub struct MemoryNavigator {
    path: Mutex<String>,
    history: Mutex<Vec<String>>,
}

impl MemoryNavigator {
    #[must_use]
    pub fn at(path: &str) -> Self {
        Self {
            path: Mutex::new(path.to_string()),
            history: Mutex::new(Vec::new()),
        }
    }

    #[must_use]
    pub fn history(&self) -> Vec<String> {
        self.history
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}

impl Navigator for MemoryNavigator {
    fn current_path(&self) -> String {
        self.path
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    fn navigate(&self, to: &str) {
        *self.path.lock().unwrap_or_else(PoisonError::into_inner) = to.to_string();
        self.history
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(to.to_string());
    }
}

#[derive(Clone, Debug)]
pub struct GuardConfig {
    /// Consecutive failed refreshes before the session is dropped.
    pub token_refresh_attempts: u32,
    /// Tokens expiring sooner than this are refreshed in the background.
    pub refresh_threshold: Duration,
    pub check_interval: Duration,
    pub enable_periodic_check: bool,
    pub show_notifications: bool,
    pub redirect_delay: Duration,
}

impl Default for GuardConfig {
    fn default() -> Self {
        Self {
            token_refresh_attempts: 3,
            refresh_threshold: Duration::from_secs(300),
            check_interval: Duration::from_secs(60),
            enable_periodic_check: true,
            show_notifications: true,
            redirect_delay: Duration::from_millis(1_500),
        }
    }
}

#[derive(Clone, Debug, PartialEq)]
pub enum AuthState {
    Unauthenticated,
    /// Tokens are valid. The cached user may be missing.
    Authenticated(Option<User>),
    /// A refresh is in flight; resolves to one of the other two.
    TokenRefreshing,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct AccessDecision {
    pub has_access: bool,
    pub should_redirect: bool,
    pub redirect_to: Option<String>,
    pub message: Option<String>,
    pub rule: RouteRule,
}

impl AccessDecision {
    #[must_use]
    pub fn evaluate(rule: &RouteRule, authenticated: bool) -> Self {
        let allowed = match rule.protection {
            Protection::Public => true,
            Protection::Authenticated => authenticated,
            Protection::Unauthenticated => !authenticated,
        };

        Self {
            has_access: allowed,
            should_redirect: !allowed,
            redirect_to: (!allowed).then(|| rule.redirect_target().to_string()),
            message: (!allowed).then(|| rule.denial_message().to_string()),
            rule: rule.clone(),
        }
    }
}

#[derive(Clone, Debug, Default)]
pub struct EnforceOptions {
    /// Only report the decision; do not navigate.
    pub prevent_redirect: bool,
    pub redirect_delay: Option<Duration>,
}

#[derive(Clone, Debug, Default)]
pub struct LogoutOptions {
    pub message: Option<String>,
    pub redirect_to: Option<String>,
    pub redirect_delay: Option<Duration>,
}

#[derive(Clone, Debug)]
pub struct GuardStats {
    pub is_authenticated: bool,
    pub current_user: Option<User>,
    pub last_token_check: Option<DateTime<Utc>>,
    pub refresh_attempts: u32,
    pub periodic_check_enabled: bool,
    pub current_route: String,
    pub rule: RouteRule,
}

struct GuardState {
    auth: AuthState,
    refresh_attempts: u32,
    last_token_check: Option<DateTime<Utc>>,
    periodic: Option<JoinHandle<()>>,
    storage_watch: Option<JoinHandle<()>>,
    pending_redirect: Option<JoinHandle<()>>,
}

struct Inner<B> {
    config: GuardConfig,
    routes: RouteTable,
    session: SessionStore,
    backend: B,
    navigator: Arc<dyn Navigator>,
    notifications: Option<NotificationCenter>,
    state: Mutex<GuardState>,
}

impl<B> Drop for Inner<B> {
    fn drop(&mut self) {
        let state = self.state.get_mut().unwrap_or_else(PoisonError::into_inner);
        for task in [
            state.periodic.take(),
            state.storage_watch.take(),
            state.pending_redirect.take(),
        ]
        .into_iter()
        .flatten()
        {
            task.abort();
        }
    }
}

pub struct RouteGuard<B> {
    inner: Arc<Inner<B>>,
}

impl<B> Clone for RouteGuard<B> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

pub struct RouteGuardBuilder<B> {
    config: GuardConfig,
    routes: RouteTable,
    session: SessionStore,
    backend: B,
    navigator: Arc<dyn Navigator>,
    notifications: Option<NotificationCenter>,
}

impl<B: SessionBackend> RouteGuardBuilder<B> {
    #[must_use]
    pub fn config(mut self, config: GuardConfig) -> Self {
        self.config = config;
        self
    }

    #[must_use]
    pub fn routes(mut self, routes: RouteTable) -> Self {
        self.routes = routes;
        self
    }

    #[must_use]
    pub fn notifications(mut self, center: NotificationCenter) -> Self {
        self.notifications = Some(center);
        self
    }

    /// Builds the guard without starting any background task; see
    /// [`RouteGuard::init`].
    #[must_use]
    pub fn build(self) -> RouteGuard<B> {
        RouteGuard {
            inner: Arc::new(Inner {
                config: self.config,
                routes: self.routes,
                session: self.session,
                backend: self.backend,
                navigator: self.navigator,
                notifications: self.notifications,
                state: Mutex::new(GuardState {
                    auth: AuthState::Unauthenticated,
                    refresh_attempts: 0,
                    last_token_check: None,
                    periodic: None,
                    storage_watch: None,
                    pending_redirect: None,
                }),
            }),
        }
    }
}

impl<B: SessionBackend> RouteGuard<B> {
    #[must_use]
    pub fn builder(
        session: SessionStore,
        backend: B,
        navigator: Arc<dyn Navigator>,
    ) -> RouteGuardBuilder<B> {
        RouteGuardBuilder {
            config: GuardConfig::default(),
            routes: RouteTable::multibpo(),
            session,
            backend,
            navigator,
            notifications: None,
        }
    }

    fn state(&self) -> MutexGuard<'_, GuardState> {
        self.inner
            .state
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }

    fn weak(&self) -> Weak<Inner<B>> {
        Arc::downgrade(&self.inner)
    }

    fn upgrade(weak: &Weak<Inner<B>>) -> Option<Self> {
        weak.upgrade().map(|inner| Self { inner })
    }

    #[must_use]
    pub fn config(&self) -> &GuardConfig {
        &self.inner.config
    }

    #[must_use]
    pub fn routes(&self) -> &RouteTable {
        &self.inner.routes
    }

    #[must_use]
    pub fn auth_state(&self) -> AuthState {
        self.state().auth.clone()
    }

    /// Initial check plus the background watchers.
    pub async fn init(&self) -> bool {
        let authenticated = self.check_auth_state().await;
        if self.inner.config.enable_periodic_check {
            self.start_periodic_check();
        }
        self.watch_storage();
        info!(authenticated, "route guard initialized");
        authenticated
    }

    /// Resolves the session: absent tokens mean logged out, an expired
    /// token is refreshed, a token close to expiry is refreshed in the
    /// background.
    #[instrument(skip(self))]
    pub async fn check_auth_state(&self) -> bool {
        let tokens = self
            .inner
            .session
            .access_token()
            .and_then(|access| Ok((access, self.inner.session.refresh_token()?)));

        let access = match tokens {
            Ok((Some(access), Some(_))) => access,
            Ok(_) => {
                self.set_unauthenticated();
                return false;
            }
            Err(err) => {
                error!("failed to read session: {err}");
                self.set_unauthenticated();
                return false;
            }
        };

        let remaining = match token::seconds_until_expiry(access.expose_secret(), token::now_unix()) {
            Ok(remaining) => remaining,
            Err(err) => {
                warn!("unusable access token: {err}");
                self.set_unauthenticated();
                return false;
            }
        };

        if remaining <= 0 {
            debug!("access token expired, refreshing");
            return self.attempt_refresh().await;
        }

        let threshold = i64::try_from(self.inner.config.refresh_threshold.as_secs()).unwrap_or(i64::MAX);
        if remaining <= threshold {
            debug!(remaining, "access token close to expiry, refreshing in background");
            self.spawn_refresh();
        }

        self.set_authenticated();
        true
    }

    fn set_authenticated(&self) {
        let user = self.inner.session.user().unwrap_or_else(|err| {
            warn!("failed to read cached user: {err}");
            None
        });
        let mut state = self.state();
        state.auth = AuthState::Authenticated(user);
        state.last_token_check = Some(Utc::now());
    }

    fn set_unauthenticated(&self) {
        {
            let mut state = self.state();
            state.auth = AuthState::Unauthenticated;
            state.refresh_attempts = 0;
        }
        if let Err(err) = self.inner.session.clear() {
            warn!("failed to clear session: {err}");
        }
    }

    fn spawn_refresh(&self) {
        let Ok(handle) = Handle::try_current() else {
            return;
        };
        let weak = self.weak();
        handle.spawn(async move {
            if let Some(guard) = Self::upgrade(&weak) {
                guard.attempt_refresh().await;
            }
        });
    }

    /// One refresh attempt, counted against `token_refresh_attempts`.
    async fn attempt_refresh(&self) -> bool {
        let max = self.inner.config.token_refresh_attempts;
        {
            let mut state = self.state();
            if state.refresh_attempts >= max {
                drop(state);
                warn!("refresh attempts exhausted");
                self.set_unauthenticated();
                return false;
            }
            state.refresh_attempts += 1;
            state.auth = AuthState::TokenRefreshing;
        }

        match self.inner.backend.refresh().await {
            Ok(()) => {
                self.state().refresh_attempts = 0;
                self.set_authenticated();
                info!("token refreshed");
                true
            }
            Err(err) => {
                let exhausted = {
                    let mut state = self.state();
                    state.auth = AuthState::Unauthenticated;
                    warn!(attempt = state.refresh_attempts, max, "token refresh failed: {err}");
                    state.refresh_attempts >= max
                };

                if exhausted {
                    self.set_unauthenticated();
                    if let Some(center) = self.notifier() {
                        center.warning(
                            SESSION_EXPIRED_MESSAGE,
                            ShowOptions::duration(EXPIRED_TOAST_DURATION),
                        );
                    }
                }
                false
            }
        }
    }

    fn notifier(&self) -> Option<&NotificationCenter> {
        self.inner
            .notifications
            .as_ref()
            .filter(|_| self.inner.config.show_notifications)
    }

    /// Checks the session, then matches the path against the route table.
    pub async fn check_route_access(&self, path: &str) -> AccessDecision {
        let authenticated = self.check_auth_state().await;
        let decision = AccessDecision::evaluate(self.inner.routes.lookup(path), authenticated);
        info!(
            path,
            authenticated,
            has_access = decision.has_access,
            redirect_to = ?decision.redirect_to,
            "route checked"
        );
        decision
    }

    /// Applies [`RouteGuard::check_route_access`] to the current location:
    /// warns and redirects after a delay when access is denied.
    pub async fn enforce_current_route(&self, options: EnforceOptions) -> bool {
        let path = self.inner.navigator.current_path();
        let decision = self.check_route_access(&path).await;
        if decision.has_access {
            return true;
        }

        if let (Some(center), Some(message)) = (self.notifier(), decision.message.as_deref()) {
            center.warning(message, ShowOptions::duration(DENIED_TOAST_DURATION));
        }

        if let (false, Some(target)) = (options.prevent_redirect, decision.redirect_to) {
            let delay = options
                .redirect_delay
                .unwrap_or(self.inner.config.redirect_delay);
            self.schedule_redirect(target, delay);
        }
        false
    }

    /// Navigates after `delay`, replacing any redirect already pending.
    /// Without a runtime the navigation happens immediately.
    fn schedule_redirect(&self, target: String, delay: Duration) {
        let Ok(handle) = Handle::try_current() else {
            self.inner.navigator.navigate(&target);
            return;
        };

        let weak = self.weak();
        let task = handle.spawn(async move {
            sleep(delay).await;
            if let Some(guard) = Self::upgrade(&weak) {
                debug!(%target, "redirecting");
                guard.inner.navigator.navigate(&target);
            }
        });

        if let Some(previous) = self.state().pending_redirect.replace(task) {
            previous.abort();
        }
    }

    /// Re-checks the session every `check_interval`. Restarts the poller if
    /// it was already running.
    pub fn start_periodic_check(&self) {
        let Ok(handle) = Handle::try_current() else {
            warn!("no runtime, periodic token check disabled");
            return;
        };

        let period = self.inner.config.check_interval;
        let weak = self.weak();
        let task = handle.spawn(async move {
            let mut ticker = interval(period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            // The first tick completes immediately.
            ticker.tick().await;
            loop {
                ticker.tick().await;
                let Some(guard) = Self::upgrade(&weak) else {
                    break;
                };
                guard.check_auth_state().await;
            }
        });

        if let Some(previous) = self.state().periodic.replace(task) {
            previous.abort();
        }
    }

    pub fn stop_periodic_check(&self) {
        if let Some(task) = self.state().periodic.take() {
            task.abort();
        }
    }

    #[must_use]
    pub fn periodic_check_running(&self) -> bool {
        self.state()
            .periodic
            .as_ref()
            .is_some_and(|task| !task.is_finished())
    }

    /// Listens for the access token being removed by another tab.
    pub fn watch_storage(&self) {
        let Ok(handle) = Handle::try_current() else {
            warn!("no runtime, cross-tab logout detection disabled");
            return;
        };

        let storage = self.inner.session.storage();
        let own_origin = storage.origin();
        let mut events = storage.subscribe();
        let weak = self.weak();

        let task = handle.spawn(async move {
            loop {
                let event = match events.recv().await {
                    Ok(event) => event,
                    Err(RecvError::Lagged(skipped)) => {
                        warn!(skipped, "storage events dropped");
                        continue;
                    }
                    Err(RecvError::Closed) => break,
                };

                if event.origin == own_origin
                    || event.key != ACCESS_TOKEN_KEY
                    || event.new_value.is_some()
                {
                    continue;
                }

                let Some(guard) = Self::upgrade(&weak) else {
                    break;
                };
                guard.on_remote_logout();
            }
        });

        if let Some(previous) = self.state().storage_watch.replace(task) {
            previous.abort();
        }
    }

    fn on_remote_logout(&self) {
        info!("logout detected in another tab");
        self.set_unauthenticated();

        let path = self.inner.navigator.current_path();
        if self.inner.routes.lookup(&path).protection == Protection::Authenticated {
            if let Some(center) = self.notifier() {
                center.warning(
                    REMOTE_LOGOUT_MESSAGE,
                    ShowOptions::duration(REMOTE_LOGOUT_TOAST_DURATION),
                );
            }
            self.schedule_redirect("/login".to_string(), REMOTE_LOGOUT_REDIRECT_DELAY);
        }
    }

    /// Whether the stored access token is present and unexpired. Does not
    /// refresh.
    #[must_use]
    pub fn is_authenticated(&self) -> bool {
        matches!(
            self.inner.session.access_token(),
            Ok(Some(access)) if !token::is_expired(access.expose_secret(), token::now_unix())
        )
    }

    /// User of the last successful check.
    #[must_use]
    pub fn current_user(&self) -> Option<User> {
        match &self.state().auth {
            AuthState::Authenticated(user) => user.clone(),
            AuthState::Unauthenticated | AuthState::TokenRefreshing => None,
        }
    }

    /// Revokes the refresh token on the server (best effort), drops the local
    /// session and optionally redirects.
    pub async fn force_logout(&self, options: LogoutOptions) {
        match self.inner.session.refresh_token() {
            Ok(Some(refresh)) => {
                if let Err(err) = self.inner.backend.revoke(refresh.expose_secret()).await {
                    warn!("server logout failed: {err}");
                }
            }
            Ok(None) => {}
            Err(err) => warn!("failed to read refresh token: {err}"),
        }

        self.set_unauthenticated();

        if let (Some(center), Some(message)) = (self.notifier(), options.message.as_deref()) {
            center.info(message, ShowOptions::duration(LOGOUT_TOAST_DURATION));
        }
        if let Some(target) = options.redirect_to {
            self.schedule_redirect(target, options.redirect_delay.unwrap_or(LOGOUT_REDIRECT_DELAY));
        }
    }

    /// Reacts to an API failure. Authentication failures drop the session
    /// and send the user to the login page; returns the redirect target.
    pub fn handle_api_error(&self, error: &ApiError) -> Option<String> {
        let path = self.inner.navigator.current_path();
        let processed = errors::classify(error, "route_guard");
        let target = processed.redirect_url(&path)?.to_string();

        self.set_unauthenticated();
        self.schedule_redirect(target.clone(), EXPIRED_REDIRECT_DELAY);
        Some(target)
    }

    #[must_use]
    pub fn stats(&self) -> GuardStats {
        let current_route = self.inner.navigator.current_path();
        let rule = self.inner.routes.lookup(&current_route).clone();
        let is_authenticated = self.is_authenticated();
        let state = self.state();

        GuardStats {
            is_authenticated,
            current_user: match &state.auth {
                AuthState::Authenticated(user) => user.clone(),
                _ => None,
            },
            last_token_check: state.last_token_check,
            refresh_attempts: state.refresh_attempts,
            periodic_check_enabled: self.inner.config.enable_periodic_check,
            current_route,
            rule,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        notify::{LogRenderer, NotificationConfig, NotificationKind},
        session::{
            token::tests::unsigned_token, MemoryStorage, Storage, REFRESH_TOKEN_KEY, USER_KEY,
        },
    };
    use serde_json::json;
    use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

    #[derive(Clone)]
    struct FakeBackend {
        storage: MemoryStorage,
        succeed: Arc<AtomicBool>,
        refreshes: Arc<AtomicUsize>,
        revoked: Arc<Mutex<Vec<String>>>,
    }

    impl FakeBackend {
        fn new(storage: &MemoryStorage, succeed: bool) -> Self {
            Self {
                storage: storage.clone(),
                succeed: Arc::new(AtomicBool::new(succeed)),
                refreshes: Arc::new(AtomicUsize::new(0)),
                revoked: Arc::new(Mutex::new(Vec::new())),
            }
        }
    }

    impl SessionBackend for FakeBackend {
        async fn refresh(&self) -> Result<(), ApiError> {
            self.refreshes.fetch_add(1, Ordering::SeqCst);
            if self.succeed.load(Ordering::SeqCst) {
                self.storage.set_item(ACCESS_TOKEN_KEY, &token_expiring_in(3_600))?;
                Ok(())
            } else {
                Err(ApiError::from_response(401, r#"{"detail":"Token is invalid"}"#))
            }
        }

        async fn revoke(&self, refresh_token: &str) -> Result<(), ApiError> {
            self.revoked
                .lock()
                .unwrap_or_else(PoisonError::into_inner)
                .push(refresh_token.to_string());
            Ok(())
        }
    }

    fn token_expiring_in(seconds: i64) -> String {
        unsigned_token(&json!({"exp": token::now_unix() + seconds, "user_id": 1}))
    }

    fn login(storage: &MemoryStorage, expires_in: i64) -> Result<(), ApiError> {
        storage.set_item(ACCESS_TOKEN_KEY, &token_expiring_in(expires_in))?;
        storage.set_item(REFRESH_TOKEN_KEY, "refresh-1")?;
        storage.set_item(
            USER_KEY,
            &json!({"email": "ana@multibpo.com.br", "nome_completo": "Ana Souza"}).to_string(),
        )?;
        Ok(())
    }

    struct Harness {
        storage: MemoryStorage,
        backend: FakeBackend,
        navigator: Arc<MemoryNavigator>,
        center: NotificationCenter,
        guard: RouteGuard<FakeBackend>,
    }

    fn harness(path: &str, refresh_succeeds: bool) -> Harness {
        let storage = MemoryStorage::new();
        let backend = FakeBackend::new(&storage, refresh_succeeds);
        let navigator = Arc::new(MemoryNavigator::at(path));
        let center = NotificationCenter::new(NotificationConfig::default(), Arc::new(LogRenderer));
        let guard = RouteGuard::builder(
            SessionStore::new(Arc::new(storage.clone())),
            backend.clone(),
            navigator.clone(),
        )
        .notifications(center.clone())
        .build();

        Harness {
            storage,
            backend,
            navigator,
            center,
            guard,
        }
    }

    fn warnings(center: &NotificationCenter) -> Vec<String> {
        center
            .notifications()
            .into_iter()
            .filter(|n| n.kind == NotificationKind::Warning)
            .map(|n| n.message)
            .collect()
    }

    #[tokio::test]
    async fn dashboard_without_tokens_redirects_to_login() {
        let h = harness("/dashboard", true);
        let decision = h.guard.check_route_access("/dashboard").await;

        assert!(!decision.has_access);
        assert!(decision.should_redirect);
        assert_eq!(decision.redirect_to.as_deref(), Some("/login"));
        assert_eq!(h.guard.auth_state(), AuthState::Unauthenticated);
    }

    #[tokio::test]
    async fn login_page_with_valid_token_redirects_to_dashboard() -> Result<(), ApiError> {
        let h = harness("/login", true);
        login(&h.storage, 3_600)?;

        let decision = h.guard.check_route_access("/login").await;
        assert!(decision.should_redirect);
        assert_eq!(decision.redirect_to.as_deref(), Some("/dashboard"));
        assert_eq!(
            h.guard.current_user().map(|user| user.email),
            Some("ana@multibpo.com.br".to_string())
        );
        assert_eq!(h.backend.refreshes.load(Ordering::SeqCst), 0);
        Ok(())
    }

    #[tokio::test]
    async fn public_routes_always_pass() {
        let h = harness("/", true);
        for path in ["/", "/sobre", "/contato", "/precos"] {
            assert!(h.guard.check_route_access(path).await.has_access, "{path}");
        }
    }

    #[tokio::test]
    async fn expired_token_is_refreshed() -> Result<(), ApiError> {
        let h = harness("/dashboard", true);
        login(&h.storage, -10)?;

        assert!(h.guard.check_auth_state().await);
        assert_eq!(h.backend.refreshes.load(Ordering::SeqCst), 1);
        assert!(h.guard.is_authenticated());
        assert_eq!(h.guard.stats().refresh_attempts, 0);
        Ok(())
    }

    #[tokio::test]
    async fn refresh_attempts_are_bounded() -> Result<(), ApiError> {
        let h = harness("/dashboard", false);
        login(&h.storage, -10)?;

        assert!(!h.guard.check_auth_state().await);
        assert!(!h.guard.check_auth_state().await);
        assert_eq!(h.storage.get_item(REFRESH_TOKEN_KEY)?, Some("refresh-1".to_string()));
        assert!(warnings(&h.center).is_empty());

        assert!(!h.guard.check_auth_state().await);
        assert_eq!(h.backend.refreshes.load(Ordering::SeqCst), 3);
        assert_eq!(h.storage.get_item(ACCESS_TOKEN_KEY)?, None);
        assert_eq!(h.storage.get_item(REFRESH_TOKEN_KEY)?, None);
        assert_eq!(warnings(&h.center), vec![SESSION_EXPIRED_MESSAGE.to_string()]);
        assert_eq!(h.guard.auth_state(), AuthState::Unauthenticated);
        Ok(())
    }

    #[tokio::test]
    async fn token_close_to_expiry_is_refreshed_in_background() -> Result<(), ApiError> {
        let h = harness("/dashboard", true);
        login(&h.storage, 60)?;

        assert!(h.guard.check_auth_state().await);
        for _ in 0..10 {
            if h.backend.refreshes.load(Ordering::SeqCst) > 0 {
                break;
            }
            tokio::task::yield_now().await;
        }
        assert_eq!(h.backend.refreshes.load(Ordering::SeqCst), 1);
        Ok(())
    }

    #[tokio::test(start_paused = true)]
    async fn enforce_warns_then_redirects_after_delay() {
        let h = harness("/perfil", true);

        assert!(!h.guard.enforce_current_route(EnforceOptions::default()).await);
        assert_eq!(
            warnings(&h.center),
            vec!["Acesso restrito a usuários autenticados.".to_string()]
        );

        sleep(Duration::from_millis(1_400)).await;
        assert!(h.navigator.history().is_empty());

        sleep(Duration::from_millis(200)).await;
        assert_eq!(h.navigator.history(), vec!["/login".to_string()]);
    }

    #[tokio::test(start_paused = true)]
    async fn enforce_can_skip_redirect() {
        let h = harness("/dashboard", true);
        let options = EnforceOptions {
            prevent_redirect: true,
            redirect_delay: None,
        };

        assert!(!h.guard.enforce_current_route(options).await);
        sleep(Duration::from_secs(5)).await;
        assert!(h.navigator.history().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn logout_in_other_tab_redirects_protected_pages() -> Result<(), ApiError> {
        let h = harness("/dashboard", true);
        login(&h.storage, 3_600)?;
        assert!(h.guard.init().await);

        let other_tab = SessionStore::new(Arc::new(h.storage.open_tab()));
        other_tab.clear()?;

        sleep(Duration::from_millis(100)).await;
        assert_eq!(h.guard.auth_state(), AuthState::Unauthenticated);
        assert_eq!(warnings(&h.center), vec![REMOTE_LOGOUT_MESSAGE.to_string()]);

        sleep(Duration::from_millis(2_000)).await;
        assert_eq!(h.navigator.history(), vec!["/login".to_string()]);
        Ok(())
    }

    #[tokio::test(start_paused = true)]
    async fn own_logout_is_not_a_remote_logout() -> Result<(), ApiError> {
        let h = harness("/dashboard", true);
        login(&h.storage, 3_600)?;
        h.guard.watch_storage();

        SessionStore::new(Arc::new(h.storage.clone())).clear()?;
        sleep(Duration::from_secs(3)).await;

        assert!(warnings(&h.center).is_empty());
        assert!(h.navigator.history().is_empty());
        Ok(())
    }

    #[tokio::test(start_paused = true)]
    async fn periodic_check_can_be_stopped() {
        let h = harness("/", true);
        h.guard.start_periodic_check();
        assert!(h.guard.periodic_check_running());

        h.guard.stop_periodic_check();
        assert!(!h.guard.periodic_check_running());
    }

    #[tokio::test(start_paused = true)]
    async fn periodic_check_notices_expiry() -> Result<(), ApiError> {
        let h = harness("/dashboard", true);
        login(&h.storage, 3_600)?;
        h.guard.start_periodic_check();

        h.storage.set_item(ACCESS_TOKEN_KEY, &token_expiring_in(-1))?;
        sleep(Duration::from_secs(61)).await;

        assert_eq!(h.backend.refreshes.load(Ordering::SeqCst), 1);
        Ok(())
    }

    #[tokio::test(start_paused = true)]
    async fn force_logout_revokes_and_redirects() -> Result<(), ApiError> {
        let h = harness("/dashboard", true);
        login(&h.storage, 3_600)?;

        h.guard
            .force_logout(LogoutOptions {
                message: Some("Até logo!".to_string()),
                redirect_to: Some("/".to_string()),
                redirect_delay: None,
            })
            .await;

        assert_eq!(
            *h.backend
                .revoked
                .lock()
                .unwrap_or_else(PoisonError::into_inner),
            vec!["refresh-1".to_string()]
        );
        assert_eq!(h.storage.get_item(ACCESS_TOKEN_KEY)?, None);
        assert!(h
            .center
            .notifications()
            .iter()
            .any(|n| n.kind == NotificationKind::Info && n.message == "Até logo!"));

        sleep(Duration::from_millis(1_100)).await;
        assert_eq!(h.navigator.history(), vec!["/".to_string()]);
        Ok(())
    }

    #[tokio::test(start_paused = true)]
    async fn auth_errors_send_user_to_login() {
        let h = harness("/dashboard", true);

        assert_eq!(
            h.guard.handle_api_error(&ApiError::AuthExpired).as_deref(),
            Some("/login?expired=true")
        );
        assert_eq!(
            h.guard
                .handle_api_error(&ApiError::from_response(500, "boom")),
            None
        );

        sleep(Duration::from_millis(2_100)).await;
        assert_eq!(h.navigator.history(), vec!["/login?expired=true".to_string()]);
    }
}
