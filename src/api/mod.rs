//! Authenticated client for the MultiBPO MVP API.
//!
//! Every call goes through the middleware [`Pipeline`], is retried with
//! exponential backoff on transient failures and, on a 401, refreshes the
//! access token once and resubmits. Loading, success and error toasts are
//! raised on the attached [`NotificationCenter`], if any.

pub mod middleware;
pub mod retry;
pub mod types;

pub use self::{
    middleware::{BearerAuth, CorrelationId, Middleware, Pipeline, RequestLog, REQUEST_ID_HEADER},
    retry::RetryPolicy,
    types::{
        ApiRequest, AuthResponse, AuthTokens, ClientStats, LoginRequest, MessageResponse,
        ProfileResponse, RefreshRequest, RefreshResponse, RegisterRequest, RequestOptions,
    },
};

use crate::{
    config::AppConfig,
    errors::{self, ApiError},
    guard::SessionBackend,
    notify::{NotificationCenter, NotificationId, ShowOptions},
    session::{token, SessionStore, User},
};
use chrono::{DateTime, SecondsFormat, Utc};
use reqwest::{header::ACCEPT, Client, Method};
use secrecy::{ExposeSecret, SecretString};
use serde::{de::DeserializeOwned, Serialize};
use serde_json::Value;
use std::{
    collections::BTreeMap,
    sync::{Arc, Mutex, MutexGuard, PoisonError},
    time::Duration,
};
use tokio::{runtime::Handle, time::sleep};
use tracing::{debug, error, info, instrument, warn};

const SUCCESS_TOAST_DURATION: Duration = Duration::from_millis(3_000);
const EXPIRED_TOAST_DURATION: Duration = Duration::from_millis(4_000);
const DEFAULT_SUCCESS_MESSAGE: &str = "Operação realizada com sucesso!";
const SESSION_EXPIRED_MESSAGE: &str = "Sua sessão expirou. Você será redirecionado para login.";

#[derive(Debug)]
struct ActiveRequest {
    method: Method,
    path: String,
    context: String,
}

#[derive(Default)]
struct ClientState {
    active: BTreeMap<String, ActiveRequest>,
    loading: BTreeMap<String, NotificationId>,
    total: u64,
    success: u64,
    error: u64,
    last_request: Option<DateTime<Utc>>,
}

struct Inner {
    config: AppConfig,
    http: Client,
    session: SessionStore,
    pipeline: Pipeline,
    retry: RetryPolicy,
    notifications: Option<NotificationCenter>,
    state: Mutex<ClientState>,
}

#[derive(Clone)]
pub struct ApiClient {
    inner: Arc<Inner>,
}

pub struct ApiClientBuilder {
    config: AppConfig,
    session: SessionStore,
    notifications: Option<NotificationCenter>,
    pipeline: Option<Pipeline>,
}

impl ApiClientBuilder {
    #[must_use]
    pub fn notifications(mut self, center: NotificationCenter) -> Self {
        self.notifications = Some(center);
        self
    }

    /// Replaces the standard pipeline.
    #[must_use]
    pub fn pipeline(mut self, pipeline: Pipeline) -> Self {
        self.pipeline = Some(pipeline);
        self
    }

    /// # Errors
    /// Returns an error if the HTTP client cannot be built.
    pub fn build(self) -> Result<ApiClient, ApiError> {
        let http = Client::builder()
            .user_agent(crate::APP_USER_AGENT)
            .timeout(self.config.timeout)
            .build()
            .map_err(|err| ApiError::Request(err.to_string()))?;

        let retry = RetryPolicy {
            max_attempts: self.config.retry_attempts,
            base_delay: self.config.retry_delay,
        };

        let pipeline = self
            .pipeline
            .unwrap_or_else(|| Pipeline::standard(self.session.clone(), self.config.debug));

        Ok(ApiClient {
            inner: Arc::new(Inner {
                config: self.config,
                http,
                session: self.session,
                pipeline,
                retry,
                notifications: self.notifications,
                state: Mutex::new(ClientState::default()),
            }),
        })
    }
}

fn transport_error(err: &reqwest::Error) -> ApiError {
    if err.is_timeout() {
        ApiError::Timeout(err.to_string())
    } else if err.is_builder() {
        ApiError::Request(err.to_string())
    } else if err.is_decode() {
        ApiError::Decode(err.to_string())
    } else {
        ApiError::Network(err.to_string())
    }
}

fn decode<T: DeserializeOwned>(body: Value) -> Result<T, ApiError> {
    serde_json::from_value(body).map_err(|err| ApiError::Decode(err.to_string()))
}

fn encode(body: &impl Serialize) -> Result<Value, ApiError> {
    serde_json::to_value(body).map_err(|err| ApiError::Request(err.to_string()))
}

impl ApiClient {
    #[must_use]
    pub fn builder(config: AppConfig, session: SessionStore) -> ApiClientBuilder {
        ApiClientBuilder {
            config,
            session,
            notifications: None,
            pipeline: None,
        }
    }

    #[must_use]
    pub fn config(&self) -> &AppConfig {
        &self.inner.config
    }

    #[must_use]
    pub fn session(&self) -> &SessionStore {
        &self.inner.session
    }

    #[must_use]
    pub fn notifications(&self) -> Option<&NotificationCenter> {
        self.inner.notifications.as_ref()
    }

    fn state(&self) -> MutexGuard<'_, ClientState> {
        self.inner
            .state
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }

    /// Sends one logical call and returns the response body.
    ///
    /// # Errors
    /// Returns the final error once retries and the token refresh are
    /// exhausted. A failed refresh yields [`ApiError::AuthExpired`].
    #[instrument(skip(self, body, options))]
    pub async fn request(
        &self,
        method: Method,
        path: &str,
        body: Option<Value>,
        options: RequestOptions,
    ) -> Result<Value, ApiError> {
        let context = options
            .context
            .clone()
            .unwrap_or_else(|| types::default_context(&method, path));
        let url = self.inner.config.url_for(path);
        let mut request = ApiRequest::new(method, path, url, context, body);

        let loading = self.begin(&request, &options);
        let result = self.execute(&mut request).await;
        self.finish(&request, loading, &result, &options);
        result
    }

    fn begin(&self, request: &ApiRequest, options: &RequestOptions) -> Option<NotificationId> {
        let loading = self
            .inner
            .notifications
            .as_ref()
            .filter(|_| options.show_loading)
            .map(|center| {
                let message = options
                    .loading_message
                    .as_deref()
                    .unwrap_or_else(|| types::default_loading_message(&request.method));
                center.loading(message)
            });

        let mut state = self.state();
        state.total += 1;
        state.last_request = Some(Utc::now());
        state.active.insert(
            request.id.clone(),
            ActiveRequest {
                method: request.method.clone(),
                path: request.path.clone(),
                context: request.context.clone(),
            },
        );
        if let Some(id) = loading {
            state.loading.insert(request.id.clone(), id);
        }
        loading
    }

    async fn execute(&self, request: &mut ApiRequest) -> Result<Value, ApiError> {
        loop {
            self.inner.pipeline.run_request(request)?;

            let error = match self.send_once(request).await {
                Ok((status, body)) => {
                    self.inner.pipeline.run_response(request, status, &body);
                    return Ok(body);
                }
                Err(error) => error,
            };
            self.inner.pipeline.run_error(request, &error);

            // Refresh first: a 401 is never retried, only resubmitted once. An
            // anonymous call (no bearer) keeps its 401, e.g. bad credentials.
            if error.status() == Some(401) && !request.refreshed && request.bearer.is_some() {
                request.refreshed = true;
                match self.refresh_access_token().await {
                    Ok(access) => {
                        request.bearer = Some(access);
                        debug!(id = %request.id, "resubmitting after token refresh");
                        continue;
                    }
                    Err(refresh_error) => {
                        warn!(id = %request.id, "token refresh failed: {refresh_error}");
                        self.expire_session();
                        return Err(ApiError::AuthExpired);
                    }
                }
            }

            if self
                .inner
                .retry
                .should_retry(&error, request.retry_count, request.refreshed)
            {
                request.retry_count += 1;
                let delay = self.inner.retry.delay(request.retry_count);
                warn!(
                    "Backing off for {} ms (attempt {}/{})",
                    delay.as_millis(),
                    request.retry_count + 1,
                    self.inner.retry.max_attempts
                );
                sleep(delay).await;
                continue;
            }

            return Err(error);
        }
    }

    async fn send_once(&self, request: &ApiRequest) -> Result<(u16, Value), ApiError> {
        let mut builder = self
            .inner
            .http
            .request(request.method.clone(), &request.url)
            .header(ACCEPT, "application/json");

        for (name, value) in &request.headers {
            builder = builder.header(name, value);
        }
        if let Some(token) = &request.bearer {
            builder = builder.bearer_auth(token.expose_secret());
        }
        if let Some(body) = &request.body {
            builder = builder.json(body);
        }

        let response = builder.send().await.map_err(|err| transport_error(&err))?;
        let status = response.status();
        let raw = response.text().await.map_err(|err| transport_error(&err))?;

        if !status.is_success() {
            return Err(ApiError::from_response(status.as_u16(), &raw));
        }

        let body = if raw.trim().is_empty() {
            Value::Null
        } else {
            serde_json::from_str(&raw).map_err(|err| ApiError::Decode(err.to_string()))?
        };
        Ok((status.as_u16(), body))
    }

    /// `POST token/refresh/` outside the pipeline. Stores the new access token
    /// and the rotated refresh token, if the server sent one.
    async fn refresh_access_token(&self) -> Result<SecretString, ApiError> {
        let refresh = self
            .inner
            .session
            .refresh_token()?
            .ok_or(ApiError::AuthExpired)?;

        let response = self
            .inner
            .http
            .post(self.inner.config.refresh_url())
            .timeout(self.inner.config.refresh_timeout)
            .json(&RefreshRequest {
                refresh: refresh.expose_secret(),
            })
            .send()
            .await
            .map_err(|err| transport_error(&err))?;

        let status = response.status();
        let raw = response.text().await.map_err(|err| transport_error(&err))?;
        if !status.is_success() {
            return Err(ApiError::from_response(status.as_u16(), &raw));
        }

        let tokens: RefreshResponse =
            serde_json::from_str(&raw).map_err(|err| ApiError::Decode(err.to_string()))?;
        if tokens.access.trim().is_empty() {
            return Err(ApiError::Decode("refresh response has no access token".to_string()));
        }

        self.inner
            .session
            .set_tokens(&tokens.access, tokens.refresh.as_deref())?;
        info!("access token refreshed");
        Ok(SecretString::from(tokens.access))
    }

    /// Refreshes the access token with the stored refresh token.
    ///
    /// # Errors
    /// Returns [`ApiError::AuthExpired`] when there is no refresh token, or
    /// the transport or HTTP error of the refresh call.
    pub async fn refresh_tokens(&self) -> Result<(), ApiError> {
        self.refresh_access_token().await.map(|_| ())
    }

    fn expire_session(&self) {
        if let Err(err) = self.inner.session.clear() {
            warn!("failed to clear session: {err}");
        }
        if let Some(center) = &self.inner.notifications {
            center.error(
                SESSION_EXPIRED_MESSAGE,
                ShowOptions::duration(EXPIRED_TOAST_DURATION),
            );
        }
    }

    fn finish(
        &self,
        request: &ApiRequest,
        loading: Option<NotificationId>,
        result: &Result<Value, ApiError>,
        options: &RequestOptions,
    ) {
        {
            let mut state = self.state();
            state.active.remove(&request.id);
            state.loading.remove(&request.id);
            if result.is_ok() {
                state.success += 1;
            } else {
                state.error += 1;
            }
        }

        match result {
            Ok(body) => {
                if let Some(id) = loading {
                    self.dismiss_loading(id, request.started_at.elapsed());
                }
                if let Some(center) = self
                    .inner
                    .notifications
                    .as_ref()
                    .filter(|_| options.show_success)
                {
                    let message = options
                        .success_message
                        .as_deref()
                        .or_else(|| body.get("message").and_then(Value::as_str))
                        .unwrap_or(DEFAULT_SUCCESS_MESSAGE);
                    center.success(message, ShowOptions::duration(SUCCESS_TOAST_DURATION));
                }
            }
            Err(err) => {
                if let (Some(center), Some(id)) = (&self.inner.notifications, loading) {
                    center.dismiss(id);
                }
                if matches!(err, ApiError::AuthExpired) {
                    // Already announced when the refresh failed.
                    error!(context = %request.context, "session expired");
                } else {
                    let center = self
                        .inner
                        .notifications
                        .as_ref()
                        .filter(|_| options.show_error);
                    errors::report(center, err, &request.context);
                }
            }
        }
    }

    /// Keeps a loading toast up for at least `loading_min_duration`.
    fn dismiss_loading(&self, id: NotificationId, elapsed: Duration) {
        let Some(center) = self.inner.notifications.clone() else {
            return;
        };
        let min = self.inner.config.loading_min_duration;

        match Handle::try_current() {
            Ok(handle) if elapsed < min => {
                let wait = min.saturating_sub(elapsed);
                handle.spawn(async move {
                    sleep(wait).await;
                    center.dismiss(id);
                });
            }
            _ => {
                center.dismiss(id);
            }
        }
    }

    fn dismiss_all_loading(&self) {
        let loading = std::mem::take(&mut self.state().loading);
        if let Some(center) = &self.inner.notifications {
            for id in loading.into_values() {
                center.dismiss(id);
            }
        }
    }

    /// # Errors
    /// See [`ApiClient::request`].
    pub async fn get(&self, path: &str) -> Result<Value, ApiError> {
        let options = RequestOptions::for_method(&Method::GET);
        self.request(Method::GET, path, None, options).await
    }

    /// # Errors
    /// See [`ApiClient::request`].
    pub async fn post(&self, path: &str, body: &impl Serialize) -> Result<Value, ApiError> {
        let options = RequestOptions::for_method(&Method::POST);
        self.request(Method::POST, path, Some(encode(body)?), options)
            .await
    }

    /// # Errors
    /// See [`ApiClient::request`].
    pub async fn put(&self, path: &str, body: &impl Serialize) -> Result<Value, ApiError> {
        let options = RequestOptions::for_method(&Method::PUT);
        self.request(Method::PUT, path, Some(encode(body)?), options)
            .await
    }

    /// # Errors
    /// See [`ApiClient::request`].
    pub async fn patch(&self, path: &str, body: &impl Serialize) -> Result<Value, ApiError> {
        let options = RequestOptions::for_method(&Method::PATCH);
        self.request(Method::PATCH, path, Some(encode(body)?), options)
            .await
    }

    /// # Errors
    /// See [`ApiClient::request`].
    pub async fn delete(&self, path: &str) -> Result<Value, ApiError> {
        let options = RequestOptions::for_method(&Method::DELETE);
        self.request(Method::DELETE, path, None, options).await
    }

    /// Creates the account and stores the returned session.
    ///
    /// # Errors
    /// See [`ApiClient::request`].
    pub async fn register(&self, payload: &RegisterRequest) -> Result<AuthResponse, ApiError> {
        let options = RequestOptions::for_method(&Method::POST)
            .context("user_registration")
            .loading("Criando sua conta...");
        let body = self
            .request(Method::POST, "/register/", Some(encode(payload)?), options)
            .await?;

        let auth: AuthResponse = decode(body)?;
        self.save_auth(&auth)?;
        Ok(auth)
    }

    /// # Errors
    /// See [`ApiClient::request`].
    pub async fn login(&self, credentials: &LoginRequest) -> Result<AuthResponse, ApiError> {
        let options = RequestOptions::for_method(&Method::POST)
            .context("user_login")
            .loading("Autenticando...");
        let body = self
            .request(Method::POST, "/login/", Some(encode(credentials)?), options)
            .await?;

        let auth: AuthResponse = decode(body)?;
        self.save_auth(&auth)?;
        Ok(auth)
    }

    /// # Errors
    /// See [`ApiClient::request`].
    pub async fn profile(&self) -> Result<ProfileResponse, ApiError> {
        let options = RequestOptions::for_method(&Method::GET)
            .context("user_profile")
            .loading("Carregando perfil...");
        let body = self.request(Method::GET, "/profile/", None, options).await?;
        decode(body)
    }

    /// Blacklists the refresh token on the server. The local session is left
    /// alone; see [`ApiClient::clear_auth`].
    ///
    /// # Errors
    /// See [`ApiClient::request`].
    pub async fn logout(&self, refresh_token: &str) -> Result<MessageResponse, ApiError> {
        let options = RequestOptions::for_method(&Method::POST)
            .context("user_logout")
            .loading("Finalizando sessão...")
            .with_success(false);
        let body = serde_json::json!({ "refresh_token": refresh_token });
        let body = self
            .request(Method::POST, "/logout/", Some(body), options)
            .await?;
        decode(body)
    }

    /// # Errors
    /// See [`ApiClient::request`].
    pub async fn test_backend(&self) -> Result<Value, ApiError> {
        let options = RequestOptions::for_method(&Method::GET)
            .context("backend_test")
            .loading("Testando conexão...");
        self.request(Method::GET, "/test/", None, options).await
    }

    /// # Errors
    /// See [`ApiClient::request`].
    pub async fn test_protected(&self) -> Result<Value, ApiError> {
        let options = RequestOptions::for_method(&Method::GET)
            .context("protected_test")
            .loading("Verificando autenticação...");
        self.request(Method::GET, "/protected-test/", None, options)
            .await
    }

    /// Whether the stored access token exists and has not expired. The
    /// signature is not checked.
    #[must_use]
    pub fn is_authenticated(&self) -> bool {
        match self.inner.session.access_token() {
            Ok(Some(access)) => !token::is_expired(access.expose_secret(), token::now_unix()),
            Ok(None) => false,
            Err(err) => {
                warn!("failed to read access token: {err}");
                false
            }
        }
    }

    /// # Errors
    /// Returns an error if storage cannot be read.
    pub fn current_user(&self) -> Result<Option<User>, ApiError> {
        Ok(self.inner.session.user()?)
    }

    /// # Errors
    /// Returns an error if storage cannot be written.
    pub fn save_auth(&self, auth: &AuthResponse) -> Result<(), ApiError> {
        self.inner.session.save_auth(
            &SecretString::from(auth.tokens.access.clone()),
            &SecretString::from(auth.tokens.refresh.clone()),
            &auth.user,
        )?;
        info!(email = %auth.user.email, "session stored");
        Ok(())
    }

    /// Drops the session and every piece of per-call bookkeeping.
    ///
    /// # Errors
    /// Returns an error if storage cannot be written.
    pub fn clear_auth(&self) -> Result<(), ApiError> {
        self.inner.session.clear()?;
        self.state().active.clear();
        self.dismiss_all_loading();
        info!("session cleared");
        Ok(())
    }

    /// Forgets in-flight calls and their loading toasts. Requests already on
    /// the wire still complete.
    pub fn cancel_active_requests(&self) {
        let active = std::mem::take(&mut self.state().active);
        for (id, request) in &active {
            debug!(
                %id,
                method = %request.method,
                path = %request.path,
                context = %request.context,
                "cancelling request"
            );
        }
        self.dismiss_all_loading();
    }

    #[must_use]
    pub fn stats(&self) -> ClientStats {
        let state = self.state();
        let success_rate = if state.total == 0 {
            "0%".to_string()
        } else {
            #[allow(clippy::cast_precision_loss)]
            let rate = state.success as f64 / state.total as f64 * 100.0;
            format!("{rate:.2}%")
        };

        ClientStats {
            total: state.total,
            success: state.success,
            error: state.error,
            active: state.active.len(),
            success_rate,
            last_request: state
                .last_request
                .map(|at| at.to_rfc3339_opts(SecondsFormat::Millis, true)),
        }
    }
}

impl SessionBackend for ApiClient {
    async fn refresh(&self) -> Result<(), ApiError> {
        self.refresh_tokens().await
    }

    async fn revoke(&self, refresh_token: &str) -> Result<(), ApiError> {
        self.logout(refresh_token).await.map(|_| ())
    }
}
