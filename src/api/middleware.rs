//! Ordered hooks run around every call. Request hooks may rewrite the request
//! or abort it; response and error hooks only observe.

use super::types::ApiRequest;
use crate::{errors::ApiError, session::SessionStore};
use serde_json::Value;
use std::sync::Arc;
use tracing::{debug, info, warn};

pub const REQUEST_ID_HEADER: &str = "X-Request-ID";

pub trait Middleware: Send + Sync {
    fn name(&self) -> &'static str;

    /// # Errors
    /// An error aborts the call before anything is sent.
    fn on_request(&self, _request: &mut ApiRequest) -> Result<(), ApiError> {
        Ok(())
    }

    fn on_response(&self, _request: &ApiRequest, _status: u16, _body: &Value) {}

    fn on_error(&self, _request: &ApiRequest, _error: &ApiError) {}
}

/// Adds the session's access token as a bearer credential.
pub struct BearerAuth {
    session: SessionStore,
}

impl BearerAuth {
    #[must_use]
    pub fn new(session: SessionStore) -> Self {
        Self { session }
    }
}

impl Middleware for BearerAuth {
    fn name(&self) -> &'static str {
        "bearer_auth"
    }

    fn on_request(&self, request: &mut ApiRequest) -> Result<(), ApiError> {
        // A refreshed call already carries the new token.
        if request.bearer.is_none() {
            request.bearer = self.session.access_token()?;
        }
        Ok(())
    }
}

/// Tags the call with its request id so server logs can be matched.
pub struct CorrelationId;

impl Middleware for CorrelationId {
    fn name(&self) -> &'static str {
        "correlation_id"
    }

    fn on_request(&self, request: &mut ApiRequest) -> Result<(), ApiError> {
        request
            .headers
            .insert(REQUEST_ID_HEADER.to_string(), request.id.clone());
        Ok(())
    }
}

pub struct RequestLog;

impl Middleware for RequestLog {
    fn name(&self) -> &'static str {
        "request_log"
    }

    fn on_request(&self, request: &mut ApiRequest) -> Result<(), ApiError> {
        debug!(
            id = %request.id,
            method = %request.method,
            url = %request.url,
            context = %request.context,
            retry = request.retry_count,
            authenticated = request.bearer.is_some(),
            "sending request"
        );
        Ok(())
    }

    fn on_response(&self, request: &ApiRequest, status: u16, _body: &Value) {
        info!(
            id = %request.id,
            method = %request.method,
            path = %request.path,
            status,
            elapsed_ms = request.started_at.elapsed().as_millis(),
            "request completed"
        );
    }

    fn on_error(&self, request: &ApiRequest, error: &ApiError) {
        warn!(
            id = %request.id,
            method = %request.method,
            path = %request.path,
            status = ?error.status(),
            elapsed_ms = request.started_at.elapsed().as_millis(),
            "request failed: {error}"
        );
    }
}

#[derive(Clone, Default)]
pub struct Pipeline {
    stages: Vec<Arc<dyn Middleware>>,
}

impl Pipeline {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Bearer injection and correlation id, plus request logging when
    /// `debug` is set.
    #[must_use]
    pub fn standard(session: SessionStore, debug: bool) -> Self {
        let pipeline = Self::new()
            .with(BearerAuth::new(session))
            .with(CorrelationId);
        if debug {
            pipeline.with(RequestLog)
        } else {
            pipeline
        }
    }

    #[must_use]
    pub fn with(mut self, stage: impl Middleware + 'static) -> Self {
        self.stages.push(Arc::new(stage));
        self
    }

    #[must_use]
    pub fn names(&self) -> Vec<&'static str> {
        self.stages.iter().map(|stage| stage.name()).collect()
    }

    /// # Errors
    /// Returns the first error raised by a stage.
    pub fn run_request(&self, request: &mut ApiRequest) -> Result<(), ApiError> {
        for stage in &self.stages {
            stage.on_request(request)?;
        }
        Ok(())
    }

    pub fn run_response(&self, request: &ApiRequest, status: u16, body: &Value) {
        for stage in &self.stages {
            stage.on_response(request, status, body);
        }
    }

    pub fn run_error(&self, request: &ApiRequest, error: &ApiError) {
        for stage in &self.stages {
            stage.on_error(request, error);
        }
    }
}
