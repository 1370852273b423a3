//! Request bookkeeping and the payloads of the MVP endpoints.

use crate::session::User;
use reqwest::Method;
use secrecy::SecretString;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use tokio::time::Instant;

/// A call in flight. Lives for one `request` invocation, across its retries.
#[derive(Debug)]
pub struct ApiRequest {
    pub id: String,
    pub method: Method,
    pub path: String,
    pub url: String,
    pub context: String,
    pub body: Option<Value>,
    pub headers: BTreeMap<String, String>,
    /// Sent as `Authorization: Bearer ...` when present.
    pub bearer: Option<SecretString>,
    pub started_at: Instant,
    pub retry_count: u32,
    /// Set once the call has been resubmitted after a token refresh.
    pub refreshed: bool,
}

impl ApiRequest {
    #[must_use]
    pub fn new(method: Method, path: &str, url: String, context: String, body: Option<Value>) -> Self {
        Self {
            id: format!("req_{}", ulid::Ulid::new()),
            method,
            path: path.to_string(),
            url,
            context,
            body,
            headers: BTreeMap::new(),
            bearer: None,
            started_at: Instant::now(),
            retry_count: 0,
            refreshed: false,
        }
    }
}

/// Per-call UX switches.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RequestOptions {
    /// Logical name used in logs and error classification. Defaults to
    /// `"<method>_<path>"`.
    pub context: Option<String>,
    pub show_loading: bool,
    pub loading_message: Option<String>,
    pub show_success: bool,
    pub success_message: Option<String>,
    pub show_error: bool,
}

impl RequestOptions {
    /// Defaults for a method: loading toast always, success toast for writes.
    #[must_use]
    pub fn for_method(method: &Method) -> Self {
        Self {
            context: None,
            show_loading: true,
            loading_message: None,
            show_success: *method != Method::GET,
            success_message: None,
            show_error: true,
        }
    }

    #[must_use]
    pub fn context(mut self, context: &str) -> Self {
        self.context = Some(context.to_string());
        self
    }

    #[must_use]
    pub fn loading(mut self, message: &str) -> Self {
        self.show_loading = true;
        self.loading_message = Some(message.to_string());
        self
    }

    /// No toasts at all; errors are still returned and logged.
    #[must_use]
    pub fn quiet(mut self) -> Self {
        self.show_loading = false;
        self.show_success = false;
        self.show_error = false;
        self
    }

    #[must_use]
    pub const fn with_success(mut self, show: bool) -> Self {
        self.show_success = show;
        self
    }
}

#[must_use]
pub fn default_loading_message(method: &Method) -> &'static str {
    match *method {
        Method::GET => "Carregando...",
        Method::POST => "Enviando...",
        Method::PUT | Method::PATCH => "Atualizando...",
        Method::DELETE => "Removendo...",
        _ => "Processando...",
    }
}

#[must_use]
pub fn default_context(method: &Method, path: &str) -> String {
    format!("{}_{}", method.as_str().to_lowercase(), path)
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize)]
pub struct RegisterRequest {
    pub first_name: String,
    pub last_name: String,
    pub email: String,
    pub password: String,
    pub password_confirm: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cpf: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub telefone: Option<String>,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

#[derive(Clone, Debug, Deserialize)]
pub struct AuthTokens {
    pub access: String,
    pub refresh: String,
    #[serde(default)]
    pub access_expires_in: Option<u64>,
    #[serde(default)]
    pub refresh_expires_in: Option<u64>,
}

/// Body of `register/` and `login/`.
#[derive(Clone, Debug, Deserialize)]
pub struct AuthResponse {
    #[serde(default)]
    pub success: bool,
    #[serde(default)]
    pub message: Option<String>,
    pub user: User,
    pub tokens: AuthTokens,
}

#[derive(Clone, Debug, Deserialize)]
pub struct ProfileResponse {
    #[serde(default)]
    pub success: bool,
    #[serde(default)]
    pub message: Option<String>,
    pub user: User,
}

#[derive(Clone, Debug, Serialize)]
pub struct RefreshRequest<'a> {
    pub refresh: &'a str,
}

#[derive(Clone, Debug, Deserialize)]
pub struct RefreshResponse {
    pub access: String,
    #[serde(default)]
    pub refresh: Option<String>,
}

#[derive(Clone, Debug, Deserialize)]
pub struct MessageResponse {
    #[serde(default)]
    pub success: bool,
    #[serde(default)]
    pub message: Option<String>,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ClientStats {
    pub total: u64,
    pub success: u64,
    pub error: u64,
    pub active: usize,
    /// `"87.50%"`, or `"0%"` before the first call.
    pub success_rate: String,
    /// RFC 3339.
    pub last_request: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn method_defaults() {
        assert!(!RequestOptions::for_method(&Method::GET).show_success);
        assert!(RequestOptions::for_method(&Method::POST).show_success);
        assert_eq!(default_loading_message(&Method::PATCH), "Atualizando...");
        assert_eq!(default_loading_message(&Method::DELETE), "Removendo...");
        assert_eq!(default_context(&Method::GET, "/profile/"), "get_/profile/");
    }

    #[test]
    fn request_ids_are_prefixed_and_unique() {
        let a = ApiRequest::new(Method::GET, "/test/", "http://x/test/".into(), "t".into(), None);
        let b = ApiRequest::new(Method::GET, "/test/", "http://x/test/".into(), "t".into(), None);
        assert!(a.id.starts_with("req_"));
        assert_ne!(a.id, b.id);
    }

    #[test]
    fn auth_response_keeps_extra_user_fields() -> Result<(), serde_json::Error> {
        let body = json!({
            "success": true,
            "message": "Login realizado com sucesso!",
            "user": {"id": 7, "email": "a@b.com", "nome_completo": "Ana Silva", "cpf": "11144477735"},
            "tokens": {"access": "a", "refresh": "r", "access_expires_in": 3600}
        });
        let response: AuthResponse = serde_json::from_value(body)?;
        assert_eq!(response.user.field("cpf"), Some(&json!("11144477735")));
        assert_eq!(response.tokens.access_expires_in, Some(3600));
        assert_eq!(response.tokens.refresh_expires_in, None);
        Ok(())
    }

    #[test]
    fn register_skips_missing_optionals() -> Result<(), serde_json::Error> {
        let body = serde_json::to_value(RegisterRequest {
            email: "a@b.com".into(),
            ..RegisterRequest::default()
        })?;
        assert!(body.get("cpf").is_none());
        assert_eq!(body["email"], "a@b.com");
        Ok(())
    }
}
