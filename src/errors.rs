//! Failure taxonomy shared by the API client, the route guard and the UI.
//!
//! [`ApiError`] is what a call returns. [`classify`] turns it into a
//! [`ProcessedError`] carrying a kind, a user-facing message and the field
//! errors the API sent back. Classification is pure; [`report`] is the side
//! effecting wrapper that also raises a toast.

use crate::{
    notify::{NotificationCenter, ShowOptions},
    session::StorageError,
};
use serde_json::Value;
use std::{collections::BTreeMap, fmt, time::Duration};
use thiserror::Error;
use tracing::error;

/// Maximum number of error body characters kept from a non-JSON response.
const MAX_ERROR_CHARS: usize = 200;

const ERROR_TOAST_DURATION: Duration = Duration::from_millis(5_000);

#[derive(Debug, Error)]
pub enum ApiError {
    #[error("network error: {0}")]
    Network(String),

    #[error("request timed out: {0}")]
    Timeout(String),

    #[error("request failed ({status}): {message}")]
    Http {
        status: u16,
        message: String,
        body: Option<Value>,
    },

    #[error("session expired")]
    AuthExpired,

    #[error("request error: {0}")]
    Request(String),

    #[error("response error: {0}")]
    Decode(String),

    #[error(transparent)]
    Storage(#[from] StorageError),
}

impl ApiError {
    /// Builds an HTTP error from a raw response body, keeping the JSON
    /// payload when there is one.
    #[must_use]
    pub fn from_response(status: u16, raw: &str) -> Self {
        let body = serde_json::from_str::<Value>(raw).ok();
        let message = body
            .as_ref()
            .and_then(|body| body.get("message"))
            .and_then(Value::as_str)
            .map_or_else(|| sanitize_body(raw), str::to_string);

        Self::Http {
            status,
            message,
            body,
        }
    }

    #[must_use]
    pub const fn status(&self) -> Option<u16> {
        match self {
            Self::Http { status, .. } => Some(*status),
            _ => None,
        }
    }
}

/// Trims and truncates error bodies before they reach the UI.
fn sanitize_body(body: &str) -> String {
    let trimmed = body.trim();
    if trimmed.is_empty() {
        "Request failed.".to_string()
    } else {
        trimmed.chars().take(MAX_ERROR_CHARS).collect()
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    Network,
    Validation,
    Auth,
    Server,
    Timeout,
    Unknown,
}

impl ErrorKind {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Network => "network",
            Self::Validation => "validation",
            Self::Auth => "auth",
            Self::Server => "server",
            Self::Timeout => "timeout",
            Self::Unknown => "unknown",
        }
    }

    #[must_use]
    pub const fn title(self) -> &'static str {
        match self {
            Self::Network => "Erro de Conexão",
            Self::Validation => "Dados Inválidos",
            Self::Auth => "Erro de Autenticação",
            Self::Server => "Erro do Servidor",
            Self::Timeout => "Timeout",
            Self::Unknown => "Erro Inesperado",
        }
    }

    #[must_use]
    pub const fn default_message(self) -> &'static str {
        match self {
            Self::Network => "Verifique sua conexão com a internet e tente novamente.",
            Self::Validation => "Verifique os dados preenchidos e tente novamente.",
            Self::Auth => "Sua sessão expirou. Faça login novamente.",
            Self::Server => "Erro interno do sistema. Tente novamente em alguns instantes.",
            Self::Timeout => "A operação demorou muito para responder. Tente novamente.",
            Self::Unknown => "Ocorreu um erro inesperado. Tente novamente.",
        }
    }

    #[must_use]
    pub const fn icon(self) -> &'static str {
        match self {
            Self::Network => "🌐",
            Self::Validation => "⚠️",
            Self::Auth => "🔐",
            Self::Server => "🔧",
            Self::Timeout => "⏱️",
            Self::Unknown => "❌",
        }
    }

    #[must_use]
    pub const fn color(self) -> &'static str {
        match self {
            Self::Network | Self::Timeout => "orange",
            Self::Validation => "yellow",
            Self::Auth | Self::Server | Self::Unknown => "red",
        }
    }

    /// Static status table. Anything not listed is a server-side problem.
    #[must_use]
    pub const fn from_status(status: u16) -> Self {
        match status {
            400 | 422 => Self::Validation,
            401 | 403 => Self::Auth,
            _ => Self::Server,
        }
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        formatter.write_str(self.as_str())
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ProcessedError {
    pub kind: ErrorKind,
    pub title: String,
    pub message: String,
    pub http_status: Option<u16>,
    pub field_errors: BTreeMap<String, Vec<String>>,
    pub context: String,
}

impl ProcessedError {
    #[must_use]
    pub const fn is_auth(&self) -> bool {
        matches!(self.kind, ErrorKind::Auth)
    }

    /// First message for a field, which is the one a form shows.
    #[must_use]
    pub fn first_field_error(&self, field: &str) -> Option<&str> {
        self.field_errors
            .get(field)
            .and_then(|messages| messages.first())
            .map(String::as_str)
    }

    /// Where the UI should go after this error, if anywhere. Auth failures
    /// send the user to the login page unless they are already on a page
    /// that does not need a session.
    #[must_use]
    pub fn redirect_url(&self, current_path: &str) -> Option<&'static str> {
        if self.is_auth() && current_path != "/login" && current_path != "/cadastro" {
            Some("/login?expired=true")
        } else {
            None
        }
    }
}

/// Maps an error to the fixed taxonomy. Same input, same output.
#[must_use]
pub fn classify(error: &ApiError, context: &str) -> ProcessedError {
    let (kind, http_status, backend_message, field_errors) = match error {
        ApiError::Network(_) => (ErrorKind::Network, None, None, BTreeMap::new()),
        ApiError::Timeout(_) => (ErrorKind::Timeout, None, None, BTreeMap::new()),
        ApiError::Http { status, body, .. } => (
            ErrorKind::from_status(*status),
            Some(*status),
            body.as_ref()
                .and_then(|body| body.get("message"))
                .and_then(Value::as_str)
                .filter(|message| !message.trim().is_empty())
                .map(str::to_string),
            body.as_ref()
                .and_then(|body| body.get("errors"))
                .map(collect_field_errors)
                .unwrap_or_default(),
        ),
        ApiError::AuthExpired => (ErrorKind::Auth, None, None, BTreeMap::new()),
        ApiError::Request(message) | ApiError::Decode(message) => (
            ErrorKind::Unknown,
            None,
            Some(message.clone()),
            BTreeMap::new(),
        ),
        ApiError::Storage(err) => (
            ErrorKind::Unknown,
            None,
            Some(err.to_string()),
            BTreeMap::new(),
        ),
    };

    ProcessedError {
        kind,
        title: kind.title().to_string(),
        message: backend_message.unwrap_or_else(|| kind.default_message().to_string()),
        http_status,
        field_errors,
        context: context.to_string(),
    }
}

/// Normalizes `{"field": "msg"}` and `{"field": ["msg", ...]}` into lists.
fn collect_field_errors(errors: &Value) -> BTreeMap<String, Vec<String>> {
    let Some(errors) = errors.as_object() else {
        return BTreeMap::new();
    };

    errors
        .iter()
        .map(|(field, messages)| {
            let messages = match messages {
                Value::Array(items) => items.iter().map(value_text).collect(),
                other => vec![value_text(other)],
            };
            (field.clone(), messages)
        })
        .filter(|(_, messages): &(String, Vec<String>)| !messages.is_empty())
        .collect()
}

fn value_text(value: &Value) -> String {
    match value {
        Value::String(text) => text.clone(),
        other => other.to_string(),
    }
}

/// Classifies, logs and shows an error toast. Auth errors stay on screen
/// until dismissed.
pub fn report(
    notifications: Option<&NotificationCenter>,
    error: &ApiError,
    context: &str,
) -> ProcessedError {
    let processed = classify(error, context);

    error!(
        kind = %processed.kind,
        status = ?processed.http_status,
        context = %processed.context,
        "{error}"
    );

    if let Some(center) = notifications {
        center.error(
            &processed.message,
            ShowOptions {
                title: Some(processed.title.clone()),
                duration: Some(ERROR_TOAST_DURATION),
                persistent: processed.is_auth(),
            },
        );
    }

    processed
}
