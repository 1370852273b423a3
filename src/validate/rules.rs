use super::documents::{matches_phone_pattern, validate_cnpj, validate_cpf, validate_email};
use crate::format::{format_cnpj, format_cpf, format_phone};
use std::{fmt, sync::Arc};

pub const DEFAULT_PASSWORD_MIN_LENGTH: usize = 8;
pub const DEFAULT_MAX_LENGTH: usize = 255;

const PASSWORD_SYMBOLS: &str = "@$!%*?&";

type Check = Arc<dyn Fn(&str) -> bool + Send + Sync>;

/// One validation rule. A field runs its rules in declaration order and
/// stops at the first failure.
#[derive(Clone)]
pub enum Rule {
    Required,
    Email,
    Password { min_length: usize, strong: bool },
    Cpf,
    Cnpj,
    Phone,
    MinLength(usize),
    MaxLength(usize),
    /// Must equal the live value of another field.
    ConfirmPassword { original_field: String },
    Custom { message: String, check: Check },
}

impl Rule {
    #[must_use]
    pub const fn password() -> Self {
        Self::Password {
            min_length: DEFAULT_PASSWORD_MIN_LENGTH,
            strong: false,
        }
    }

    #[must_use]
    pub fn confirm(original_field: &str) -> Self {
        Self::ConfirmPassword {
            original_field: original_field.to_string(),
        }
    }

    pub fn custom(
        message: impl Into<String>,
        check: impl Fn(&str) -> bool + Send + Sync + 'static,
    ) -> Self {
        Self::Custom {
            message: message.into(),
            check: Arc::new(check),
        }
    }

    #[must_use]
    pub const fn name(&self) -> &'static str {
        match self {
            Self::Required => "required",
            Self::Email => "email",
            Self::Password { .. } => "password",
            Self::Cpf => "cpf",
            Self::Cnpj => "cnpj",
            Self::Phone => "phone",
            Self::MinLength(_) => "min_length",
            Self::MaxLength(_) => "max_length",
            Self::ConfirmPassword { .. } => "confirm_password",
            Self::Custom { .. } => "custom",
        }
    }

    /// Checks a trimmed value. `lookup` returns the live value of another
    /// field and is only used by [`Rule::ConfirmPassword`].
    ///
    /// # Errors
    /// Returns the message to show when the value does not satisfy the rule.
    pub fn evaluate(&self, value: &str, lookup: &dyn Fn(&str) -> Option<String>) -> Result<(), String> {
        let ok = match self {
            Self::Required => !value.is_empty(),
            // Format rules leave emptiness to `Required`.
            Self::Email => value.is_empty() || validate_email(value),
            Self::Cpf => value.is_empty() || validate_cpf(value),
            Self::Cnpj => value.is_empty() || validate_cnpj(value),
            Self::Phone => value.is_empty() || matches_phone_pattern(value),
            Self::MinLength(min) => value.is_empty() || value.chars().count() >= *min,
            Self::MaxLength(max) => value.chars().count() <= *max,
            Self::Password { min_length, strong } => {
                if value.chars().count() < *min_length {
                    return Err(format!("Senha deve ter pelo menos {min_length} caracteres"));
                }
                !*strong || is_strong_password(value)
            }
            Self::ConfirmPassword { original_field } => {
                let original = lookup(original_field).unwrap_or_default();
                value == original.trim()
            }
            Self::Custom { check, .. } => check(value),
        };

        if ok {
            Ok(())
        } else {
            Err(self.message())
        }
    }

    fn message(&self) -> String {
        match self {
            Self::Required => "Este campo é obrigatório".to_string(),
            Self::Email => "Email inválido".to_string(),
            Self::Password { .. } => {
                "Senha deve conter: maiúscula, minúscula, número e símbolo".to_string()
            }
            Self::Cpf => "CPF inválido".to_string(),
            Self::Cnpj => "CNPJ inválido".to_string(),
            Self::Phone => "Telefone inválido".to_string(),
            Self::MinLength(min) => format!("Mínimo de {min} caracteres"),
            Self::MaxLength(max) => format!("Máximo de {max} caracteres"),
            Self::ConfirmPassword { .. } => "Senhas não coincidem".to_string(),
            Self::Custom { message, .. } => {
                if message.is_empty() {
                    "Valor inválido".to_string()
                } else {
                    message.clone()
                }
            }
        }
    }

    /// Live mask applied while the user types, if this rule has one.
    #[must_use]
    pub fn input_mask(&self) -> Option<fn(&str) -> String> {
        match self {
            Self::Cpf => Some(format_cpf as fn(&str) -> String),
            Self::Cnpj => Some(format_cnpj as fn(&str) -> String),
            Self::Phone => Some(format_phone as fn(&str) -> String),
            _ => None,
        }
    }
}

impl fmt::Debug for Rule {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Password { min_length, strong } => formatter
                .debug_struct("Password")
                .field("min_length", min_length)
                .field("strong", strong)
                .finish(),
            Self::MinLength(min) => formatter.debug_tuple("MinLength").field(min).finish(),
            Self::MaxLength(max) => formatter.debug_tuple("MaxLength").field(max).finish(),
            Self::ConfirmPassword { original_field } => formatter
                .debug_struct("ConfirmPassword")
                .field("original_field", original_field)
                .finish(),
            Self::Custom { message, .. } => formatter
                .debug_struct("Custom")
                .field("message", message)
                .finish_non_exhaustive(),
            other => formatter.write_str(other.name()),
        }
    }
}

/// Lowercase, uppercase, digit and one of `@$!%*?&`.
fn is_strong_password(value: &str) -> bool {
    value.chars().any(|c| c.is_ascii_lowercase())
        && value.chars().any(|c| c.is_ascii_uppercase())
        && value.chars().any(|c| c.is_ascii_digit())
        && value.chars().any(|c| PASSWORD_SYMBOLS.contains(c))
}
