use crate::{
    format,
    validate::{self, DocumentType},
};
use anyhow::{bail, Result};
use chrono::{DateTime, Utc};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum CheckKind {
    Cpf,
    Cnpj,
    Document,
    Email,
    Phone,
    Cep,
    Password,
}

impl CheckKind {
    #[must_use]
    pub fn from_name(name: &str) -> Option<Self> {
        Some(match name {
            "cpf" => Self::Cpf,
            "cnpj" => Self::Cnpj,
            "document" => Self::Document,
            "email" => Self::Email,
            "phone" => Self::Phone,
            "cep" => Self::Cep,
            "password" => Self::Password,
            _ => return None,
        })
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum FormatKind {
    Cpf,
    Cnpj,
    Phone,
    Cep,
    Currency,
    Number,
    Percentage,
    Date,
    RelativeDate,
    Name,
    Initials,
    Text,
}

impl FormatKind {
    #[must_use]
    pub fn from_name(name: &str) -> Option<Self> {
        Some(match name {
            "cpf" => Self::Cpf,
            "cnpj" => Self::Cnpj,
            "phone" => Self::Phone,
            "cep" => Self::Cep,
            "currency" => Self::Currency,
            "number" => Self::Number,
            "percentage" => Self::Percentage,
            "date" => Self::Date,
            "relative-date" => Self::RelativeDate,
            "name" => Self::Name,
            "initials" => Self::Initials,
            "text" => Self::Text,
            _ => return None,
        })
    }
}

#[derive(Debug)]
pub struct Check {
    pub kind: CheckKind,
    pub value: String,
}

#[derive(Debug)]
pub struct Format {
    pub kind: FormatKind,
    pub value: String,
    pub decimals: usize,
    pub include_time: bool,
}

/// Outcome line of a check; `Err` carries the rejection.
fn check(kind: CheckKind, value: &str) -> std::result::Result<String, String> {
    let verdict = |valid: bool, label: &str| {
        if valid {
            Ok(format!("{label} válido"))
        } else {
            Err(format!("{label} inválido"))
        }
    };

    match kind {
        CheckKind::Cpf => verdict(validate::validate_cpf(value), "CPF"),
        CheckKind::Cnpj => verdict(validate::validate_cnpj(value), "CNPJ"),
        CheckKind::Document => match validate::detect_document_type(value) {
            DocumentType::Cpf => verdict(validate::validate_cpf(value), "CPF"),
            DocumentType::Cnpj => verdict(validate::validate_cnpj(value), "CNPJ"),
            DocumentType::Unknown => Err("Documento deve ser um CPF ou CNPJ".to_string()),
        },
        CheckKind::Email => verdict(validate::validate_email(value), "E-mail"),
        CheckKind::Phone => verdict(validate::validate_phone(value), "Telefone"),
        CheckKind::Cep => verdict(validate::validate_cep(value), "CEP"),
        CheckKind::Password => {
            let strength = validate::password_strength(value);
            let mut lines = vec![format!(
                "{} ({}, {}/6)",
                strength.message,
                strength.level.as_str(),
                strength.score
            )];
            lines.extend(strength.suggestions.iter().map(|hint| format!("  - {hint}")));
            Ok(lines.join("\n"))
        }
    }
}

#[must_use]
pub fn render(format: &Format, now: DateTime<Utc>) -> String {
    let value = format.value.as_str();
    match format.kind {
        FormatKind::Cpf => format::format_cpf(value),
        FormatKind::Cnpj => format::format_cnpj(value),
        FormatKind::Phone => format::format_phone(value),
        FormatKind::Cep => format::format_cep(value),
        FormatKind::Currency => format::format_currency(value),
        FormatKind::Number => format::format_number(value, format.decimals),
        FormatKind::Percentage => format::format_percentage(value, format.decimals),
        FormatKind::Date => format::format_date(value, format.include_time),
        FormatKind::RelativeDate => format::format_relative_date(value, now),
        FormatKind::Name => format::capitalize_name(value),
        FormatKind::Initials => format::initials(value),
        FormatKind::Text => format::clean_text(value),
    }
}

/// # Errors
/// Returns an error when the value is rejected.
pub fn validate(args: &Check) -> Result<()> {
    match check(args.kind, &args.value) {
        Ok(line) => {
            println!("{line}");
            Ok(())
        }
        Err(reason) => bail!(reason),
    }
}

/// # Errors
/// Returns an error when the value cannot be formatted.
pub fn format(args: &Format) -> Result<()> {
    let rendered = render(args, Utc::now());
    if rendered.is_empty() && !args.value.trim().is_empty() {
        bail!("não foi possível formatar {:?}", args.value);
    }
    println!("{rendered}");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn format_args(kind: FormatKind, value: &str) -> Format {
        Format {
            kind,
            value: value.to_string(),
            decimals: 2,
            include_time: false,
        }
    }

    #[test]
    fn kinds_match_command_values() {
        for name in crate::cli::commands::tools::VALIDATE_KINDS {
            assert!(CheckKind::from_name(name).is_some(), "{name}");
        }
        for name in crate::cli::commands::tools::FORMAT_KINDS {
            assert!(FormatKind::from_name(name).is_some(), "{name}");
        }
        assert_eq!(CheckKind::from_name("rg"), None);
    }

    #[test]
    fn document_check_picks_type_by_length() {
        assert_eq!(
            check(CheckKind::Document, "111.444.777-35"),
            Ok("CPF válido".to_string())
        );
        assert_eq!(
            check(CheckKind::Document, "11.222.333/0001-80"),
            Err("CNPJ inválido".to_string())
        );
        assert_eq!(
            check(CheckKind::Document, "123"),
            Err("Documento deve ser um CPF ou CNPJ".to_string())
        );
    }

    #[test]
    fn password_check_never_fails() {
        let report = check(CheckKind::Password, "abc");
        assert!(matches!(report, Ok(ref text) if text.starts_with("Senha fraca (fraca, 1/6)")));
        assert!(validate(&Check {
            kind: CheckKind::Password,
            value: String::new(),
        })
        .is_ok());
    }

    #[test]
    fn invalid_value_is_an_error() {
        let result = validate(&Check {
            kind: CheckKind::Cpf,
            value: "111.111.111-11".to_string(),
        });
        assert!(result.is_err());
    }

    #[test]
    fn render_uses_selected_formatter() {
        let now = Utc.with_ymd_and_hms(2024, 1, 15, 12, 0, 0).single();
        let Some(now) = now else {
            panic!("valid timestamp");
        };

        assert_eq!(render(&format_args(FormatKind::Cpf, "11144477735"), now), "111.444.777-35");
        assert_eq!(render(&format_args(FormatKind::Cep, "01310100"), now), "01310-100");
        assert_eq!(
            render(&format_args(FormatKind::Percentage, "0.157"), now),
            "15,70%"
        );
        assert_eq!(
            render(&format_args(FormatKind::Name, "maria DA silva"), now),
            "Maria da Silva"
        );
        assert_eq!(
            render(&format_args(FormatKind::RelativeDate, "2024-01-15T11:55:00Z"), now),
            "há 5 minutos"
        );
    }
}
