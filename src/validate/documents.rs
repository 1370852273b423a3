//! Stateless checks for Brazilian documents, contact data and passwords.

use regex::Regex;

const CNPJ_FIRST_WEIGHTS: [u32; 12] = [5, 4, 3, 2, 9, 8, 7, 6, 5, 4, 3, 2];
const CNPJ_SECOND_WEIGHTS: [u32; 13] = [6, 5, 4, 3, 2, 9, 8, 7, 6, 5, 4, 3, 2];

/// Characters that count as a symbol in the strength meter.
const STRENGTH_SYMBOLS: &str = "!@#$%^&*(),.?\":{}|<>";

fn digit_values(value: &str) -> Vec<u32> {
    value.chars().filter_map(|c| c.to_digit(10)).collect()
}

fn all_equal(digits: &[u32]) -> bool {
    digits.windows(2).all(|pair| pair[0] == pair[1])
}

/// Weighted sum over the digits, mapped to a check digit (remainder < 2 is 0).
fn check_digit(digits: &[u32], weights: impl Iterator<Item = u32>) -> u32 {
    let sum: u32 = digits.iter().zip(weights).map(|(d, w)| d * w).sum();
    let remainder = sum % 11;
    if remainder < 2 {
        0
    } else {
        11 - remainder
    }
}

/// CPF check digits: weights 10..2 over the first nine digits, then 11..2
/// over the first ten.
#[must_use]
pub fn validate_cpf(value: &str) -> bool {
    let digits = digit_values(value);
    if digits.len() != 11 || all_equal(&digits) {
        return false;
    }

    let first = check_digit(&digits[..9], (2..=10).rev());
    let second = check_digit(&digits[..10], (2..=11).rev());
    first == digits[9] && second == digits[10]
}

#[must_use]
pub fn validate_cnpj(value: &str) -> bool {
    let digits = digit_values(value);
    if digits.len() != 14 || all_equal(&digits) {
        return false;
    }

    let first = check_digit(&digits[..12], CNPJ_FIRST_WEIGHTS.into_iter());
    let second = check_digit(&digits[..13], CNPJ_SECOND_WEIGHTS.into_iter());
    first == digits[12] && second == digits[13]
}

#[must_use]
pub fn validate_email(email: &str) -> bool {
    Regex::new(r"^[^\s@]+@[^\s@]+\.[^\s@]+$").is_ok_and(|regex| regex.is_match(email.trim()))
}

/// Accepts the shapes users type: `+55 (11) 98765-4321`, `11 3456-7890`,
/// `987654321`.
#[must_use]
pub fn matches_phone_pattern(phone: &str) -> bool {
    Regex::new(r"^(\+55\s?)?(\(\d{2}\)\s?|\d{2}\s?)?\d{4,5}-?\d{4}$")
        .is_ok_and(|regex| regex.is_match(phone.trim()))
}

/// Stricter check on the digits: 10 or 11 of them, a real DDD (11-99) and a
/// leading 9 on mobile numbers.
#[must_use]
pub fn validate_phone(phone: &str) -> bool {
    let digits = digit_values(phone);
    if digits.len() != 10 && digits.len() != 11 {
        return false;
    }

    let ddd = digits[0] * 10 + digits[1];
    if !(11..=99).contains(&ddd) {
        return false;
    }

    digits.len() == 10 || digits[2] == 9
}

#[must_use]
pub fn validate_cep(cep: &str) -> bool {
    digit_values(cep).len() == 8 && cep.chars().all(|c| c.is_ascii_digit() || c == '-')
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum DocumentType {
    Cpf,
    Cnpj,
    Unknown,
}

/// Classifies a document by its digit count.
#[must_use]
pub fn detect_document_type(value: &str) -> DocumentType {
    match digit_values(value).len() {
        11 => DocumentType::Cpf,
        14 => DocumentType::Cnpj,
        _ => DocumentType::Unknown,
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum StrengthLevel {
    VeryWeak,
    Weak,
    Medium,
    Strong,
}

impl StrengthLevel {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::VeryWeak => "muito-fraca",
            Self::Weak => "fraca",
            Self::Medium => "media",
            Self::Strong => "forte",
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PasswordStrength {
    /// 0 to 6, one point per satisfied criterion.
    pub score: u8,
    pub level: StrengthLevel,
    pub message: &'static str,
    /// At most three hints, most important first.
    pub suggestions: Vec<&'static str>,
}

#[must_use]
pub fn password_strength(password: &str) -> PasswordStrength {
    if password.is_empty() {
        return PasswordStrength {
            score: 0,
            level: StrengthLevel::VeryWeak,
            message: "Senha é obrigatória",
            suggestions: vec!["Digite uma senha"],
        };
    }

    let length = password.chars().count();
    let criteria = [
        (length >= 8, "Use pelo menos 8 caracteres"),
        (length >= 12, "Use 12 ou mais caracteres para maior segurança"),
        (
            password.chars().any(|c| c.is_lowercase()),
            "Adicione letras minúsculas",
        ),
        (
            password.chars().any(|c| c.is_uppercase()),
            "Adicione letras maiúsculas",
        ),
        (
            password.chars().any(|c| c.is_ascii_digit()),
            "Adicione números",
        ),
        (
            password.chars().any(|c| STRENGTH_SYMBOLS.contains(c)),
            "Adicione símbolos (!@#$%...)",
        ),
    ];

    let score = criteria.iter().filter(|(met, _)| *met).count() as u8;
    let suggestions = criteria
        .iter()
        .filter(|(met, _)| !*met)
        .map(|(_, hint)| *hint)
        .take(3)
        .collect();

    let (level, message) = match score {
        0..=2 => (StrengthLevel::Weak, "Senha fraca"),
        3..=4 => (StrengthLevel::Medium, "Senha média"),
        _ => (StrengthLevel::Strong, "Senha forte"),
    };

    PasswordStrength {
        score,
        level,
        message,
        suggestions,
    }
}
