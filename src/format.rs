//! Display formatters for Brazilian documents, numbers and dates.
//!
//! All functions are pure. Input that cannot be formatted yields an empty
//! string. Document masks are progressive: they format whatever prefix has
//! been typed so far, which is what the form fields call on every keystroke.

use chrono::{DateTime, FixedOffset, NaiveDate, NaiveDateTime, TimeZone, Utc};

const CPF_DIGITS: usize = 11;
const CNPJ_DIGITS: usize = 14;
const PHONE_DIGITS: usize = 11;
const CEP_DIGITS: usize = 8;

/// America/Sao_Paulo has been fixed at UTC-3 since daylight saving ended in 2019.
const SAO_PAULO_OFFSET_SECS: i32 = -3 * 3600;

/// Lowercase particles kept in lowercase inside person names.
const NAME_PARTICLES: [&str; 10] = ["de", "da", "do", "das", "dos", "e", "em", "na", "no", "para"];

fn digits(value: &str, limit: usize) -> String {
    value
        .chars()
        .filter(char::is_ascii_digit)
        .take(limit)
        .collect()
}

/// Strips everything but digits.
#[must_use]
pub fn remove_document_formatting(value: &str) -> String {
    value.chars().filter(char::is_ascii_digit).collect()
}

/// `123.456.789-01`, applied to any prefix.
#[must_use]
pub fn format_cpf(value: &str) -> String {
    let d = digits(value, CPF_DIGITS);
    match d.len() {
        0..=3 => d,
        4..=6 => format!("{}.{}", &d[..3], &d[3..]),
        7..=9 => format!("{}.{}.{}", &d[..3], &d[3..6], &d[6..]),
        _ => format!("{}.{}.{}-{}", &d[..3], &d[3..6], &d[6..9], &d[9..]),
    }
}

/// `12.345.678/0001-90`, applied to any prefix.
#[must_use]
pub fn format_cnpj(value: &str) -> String {
    let d = digits(value, CNPJ_DIGITS);
    match d.len() {
        0..=2 => d,
        3..=5 => format!("{}.{}", &d[..2], &d[2..]),
        6..=8 => format!("{}.{}.{}", &d[..2], &d[2..5], &d[5..]),
        9..=12 => format!("{}.{}.{}/{}", &d[..2], &d[2..5], &d[5..8], &d[8..]),
        _ => format!(
            "{}.{}.{}/{}-{}",
            &d[..2],
            &d[2..5],
            &d[5..8],
            &d[8..12],
            &d[12..]
        ),
    }
}

/// `(11) 98765-4321` for mobiles, `(11) 3456-7890` for landlines.
#[must_use]
pub fn format_phone(value: &str) -> String {
    let d = digits(value, PHONE_DIGITS);
    match d.len() {
        0..=2 => d,
        3..=7 => format!("({}) {}", &d[..2], &d[2..]),
        8..=10 => format!("({}) {}-{}", &d[..2], &d[2..6], &d[6..]),
        _ => format!("({}) {}-{}", &d[..2], &d[2..7], &d[7..]),
    }
}

/// `01310-100`, applied to any prefix.
#[must_use]
pub fn format_cep(value: &str) -> String {
    let d = digits(value, CEP_DIGITS);
    match d.len() {
        0..=5 => d,
        _ => format!("{}-{}", &d[..5], &d[5..]),
    }
}

/// Anything that can be shown as a number: floats, integers and numeric text.
pub trait NumericInput {
    fn to_number(&self) -> Option<f64>;
}

impl NumericInput for f64 {
    fn to_number(&self) -> Option<f64> {
        self.is_finite().then_some(*self)
    }
}

impl NumericInput for i64 {
    fn to_number(&self) -> Option<f64> {
        Some(*self as f64)
    }
}

impl NumericInput for u64 {
    fn to_number(&self) -> Option<f64> {
        Some(*self as f64)
    }
}

/// Accepts `1234.56` and, when there is no dot, the comma form `1234,56`.
impl NumericInput for &str {
    fn to_number(&self) -> Option<f64> {
        let trimmed = self.trim();
        if trimmed.is_empty() {
            return None;
        }
        let normalized = if trimmed.contains('.') {
            trimmed.to_string()
        } else {
            trimmed.replace(',', ".")
        };
        normalized.parse::<f64>().ok().filter(|n| n.is_finite())
    }
}

/// pt-BR grouping: `.` between thousands, `,` before decimals.
fn group(value: f64, decimals: usize) -> String {
    let fixed = format!("{:.*}", decimals, value.abs());
    let (integer, fraction) = fixed.split_once('.').unwrap_or((fixed.as_str(), ""));

    let mut grouped = String::with_capacity(integer.len() + integer.len() / 3);
    for (index, ch) in integer.chars().enumerate() {
        if index > 0 && (integer.len() - index) % 3 == 0 {
            grouped.push('.');
        }
        grouped.push(ch);
    }

    let negative = value < 0.0 && fixed.chars().any(|c| c.is_ascii_digit() && c != '0');
    let sign = if negative { "-" } else { "" };

    if fraction.is_empty() {
        format!("{sign}{grouped}")
    } else {
        format!("{sign}{grouped},{fraction}")
    }
}

/// `R$ 1.234,56`
#[must_use]
pub fn format_currency(value: impl NumericInput) -> String {
    value.to_number().map_or_else(String::new, |n| {
        let body = group(n, 2);
        match body.strip_prefix('-') {
            Some(abs) => format!("-R$ {abs}"),
            None => format!("R$ {body}"),
        }
    })
}

/// `1.234,57` with a fixed number of decimals.
#[must_use]
pub fn format_number(value: impl NumericInput, decimals: usize) -> String {
    value
        .to_number()
        .map_or_else(String::new, |n| group(n, decimals))
}

/// `15,7%` for the ratio `0.157`.
#[must_use]
pub fn format_percentage(value: impl NumericInput, decimals: usize) -> String {
    value
        .to_number()
        .map_or_else(String::new, |n| format!("{}%", group(n * 100.0, decimals)))
}

fn sao_paulo() -> Option<FixedOffset> {
    FixedOffset::east_opt(SAO_PAULO_OFFSET_SECS)
}

/// Parses RFC 3339 timestamps, `YYYY-MM-DD HH:MM:SS` (UTC) and plain dates
/// (midnight in São Paulo).
#[must_use]
pub fn parse_date(value: &str) -> Option<DateTime<Utc>> {
    let value = value.trim();
    if value.is_empty() {
        return None;
    }

    if let Ok(parsed) = DateTime::parse_from_rfc3339(value) {
        return Some(parsed.with_timezone(&Utc));
    }

    for pattern in ["%Y-%m-%d %H:%M:%S", "%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%dT%H:%M:%S"] {
        if let Ok(naive) = NaiveDateTime::parse_from_str(value, pattern) {
            return Some(naive.and_utc());
        }
    }

    let date = NaiveDate::parse_from_str(value, "%Y-%m-%d").ok()?;
    let midnight = date.and_hms_opt(0, 0, 0)?;
    sao_paulo()?
        .from_local_datetime(&midnight)
        .single()
        .map(|local| local.with_timezone(&Utc))
}

/// `15/01/2024`, or `15/01/2024, 10:30` with `include_time`, in São Paulo time.
#[must_use]
pub fn format_date(value: &str, include_time: bool) -> String {
    parse_date(value).map_or_else(String::new, |date| format_datetime(date, include_time))
}

#[must_use]
pub fn format_datetime(date: DateTime<Utc>, include_time: bool) -> String {
    let Some(offset) = sao_paulo() else {
        return String::new();
    };
    let local = date.with_timezone(&offset);
    if include_time {
        local.format("%d/%m/%Y, %H:%M").to_string()
    } else {
        local.format("%d/%m/%Y").to_string()
    }
}

fn plural(count: i64, singular: &str, plural: &str) -> String {
    if count == 1 {
        format!("há 1 {singular}")
    } else {
        format!("há {count} {plural}")
    }
}

/// "agora", "há 5 minutos", "há 1 hora", "há 3 dias", then the plain date
/// once a week has passed.
#[must_use]
pub fn format_relative_date(value: &str, now: DateTime<Utc>) -> String {
    let Some(date) = parse_date(value) else {
        return String::new();
    };

    let seconds = (now - date).num_seconds();
    match seconds {
        s if s < 60 => "agora".to_string(),
        s if s < 3_600 => plural(s / 60, "minuto", "minutos"),
        s if s < 86_400 => plural(s / 3_600, "hora", "horas"),
        s if s < 7 * 86_400 => plural(s / 86_400, "dia", "dias"),
        _ => format_datetime(date, false),
    }
}

/// `maria DA silva` becomes `Maria da Silva`.
#[must_use]
pub fn capitalize_name(name: &str) -> String {
    name.split_whitespace()
        .enumerate()
        .map(|(index, word)| {
            let lower = word.to_lowercase();
            if index > 0 && NAME_PARTICLES.contains(&lower.as_str()) {
                return lower;
            }
            let mut chars = lower.chars();
            chars.next().map_or_else(String::new, |first| {
                first.to_uppercase().chain(chars).collect()
            })
        })
        .collect::<Vec<_>>()
        .join(" ")
}

/// Collapses whitespace and drops anything that is not a letter, digit,
/// `_`, `-`, `.` or `@`.
#[must_use]
pub fn clean_text(text: &str) -> String {
    text.split_whitespace()
        .map(|word| {
            word.chars()
                .filter(|c| c.is_alphanumeric() || matches!(c, '_' | '-' | '.' | '@'))
                .collect::<String>()
        })
        .filter(|word| !word.is_empty())
        .collect::<Vec<_>>()
        .join(" ")
}

/// Up to two initials: `Ana Souza` gives `AS`.
#[must_use]
pub fn initials(name: &str) -> String {
    name.split_whitespace()
        .filter_map(|word| word.chars().next())
        .flat_map(char::to_uppercase)
        .take(2)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    #[test]
    fn cpf_progressive_mask() {
        assert_eq!(format_cpf(""), "");
        assert_eq!(format_cpf("111"), "111");
        assert_eq!(format_cpf("1114"), "111.4");
        assert_eq!(format_cpf("1114447"), "111.444.7");
        assert_eq!(format_cpf("1114447773"), "111.444.777-3");
        assert_eq!(format_cpf("11144477735"), "111.444.777-35");
        assert_eq!(format_cpf("111444777359999"), "111.444.777-35");
        assert_eq!(format_cpf("abc"), "");
    }

    #[test]
    fn cnpj_progressive_mask() {
        assert_eq!(format_cnpj("11"), "11");
        assert_eq!(format_cnpj("112"), "11.2");
        assert_eq!(format_cnpj("112223"), "11.222.3");
        assert_eq!(format_cnpj("112223330001"), "11.222.333/0001");
        assert_eq!(format_cnpj("11222333000181"), "11.222.333/0001-81");
    }

    #[test]
    fn phone_mask_for_landline_and_mobile() {
        assert_eq!(format_phone("11"), "11");
        assert_eq!(format_phone("119"), "(11) 9");
        assert_eq!(format_phone("1134567"), "(11) 34567");
        assert_eq!(format_phone("11345678"), "(11) 3456-78");
        assert_eq!(format_phone("1134567890"), "(11) 3456-7890");
        assert_eq!(format_phone("11987654321"), "(11) 98765-4321");
    }

    #[test]
    fn cep_mask() {
        assert_eq!(format_cep("01310"), "01310");
        assert_eq!(format_cep("01310100"), "01310-100");
    }

    #[test]
    fn masks_are_idempotent() {
        let inputs = ["1", "1114", "1114447", "11144477735", "123.456.78"];
        for input in inputs {
            let once = format_cpf(input);
            assert_eq!(format_cpf(&remove_document_formatting(&once)), once);
            assert_eq!(format_cpf(&once), once);
        }

        for input in ["112", "11222333", "11222333000181"] {
            let once = format_cnpj(input);
            assert_eq!(format_cnpj(&once), once);
        }

        for input in ["119", "1134567", "1134567890", "11987654321"] {
            let once = format_phone(input);
            assert_eq!(format_phone(&once), once);
        }
    }

    #[test]
    fn currency_and_numbers_use_pt_br_separators() {
        assert_eq!(format_currency(1234.56), "R$ 1.234,56");
        assert_eq!(format_currency(0.5), "R$ 0,50");
        assert_eq!(format_currency(-1_000_000.0), "-R$ 1.000.000,00");
        assert_eq!(format_currency("1234,5"), "R$ 1.234,50");
        assert_eq!(format_currency("abc"), "");
        assert_eq!(format_currency(f64::NAN), "");

        assert_eq!(format_number(1234.567, 2), "1.234,57");
        assert_eq!(format_number(999_i64, 0), "999");
        assert_eq!(format_number(1_000_u64, 0), "1.000");

        assert_eq!(format_percentage(0.157, 1), "15,7%");
        assert_eq!(format_percentage(1_i64, 0), "100%");
        assert_eq!(format_percentage("0,5", 1), "50,0%");
        assert_eq!(format_percentage(-0.0425, 2), "-4,25%");
    }

    #[test]
    fn negative_zero_has_no_sign() {
        assert_eq!(format_number(-0.001, 2), "0,00");
    }

    #[test]
    fn dates_in_sao_paulo() {
        assert_eq!(format_date("2024-01-15T13:30:00Z", false), "15/01/2024");
        assert_eq!(format_date("2024-01-15T13:30:00Z", true), "15/01/2024, 10:30");
        assert_eq!(format_date("2024-01-15T01:00:00Z", false), "14/01/2024");
        assert_eq!(format_date("2024-01-15", false), "15/01/2024");
        assert_eq!(format_date("not a date", false), "");
    }

    #[test]
    fn relative_dates() {
        let now = Utc::now();
        let at = |delta: Duration| (now - delta).to_rfc3339();

        assert_eq!(format_relative_date(&at(Duration::seconds(10)), now), "agora");
        assert_eq!(
            format_relative_date(&at(Duration::minutes(1)), now),
            "há 1 minuto"
        );
        assert_eq!(
            format_relative_date(&at(Duration::minutes(5)), now),
            "há 5 minutos"
        );
        assert_eq!(
            format_relative_date(&at(Duration::hours(2)), now),
            "há 2 horas"
        );
        assert_eq!(format_relative_date(&at(Duration::days(1)), now), "há 1 dia");
        assert_eq!(
            format_relative_date(&at(Duration::days(8)), now),
            format_datetime(now - Duration::days(8), false)
        );
        assert_eq!(format_relative_date("", now), "");
    }

    #[test]
    fn names_and_text() {
        assert_eq!(capitalize_name("maria DA silva"), "Maria da Silva");
        assert_eq!(capitalize_name("  joão   dos  santos e souza "), "João dos Santos e Souza");
        assert_eq!(capitalize_name("da costa"), "Da Costa");

        assert_eq!(clean_text("  olá,   mundo!  <b>x</b> "), "olá mundo bxb");
        assert_eq!(clean_text("a@b.co   x-y_z"), "a@b.co x-y_z");

        assert_eq!(initials("Ana Souza Lima"), "AS");
        assert_eq!(initials("ana"), "A");
        assert_eq!(initials(""), "");
    }
}
