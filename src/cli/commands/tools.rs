use clap::{Arg, ArgAction, Command};

pub const ARG_PATH: &str = "path";
pub const ARG_KIND: &str = "kind";
pub const ARG_VALUE: &str = "value";
pub const ARG_DECIMALS: &str = "decimals";
pub const ARG_TIME: &str = "time";

pub const VALIDATE_KINDS: [&str; 7] = ["cpf", "cnpj", "document", "email", "phone", "cep", "password"];

pub const FORMAT_KINDS: [&str; 12] = [
    "cpf",
    "cnpj",
    "phone",
    "cep",
    "currency",
    "number",
    "percentage",
    "date",
    "relative-date",
    "name",
    "initials",
    "text",
];

#[must_use]
pub fn route() -> Command {
    Command::new("route")
        .about("Check whether the stored session may open a route")
        .arg(
            Arg::new(ARG_PATH)
                .help("Route path, e.g. /dashboard")
                .required(true),
        )
}

#[must_use]
pub fn validate() -> Command {
    Command::new("validate")
        .about("Validate a Brazilian document, e-mail, phone, CEP or password")
        .arg(
            Arg::new(ARG_KIND)
                .help("What the value is")
                .required(true)
                .value_parser(VALIDATE_KINDS),
        )
        .arg(Arg::new(ARG_VALUE).help("Value to check").required(true))
}

#[must_use]
pub fn format() -> Command {
    Command::new("format")
        .about("Format a value for display")
        .arg(
            Arg::new(ARG_KIND)
                .help("How to format the value")
                .required(true)
                .value_parser(FORMAT_KINDS),
        )
        .arg(
            Arg::new(ARG_VALUE)
                .help("Value to format")
                .required(true)
                .allow_negative_numbers(true),
        )
        .arg(
            Arg::new(ARG_DECIMALS)
                .long(ARG_DECIMALS)
                .help("Decimal places for number and percentage")
                .default_value("2")
                .value_parser(clap::value_parser!(usize)),
        )
        .arg(
            Arg::new(ARG_TIME)
                .long(ARG_TIME)
                .help("Include the time when formatting a date")
                .action(ArgAction::SetTrue),
        )
}
