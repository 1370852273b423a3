use clap::{Arg, ArgAction, ArgMatches, Command};
use secrecy::SecretString;

pub const ARG_EMAIL: &str = "email";
pub const ARG_PASSWORD: &str = "password";
pub const ARG_FIRST_NAME: &str = "first-name";
pub const ARG_LAST_NAME: &str = "last-name";
pub const ARG_CPF: &str = "cpf";
pub const ARG_PHONE: &str = "telefone";
pub const ARG_PROTECTED: &str = "protected";
pub const ARG_REFRESH: &str = "refresh";

fn email_arg() -> Arg {
    Arg::new(ARG_EMAIL)
        .long(ARG_EMAIL)
        .help("Account e-mail")
        .required(true)
}

fn password_arg() -> Arg {
    Arg::new(ARG_PASSWORD)
        .long(ARG_PASSWORD)
        .help("Account password")
        .env("MULTIBPO_PASSWORD")
        .hide_env_values(true)
        .required(true)
}

#[must_use]
pub fn login() -> Command {
    Command::new("login")
        .about("Authenticate and store the session")
        .arg(email_arg())
        .arg(password_arg())
}

#[must_use]
pub fn register() -> Command {
    Command::new("register")
        .about("Create an account and store the session")
        .arg(
            Arg::new(ARG_FIRST_NAME)
                .long(ARG_FIRST_NAME)
                .help("First name")
                .required(true),
        )
        .arg(
            Arg::new(ARG_LAST_NAME)
                .long(ARG_LAST_NAME)
                .help("Last name")
                .required(true),
        )
        .arg(email_arg())
        .arg(password_arg())
        .arg(Arg::new(ARG_CPF).long(ARG_CPF).help("CPF, formatted or not"))
        .arg(
            Arg::new(ARG_PHONE)
                .long(ARG_PHONE)
                .help("Phone number, formatted or not"),
        )
}

#[must_use]
pub fn profile() -> Command {
    Command::new("profile").about("Show the profile of the stored session")
}

#[must_use]
pub fn logout() -> Command {
    Command::new("logout").about("Revoke the refresh token and clear the stored session")
}

#[must_use]
pub fn status() -> Command {
    Command::new("status")
        .about("Show the stored session and token expiry")
        .arg(
            Arg::new(ARG_REFRESH)
                .long(ARG_REFRESH)
                .help("Refresh the access token when it is expired or about to expire")
                .action(ArgAction::SetTrue),
        )
}

#[must_use]
pub fn test() -> Command {
    Command::new("test")
        .about("Check that the backend answers")
        .arg(
            Arg::new(ARG_PROTECTED)
                .long(ARG_PROTECTED)
                .help("Call the protected endpoint with the stored session")
                .action(ArgAction::SetTrue),
        )
}

#[derive(Debug)]
pub struct Credentials {
    pub email: String,
    pub password: SecretString,
}

impl Credentials {
    /// # Errors
    /// Returns an error if e-mail or password are missing or blank.
    pub fn parse(matches: &ArgMatches) -> anyhow::Result<Self> {
        Ok(Self {
            email: read_required(matches, ARG_EMAIL)?,
            password: SecretString::from(read_required(matches, ARG_PASSWORD)?),
        })
    }
}

#[derive(Debug)]
pub struct Registration {
    pub first_name: String,
    pub last_name: String,
    pub credentials: Credentials,
    pub cpf: Option<String>,
    pub telefone: Option<String>,
}

impl Registration {
    /// # Errors
    /// Returns an error if a required field is missing or blank.
    pub fn parse(matches: &ArgMatches) -> anyhow::Result<Self> {
        let optional = |id: &str| {
            matches
                .get_one::<String>(id)
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
        };

        Ok(Self {
            first_name: read_required(matches, ARG_FIRST_NAME)?,
            last_name: read_required(matches, ARG_LAST_NAME)?,
            credentials: Credentials::parse(matches)?,
            cpf: optional(ARG_CPF),
            telefone: optional(ARG_PHONE),
        })
    }
}

fn read_required(matches: &ArgMatches, id: &str) -> anyhow::Result<String> {
    matches
        .get_one::<String>(id)
        .cloned()
        .filter(|v| !v.trim().is_empty())
        .ok_or_else(|| anyhow::anyhow!("missing required argument: --{id}"))
}
