//! Maps validated CLI matches to an [`Action`].

use crate::cli::{
    actions::{document, route, session, Action},
    commands::{account, client, logging, tools},
    globals::GlobalArgs,
};
use anyhow::{bail, Context, Result};
use clap::ArgMatches;
use url::Url;

/// `-vvv`, or `MULTIBPO_LOG_LEVEL=debug`, also logs every request.
const DEBUG_VERBOSITY: u8 = 3;

/// Map validated CLI matches to an action.
///
/// # Errors
/// Returns an error if required arguments are missing or inconsistent.
pub fn handler(matches: &ArgMatches) -> Result<Action> {
    let (name, sub) = matches
        .subcommand()
        .context("missing required subcommand")?;

    match name {
        "validate" => return Ok(Action::Validate(check(sub)?)),
        "format" => return Ok(Action::Format(format(sub)?)),
        _ => {}
    }

    let globals = globals(matches)?;

    Ok(match name {
        "login" => {
            let credentials = account::Credentials::parse(sub)?;
            Action::Login(session::Login {
                globals,
                email: credentials.email,
                password: credentials.password,
            })
        }
        "register" => {
            let registration = account::Registration::parse(sub)?;
            Action::Register(session::Register {
                globals,
                first_name: registration.first_name,
                last_name: registration.last_name,
                email: registration.credentials.email,
                password: registration.credentials.password,
                cpf: registration.cpf,
                telefone: registration.telefone,
            })
        }
        "profile" => Action::Profile(globals),
        "logout" => Action::Logout(globals),
        "status" => Action::Status {
            globals,
            refresh: sub.get_flag(account::ARG_REFRESH),
        },
        "test" => Action::Test {
            globals,
            protected: sub.get_flag(account::ARG_PROTECTED),
        },
        "route" => {
            let path = sub
                .get_one::<String>(tools::ARG_PATH)
                .cloned()
                .context("missing required argument: <path>")?;
            if !path.starts_with('/') {
                bail!("route path must start with '/': {path}");
            }
            Action::Route(route::Args { globals, path })
        }
        other => bail!("unknown subcommand: {other}"),
    })
}

fn globals(matches: &ArgMatches) -> Result<GlobalArgs> {
    let options = client::Options::parse(matches)?;

    let url = Url::parse(options.api_base_url.trim())
        .with_context(|| format!("invalid MULTIBPO_API_BASE_URL: {}", options.api_base_url))?;
    if !matches!(url.scheme(), "http" | "https") {
        bail!("MULTIBPO_API_BASE_URL must be http or https: {url}");
    }

    Ok(GlobalArgs {
        api_base_url: options.api_base_url,
        timeout: options.timeout,
        retry_attempts: options.retry_attempts,
        state_file: options.state_file,
        debug: matches
            .get_one::<u8>(logging::ARG_VERBOSITY)
            .is_some_and(|count| *count >= DEBUG_VERBOSITY),
    })
}

fn check(matches: &ArgMatches) -> Result<document::Check> {
    let kind = matches
        .get_one::<String>(tools::ARG_KIND)
        .context("missing required argument: <kind>")?;
    let value = matches
        .get_one::<String>(tools::ARG_VALUE)
        .cloned()
        .context("missing required argument: <value>")?;

    Ok(document::Check {
        kind: document::CheckKind::from_name(kind)
            .with_context(|| format!("unsupported kind: {kind}"))?,
        value,
    })
}

fn format(matches: &ArgMatches) -> Result<document::Format> {
    let kind = matches
        .get_one::<String>(tools::ARG_KIND)
        .context("missing required argument: <kind>")?;
    let value = matches
        .get_one::<String>(tools::ARG_VALUE)
        .cloned()
        .context("missing required argument: <value>")?;

    Ok(document::Format {
        kind: document::FormatKind::from_name(kind)
            .with_context(|| format!("unsupported kind: {kind}"))?,
        value,
        decimals: matches
            .get_one::<usize>(tools::ARG_DECIMALS)
            .copied()
            .unwrap_or(2),
        include_time: matches.get_flag(tools::ARG_TIME),
    })
}
