use crate::config::DEFAULT_API_BASE_URL;
use clap::{Arg, ArgMatches, Command};
use std::{path::PathBuf, time::Duration};

pub const ARG_API_BASE_URL: &str = "api-base-url";
pub const ARG_TIMEOUT: &str = "timeout";
pub const ARG_RETRY_ATTEMPTS: &str = "retry-attempts";
pub const ARG_STATE_FILE: &str = "state-file";

#[derive(Debug)]
pub struct Options {
    pub api_base_url: String,
    pub timeout: Duration,
    pub retry_attempts: u32,
    pub state_file: PathBuf,
}

impl Options {
    /// Parse API client arguments from matches.
    ///
    /// # Errors
    /// Returns an error if required arguments are missing.
    pub fn parse(matches: &ArgMatches) -> anyhow::Result<Self> {
        let api_base_url = matches
            .get_one::<String>(ARG_API_BASE_URL)
            .cloned()
            .filter(|v| !v.trim().is_empty())
            .ok_or_else(|| anyhow::anyhow!("missing required argument: --{ARG_API_BASE_URL}"))?;

        let state_file = matches
            .get_one::<String>(ARG_STATE_FILE)
            .filter(|v| !v.trim().is_empty())
            .map(PathBuf::from)
            .ok_or_else(|| anyhow::anyhow!("missing required argument: --{ARG_STATE_FILE}"))?;

        Ok(Self {
            api_base_url,
            timeout: Duration::from_secs(matches.get_one::<u64>(ARG_TIMEOUT).copied().unwrap_or(30)),
            retry_attempts: matches
                .get_one::<u32>(ARG_RETRY_ATTEMPTS)
                .copied()
                .unwrap_or(3),
            state_file,
        })
    }
}

#[must_use]
pub fn with_args(command: Command) -> Command {
    command
        .arg(
            Arg::new(ARG_API_BASE_URL)
                .long(ARG_API_BASE_URL)
                .help("Base URL of the MultiBPO API")
                .env("MULTIBPO_API_BASE_URL")
                .default_value(DEFAULT_API_BASE_URL)
                .global(true),
        )
        .arg(
            Arg::new(ARG_TIMEOUT)
                .long(ARG_TIMEOUT)
                .help("Request timeout in seconds")
                .env("MULTIBPO_TIMEOUT")
                .default_value("30")
                .global(true)
                .value_parser(clap::value_parser!(u64).range(1..)),
        )
        .arg(
            Arg::new(ARG_RETRY_ATTEMPTS)
                .long(ARG_RETRY_ATTEMPTS)
                .help("Sends per call, the first included, on network, timeout and 5xx failures")
                .env("MULTIBPO_RETRY_ATTEMPTS")
                .default_value("3")
                .global(true)
                .value_parser(clap::value_parser!(u32)),
        )
        .arg(
            Arg::new(ARG_STATE_FILE)
                .long(ARG_STATE_FILE)
                .help("File where the session is kept between runs")
                .env("MULTIBPO_STATE_FILE")
                .default_value(".multibpo-session.json")
                .global(true),
        )
}
