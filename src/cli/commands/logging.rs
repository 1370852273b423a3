use clap::{builder::ValueParser, Arg, ArgAction, Command};

pub const ARG_VERBOSITY: &str = "verbosity";

/// Level names accepted by `MULTIBPO_LOG_LEVEL`, indexed by verbosity count.
const LEVELS: [&str; 5] = ["error", "warn", "info", "debug", "trace"];

/// Counts saturate: `-vvvvvv` is as verbose as `-vvvv`.
const MAX_COUNT: u8 = 5;

/// `MULTIBPO_LOG_LEVEL` takes a level name or a count; `-v` runs through here
/// with its count as well.
fn parse_level(level: &str) -> Result<u8, String> {
    let level = level.trim().to_ascii_lowercase();
    if let Ok(count) = level.parse::<u8>() {
        return Ok(count.min(MAX_COUNT));
    }

    let level = if level == "warning" { "warn" } else { level.as_str() };
    LEVELS
        .iter()
        .position(|name| *name == level)
        .and_then(|index| u8::try_from(index).ok())
        .ok_or_else(|| format!("invalid log level: {level} (expected one of {})", LEVELS.join(", ")))
}

#[must_use]
pub fn validator_log_level() -> ValueParser {
    ValueParser::from(parse_level)
}

#[must_use]
pub fn with_args(command: Command) -> Command {
    command.arg(
        Arg::new(ARG_VERBOSITY)
            .short('v')
            .long("verbose")
            .help("Verbosity level: ERROR, WARN, INFO, DEBUG, TRACE (default: ERROR)")
            .env("MULTIBPO_LOG_LEVEL")
            .global(true)
            .action(ArgAction::Count)
            .value_parser(validator_log_level()),
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn names_and_counts() {
        assert_eq!(parse_level("error"), Ok(0));
        assert_eq!(parse_level(" WARNING "), Ok(1));
        assert_eq!(parse_level("Trace"), Ok(4));
        assert_eq!(parse_level("5"), Ok(5));
        assert_eq!(parse_level("6"), Ok(5));
        assert_eq!(parse_level("255"), Ok(5));
        assert!(parse_level("verbose").is_err());
    }
}
