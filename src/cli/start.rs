use crate::cli::{actions::Action, commands, dispatch, telemetry};
use anyhow::Result;
use clap::ArgMatches;
use tracing::Level;

/// Levels by `-v` count; no flag leaves the default of errors only.
const VERBOSITY: [Level; 4] = [Level::WARN, Level::INFO, Level::DEBUG, Level::TRACE];

fn verbosity_level(matches: &ArgMatches) -> Option<Level> {
    let count = matches
        .get_one::<u8>(commands::logging::ARG_VERBOSITY)
        .copied()
        .unwrap_or(0);

    match usize::from(count) {
        0 => None,
        n => Some(VERBOSITY[(n - 1).min(VERBOSITY.len() - 1)]),
    }
}

/// Parses the command line, sets up logging and returns the action to run.
///
/// # Errors
///
/// Returns an error if telemetry initialization or action dispatch fails
pub fn start() -> Result<Action> {
    let matches = commands::new().get_matches();

    telemetry::init(verbosity_level(&matches))?;

    dispatch::handler(&matches)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn level_for(args: &[&str]) -> Option<Level> {
        temp_env::with_vars([("MULTIBPO_LOG_LEVEL", None::<&str>)], || {
            match commands::new().try_get_matches_from(args.iter().copied()) {
                Ok(matches) => verbosity_level(&matches),
                Err(err) => panic!("{args:?} should parse: {err}"),
            }
        })
    }

    #[test]
    fn verbosity_levels() {
        assert_eq!(level_for(&["multibpo", "status"]), None);
        assert_eq!(level_for(&["multibpo", "-v", "status"]), Some(Level::WARN));
        assert_eq!(level_for(&["multibpo", "status", "-vv"]), Some(Level::INFO));
        assert_eq!(level_for(&["multibpo", "-vvv", "status"]), Some(Level::DEBUG));
        assert_eq!(level_for(&["multibpo", "-vvvvvv", "status"]), Some(Level::TRACE));
        assert_eq!(level_for(&["multibpo", "-vvvvvvvvvv", "status"]), Some(Level::TRACE));
    }

    #[test]
    fn env_level_sets_verbosity() {
        let level = temp_env::with_vars([("MULTIBPO_LOG_LEVEL", Some("debug"))], || {
            commands::new()
                .try_get_matches_from(["multibpo", "status"])
                .map(|matches| verbosity_level(&matches))
        });
        assert!(matches!(level, Ok(Some(Level::DEBUG))));
    }
}
