use anyhow::Result;
use tracing::Level;
use tracing_subscriber::{fmt, layer::SubscriberExt, EnvFilter, Registry};

/// Initialize logging. `RUST_LOG` directives are applied on top of the
/// verbosity level.
///
/// # Errors
///
/// Returns an error if a filter directive is invalid or a global subscriber
/// is already set
pub fn init(verbosity_level: Option<Level>) -> Result<()> {
    let verbosity_level = verbosity_level.unwrap_or(Level::ERROR);

    let fmt_layer = fmt::layer()
        .with_writer(std::io::stderr)
        .with_file(false)
        .with_line_number(false)
        .with_thread_ids(false)
        .with_thread_names(false)
        .with_target(false);

    let subscriber = Registry::default().with(fmt_layer).with(filter(verbosity_level)?);
    tracing::subscriber::set_global_default(subscriber)?;

    Ok(())
}

fn filter(level: Level) -> Result<EnvFilter> {
    Ok(EnvFilter::builder()
        .with_default_directive(level.into())
        .from_env_lossy()
        .add_directive("hyper=error".parse()?)
        .add_directive("hyper_util=error".parse()?)
        .add_directive("reqwest=warn".parse()?))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn filter_keeps_requested_level() -> Result<()> {
        temp_env::with_vars([("RUST_LOG", None::<&str>)], || {
            let filter = filter(Level::DEBUG)?;
            let rendered = filter.to_string();
            assert!(rendered.contains("debug"), "{rendered}");
            assert!(rendered.contains("hyper=error"), "{rendered}");
            Ok(())
        })
    }
}
