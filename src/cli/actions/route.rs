use crate::{cli::globals::GlobalArgs, guard::EnforceOptions};
use anyhow::{bail, Result};

#[derive(Debug)]
pub struct Args {
    pub globals: GlobalArgs,
    pub path: String,
}

/// Runs the guard against `path` without navigating. A denial is reported
/// as an error naming the redirect target.
///
/// # Errors
/// Returns an error if access is denied or the context cannot be built.
pub async fn execute(args: Args) -> Result<()> {
    let context = args.globals.context(&args.path)?;
    let allowed = context
        .guard
        .enforce_current_route(EnforceOptions {
            prevent_redirect: true,
            redirect_delay: None,
        })
        .await;

    let rule = context.guard.routes().lookup(&args.path);
    if allowed {
        println!("{}: acesso permitido ({:?})", args.path, rule.protection);
        Ok(())
    } else {
        bail!("{}: acesso negado, redirecionar para {}", args.path, rule.redirect_target())
    }
}
