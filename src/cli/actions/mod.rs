pub mod document;
pub mod route;
pub mod session;

// Internal "interpreter" for `Action`.
// We keep the match in a separate module so `mod.rs` stays small as more actions are added.
mod run;

use crate::cli::globals::GlobalArgs;

#[derive(Debug)]
pub enum Action {
    Login(session::Login),
    Register(session::Register),
    Profile(GlobalArgs),
    Logout(GlobalArgs),
    Status { globals: GlobalArgs, refresh: bool },
    Test { globals: GlobalArgs, protected: bool },
    Route(route::Args),
    Validate(document::Check),
    Format(document::Format),
}

impl Action {
    /// Execute the action.
    /// # Errors
    /// Returns an error if the action fails.
    pub async fn execute(self) -> anyhow::Result<()> {
        run::execute(self).await
    }
}
