use super::{document, route, session, Action};

pub(super) async fn execute(action: Action) -> anyhow::Result<()> {
    match action {
        Action::Login(args) => session::login(args).await,
        Action::Register(args) => session::register(args).await,
        Action::Profile(globals) => session::profile(globals).await,
        Action::Logout(globals) => session::logout(globals).await,
        Action::Status { globals, refresh } => session::status(globals, refresh).await,
        Action::Test { globals, protected } => session::test(globals, protected).await,
        Action::Route(args) => route::execute(args).await,
        Action::Validate(args) => document::validate(&args),
        Action::Format(args) => document::format(&args),
    }
}
