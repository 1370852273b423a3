pub mod account;
pub mod client;
pub mod logging;
pub mod tools;

use clap::{
    builder::styling::{AnsiColor, Effects, Styles},
    ColorChoice, Command,
};

#[must_use]
pub fn new() -> Command {
    let styles = Styles::styled()
        .header(AnsiColor::Yellow.on_default() | Effects::BOLD)
        .usage(AnsiColor::Green.on_default() | Effects::BOLD)
        .literal(AnsiColor::Blue.on_default() | Effects::BOLD)
        .placeholder(AnsiColor::Green.on_default());

    let long_version: &'static str = Box::leak(
        format!("{} - {}", env!("CARGO_PKG_VERSION"), crate::GIT_COMMIT_HASH).into_boxed_str(),
    );

    let command = Command::new("multibpo")
        .about("MultiBPO API client")
        .version(env!("CARGO_PKG_VERSION"))
        .long_version(long_version)
        .color(ColorChoice::Auto)
        .styles(styles)
        .subcommand_required(true)
        .arg_required_else_help(true)
        .subcommand(account::login())
        .subcommand(account::register())
        .subcommand(account::profile())
        .subcommand(account::logout())
        .subcommand(account::status())
        .subcommand(account::test())
        .subcommand(tools::route())
        .subcommand(tools::validate())
        .subcommand(tools::format());

    let command = client::with_args(command);

    logging::with_args(command)
}
