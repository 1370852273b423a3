//! # MultiBPO client toolkit
//!
//! Client-side layer of the MultiBPO MVP: everything the web front end does
//! between the user and the REST API, expressed as plain Rust objects that run
//! on Tokio.
//!
//! - [`api::ApiClient`] sends authenticated requests, retries transient
//!   failures with exponential backoff and refreshes an expired access token
//!   once before giving up.
//! - [`errors::classify`] maps any failure to a fixed taxonomy with display
//!   metadata.
//! - [`notify::NotificationCenter`] keeps the toast stack: capacity eviction,
//!   auto-dismiss and pause on hover.
//! - [`guard::RouteGuard`] decides whether a path may be shown for the current
//!   session, polls token expiry and reacts to logouts made in other tabs.
//! - [`validate::FieldValidator`] runs debounced field rules (CPF, CNPJ, phone,
//!   email, password) and [`format`] holds the Brazilian display formatters.
//!
//! ## Trust model
//!
//! Access tokens are decoded without verifying their signature. The decoded
//! `exp` claim only drives UX decisions (redirects and preemptive refresh);
//! every authorization decision belongs to the API.
//!
//! ## Browser seams
//!
//! Local storage, the toast container, form fields and the location bar are
//! traits ([`session::Storage`], [`notify::ToastRenderer`],
//! [`validate::FormHost`], [`guard::Navigator`]). In-memory implementations
//! ship with the crate and the CLI persists the session to a JSON file.

pub mod api;
pub mod cli;
pub mod config;
pub mod context;
pub mod errors;
pub mod format;
pub mod guard;
pub mod notify;
pub mod session;
pub mod validate;

#[allow(clippy::doc_markdown, clippy::needless_raw_string_hashes)]
pub mod built_info {
    include!(concat!(env!("OUT_DIR"), "/built.rs"));
}

pub const GIT_COMMIT_HASH: &str = match built_info::GIT_COMMIT_HASH {
    Some(hash) => hash,
    None => "unknown",
};

pub const APP_USER_AGENT: &str = concat!(env!("CARGO_PKG_NAME"), "/", env!("CARGO_PKG_VERSION"),);
