//! `livevoice` command-line client.
//!
//! `main.rs` is the composition root: it loads `.env`, installs logging,
//! parses [`Cli`] and dispatches to [`handlers`].

pub mod commands;
pub mod handlers;
pub mod parser;

pub use commands::Commands;
pub use parser::{Cli, GatewayArgs};
