//! `livevoice url`

use anyhow::{Context, Result};

use crate::parser::GatewayArgs;

/// Print the WebSocket URL the current options resolve to.
pub fn execute(args: &GatewayArgs) -> Result<()> {
    let url = args.ws_url().context("Invalid gateway configuration")?;
    println!("{url}");
    Ok(())
}
