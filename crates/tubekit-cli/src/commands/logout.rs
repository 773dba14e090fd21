//! Logout command implementation.

use anyhow::{Context, Result};
use clap::Args;

use crate::context::CliContext;
use crate::output;

#[derive(Args, Debug)]
pub struct LogoutArgs {}

pub async fn run(ctx: &CliContext, _args: LogoutArgs) -> Result<()> {
    ctx.session
        .logout()
        .await
        .context("Failed to remove stored tokens")?;

    output::success("Logged out");
    Ok(())
}
