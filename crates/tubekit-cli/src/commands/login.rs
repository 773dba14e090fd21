//! Login command implementation.

use anyhow::{Context, Result};
use clap::Args;
use colored::Colorize;

use tubekit_core::Credentials;

use crate::context::CliContext;
use crate::output;

#[derive(Args, Debug)]
pub struct LoginArgs {
    /// Username or email to authenticate with
    #[arg(long)]
    pub identifier: String,

    /// Account password
    #[arg(long, env = "TUBEKIT_PASSWORD", hide_env_values = true)]
    pub password: String,
}

pub async fn run(ctx: &CliContext, args: LoginArgs) -> Result<()> {
    let credentials = Credentials::new(&args.identifier, &args.password);

    eprintln!("{}", "Logging in...".dimmed());

    let user = ctx
        .session
        .login(credentials)
        .await
        .context("Failed to login")?;

    output::success("Logged in successfully");
    println!();
    output::field("User", &user.username);
    output::field("ID", &user.id);
    if let Some(role) = &user.role {
        output::field("Role", role);
    }
    output::field("Tokens", &ctx.token_path.display().to_string());

    Ok(())
}
