//! Command implementations.

pub mod login;
pub mod logout;
pub mod request;
pub mod whoami;

use anyhow::{Result, anyhow};

use crate::cli::{Commands, GlobalArgs};
use crate::context::CliContext;

/// The one message shown when the stored session can no longer be used.
pub const SESSION_EXPIRED: &str = "Session expired. Run 'tubekit login' to sign in again.";

pub async fn handle(global: GlobalArgs, command: Commands) -> Result<()> {
    let ctx = CliContext::open(&global)?;

    let result = match command {
        Commands::Login(args) => login::run(&ctx, args).await,
        Commands::Logout(args) => logout::run(&ctx, args).await,
        Commands::Whoami(args) => whoami::run(&ctx, args).await,
        Commands::Request(args) => request::run(&ctx, args).await,
    };

    result.map_err(|err| match err.downcast_ref::<tubekit_core::Error>() {
        Some(api_err) if api_err.is_session_expired() => anyhow!(SESSION_EXPIRED),
        _ => err,
    })
}
