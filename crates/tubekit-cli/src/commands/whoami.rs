//! Whoami command implementation.

use anyhow::{Result, bail};
use clap::Args;

use crate::commands::SESSION_EXPIRED;
use crate::context::CliContext;
use crate::output;

#[derive(Args, Debug)]
pub struct WhoamiArgs {
    /// Print the full user record as JSON
    #[arg(long)]
    pub json: bool,
}

pub async fn run(ctx: &CliContext, args: WhoamiArgs) -> Result<()> {
    if !ctx.client.has_session() {
        bail!("No active session. Run 'tubekit login' first.");
    }

    let Some(user) = ctx.session.bootstrap().await else {
        if ctx.client.has_session() {
            bail!("Could not verify the session; stored tokens were kept. Is the API reachable?");
        }
        bail!(SESSION_EXPIRED);
    };

    if args.json {
        return output::json_pretty(&user);
    }

    output::field("User", &user.username);
    output::field("ID", &user.id);
    if let Some(role) = &user.role {
        output::field("Role", role);
    }
    output::field("Verified", if user.is_verified() { "yes" } else { "no" });

    Ok(())
}
