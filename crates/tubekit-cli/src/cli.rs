//! CLI argument definitions.

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

use crate::commands::{login, logout, request, whoami};

/// Command-line client for a tubekit video platform API.
#[derive(Parser, Debug)]
#[command(name = "tubekit")]
#[command(author, version = env!("TUBEKIT_VERSION"), about, long_about = None)]
pub struct Cli {
    /// Increase verbosity (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Output logs as JSON
    #[arg(long, global = true)]
    pub json_logs: bool,

    #[command(flatten)]
    pub global: GlobalArgs,

    #[command(subcommand)]
    pub command: Commands,
}

/// Options shared by every command.
#[derive(Args, Debug, Clone)]
pub struct GlobalArgs {
    /// API base URL
    #[arg(long, env = "TUBEKIT_API_URL", global = true)]
    pub api_url: Option<String>,

    /// Where tokens are kept between runs
    #[arg(long, env = "TUBEKIT_TOKEN_FILE", global = true)]
    pub token_file: Option<PathBuf>,

    /// Request timeout in seconds
    #[arg(long, env = "TUBEKIT_TIMEOUT_SECS", global = true)]
    pub timeout: Option<u64>,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Log in and store the session tokens
    Login(login::LoginArgs),

    /// End the session and forget the stored tokens
    Logout(logout::LogoutArgs),

    /// Display the logged-in user
    Whoami(whoami::WhoamiArgs),

    /// Send an authenticated request and print the response body
    Request(request::RequestArgs),
}
