//! Wiring of the session layer for one CLI invocation.

use std::fs;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use directories::ProjectDirs;

use tubekit_core::ApiBaseUrl;
use tubekit_http::{ApiClient, ClientConfig, Session};
use tubekit_store::FileTokenStore;

use crate::cli::GlobalArgs;
use crate::navigator::TerminalNavigator;

/// The client and session shared by a command.
pub struct CliContext {
    pub client: ApiClient,
    pub session: Session,
    pub token_path: PathBuf,
}

impl CliContext {
    pub fn open(global: &GlobalArgs) -> Result<Self> {
        let api_url = global
            .api_url
            .as_deref()
            .context("No API URL. Pass --api-url or set TUBEKIT_API_URL.")?;
        let base_url = ApiBaseUrl::new(api_url).context("Invalid API URL")?;

        let mut config = ClientConfig::new(base_url);
        if let Some(secs) = global.timeout {
            config = config.with_timeout(Duration::from_secs(secs));
        }

        let token_path = token_path(global)?;
        let store = Arc::new(FileTokenStore::open(&token_path));
        let client = ApiClient::new(config, store).context("Failed to create HTTP client")?;
        let session = Session::new(client.clone(), Arc::new(TerminalNavigator));

        Ok(Self {
            client,
            session,
            token_path,
        })
    }
}

/// Get the token file path.
fn token_path(global: &GlobalArgs) -> Result<PathBuf> {
    if let Some(path) = &global.token_file {
        return Ok(path.clone());
    }

    let dirs =
        ProjectDirs::from("", "", "tubekit").context("Could not determine data directory")?;

    let data_dir = dirs.data_dir();
    fs::create_dir_all(data_dir).context("Failed to create data directory")?;

    Ok(data_dir.join("tokens.json"))
}
