use std::path::{Path, PathBuf};
use std::process::{Command, Output};

use tempfile::TempDir;

/// Isolated token file location for one test.
pub struct TestHome {
    _dir: TempDir,
    pub token_file: PathBuf,
}

impl TestHome {
    pub fn new() -> Self {
        let dir = TempDir::new().unwrap();
        let token_file = dir.path().join("tokens.json");
        Self {
            _dir: dir,
            token_file,
        }
    }

    /// Write a token pair as a previous login would have.
    pub fn seed_tokens(&self, access: &str, refresh: &str) {
        let json = serde_json::json!({"accessToken": access, "refreshToken": refresh});
        std::fs::write(&self.token_file, json.to_string()).unwrap();
    }

    /// Read back the stored pair, if any.
    pub fn stored_tokens(&self) -> Option<(String, String)> {
        let json = std::fs::read_to_string(&self.token_file).ok()?;
        let value: serde_json::Value = serde_json::from_str(&json).ok()?;
        Some((
            value["accessToken"].as_str()?.to_string(),
            value["refreshToken"].as_str()?.to_string(),
        ))
    }
}

/// Run the CLI binary against `api_url` with tokens kept at `token_file`.
pub fn run_cli_with_env(args: &[&str], token_file: &Path, api_url: &str) -> Output {
    let mut cmd = Command::new(env!("CARGO_BIN_EXE_tubekit"));
    cmd.args(args);
    cmd.env("TUBEKIT_API_URL", api_url);
    cmd.env("TUBEKIT_TOKEN_FILE", token_file);
    cmd.env_remove("TUBEKIT_PASSWORD");
    cmd.env_remove("TUBEKIT_TIMEOUT_SECS");
    cmd.env_remove("RUST_LOG");
    cmd.env("NO_COLOR", "1");
    cmd.output().expect("Failed to execute CLI")
}

/// Run the CLI off the async runtime so the mock server keeps serving.
pub async fn run_cli(args: &[&str], home: &TestHome, api_url: &str) -> Output {
    let args: Vec<String> = args.iter().map(|s| s.to_string()).collect();
    let token_file = home.token_file.clone();
    let api_url = api_url.to_string();

    tokio::task::spawn_blocking(move || {
        let args: Vec<&str> = args.iter().map(String::as_str).collect();
        run_cli_with_env(&args, &token_file, &api_url)
    })
    .await
    .unwrap()
}

pub fn stdout(output: &Output) -> String {
    String::from_utf8_lossy(&output.stdout).to_string()
}

pub fn stderr(output: &Output) -> String {
    String::from_utf8_lossy(&output.stderr).to_string()
}
