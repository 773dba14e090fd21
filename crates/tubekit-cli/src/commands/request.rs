//! Request command implementation.

use anyhow::{Context, Result, bail};
use clap::Args;
use tracing::debug;

use tubekit_http::{ApiResponse, CancelHandle, CancelSignal, Method, RequestOptions};

use crate::context::CliContext;
use crate::output;

#[derive(Args, Debug)]
pub struct RequestArgs {
    /// HTTP method (GET, POST, PUT, PATCH, DELETE)
    pub method: String,

    /// Path relative to the API URL, e.g. /videos/trending
    pub path: String,

    /// JSON request body
    #[arg(long)]
    pub data: Option<String>,

    /// Query parameter as key=value (repeatable)
    #[arg(long = "query", value_name = "KEY=VALUE")]
    pub query: Vec<String>,

    /// Extra header as "Name: value" (repeatable)
    #[arg(long = "header", value_name = "NAME: VALUE")]
    pub headers: Vec<String>,
}

pub async fn run(ctx: &CliContext, args: RequestArgs) -> Result<()> {
    let method = Method::from_bytes(args.method.to_ascii_uppercase().as_bytes())
        .with_context(|| format!("Invalid HTTP method: {}", args.method))?;

    let body = args
        .data
        .as_deref()
        .map(serde_json::from_str::<serde_json::Value>)
        .transpose()
        .context("--data is not valid JSON")?;

    let cancel = CancelHandle::new();
    let options = build_options(&args, cancel.signal())?;

    // Ctrl-C cancels the in-flight request
    let interrupt = tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            debug!("Interrupted, cancelling request");
            cancel.cancel();
        }
    });

    let result = ctx.client.send(method, &args.path, body, options).await;
    interrupt.abort();
    let response = result.context("Request failed")?;

    print_response(&response)
}

fn build_options(args: &RequestArgs, cancel: CancelSignal) -> Result<RequestOptions> {
    let mut options = RequestOptions::new().cancel_on(cancel);

    for pair in &args.query {
        let Some((key, value)) = pair.split_once('=') else {
            bail!("Query parameter must be KEY=VALUE, got '{pair}'");
        };
        options = options.query(key, value);
    }

    for header in &args.headers {
        let Some((name, value)) = header.split_once(':') else {
            bail!("Header must be 'Name: value', got '{header}'");
        };
        options = options
            .header(name.trim(), value.trim())
            .with_context(|| format!("Invalid header '{header}'"))?;
    }

    Ok(options)
}

fn print_response(response: &ApiResponse) -> Result<()> {
    if response.body().is_empty() {
        output::success(&format!("{}", response.status()));
        return Ok(());
    }

    match response.json::<serde_json::Value>() {
        Ok(value) => output::json_pretty(&value),
        Err(_) => {
            println!("{}", response.text());
            Ok(())
        }
    }
}
