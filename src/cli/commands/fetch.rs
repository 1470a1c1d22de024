//! Fetch command - route one request through the worker

use crate::cli::args::FetchArgs;
use crate::cli::host::WorkerHost;
use crate::config::Config;
use crate::error::{ShellCacheError, ShellCacheResult};
use crate::fetch::{Fetcher, Request};
use crate::worker::FetchOutcome;
use tokio::fs;

/// Execute the fetch command
pub async fn execute(args: FetchArgs, config: &Config) -> ShellCacheResult<()> {
    let host = WorkerHost::open(config).await?;
    let request = Request::with_method(args.url, &args.method);
    let worker = host.controller().await;

    let (response, source) = match worker.handle_fetch(&request).await? {
        FetchOutcome::Responded { response, source } => (response, source.to_string()),
        // Not intercepted: the request goes to the network untouched
        FetchOutcome::Passthrough => (host.fetcher.fetch(&request).await?, "passthrough".into()),
    };
    worker.settle().await;

    println!("{} {} ({} bytes)", source, response.status, response.body.len());
    if let Some(path) = args.output {
        fs::write(&path, &response.body)
            .await
            .map_err(|e| ShellCacheError::io(format!("writing {}", path.display()), e))?;
    }
    Ok(())
}
