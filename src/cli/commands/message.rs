//! Message command - deliver a message to the worker

use crate::cli::args::MessageArgs;
use crate::cli::host::WorkerHost;
use crate::config::Config;
use crate::error::ShellCacheResult;
use crate::ui::{self, UiContext, TaskSpinner};
use crate::worker::{Message, MessageOutcome};
use serde_json::json;

/// Execute the message command
pub async fn execute(args: MessageArgs, config: &Config) -> ShellCacheResult<()> {
    let ctx = UiContext::detect();
    let host = WorkerHost::open(config).await?;

    let message = Message::parse(&args.data);
    // skipWaiting concerns the newest version; downloads belong to the one serving
    let worker = match message {
        Some(Message::SkipWaiting) => &host.worker,
        _ => host.controller().await,
    };

    let spinner = (message == Some(Message::DownloadOffline))
        .then(|| TaskSpinner::start(&ctx, "Downloading resources for offline use..."));
    let outcome = worker.handle_message(&args.data).await;
    if let Some(spinner) = spinner {
        spinner.finish();
    }

    match outcome? {
        MessageOutcome::SkipWaiting => {
            host.persist().await?;
            ui::step_ok(&ctx, "Skip waiting requested");
        }
        MessageOutcome::Downloaded(report) => {
            host.journal
                .record(
                    "prefetch.completed",
                    &json!({"stored": report.stored, "failed": report.failed}),
                )
                .await;
            if report.stored.is_empty() && report.is_complete() {
                ui::step_info(&ctx, "Every resource is already available offline");
            } else {
                ui::step_ok(&ctx, &format!("Downloaded {} resource(s)", report.stored.len()));
            }
            for failure in &report.failed {
                ui::step_error(&ctx, &format!("{}: {}", failure.key, failure.reason));
            }
            report.into_result()?;
        }
        MessageOutcome::Ignored => {
            ui::step_warn(&ctx, &format!("Ignored unknown message {:?}", args.data));
        }
    }
    Ok(())
}
