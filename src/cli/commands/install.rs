//! Install command - stage the shell

use crate::cli::host::WorkerHost;
use crate::config::Config;
use crate::error::ShellCacheResult;
use crate::ui::{self, UiContext, TaskSpinner};
use serde_json::json;

/// Execute the install command
pub async fn execute(config: &Config) -> ShellCacheResult<()> {
    let ctx = UiContext::detect();
    let host = WorkerHost::open(config).await?;
    let version = host.worker.context().version();

    let spinner = TaskSpinner::start(&ctx, "Fetching shell resources...");
    let result = host.worker.install().await;
    spinner.finish();
    host.persist().await?;

    match result {
        Ok(report) => {
            host.journal
                .record(
                    "worker.installed",
                    &json!({"version": version, "staged": report.staged, "bytes": report.bytes}),
                )
                .await;
            ui::step_ok_detail(
                &ctx,
                &format!("Installed worker {}", version),
                &format!("{} shell resource(s), {} bytes", report.staged.len(), report.bytes),
            );
            Ok(())
        }
        Err(e) => {
            host.journal
                .record(
                    "worker.install_failed",
                    &json!({"version": version, "error": e.to_string()}),
                )
                .await;
            Err(e)
        }
    }
}
