//! Activate command - reconcile content against the manifest

use crate::cli::host::WorkerHost;
use crate::config::Config;
use crate::error::{ShellCacheError, ShellCacheResult};
use crate::ui::{self, UiContext};
use crate::worker::Activation;
use serde_json::json;

/// Execute the activate command
pub async fn execute(config: &Config) -> ShellCacheResult<()> {
    let ctx = UiContext::detect();
    let host = WorkerHost::open(config).await?;
    let version = host.worker.context().version();

    let activation = host.worker.activate().await?;
    host.persist().await?;

    match activation {
        Activation::Reconciled(summary) => {
            host.journal
                .record(
                    "worker.activated",
                    &json!({"version": version, "summary": summary}),
                )
                .await;
            if summary.first_install {
                ui::step_info(&ctx, "No previous manifest, content rebuilt from scratch");
            }
            ui::step_ok_detail(
                &ctx,
                &format!("Activated worker {}", version),
                &format!(
                    "{} retained, {} evicted, {} from staging",
                    summary.retained.len(),
                    summary.evicted.len(),
                    summary.restored.len()
                ),
            );
            Ok(())
        }
        Activation::Reset { reason } => {
            host.journal
                .record("worker.reset", &json!({"version": version, "reason": reason}))
                .await;
            Err(ShellCacheError::ActivationReset(reason))
        }
    }
}
