//! Status command - worker state and cache contents

use crate::cli::args::{OutputFormat, StatusArgs};
use crate::cli::host::WorkerHost;
use crate::config::Config;
use crate::error::ShellCacheResult;
use crate::store::CacheStorage;
use crate::ui::{self, UiContext};
use console::{style, Emoji};
use serde::Serialize;

static CHECK: Emoji<'_, '_> = Emoji("✓ ", "[OK] ");
static CROSS: Emoji<'_, '_> = Emoji("✗ ", "[FAIL] ");
static WARN: Emoji<'_, '_> = Emoji("⚠ ", "[WARN] ");

#[derive(Debug, Serialize)]
struct PartitionStatus {
    name: String,
    exists: bool,
    entries: usize,
}

#[derive(Debug, Serialize)]
struct Drift {
    snapshot_version: String,
    changed: Vec<String>,
    removed: Vec<String>,
}

#[derive(Debug, Serialize)]
struct Status {
    version: String,
    state: String,
    /// Version controlling clients, if any
    serving: Option<String>,
    skip_waiting: bool,
    origin: String,
    resources: usize,
    missing: usize,
    partitions: Vec<PartitionStatus>,
    drift: Option<Drift>,
}

/// Execute the status command
pub async fn execute(args: StatusArgs, config: &Config) -> ShellCacheResult<()> {
    let host = WorkerHost::open(config).await?;
    let status = collect(&host).await?;

    match args.format {
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&status)?),
        OutputFormat::Table => print_table(&UiContext::detect(), &status),
    }
    Ok(())
}

async fn collect(host: &WorkerHost) -> ShellCacheResult<Status> {
    let worker = &host.worker;
    let ctx = worker.context();
    let names = &ctx.partitions;

    // Only open partitions that exist; opening creates them
    let mut partitions = vec![];
    for name in names.all() {
        let exists = host.storage.has(name).await?;
        let entries = if exists {
            host.storage.open(name).await?.keys().await?.len()
        } else {
            0
        };
        partitions.push(PartitionStatus {
            name: name.to_string(),
            exists,
            entries,
        });
    }

    let missing = if host.storage.has(&names.content).await? {
        worker.missing_resources().await?.len()
    } else {
        ctx.manifest.len()
    };

    let drift = if host.storage.has(&names.snapshot).await? {
        worker.previous_manifest().await?.map(|previous| Drift {
            snapshot_version: previous.version(),
            changed: to_strings(ctx.manifest.changed_since(&previous)),
            removed: to_strings(ctx.manifest.removed_since(&previous)),
        })
    } else {
        None
    };

    let controller = host.controller().await;
    let serving = if controller.state().await.controls_clients() {
        Some(controller.context().version())
    } else {
        None
    };

    Ok(Status {
        version: ctx.version(),
        state: worker.state().await.to_string(),
        serving,
        skip_waiting: worker.skip_waiting_requested(),
        origin: ctx.origin.to_string(),
        resources: ctx.manifest.len(),
        missing,
        partitions,
        drift,
    })
}

fn to_strings(keys: Vec<&str>) -> Vec<String> {
    keys.into_iter().map(str::to_string).collect()
}

fn print_table(ctx: &UiContext, status: &Status) {
    println!("{}", style("shellcache Worker Status").bold().cyan());
    println!();

    println!("{}", style("Worker:").bold());
    ui::key_value(ctx, "Version", &status.version);
    let marker = match status.state.as_str() {
        "reconciled" => &CHECK,
        "reset" | "redundant" => &CROSS,
        _ => &WARN,
    };
    println!("  {}State: {}", marker, status.state);
    ui::key_value(ctx, "Origin", &status.origin);
    match &status.serving {
        Some(version) if *version == status.version => {}
        Some(version) => ui::key_value(ctx, "Serving", &format!("{} (previous version)", version)),
        None => ui::key_value(ctx, "Serving", "nothing, requests pass through"),
    }
    if status.skip_waiting {
        println!("  Skip waiting requested");
    }

    println!();
    println!("{}", style("Partitions:").bold());
    for partition in &status.partitions {
        if partition.exists {
            println!("  {}{} ({} entries)", CHECK, partition.name, partition.entries);
        } else {
            println!("  {}{} {}", WARN, partition.name, style("(absent)").dim());
        }
    }

    println!();
    println!("{}", style("Manifest:").bold());
    ui::key_value(ctx, "Resources", &status.resources.to_string());
    if status.missing == 0 {
        println!("  {}All resources available offline", CHECK);
    } else {
        println!(
            "  {}{} resource(s) not cached - Run: shellcache message downloadOffline",
            WARN, status.missing
        );
    }
    match &status.drift {
        Some(drift) if drift.changed.is_empty() && drift.removed.is_empty() => {
            println!("  {}Snapshot matches current manifest", CHECK);
        }
        Some(drift) => println!(
            "  {}Snapshot {} differs: {} changed, {} removed - Run: shellcache install",
            WARN,
            drift.snapshot_version,
            drift.changed.len(),
            drift.removed.len()
        ),
        None => println!("  {}No snapshot (next activation is a first install)", WARN),
    }
}
