//! Manifest command - fingerprint a build directory

use crate::cli::args::ManifestArgs;
use crate::error::{ShellCacheError, ShellCacheResult};
use crate::manifest::{ResourceManifest, DEFAULT_EXCLUDES};
use crate::ui::{self, UiContext};
use tokio::fs;

/// Execute the manifest command
pub async fn execute(args: ManifestArgs) -> ShellCacheResult<()> {
    let mut excludes: Vec<&str> = DEFAULT_EXCLUDES.to_vec();
    excludes.extend(args.exclude.iter().map(String::as_str));

    let manifest = ResourceManifest::generate(&args.build_dir, &excludes)?;
    let json = manifest.to_json()?;

    match args.output {
        Some(path) => {
            fs::write(&path, format!("{}\n", json))
                .await
                .map_err(|e| ShellCacheError::io(format!("writing {}", path.display()), e))?;
            ui::step_ok_detail(
                &UiContext::detect(),
                &format!("Wrote manifest with {} resource(s)", manifest.len()),
                &path.display().to_string(),
            );
        }
        None => println!("{}", json),
    }
    Ok(())
}
