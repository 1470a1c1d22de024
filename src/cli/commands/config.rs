//! Config command - show or initialize configuration

use crate::cli::args::{ConfigAction, ConfigArgs};
use crate::config::{Config, ConfigManager};
use crate::error::ShellCacheResult;
use crate::ui::{self, UiContext};

/// Execute the config command
pub async fn execute(
    args: ConfigArgs,
    manager: &ConfigManager,
    config: &Config,
) -> ShellCacheResult<()> {
    match args.action {
        None | Some(ConfigAction::Show) => println!("{}", toml::to_string_pretty(config)?),
        Some(ConfigAction::Path) => println!("{}", manager.path().display()),
        Some(ConfigAction::Init { force }) => init_config(manager, force).await?,
    }
    Ok(())
}

async fn init_config(manager: &ConfigManager, force: bool) -> ShellCacheResult<()> {
    let ctx = UiContext::detect();
    let path = manager.path();

    if path.exists() && !force {
        ui::step_warn_hint(
            &ctx,
            &format!("Config already exists at {}", path.display()),
            "Use --force to overwrite",
        );
        return Ok(());
    }

    manager.save(&Config::default()).await?;
    ui::step_ok_detail(&ctx, "Configuration initialized", &path.display().to_string());
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[tokio::test]
    async fn init_writes_defaults_once() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("config.toml");
        let manager = ConfigManager::with_path(path.clone());

        init_config(&manager, false).await.unwrap();
        let written = std::fs::read_to_string(&path).unwrap();
        assert!(written.contains("[worker]"));

        std::fs::write(&path, "# edited\n").unwrap();
        init_config(&manager, false).await.unwrap();
        assert_eq!(std::fs::read_to_string(&path).unwrap(), "# edited\n");

        init_config(&manager, true).await.unwrap();
        assert!(std::fs::read_to_string(&path).unwrap().contains("[storage]"));
    }
}
