//! Configuration management for shellcache

pub mod schema;

pub use schema::Config;

use crate::error::{ShellCacheError, ShellCacheResult};
use std::path::{Path, PathBuf};
use tokio::fs;
use tracing::{debug, info};

/// Project-local config file name
pub const LOCAL_CONFIG_FILE: &str = ".shellcache.toml";

/// Path-valued keys resolved against the directory of the file that sets them
const PATH_KEYS: &[(&str, &str)] = &[("worker", "manifest"), ("storage", "root")];

/// Configuration manager
pub struct ConfigManager {
    config_path: PathBuf,
}

impl ConfigManager {
    /// Create a new config manager with default path
    pub fn new() -> Self {
        Self {
            config_path: Self::default_config_path(),
        }
    }

    /// Create a config manager with a custom path
    pub fn with_path(path: PathBuf) -> Self {
        Self { config_path: path }
    }

    /// Get the default config file path
    pub fn default_config_path() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("shellcache")
            .join("config.toml")
    }

    /// Load configuration, falling back to defaults if the file is missing
    pub async fn load(&self) -> ShellCacheResult<Config> {
        self.load_merged(None).await
    }

    /// Load configuration from a specific file
    pub async fn load_from_file(&self, path: &Path) -> ShellCacheResult<Config> {
        let value = Self::read_value(path).await?;
        Self::into_config(value, path)
    }

    /// Load the global config with an optional local config merged on top
    ///
    /// Tables merge key by key; any other local value replaces the global one.
    pub async fn load_merged(&self, local: Option<&Path>) -> ShellCacheResult<Config> {
        let mut merged = if self.config_path.exists() {
            Self::read_value(&self.config_path).await?
        } else {
            debug!("Config file not found, using defaults");
            toml::Value::Table(toml::map::Map::new())
        };

        if let Some(local) = local {
            let overlay = Self::read_value(local).await?;
            merge_values(&mut merged, overlay);
        }

        Self::into_config(merged, local.unwrap_or(&self.config_path))
    }

    /// Walk up from `start` looking for a project-local config
    pub fn find_local_config(start: &Path) -> Option<PathBuf> {
        start
            .ancestors()
            .map(|dir| dir.join(LOCAL_CONFIG_FILE))
            .find(|candidate| candidate.is_file())
    }

    /// Save configuration to file
    pub async fn save(&self, config: &Config) -> ShellCacheResult<()> {
        self.ensure_config_dir().await?;

        let content = toml::to_string_pretty(config)?;
        fs::write(&self.config_path, content).await.map_err(|e| {
            ShellCacheError::io(
                format!("writing config to {}", self.config_path.display()),
                e,
            )
        })?;

        info!("Configuration saved to {}", self.config_path.display());
        Ok(())
    }

    /// Ensure the config directory exists
    async fn ensure_config_dir(&self) -> ShellCacheResult<()> {
        if let Some(parent) = self.config_path.parent() {
            fs::create_dir_all(parent)
                .await
                .map_err(|e| ShellCacheError::ConfigDirCreate {
                    path: parent.to_path_buf(),
                    source: e,
                })?;
        }
        Ok(())
    }

    /// Get the config file path
    pub fn path(&self) -> &Path {
        &self.config_path
    }

    async fn read_value(path: &Path) -> ShellCacheResult<toml::Value> {
        let content = fs::read_to_string(path).await.map_err(|e| {
            ShellCacheError::io(format!("reading config from {}", path.display()), e)
        })?;
        let mut value: toml::Value =
            toml::from_str(&content).map_err(|e| ShellCacheError::ConfigInvalid {
                path: path.to_path_buf(),
                reason: e.to_string(),
            })?;
        if let Some(base) = path.parent() {
            anchor_paths(&mut value, base);
        }
        Ok(value)
    }

    fn into_config(value: toml::Value, path: &Path) -> ShellCacheResult<Config> {
        value
            .try_into()
            .map_err(|e: toml::de::Error| ShellCacheError::ConfigInvalid {
                path: path.to_path_buf(),
                reason: e.to_string(),
            })
    }
}

impl Default for ConfigManager {
    fn default() -> Self {
        Self::new()
    }
}

/// Merge `overlay` into `base`
fn merge_values(base: &mut toml::Value, overlay: toml::Value) {
    match (base, overlay) {
        (toml::Value::Table(base), toml::Value::Table(overlay)) => {
            for (key, value) in overlay {
                match base.get_mut(&key) {
                    Some(existing) => merge_values(existing, value),
                    None => {
                        base.insert(key, value);
                    }
                }
            }
        }
        (base, overlay) => *base = overlay,
    }
}

/// Make relative path values absolute against `base`
fn anchor_paths(value: &mut toml::Value, base: &Path) {
    for (section, key) in PATH_KEYS {
        let Some(entry) = value.get_mut(*section).and_then(|s| s.get_mut(*key)) else {
            continue;
        };
        if let toml::Value::String(path) = entry {
            if Path::new(path.as_str()).is_relative() {
                *path = base.join(path.as_str()).display().to_string();
            }
        }
    }
}
