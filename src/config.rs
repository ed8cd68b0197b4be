use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    pub config_version: u32,
    /// Large-file selection threshold in MiB.
    pub lfs_threshold_mib: f64,
    /// Quiet window for watcher-driven reloads, in milliseconds.
    pub reload_quiet_ms: u64,
    /// Author used for the bootstrap commit of a new workspace.
    pub commit_author: String,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            config_version: 1,
            lfs_threshold_mib: 1.0,
            reload_quiet_ms: 300,
            commit_author: "arcsync <arcsync@localhost>".to_string(),
        }
    }
}

impl EngineConfig {
    pub fn load_or_default() -> Result<Self> {
        let path = config_path()?;
        if !path.exists() {
            return Ok(Self::default());
        }

        let raw = fs::read_to_string(&path)
            .with_context(|| format!("failed to read config: {}", path.display()))?;

        let parsed = toml::from_str::<EngineConfig>(&raw)
            .with_context(|| format!("failed to parse config: {}", path.display()))?;

        Ok(parsed)
    }

    pub fn save(&self) -> Result<PathBuf> {
        let path = config_path()?;
        ensure_parent_dir(&path)?;

        let body = toml::to_string_pretty(self).context("failed to serialize config")?;
        fs::write(&path, body)
            .with_context(|| format!("failed to write config: {}", path.display()))?;

        Ok(path)
    }

    pub fn quiet_window(&self) -> Duration {
        Duration::from_millis(self.reload_quiet_ms)
    }
}

pub fn config_path() -> Result<PathBuf> {
    let base = dirs::config_dir().context("could not resolve config directory")?;
    Ok(base.join("arcsync").join("config.toml"))
}

fn ensure_parent_dir(path: &Path) -> Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)
            .with_context(|| format!("failed to create config directory: {}", parent.display()))?;
    }
    Ok(())
}
