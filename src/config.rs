//! Persisted launcher defaults.
//!
//! A small TOML file under the config directory remembers the knobs a user
//! set for their last launches, most usefully the last disk image created
//! or booted, so `start` without `--disk` keeps reattaching the same
//! persistent disk.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use tracing::warn;

/// File name of the launcher config inside the config directory.
pub const CONFIG_FILE: &str = "config.toml";

/// Defaults applied when a `start` flag is not given on the command line.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LauncherConfig {
    pub ram_mb: u32,
    pub cpu_cores: u32,
    pub vnc_port: i32,
    pub gfx: String,
    pub use_kvm: bool,
    /// Remembered persistent disk image from the last create/start.
    pub last_disk: Option<PathBuf>,
}

impl Default for LauncherConfig {
    fn default() -> Self {
        Self {
            ram_mb: 1024,
            cpu_cores: 2,
            vnc_port: 5901,
            gfx: "virtio".to_string(),
            use_kvm: false,
            last_disk: None,
        }
    }
}

impl LauncherConfig {
    /// Load from `path`. A missing file yields the defaults; an unreadable
    /// one is reported and replaced by the defaults rather than failing the
    /// launch.
    pub fn load(path: &Path) -> Self {
        match std::fs::read_to_string(path) {
            Ok(text) => match toml::from_str(&text) {
                Ok(config) => config,
                Err(e) => {
                    warn!(config = %path.display(), error = %e, "config file unreadable, using defaults");
                    Self::default()
                }
            },
            Err(_) => Self::default(),
        }
    }

    /// Write to `path`, creating parent directories as needed.
    pub fn save(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("create config directory {}", parent.display()))?;
        }
        let text = toml::to_string_pretty(self).context("serialize launcher config")?;
        std::fs::write(path, text).with_context(|| format!("write {}", path.display()))?;
        Ok(())
    }

    /// Forget the remembered disk if its file no longer exists.
    pub fn validate_last_disk(&mut self) {
        if let Some(disk) = &self.last_disk {
            if !disk.exists() {
                warn!(disk = %disk.display(), "remembered disk image is gone, forgetting it");
                self.last_disk = None;
            }
        }
    }
}
