//! Application directory structure for qemu-warden.
//!
//! Provides a single `WardenPaths` struct that resolves all standard
//! directories and ensures they exist on first launch. Follows macOS
//! conventions:
//!
//! - Config:  `~/.config/qemu-warden/`  (human-editable, XDG-style)
//! - Data:    `~/Library/Application Support/dev.wardenvm.qemu-warden/`
//! - Disks:   `<data>/disks/`  (guest disk images)
//! - Logs:    `~/Library/Logs/qemu-warden/`
//!
//! On non-macOS, falls back to XDG paths.

use std::path::{Path, PathBuf};

use tracing::info;
#[cfg(target_os = "macos")]
use tracing::warn;

const BUNDLE_ID: &str = "dev.wardenvm.qemu-warden";
const APP_NAME: &str = "qemu-warden";

/// All resolved application directory paths.
#[derive(Debug, Clone)]
pub struct WardenPaths {
    /// Human-editable config: `~/.config/qemu-warden/`
    pub config: PathBuf,
    /// Machine-managed application data root
    pub data: PathBuf,
    /// Guest disk images
    pub disks: PathBuf,
    /// Supervisor and guest logs
    pub logs: PathBuf,
}

impl WardenPaths {
    /// Resolve all paths from the user's home directory.
    /// Does not create any directories — call `ensure()` for that.
    pub fn resolve() -> Option<Self> {
        let home = std::env::var("HOME").ok().map(PathBuf::from)?;

        let config = resolve_config_dir(&home);
        let data = resolve_data_dir(&home);
        let logs = resolve_log_dir(&home);

        Some(Self {
            config,
            disks: data.join("disks"),
            data,
            logs,
        })
    }

    /// Create all directories that don't already exist.
    /// Excludes the disk image directory from Time Machine on macOS.
    pub fn ensure(&self) -> std::io::Result<()> {
        let dirs = [&self.config, &self.data, &self.disks, &self.logs];

        for dir in &dirs {
            std::fs::create_dir_all(dir)?;
            info!("ensured directory: {}", dir.display());
        }

        #[cfg(target_os = "macos")]
        exclude_from_time_machine(&self.disks);

        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Platform-specific path resolution
// ---------------------------------------------------------------------------

fn resolve_config_dir(home: &Path) -> PathBuf {
    if let Ok(xdg) = std::env::var("XDG_CONFIG_HOME") {
        PathBuf::from(xdg).join(APP_NAME)
    } else {
        home.join(".config").join(APP_NAME)
    }
}

#[cfg(target_os = "macos")]
fn resolve_data_dir(home: &Path) -> PathBuf {
    home.join("Library")
        .join("Application Support")
        .join(BUNDLE_ID)
}

#[cfg(not(target_os = "macos"))]
fn resolve_data_dir(home: &Path) -> PathBuf {
    if let Ok(xdg) = std::env::var("XDG_DATA_HOME") {
        PathBuf::from(xdg).join(APP_NAME)
    } else {
        home.join(".local").join("share").join(APP_NAME)
    }
}

#[cfg(target_os = "macos")]
fn resolve_log_dir(home: &Path) -> PathBuf {
    home.join("Library").join("Logs").join(APP_NAME)
}

#[cfg(not(target_os = "macos"))]
fn resolve_log_dir(home: &Path) -> PathBuf {
    if let Ok(xdg) = std::env::var("XDG_DATA_HOME") {
        PathBuf::from(xdg).join(APP_NAME).join("logs")
    } else {
        home.join(".local").join("share").join(APP_NAME).join("logs")
    }
}

// ---------------------------------------------------------------------------
// Time Machine exclusion (macOS only)
// ---------------------------------------------------------------------------

#[cfg(target_os = "macos")]
fn exclude_from_time_machine(path: &Path) {
    use std::process::Command;
    match Command::new("tmutil")
        .args(["addexclusion", &path.to_string_lossy()])
        .output()
    {
        Ok(output) if output.status.success() => {
            info!("TM-excluded: {}", path.display());
        }
        Ok(output) => {
            let stderr = String::from_utf8_lossy(&output.stderr);
            warn!("tmutil addexclusion failed for {}: {}", path.display(), stderr.trim());
        }
        Err(e) => {
            warn!("failed to run tmutil for {}: {e}", path.display());
        }
    }
}
