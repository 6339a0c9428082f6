//! Guest log file management.
//!
//! The supervisor's argv block, the guest's stdout/stderr, and the terminal
//! status line all land in one append-only file per session under the logs
//! directory. This module owns where that file lives and its lifecycle
//! between sessions.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};

/// File name of the guest log inside the logs directory.
pub const GUEST_LOG_FILE: &str = "qemu.log";

/// Path of the guest log inside `logs_dir`. The file may not exist yet.
pub fn log_path(logs_dir: &Path) -> PathBuf {
    logs_dir.join(GUEST_LOG_FILE)
}

/// Begin a fresh log session: create the directory, truncate any previous
/// contents, and return the log path for [`crate::vm::VmConfig::log_path`].
pub fn start_session(logs_dir: &Path) -> Result<PathBuf> {
    std::fs::create_dir_all(logs_dir)
        .with_context(|| format!("create log directory {}", logs_dir.display()))?;

    let path = log_path(logs_dir);
    std::fs::write(&path, b"").with_context(|| format!("truncate {}", path.display()))?;
    Ok(path)
}

/// Full contents of the guest log, or `None` when no log exists yet.
pub fn read_all(logs_dir: &Path) -> Option<String> {
    std::fs::read_to_string(log_path(logs_dir)).ok()
}

/// Truncate the guest log. No-op when the file does not exist.
pub fn clear(logs_dir: &Path) -> Result<()> {
    let path = log_path(logs_dir);
    if path.exists() {
        std::fs::write(&path, b"").with_context(|| format!("truncate {}", path.display()))?;
    }
    Ok(())
}
