//! Guest process lifecycle management.
//!
//! ## Architecture
//!
//! ```text
//! Supervisor::start(VmConfig)
//!     └─► tokio::process::Command  →  qemu-system-aarch64 child process
//!             ├─► slot: Mutex<Option<VmSlot>>   (the single guest slot)
//!             └─► exit monitor task             (awaits child.wait())
//!                     ├─► appends the terminal status line to the guest log
//!                     └─► clears the slot when the guest dies on its own
//! ```
//!
//! The supervisor owns one guest slot. `start` checks and fills the slot
//! under a single lock acquisition, so two concurrent starts cannot both
//! spawn. `stop` sends SIGTERM and then waits for the monitor task, which is
//! the only place the child is ever reaped.

use std::io::Write;
use std::path::PathBuf;
use std::process::{ExitStatus, Stdio};
use std::sync::Arc;

use anyhow::bail;
use tokio::process::{Child, Command};
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use crate::vm::VmConfig;
use crate::vm::args::build_qemu_args;

/// The emulator binary the supervisor launches.
pub const QEMU_BINARY: &str = "qemu-system-aarch64";

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

/// Why a start request did not produce a running guest.
#[derive(Debug, thiserror::Error)]
pub enum StartError {
    /// The slot is occupied; the incumbent guest is left untouched.
    #[error("a VM is already running")]
    AlreadyRunning,

    /// The OS-level spawn failed. The slot is left empty.
    #[error("failed to spawn QEMU: {0}")]
    Spawn(#[from] std::io::Error),
}

impl StartError {
    /// Stable numeric code for non-Rust callers: `-2` when a guest is
    /// already tracked, `-3` when the spawn itself failed. A successful
    /// start is `0`.
    pub fn code(&self) -> i32 {
        match self {
            StartError::AlreadyRunning => -2,
            StartError::Spawn(_) => -3,
        }
    }
}

// ---------------------------------------------------------------------------
// Supervisor
// ---------------------------------------------------------------------------

/// The single tracked guest.
struct VmSlot {
    pid: u32,
    monitor: JoinHandle<()>,
}

/// Owns the one allowed guest process slot.
///
/// Cheap to clone; clones share the same slot.
#[derive(Clone, Default)]
pub struct Supervisor {
    slot: Arc<Mutex<Option<VmSlot>>>,
}

impl Supervisor {
    pub fn new() -> Self {
        Self::default()
    }

    /// Spawn a guest from `config` and begin supervising it.
    ///
    /// Returns the child pid. Fails with [`StartError::AlreadyRunning`]
    /// without touching the incumbent guest when the slot is occupied, and
    /// with [`StartError::Spawn`] when the OS refuses the spawn (including a
    /// missing or non-executable emulator binary).
    pub async fn start(&self, config: VmConfig) -> Result<u32, StartError> {
        let mut slot = self.slot.lock().await;
        if let Some(existing) = slot.as_ref() {
            warn!(pid = existing.pid, "start rejected: a VM is already running");
            return Err(StartError::AlreadyRunning);
        }

        let args = build_qemu_args(&config);
        info!(
            qemu = %config.qemu_path.display(),
            ram_mb = config.ram_mb,
            cpus = config.cpu_cores,
            vnc_port = config.vnc_port,
            "starting QEMU guest"
        );

        let mut cmd = Command::new(&config.qemu_path);
        cmd.args(&args)
            .env("LD_LIBRARY_PATH", &config.lib_dir)
            .env("QEMU_AUDIO_DRV", "none")
            .stdin(Stdio::null());

        // The argv block is appended before the child exists, and the
        // child's descriptors point at the same open file, so everything the
        // guest prints lands after the block.
        match open_guest_log(&config, &args) {
            Some(log) => match log.try_clone() {
                Ok(stdout) => {
                    cmd.stdout(Stdio::from(stdout));
                    cmd.stderr(Stdio::from(log));
                }
                Err(e) => {
                    warn!(error = %e, "could not duplicate guest log handle, output discarded");
                    cmd.stdout(Stdio::null());
                    cmd.stderr(Stdio::null());
                }
            },
            None => {
                cmd.stdout(Stdio::null());
                cmd.stderr(Stdio::null());
            }
        }

        let child = cmd.spawn().map_err(|e| {
            error!(qemu = %config.qemu_path.display(), error = %e, "failed to spawn QEMU");
            StartError::Spawn(e)
        })?;

        let Some(pid) = child.id() else {
            return Err(StartError::Spawn(std::io::Error::other(
                "spawned QEMU process has no pid",
            )));
        };
        info!(pid, "QEMU guest started");

        let monitor = spawn_exit_monitor(
            Arc::clone(&self.slot),
            child,
            pid,
            config.log_path.clone(),
        );
        *slot = Some(VmSlot { pid, monitor });

        Ok(pid)
    }

    /// Terminate the tracked guest and wait until it has been reaped.
    ///
    /// No-op when nothing is running. There is no timeout: a guest that
    /// ignores SIGTERM keeps this call suspended indefinitely.
    pub async fn stop(&self) {
        let taken = self.slot.lock().await.take();
        let Some(VmSlot { pid, monitor }) = taken else {
            debug!("stop requested with no VM running");
            return;
        };

        info!(pid, "stopping QEMU guest");
        // The guest may have exited between the take and the kill; ESRCH is
        // harmless because the monitor still reaps it below.
        let rc = unsafe { libc::kill(pid as libc::pid_t, libc::SIGTERM) };
        if rc != 0 {
            let e = std::io::Error::last_os_error();
            warn!(pid, error = %e, "SIGTERM delivery failed");
        }

        if let Err(e) = monitor.await {
            warn!(pid, error = %e, "exit monitor task failed");
        }
    }

    /// `true` while a guest process is tracked in the slot.
    pub async fn is_running(&self) -> bool {
        self.slot.lock().await.is_some()
    }

    /// Pid of the tracked guest, if any.
    pub async fn current_pid(&self) -> Option<u32> {
        self.slot.lock().await.as_ref().map(|s| s.pid)
    }
}

// ---------------------------------------------------------------------------
// Guest log
// ---------------------------------------------------------------------------

/// Open the guest log in append mode and record the argv block.
///
/// Returns `None` when no log path is configured or the file cannot be
/// opened; the guest then runs with its output discarded, never failing
/// the start.
fn open_guest_log(config: &VmConfig, args: &[String]) -> Option<std::fs::File> {
    if config.log_path.is_empty() {
        return None;
    }

    let mut file = match std::fs::OpenOptions::new()
        .append(true)
        .create(true)
        .open(&config.log_path)
    {
        Ok(f) => f,
        Err(e) => {
            warn!(log = %config.log_path, error = %e, "cannot open guest log, output discarded");
            return None;
        }
    };

    let mut block = String::from("QEMU args:\n");
    block.push_str(&format!("  {}\n", config.qemu_path.display()));
    for arg in args {
        block.push_str("  ");
        block.push_str(arg);
        block.push('\n');
    }
    if let Err(e) = file.write_all(block.as_bytes()) {
        warn!(log = %config.log_path, error = %e, "could not record argv block");
    }

    Some(file)
}

// ---------------------------------------------------------------------------
// Exit monitor
// ---------------------------------------------------------------------------

/// One task per spawned guest. Blocks on `child.wait()`, the sole way
/// termination is observed (there is no polling), then appends the terminal
/// status line and frees the slot.
fn spawn_exit_monitor(
    slot: Arc<Mutex<Option<VmSlot>>>,
    mut child: Child,
    pid: u32,
    log_path: String,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        match child.wait().await {
            Ok(status) => {
                info!(pid, %status, "QEMU guest exited");
                if !log_path.is_empty() {
                    append_status_line(&log_path, status).await;
                }
            }
            Err(e) => {
                error!(pid, error = %e, "waiting for QEMU guest failed");
            }
        }

        // A stop() that raced us has already emptied the slot; only clear it
        // when it still names this guest, so a newer guest is never evicted.
        let mut guard = slot.lock().await;
        if guard.as_ref().is_some_and(|s| s.pid == pid) {
            *guard = None;
        }
    })
}

/// Append the single terminal status line for this spawn. Best-effort: a
/// log that cannot be opened is skipped silently.
async fn append_status_line(log_path: &str, status: ExitStatus) {
    use tokio::io::AsyncWriteExt;

    let line = exit_status_line(status);
    match tokio::fs::OpenOptions::new()
        .append(true)
        .create(true)
        .open(log_path)
        .await
    {
        Ok(mut file) => {
            let _ = file.write_all(format!("{line}\n").as_bytes()).await;
        }
        Err(e) => {
            debug!(log = log_path, error = %e, "could not append exit status");
        }
    }
}

/// Classify a termination status into the one log line recorded for it.
fn exit_status_line(status: ExitStatus) -> String {
    use std::os::unix::process::ExitStatusExt;

    if let Some(code) = status.code() {
        format!("QEMU exited with code {code}")
    } else if let Some(signal) = status.signal() {
        format!("QEMU killed by signal {signal}")
    } else {
        format!("QEMU exited (status={})", status.into_raw())
    }
}

// ---------------------------------------------------------------------------
// Emulator discovery
// ---------------------------------------------------------------------------

/// Resolve the path to `qemu-system-aarch64`, honouring `PATH` first and
/// then common install locations.
pub fn find_qemu() -> anyhow::Result<PathBuf> {
    if let Ok(path_var) = std::env::var("PATH") {
        for dir in path_var.split(':') {
            let candidate = PathBuf::from(dir).join(QEMU_BINARY);
            if candidate.exists() {
                return Ok(candidate);
            }
        }
    }

    let candidates: &[&str] = &[
        "/usr/bin/qemu-system-aarch64",
        "/usr/local/bin/qemu-system-aarch64",
        "/opt/homebrew/bin/qemu-system-aarch64",
    ];

    for &path in candidates {
        if PathBuf::from(path).exists() {
            return Ok(PathBuf::from(path));
        }
    }

    bail!(
        "qemu-system-aarch64 not found. Install QEMU (apt install qemu-system-arm, \
         brew install qemu) or put it on PATH."
    )
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use std::os::unix::process::ExitStatusExt;

    #[test]
    fn start_error_codes_match_boundary_contract() {
        assert_eq!(StartError::AlreadyRunning.code(), -2);
        assert_eq!(StartError::Spawn(std::io::Error::other("no")).code(), -3);
    }

    #[test]
    fn status_line_for_normal_exit() {
        // Raw wait status 0x0700 = exited with code 7.
        let status = ExitStatus::from_raw(0x0700);
        assert_eq!(exit_status_line(status), "QEMU exited with code 7");
    }

    #[test]
    fn status_line_for_signal_death() {
        // Raw wait status 9 = killed by SIGKILL.
        let status = ExitStatus::from_raw(9);
        assert_eq!(exit_status_line(status), "QEMU killed by signal 9");
    }

    #[test]
    fn status_line_for_unrecognized_status() {
        // Raw wait status 0x057f = stopped, neither exited nor signaled.
        let status = ExitStatus::from_raw(0x057f);
        assert_eq!(exit_status_line(status), "QEMU exited (status=1407)");
    }
}
