//! VM supervision module for qemu-warden.
//!
//! Provides QEMU argument synthesis, the single-guest process supervisor
//! with its asynchronous exit monitor, raw disk image creation, guest log
//! management, and the input-event entry points.

use std::path::PathBuf;

pub mod args;
pub mod disk;
pub mod input;
pub mod log_store;
pub mod supervisor;

// ---------------------------------------------------------------------------
// Shared types used across submodules
// ---------------------------------------------------------------------------

/// Top-level configuration for launching a QEMU guest.
///
/// Constructed fresh per start request and passed to
/// [`supervisor::Supervisor::start`]; never persisted.
///
/// `iso_path`, `disk_path` and `log_path` use an empty string for "not
/// supplied": an empty disk or media path attaches nothing, and an empty log
/// path disables output redirection and the terminal status line.
#[derive(Debug, Clone)]
pub struct VmConfig {
    /// Path to the emulator binary (see [`supervisor::find_qemu`]).
    pub qemu_path: PathBuf,

    /// Directory exported to the guest process as `LD_LIBRARY_PATH`.
    pub lib_dir: PathBuf,

    /// QEMU data directory; the firmware image is expected at
    /// `<share_dir>/qemu/edk2-aarch64-code.fd`.
    pub share_dir: PathBuf,

    /// Installation media path (ISO or disk image), may be empty.
    pub iso_path: String,

    /// Persistent disk image path, may be empty.
    pub disk_path: String,

    /// Append-mode log file receiving the argv block, the guest's
    /// stdout/stderr, and the terminal status line. May be empty.
    pub log_path: String,

    /// Memory allocation in megabytes.
    pub ram_mb: u32,

    /// Number of virtual CPU cores.
    pub cpu_cores: u32,

    /// Graphics backend tag. Informational: the guest always gets a
    /// virtio GPU and a headless display, exposed via VNC only.
    pub gfx: String,

    /// VNC TCP port; the display argument becomes
    /// `127.0.0.1:<vnc_port - 5900>`. Ports below 5900 are passed through
    /// unchecked.
    pub vnc_port: i32,

    /// Request hardware-accelerated execution. Honoured only when the
    /// accelerator device is usable; otherwise the guest falls back to
    /// multithreaded TCG.
    pub use_hw_accel: bool,
}

// ---------------------------------------------------------------------------
// Re-exports
// ---------------------------------------------------------------------------

pub use args::{MediaFormat, build_qemu_args};
pub use supervisor::{StartError, Supervisor};
