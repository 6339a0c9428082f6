//! QEMU argument synthesis.
//!
//! Maps a [`VmConfig`] into the ordered argument vector for
//! `qemu-system-aarch64`. Pure apart from the accelerator device probe:
//! the builder never touches the disk or media files themselves, it only
//! classifies their filename suffixes.
//!
//! Guests are always arm64 (`-machine virt -cpu cortex-a57`) with a
//! headless display; the framebuffer is reachable only through the VNC
//! server the guest starts on `127.0.0.1:<display>`.

use std::path::Path;

use tracing::{debug, warn};

use crate::vm::VmConfig;

/// Device node probed when hardware acceleration is requested.
pub const KVM_DEVICE: &str = "/dev/kvm";

// ---------------------------------------------------------------------------
// Media format classification
// ---------------------------------------------------------------------------

/// Disk/media image format derived from a path's filename suffix.
///
/// Classification is total: every path maps to a variant, and the caller
/// decides what `Unrecognized` means for its role (a persistent disk with an
/// unknown suffix is omitted; installation media with an unknown suffix is
/// treated as a raw CD-ROM image).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MediaFormat {
    /// `.qcow2`
    Qcow2,
    /// `.img` or `.raw`
    Raw,
    /// Any other suffix. Matching is case-sensitive.
    Unrecognized,
}

impl MediaFormat {
    /// Classify a path by its filename suffix.
    pub fn classify(path: &str) -> Self {
        if path.ends_with(".qcow2") {
            MediaFormat::Qcow2
        } else if path.ends_with(".img") || path.ends_with(".raw") {
            MediaFormat::Raw
        } else {
            MediaFormat::Unrecognized
        }
    }

    /// The `format=` value QEMU expects for this classification.
    /// `Unrecognized` only reaches QEMU on the CD-ROM path, which is raw.
    fn qemu_format(self) -> &'static str {
        match self {
            MediaFormat::Qcow2 => "qcow2",
            MediaFormat::Raw | MediaFormat::Unrecognized => "raw",
        }
    }
}

// ---------------------------------------------------------------------------
// Acceleration probe
// ---------------------------------------------------------------------------

/// Returns `true` when `device` is accessible for both read and write,
/// i.e. QEMU will be able to open it for hardware-assisted execution.
pub fn accel_device_usable(device: &Path) -> bool {
    use std::os::unix::ffi::OsStrExt;

    let Ok(cpath) = std::ffi::CString::new(device.as_os_str().as_bytes()) else {
        return false;
    };
    unsafe { libc::access(cpath.as_ptr(), libc::R_OK | libc::W_OK) == 0 }
}

// ---------------------------------------------------------------------------
// Argument builder
// ---------------------------------------------------------------------------

/// Build the full argument vector for the emulator process.
///
/// The program path itself is not included; pass the result to
/// `Command::args`. Probes [`KVM_DEVICE`] for the acceleration decision.
pub fn build_qemu_args(config: &VmConfig) -> Vec<String> {
    build_qemu_args_with_accel_device(config, Path::new(KVM_DEVICE))
}

/// Like [`build_qemu_args`] but with the accelerator device node
/// parameterized, so tests can force either acceleration outcome.
pub fn build_qemu_args_with_accel_device(config: &VmConfig, accel_device: &Path) -> Vec<String> {
    // VNC display index, not the raw TCP port. Callers are expected to pass
    // ports >= 5900; lower values produce a negative index and are passed
    // through unchecked.
    let vnc_display = format!("127.0.0.1:{}", config.vnc_port - 5900);

    let mut args: Vec<String> = vec![
        "-L".into(),
        format!("{}/qemu", config.share_dir.display()),
        "-machine".into(),
        "virt".into(),
        "-cpu".into(),
        "cortex-a57".into(),
        "-m".into(),
        config.ram_mb.to_string(),
        "-smp".into(),
        config.cpu_cores.to_string(),
        "-display".into(),
        "none".into(),
        "-vnc".into(),
        vnc_display,
        "-netdev".into(),
        "user,id=net0".into(),
        "-device".into(),
        "virtio-net-pci,netdev=net0".into(),
        "-device".into(),
        "virtio-gpu-pci".into(),
        "-bios".into(),
        format!("{}/qemu/edk2-aarch64-code.fd", config.share_dir.display()),
    ];

    let mut have_disk = false;
    if !config.disk_path.is_empty() {
        match MediaFormat::classify(&config.disk_path) {
            fmt @ (MediaFormat::Qcow2 | MediaFormat::Raw) => {
                args.push("-drive".into());
                args.push(format!(
                    "file={},if=virtio,format={}",
                    config.disk_path,
                    fmt.qemu_format()
                ));
                have_disk = true;
            }
            MediaFormat::Unrecognized => {
                warn!(
                    disk = %config.disk_path,
                    "unrecognized disk image suffix, not attaching"
                );
            }
        }
    }

    if !config.iso_path.is_empty() {
        match MediaFormat::classify(&config.iso_path) {
            fmt @ (MediaFormat::Qcow2 | MediaFormat::Raw) => {
                args.push("-drive".into());
                args.push(format!(
                    "file={},if=virtio,format={}",
                    config.iso_path,
                    fmt.qemu_format()
                ));
            }
            MediaFormat::Unrecognized => {
                args.push("-drive".into());
                args.push(format!(
                    "file={},if=virtio,media=cdrom,format=raw",
                    config.iso_path
                ));
                if have_disk {
                    args.push("-boot".into());
                    args.push("order=d".into());
                }
            }
        }
    }

    if config.use_hw_accel && accel_device_usable(accel_device) {
        args.push("-accel".into());
        args.push("kvm".into());
    } else {
        if config.use_hw_accel {
            debug!(
                device = %accel_device.display(),
                "accelerator device not usable, falling back to TCG"
            );
        }
        args.push("-accel".into());
        args.push("tcg,thread=multi".into());
    }

    args
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
