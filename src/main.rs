//! qemu-warden: launch and supervise a single local QEMU guest.
//!
//! The CLI resolves the emulator, assembles a [`VmConfig`] from flags and
//! the persisted launcher defaults, and hands it to the supervisor. `start`
//! stays in the foreground until the guest powers off on its own or Ctrl-C
//! asks for a graceful stop; the guest's display is reachable over VNC the
//! whole time.

use std::path::PathBuf;
use std::time::Duration;

use anyhow::{Context, Result, bail};
use clap::{Parser, Subcommand};
use tracing::{info, warn};

use qemu_warden::config::{self, LauncherConfig};
use qemu_warden::logging;
use qemu_warden::paths::WardenPaths;
use qemu_warden::vm::supervisor::{Supervisor, find_qemu};
use qemu_warden::vm::{VmConfig, disk, log_store};

/// Local QEMU guest supervisor
#[derive(Parser, Debug)]
#[command(name = "qemu-warden", version, about = "Local QEMU guest supervisor")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Boot a guest and supervise it until it exits or Ctrl-C stops it
    Start(StartArgs),
    /// Create a blank raw disk image and remember it for future starts
    CreateDisk {
        /// Disk size in GiB
        #[arg(long)]
        size_gb: u32,
    },
    /// Print the current guest log
    Logs {
        /// Truncate the log instead of printing it
        #[arg(long)]
        clear: bool,
    },
}

#[derive(clap::Args, Debug)]
struct StartArgs {
    /// Installation media to boot (ISO or disk image)
    #[arg(long)]
    iso: Option<PathBuf>,

    /// Persistent disk image (defaults to the last created/used disk)
    #[arg(long)]
    disk: Option<PathBuf>,

    /// Memory in megabytes
    #[arg(long)]
    ram_mb: Option<u32>,

    /// Virtual CPU cores
    #[arg(long)]
    cpus: Option<u32>,

    /// Graphics backend tag (only `virtio` is supported for arm64 guests)
    #[arg(long)]
    gfx: Option<String>,

    /// VNC TCP port the guest display is exposed on (5900-5999)
    #[arg(long)]
    vnc_port: Option<i32>,

    /// Request KVM hardware acceleration (falls back to TCG when unavailable)
    #[arg(long)]
    kvm: bool,

    /// Emulator binary (defaults to qemu-system-aarch64 found on PATH)
    #[arg(long)]
    qemu: Option<PathBuf>,

    /// QEMU data directory containing the firmware under qemu/
    #[arg(long, default_value = "/usr/share")]
    share_dir: PathBuf,

    /// Directory exported to the guest process as LD_LIBRARY_PATH
    #[arg(long, default_value = "/usr/lib")]
    lib_dir: PathBuf,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let paths = WardenPaths::resolve().context("HOME is not set")?;
    paths.ensure().context("create application directories")?;
    let _log_guard = logging::init(Some(paths.logs.as_path()));

    match cli.command {
        Command::Start(args) => run_start(args, &paths).await,
        Command::CreateDisk { size_gb } => run_create_disk(size_gb, &paths),
        Command::Logs { clear } => run_logs(clear, &paths),
    }
}

// ---------------------------------------------------------------------------
// start
// ---------------------------------------------------------------------------

async fn run_start(args: StartArgs, paths: &WardenPaths) -> Result<()> {
    let config_path = paths.config.join(config::CONFIG_FILE);
    let mut launcher = LauncherConfig::load(&config_path);
    launcher.validate_last_disk();

    let vnc_port = args.vnc_port.unwrap_or(launcher.vnc_port);
    if !(5900..=5999).contains(&vnc_port) {
        bail!("VNC port must be between 5900 and 5999, got {vnc_port}");
    }

    let mut gfx = args.gfx.unwrap_or_else(|| launcher.gfx.clone());
    if gfx != "virtio" {
        warn!(gfx = %gfx, "only the virtio GPU is supported for arm64 guests, using virtio");
        gfx = "virtio".to_string();
    }

    if let Some(iso) = &args.iso {
        let name = iso
            .file_name()
            .map(|n| n.to_string_lossy().to_lowercase())
            .unwrap_or_default();
        if name.contains("x86") || name.contains("amd64") || name.contains("i386") {
            bail!(
                "{} looks like an x86 image; this supervisor runs arm64/aarch64 guests",
                iso.display()
            );
        }
    }

    let qemu_path = match args.qemu {
        Some(path) => path,
        None => find_qemu()?,
    };

    let disk_path = args.disk.clone().or_else(|| launcher.last_disk.clone());
    if let Some(disk) = args.disk {
        launcher.last_disk = Some(disk);
    }
    if let Err(e) = launcher.save(&config_path) {
        warn!(error = %e, "could not persist launcher config");
    }

    let log_path = log_store::start_session(&paths.logs).context("start guest log session")?;

    let vm_config = VmConfig {
        qemu_path,
        lib_dir: args.lib_dir,
        share_dir: args.share_dir,
        iso_path: args
            .iso
            .map(|p| p.to_string_lossy().into_owned())
            .unwrap_or_default(),
        disk_path: disk_path
            .map(|p| p.to_string_lossy().into_owned())
            .unwrap_or_default(),
        log_path: log_path.to_string_lossy().into_owned(),
        ram_mb: args.ram_mb.unwrap_or(launcher.ram_mb),
        cpu_cores: args.cpus.unwrap_or(launcher.cpu_cores),
        gfx,
        vnc_port,
        use_hw_accel: args.kvm || launcher.use_kvm,
    };

    let supervisor = Supervisor::new();
    let pid = match supervisor.start(vm_config).await {
        Ok(pid) => pid,
        Err(e) => {
            eprintln!("failed to start VM: {e}");
            std::process::exit(e.code().unsigned_abs() as i32);
        }
    };

    println!("VM started (pid {pid}); display on vnc://127.0.0.1:{vnc_port}");
    println!("Guest log: {}", log_path.display());

    loop {
        tokio::select! {
            result = tokio::signal::ctrl_c() => {
                result.context("listen for Ctrl-C")?;
                info!("interrupt received, stopping guest");
                supervisor.stop().await;
                println!("VM stopped.");
                break;
            }
            _ = tokio::time::sleep(Duration::from_millis(500)) => {
                if !supervisor.is_running().await {
                    info!("guest exited on its own");
                    println!("VM exited; see {} for the exit status.", log_path.display());
                    break;
                }
            }
        }
    }

    Ok(())
}

// ---------------------------------------------------------------------------
// create-disk / logs
// ---------------------------------------------------------------------------

fn run_create_disk(size_gb: u32, paths: &WardenPaths) -> Result<()> {
    let path = disk::create_raw_disk(&paths.disks, size_gb)?;

    let config_path = paths.config.join(config::CONFIG_FILE);
    let mut launcher = LauncherConfig::load(&config_path);
    launcher.last_disk = Some(path.clone());
    launcher.save(&config_path)?;

    println!("Created disk: {}", path.display());
    Ok(())
}

fn run_logs(clear: bool, paths: &WardenPaths) -> Result<()> {
    if clear {
        log_store::clear(&paths.logs)?;
        println!("Guest log cleared.");
    } else {
        match log_store::read_all(&paths.logs) {
            Some(text) => print!("{text}"),
            None => println!("(no logs yet)"),
        }
    }
    Ok(())
}
