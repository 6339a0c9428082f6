//! Logging initialisation for qemu-warden.
//!
//! When the `WARDEN_LOG` environment variable is set to `1`, structured
//! logs are written to the application log directory as `qemu-warden.log`.
//! Otherwise only stderr output (filtered by `RUST_LOG`) is enabled.
//!
//! This is the supervisor's own diagnostic log, separate from the guest log
//! managed by `vm::log_store`.

use std::path::Path;

use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

pub struct LogGuard {
    _file_guard: Option<tracing_appender::non_blocking::WorkerGuard>,
}

/// Initialise the global tracing subscriber.
///
/// Call once from `main`, keep the returned `LogGuard` alive for the
/// duration of the process so buffered lines are flushed on exit.
pub fn init(logs_dir: Option<&Path>) -> LogGuard {
    let file_guard = match logs_dir {
        Some(dir) if std::env::var("WARDEN_LOG").as_deref() == Ok("1") => {
            let _ = std::fs::create_dir_all(dir);
            let file_appender = tracing_appender::rolling::never(dir, "qemu-warden.log");
            let (non_blocking, guard) = tracing_appender::non_blocking(file_appender);

            let file_layer = fmt::layer().with_writer(non_blocking).with_ansi(false);

            tracing_subscriber::registry()
                .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
                .with(fmt::layer().with_writer(std::io::stderr))
                .with(file_layer)
                .init();

            Some(guard)
        }
        _ => {
            tracing_subscriber::registry()
                .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")))
                .with(fmt::layer().with_writer(std::io::stderr))
                .init();

            None
        }
    };

    LogGuard { _file_guard: file_guard }
}
