//! Host-side supervisor for a single locally-launched QEMU guest.
//!
//! The crate builds the `qemu-system-aarch64` command line from a
//! [`vm::VmConfig`], spawns the emulator with its output redirected to an
//! append-only log file, enforces the one-guest-at-a-time rule, and records
//! how the guest died without blocking the caller.

pub mod config;
pub mod logging;
pub mod paths;
pub mod vm;
