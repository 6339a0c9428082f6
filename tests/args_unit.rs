//! Pure unit tests for QEMU argument synthesis.
//!
//! These tests exercise the argument builder without spawning anything.
//! The accelerator probe is pointed at controlled paths so the host's
//! actual `/dev/kvm` never influences the outcome.

use std::path::{Path, PathBuf};

use qemu_warden::vm::VmConfig;
use qemu_warden::vm::args::{MediaFormat, accel_device_usable, build_qemu_args_with_accel_device};

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

fn base_config() -> VmConfig {
    VmConfig {
        qemu_path: PathBuf::from("/opt/qemu/bin/qemu-system-aarch64"),
        lib_dir: PathBuf::from("/opt/qemu/lib"),
        share_dir: PathBuf::from("/opt/qemu/share"),
        iso_path: String::new(),
        disk_path: String::new(),
        log_path: String::new(),
        ram_mb: 1024,
        cpu_cores: 2,
        gfx: "virtio".to_string(),
        vnc_port: 5901,
        use_hw_accel: false,
    }
}

/// Build with a probe path that never exists, pinning acceleration to TCG.
fn build(config: &VmConfig) -> Vec<String> {
    build_qemu_args_with_accel_device(config, Path::new("/nonexistent/kvm"))
}

/// The value following `flag`, panicking when the flag is absent.
fn arg_after<'a>(args: &'a [String], flag: &str) -> &'a str {
    let idx = args
        .iter()
        .position(|a| a == flag)
        .unwrap_or_else(|| panic!("flag {flag} not found in {args:?}"));
    &args[idx + 1]
}

/// All `-drive` values in order.
fn drive_args(args: &[String]) -> Vec<&str> {
    args.iter()
        .enumerate()
        .filter(|(_, a)| *a == "-drive")
        .map(|(i, _)| args[i + 1].as_str())
        .collect()
}

// ---------------------------------------------------------------------------
// Base flags
// ---------------------------------------------------------------------------

#[test]
fn base_flags_are_fixed() {
    let args = build(&base_config());

    assert_eq!(arg_after(&args, "-machine"), "virt");
    assert_eq!(arg_after(&args, "-cpu"), "cortex-a57");
    assert_eq!(arg_after(&args, "-m"), "1024");
    assert_eq!(arg_after(&args, "-smp"), "2");
    assert_eq!(arg_after(&args, "-display"), "none");
    assert_eq!(arg_after(&args, "-netdev"), "user,id=net0");
    assert_eq!(arg_after(&args, "-L"), "/opt/qemu/share/qemu");
}

#[test]
fn virtio_gpu_and_nic_are_always_attached() {
    let args = build(&base_config());

    let devices: Vec<&str> = args
        .iter()
        .enumerate()
        .filter(|(_, a)| *a == "-device")
        .map(|(i, _)| args[i + 1].as_str())
        .collect();

    assert!(devices.contains(&"virtio-net-pci,netdev=net0"), "{devices:?}");
    assert!(devices.contains(&"virtio-gpu-pci"), "{devices:?}");
}

#[test]
fn firmware_path_is_derived_from_share_dir() {
    let args = build(&base_config());

    assert_eq!(
        arg_after(&args, "-bios"),
        "/opt/qemu/share/qemu/edk2-aarch64-code.fd"
    );
}

#[test]
fn vnc_port_5901_maps_to_display_index_1() {
    let args = build(&base_config());

    assert_eq!(arg_after(&args, "-vnc"), "127.0.0.1:1");
}

#[test]
fn vnc_port_below_5900_passes_through_as_negative_index() {
    let mut config = base_config();
    config.vnc_port = 5890;

    let args = build(&config);

    assert_eq!(arg_after(&args, "-vnc"), "127.0.0.1:-10");
}

// ---------------------------------------------------------------------------
// Disk and installation media
// ---------------------------------------------------------------------------

#[test]
fn qcow2_media_without_disk_gets_one_drive_and_no_boot_override() {
    let mut config = base_config();
    config.iso_path = "/images/install.qcow2".to_string();

    let args = build(&config);
    let drives = drive_args(&args);

    assert_eq!(drives, vec!["file=/images/install.qcow2,if=virtio,format=qcow2"]);
    assert!(!args.contains(&"-boot".to_string()), "{args:?}");
}

#[test]
fn raw_disk_plus_iso_media_gets_two_drives_and_boot_override() {
    let mut config = base_config();
    config.disk_path = "/images/root.raw".to_string();
    config.iso_path = "/images/install.iso".to_string();

    let args = build(&config);
    let drives = drive_args(&args);

    assert_eq!(
        drives,
        vec![
            "file=/images/root.raw,if=virtio,format=raw",
            "file=/images/install.iso,if=virtio,media=cdrom,format=raw",
        ]
    );
    assert_eq!(arg_after(&args, "-boot"), "order=d");
}

#[test]
fn iso_media_without_disk_gets_cdrom_but_no_boot_override() {
    let mut config = base_config();
    config.iso_path = "/images/install.iso".to_string();

    let args = build(&config);
    let drives = drive_args(&args);

    assert_eq!(
        drives,
        vec!["file=/images/install.iso,if=virtio,media=cdrom,format=raw"]
    );
    assert!(!args.contains(&"-boot".to_string()), "{args:?}");
}

#[test]
fn img_disk_is_attached_as_raw() {
    let mut config = base_config();
    config.disk_path = "/images/root.img".to_string();

    let args = build(&config);
    let drives = drive_args(&args);

    assert_eq!(drives, vec!["file=/images/root.img,if=virtio,format=raw"]);
}

#[test]
fn unrecognized_disk_suffix_attaches_nothing() {
    let mut config = base_config();
    config.disk_path = "/images/root.vdi".to_string();

    let args = build(&config);

    assert!(drive_args(&args).is_empty(), "{args:?}");
    assert!(!args.contains(&"-boot".to_string()));
}

#[test]
fn unrecognized_disk_does_not_count_for_boot_override() {
    // The CD-ROM boot override requires an *attached* disk; a disk that was
    // omitted for its suffix must not trigger it.
    let mut config = base_config();
    config.disk_path = "/images/root.vdi".to_string();
    config.iso_path = "/images/install.iso".to_string();

    let args = build(&config);

    assert_eq!(drive_args(&args).len(), 1);
    assert!(!args.contains(&"-boot".to_string()), "{args:?}");
}

#[test]
fn empty_paths_attach_no_drives() {
    let args = build(&base_config());

    assert!(drive_args(&args).is_empty());
}

// ---------------------------------------------------------------------------
// Classification round-trip through the emitted arguments
// ---------------------------------------------------------------------------

/// Recover the classification of a media path from the drive argument the
/// builder emitted for it.
fn classification_from_drive(drive: &str) -> MediaFormat {
    if drive.contains("media=cdrom") {
        MediaFormat::Unrecognized
    } else if drive.contains("format=qcow2") {
        MediaFormat::Qcow2
    } else {
        MediaFormat::Raw
    }
}

#[test]
fn media_classification_round_trips_through_emitted_arguments() {
    let cases = [
        ("/images/a.qcow2", MediaFormat::Qcow2),
        ("/images/a.img", MediaFormat::Raw),
        ("/images/a.raw", MediaFormat::Raw),
        ("/images/a.iso", MediaFormat::Unrecognized),
    ];

    for (path, expected) in cases {
        assert_eq!(MediaFormat::classify(path), expected, "classify {path}");

        let mut config = base_config();
        config.iso_path = path.to_string();
        let args = build(&config);
        let drives = drive_args(&args);

        assert_eq!(drives.len(), 1, "media {path} must attach one drive");
        assert_eq!(
            classification_from_drive(drives[0]),
            expected,
            "emitted drive {} must recover the classification of {path}",
            drives[0]
        );
    }
}

// ---------------------------------------------------------------------------
// Acceleration
// ---------------------------------------------------------------------------

#[test]
fn missing_accelerator_device_forces_tcg() {
    let mut config = base_config();
    config.use_hw_accel = true;

    let args = build_qemu_args_with_accel_device(&config, Path::new("/nonexistent/kvm"));

    assert_eq!(arg_after(&args, "-accel"), "tcg,thread=multi");
}

#[test]
fn usable_accelerator_device_enables_kvm_when_requested() {
    let tmp = tempfile::TempDir::new().expect("temp dir");
    let device = tmp.path().join("kvm");
    std::fs::write(&device, b"").expect("create fake device");
    assert!(accel_device_usable(&device));

    let mut config = base_config();
    config.use_hw_accel = true;

    let args = build_qemu_args_with_accel_device(&config, &device);

    assert_eq!(arg_after(&args, "-accel"), "kvm");
}

#[test]
fn acceleration_stays_software_when_not_requested() {
    let tmp = tempfile::TempDir::new().expect("temp dir");
    let device = tmp.path().join("kvm");
    std::fs::write(&device, b"").expect("create fake device");

    let args = build_qemu_args_with_accel_device(&base_config(), &device);

    assert_eq!(arg_after(&args, "-accel"), "tcg,thread=multi");
}

#[test]
fn accel_flag_comes_last() {
    let mut config = base_config();
    config.disk_path = "/images/root.qcow2".to_string();

    let args = build(&config);

    assert_eq!(args[args.len() - 2], "-accel");
    assert_eq!(args[args.len() - 1], "tcg,thread=multi");
}
