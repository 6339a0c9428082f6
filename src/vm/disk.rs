//! Raw guest disk image creation.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result, bail};
use tracing::info;

const BYTES_PER_GIB: u64 = 1024 * 1024 * 1024;

/// Create a blank sparse raw disk image under `dir`, `size_gb` GiB large.
///
/// The file only consumes real disk blocks as the guest writes to it. The
/// image is named `disk-<millis>.img` so repeated creations never collide,
/// and the `.img` suffix keeps it in raw format for the argument builder.
pub fn create_raw_disk(dir: &Path, size_gb: u32) -> Result<PathBuf> {
    if size_gb == 0 {
        bail!("disk size must be at least 1 GiB");
    }

    std::fs::create_dir_all(dir)
        .with_context(|| format!("create disk directory {}", dir.display()))?;

    let name = format!("disk-{}.img", chrono::Utc::now().timestamp_millis());
    let path = dir.join(name);

    let file = std::fs::File::create(&path)
        .with_context(|| format!("create disk image {}", path.display()))?;
    file.set_len(u64::from(size_gb) * BYTES_PER_GIB)
        .with_context(|| format!("size disk image {}", path.display()))?;

    info!(disk = %path.display(), size_gb, "created raw disk image");
    Ok(path)
}
