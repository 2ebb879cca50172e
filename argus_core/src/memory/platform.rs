//! Platform paths for Argus shared regions.
//!
//! On Linux regions live as files under `/dev/shm` (tmpfs, RAM-backed, no
//! disk I/O). Elsewhere a temp-dir file is used; mmap still gives
//! cross-process sharing, the backing just may not be RAM-pinned.

use std::path::PathBuf;

/// Base directory holding all Argus region files.
pub fn regions_dir() -> PathBuf {
    #[cfg(target_os = "linux")]
    {
        PathBuf::from("/dev/shm/argus")
    }
    #[cfg(not(target_os = "linux"))]
    {
        std::env::temp_dir().join("argus")
    }
}

/// File path backing the region for one logical address.
///
/// The address is used verbatim; the fabric appends only the `_sh_mem`
/// suffix. Addresses may contain `/` for namespacing.
pub fn region_path(region_name: &str) -> PathBuf {
    regions_dir().join(region_name)
}
