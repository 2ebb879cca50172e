//! Named, process-shared memory region.
//!
//! A region is a memory-mapped file under the Argus regions directory
//! (tmpfs on Linux). The first creator is the owner: it zero-fills the
//! mapping and unlinks the file on drop. Any number of other processes may
//! open the same region by name while the file exists; their mappings stay
//! valid even after the owner unlinks (the kernel keeps the inode alive
//! until the last mapping goes away).

use crate::error::{ArgusError, ArgusResult};
use crate::memory::platform::{region_path, regions_dir};
use memmap2::{MmapMut, MmapOptions};
use std::fs::{File, OpenOptions};
use std::path::PathBuf;

/// A named shared memory region, mapped read/write.
#[derive(Debug)]
pub struct ShmRegion {
    mmap: MmapMut,
    _file: File,
    path: PathBuf,
    name: String,
    size: usize,
    owner: bool,
}

impl ShmRegion {
    /// Create or open the region `name`, sized to at least `size` bytes.
    ///
    /// If the file already exists this handle is not the owner and the
    /// existing contents are preserved (the caller decides whether they are
    /// stale). A fresh region is zero-filled.
    pub fn create(name: &str, size: usize) -> ArgusResult<Self> {
        if size == 0 {
            return Err(ArgusError::memory("region size must be > 0"));
        }

        let dir = regions_dir();
        std::fs::create_dir_all(&dir)?;

        let path = region_path(name);
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let (file, is_owner) = if path.exists() {
            let file = OpenOptions::new().read(true).write(true).open(&path)?;
            if file.metadata()?.len() < size as u64 {
                file.set_len(size as u64).map_err(|e| grow_failed(name, e))?;
            }
            (file, false)
        } else {
            let file = OpenOptions::new()
                .read(true)
                .write(true)
                .create(true)
                .truncate(true)
                .open(&path)?;
            file.set_len(size as u64).map_err(|e| grow_failed(name, e))?;
            (file, true)
        };

        // SAFETY: file is open read/write and at least `size` bytes long.
        let mut mmap = unsafe {
            MmapOptions::new()
                .len(size)
                .map_mut(&file)
                .map_err(|e| grow_failed(name, e))?
        };

        if is_owner {
            mmap.fill(0);
        }

        Ok(Self {
            mmap,
            _file: file,
            path,
            name: name.to_string(),
            size,
            owner: is_owner,
        })
    }

    /// Open an existing region at its current size.
    ///
    /// Fails with [`ArgusError::NotFound`] if no region file exists.
    pub fn open(name: &str) -> ArgusResult<Self> {
        let path = region_path(name);
        if !path.exists() {
            return Err(ArgusError::NotFound(name.to_string()));
        }

        let file = OpenOptions::new().read(true).write(true).open(&path)?;
        let size = file.metadata()?.len() as usize;
        if size == 0 {
            return Err(ArgusError::memory(format!("region '{name}' is empty")));
        }

        // SAFETY: file is open read/write and `size` matches its length.
        let mmap = unsafe {
            MmapOptions::new()
                .len(size)
                .map_mut(&file)
                .map_err(|e| grow_failed(name, e))?
        };

        Ok(Self {
            mmap,
            _file: file,
            path,
            name: name.to_string(),
            size,
            owner: false,
        })
    }

    /// Remove the backing file for `name`. Returns true if a file was
    /// removed. Existing mappings are unaffected.
    pub fn unlink(name: &str) -> bool {
        std::fs::remove_file(region_path(name)).is_ok()
    }

    /// Whether a region file currently exists for `name`.
    pub fn exists(name: &str) -> bool {
        region_path(name).exists()
    }

    #[inline]
    pub fn as_ptr(&self) -> *const u8 {
        self.mmap.as_ptr()
    }

    /// Raw mutable pointer into the mapping.
    ///
    /// Concurrent access is coordinated entirely by the node header's
    /// process-shared synchronization; callers get no aliasing guarantees
    /// from this handle.
    #[inline]
    pub fn as_mut_ptr(&self) -> *mut u8 {
        self.mmap.as_ptr() as *mut u8
    }

    #[inline]
    pub fn size(&self) -> usize {
        self.size
    }

    #[inline]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Whether this handle created the region (and will unlink it on drop).
    #[inline]
    pub fn is_owner(&self) -> bool {
        self.owner
    }
}

impl Drop for ShmRegion {
    fn drop(&mut self) {
        if self.owner && self.path.exists() {
            let _ = std::fs::remove_file(&self.path);
        }
    }
}

// SAFETY: the mapping is plain OS shared memory with no thread-local state;
// all concurrent mutation goes through atomics in the node header.
unsafe impl Send for ShmRegion {}
unsafe impl Sync for ShmRegion {}

fn grow_failed(name: &str, e: impl std::fmt::Display) -> ArgusError {
    ArgusError::InsufficientMemory {
        name: name.to_string(),
        reason: e.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn unique_name(prefix: &str) -> String {
        format!(
            "{}_{}_{}",
            prefix,
            std::process::id(),
            std::time::SystemTime::now()
                .duration_since(std::time::UNIX_EPOCH)
                .unwrap()
                .as_nanos()
        )
    }

    #[test]
    fn create_zero_fills_and_round_trips() {
        let name = unique_name("region_rw");
        let region = ShmRegion::create(&name, 4096).expect("create");
        assert!(region.is_owner());

        for i in 0..4096 {
            // SAFETY: i < size
            assert_eq!(unsafe { *region.as_ptr().add(i) }, 0, "byte {i} not zeroed");
        }

        let ptr = region.as_mut_ptr();
        for i in 0..4096 {
            // SAFETY: i < size
            unsafe { *ptr.add(i) = (i % 251) as u8 };
        }
        for i in 0..4096 {
            // SAFETY: i < size
            assert_eq!(unsafe { *region.as_ptr().add(i) }, (i % 251) as u8);
        }
    }

    #[test]
    fn second_create_is_not_owner_and_sees_writes() {
        let name = unique_name("region_share");
        let a = ShmRegion::create(&name, 128).expect("create a");
        let b = ShmRegion::create(&name, 128).expect("create b");
        assert!(a.is_owner());
        assert!(!b.is_owner());

        // SAFETY: offset 7 < 128 in both mappings of the same file
        unsafe { *a.as_mut_ptr().add(7) = 0xAB };
        assert_eq!(unsafe { *b.as_ptr().add(7) }, 0xAB);
    }

    #[test]
    fn open_missing_is_not_found() {
        let name = unique_name("region_missing");
        assert!(matches!(
            ShmRegion::open(&name),
            Err(ArgusError::NotFound(_))
        ));
    }

    #[test]
    fn owner_drop_unlinks() {
        let name = unique_name("region_unlink");
        {
            let _r = ShmRegion::create(&name, 64).expect("create");
            assert!(ShmRegion::exists(&name));
        }
        assert!(!ShmRegion::exists(&name));
    }

    #[test]
    fn mapping_survives_unlink() {
        let name = unique_name("region_survive");
        let owner = ShmRegion::create(&name, 64).expect("create");
        let reader = ShmRegion::open(&name).expect("open");
        // SAFETY: offset 0 < 64
        unsafe { *owner.as_mut_ptr() = 42 };
        drop(owner); // unlinks the file
        assert!(!ShmRegion::exists(&name));
        // The reader's mapping still works.
        assert_eq!(unsafe { *reader.as_ptr() }, 42);
    }
}
