//! Filesystem capacity via `statvfs(3)`.

use super::NOT_AVAILABLE;
use log::debug;
use std::ffi::CString;
use std::io;
use std::os::unix::ffi::OsStrExt;
use std::path::{Path, PathBuf};

const BYTES_PER_GIB: u64 = 1024 * 1024 * 1024;

/// Block counts of one filesystem
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DiskUsage {
    /// Blocks available to unprivileged users
    pub available_blocks: u64,
    pub total_blocks: u64,
    pub fragment_size: u64,
}

impl DiskUsage {
    pub fn query(path: &Path) -> io::Result<Self> {
        let c_path = CString::new(path.as_os_str().as_bytes())
            .map_err(|e| io::Error::new(io::ErrorKind::InvalidInput, e))?;
        let mut stat = std::mem::MaybeUninit::<libc::statvfs>::uninit();

        // SAFETY: `c_path` is NUL-terminated and `stat` is valid for writes.
        let ret = unsafe { libc::statvfs(c_path.as_ptr(), stat.as_mut_ptr()) };
        if ret != 0 {
            return Err(io::Error::last_os_error());
        }
        // SAFETY: statvfs returned 0, so the struct is initialised.
        let stat = unsafe { stat.assume_init() };

        Ok(Self {
            available_blocks: stat.f_bavail as u64,
            total_blocks: stat.f_blocks as u64,
            fragment_size: stat.f_frsize as u64,
        })
    }

    /// `"available/total"` in whole GiB
    pub fn display(&self) -> String {
        let available = self.available_blocks.saturating_mul(self.fragment_size) / BYTES_PER_GIB;
        let total = self.total_blocks.saturating_mul(self.fragment_size) / BYTES_PER_GIB;
        format!("{:3}Gi/{:3}Gi", available, total)
    }
}

#[derive(Debug, Clone)]
pub struct DiskSampler {
    mount: PathBuf,
}

impl DiskSampler {
    pub fn new() -> Self {
        Self::with_mount("/")
    }

    pub fn with_mount(mount: impl Into<PathBuf>) -> Self {
        Self {
            mount: mount.into(),
        }
    }

    pub fn sample(&self) -> String {
        match DiskUsage::query(&self.mount) {
            Ok(usage) => usage.display(),
            Err(e) => {
                debug!("statvfs({}) failed: {}", self.mount.display(), e);
                NOT_AVAILABLE.to_string()
            }
        }
    }
}

impl Default for DiskSampler {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display_whole_gib() {
        let usage = DiskUsage {
            available_blocks: 30 * 262144 + 100,
            total_blocks: 476 * 262144,
            fragment_size: 4096,
        };
        assert_eq!(usage.display(), " 30Gi/476Gi");
    }

    #[test]
    fn test_display_large_volume() {
        let usage = DiskUsage {
            available_blocks: 1000 * 262144,
            total_blocks: 3726 * 262144,
            fragment_size: 4096,
        };
        assert_eq!(usage.display(), "1000Gi/3726Gi");
    }

    #[test]
    fn test_query_root() {
        let usage = DiskUsage::query(Path::new("/")).unwrap();
        assert!(usage.total_blocks > 0);
        assert!(usage.available_blocks <= usage.total_blocks);
    }

    #[test]
    fn test_sample_missing_mount() {
        let dir = tempfile::tempdir().unwrap();
        let sampler = DiskSampler::with_mount(dir.path().join("not-mounted"));
        assert_eq!(sampler.sample(), "N/A");
    }
}
