//! Abstractions for filesystem access to enable testing and mocking.
//!
//! The `FileSystem` trait lets the modules read the real `/proc` and `/sys`
//! trees on Linux, or an in-memory [`MockFs`](crate::collector::MockFs) in
//! tests and on hosts without procfs.

use std::io;
use std::path::{Path, PathBuf};

/// Space accounting for one mounted filesystem, already scaled to bytes.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FsUsage {
    pub total_bytes: u64,
    pub free_bytes: u64,
    /// Free space usable by unprivileged callers (excludes reserved blocks).
    pub available_bytes: u64,
}

/// Abstraction for filesystem operations.
pub trait FileSystem: Send + Sync {
    /// Reads the entire contents of a file as a string.
    fn read_to_string(&self, path: &Path) -> io::Result<String>;

    /// Checks if a path exists.
    fn exists(&self, path: &Path) -> bool;

    /// Lists entries in a directory. Order is unspecified.
    fn read_dir(&self, path: &Path) -> io::Result<Vec<PathBuf>>;

    /// Returns space usage of the filesystem containing `path`.
    fn statvfs(&self, path: &Path) -> io::Result<FsUsage>;
}

/// Real filesystem implementation that delegates to `std::fs` and `statvfs(3)`.
#[derive(Debug, Default, Clone, Copy)]
pub struct RealFs;

impl RealFs {
    pub fn new() -> Self {
        Self
    }
}

impl FileSystem for RealFs {
    fn read_to_string(&self, path: &Path) -> io::Result<String> {
        std::fs::read_to_string(path)
    }

    fn exists(&self, path: &Path) -> bool {
        path.exists()
    }

    fn read_dir(&self, path: &Path) -> io::Result<Vec<PathBuf>> {
        let entries = std::fs::read_dir(path)?;
        let mut paths = Vec::new();
        for entry in entries {
            paths.push(entry?.path());
        }
        Ok(paths)
    }

    #[cfg(unix)]
    fn statvfs(&self, path: &Path) -> io::Result<FsUsage> {
        use std::ffi::CString;
        use std::os::unix::ffi::OsStrExt;

        let c_path = CString::new(path.as_os_str().as_bytes())
            .map_err(|e| io::Error::new(io::ErrorKind::InvalidInput, e))?;

        // SAFETY: `c_path` is a valid NUL-terminated string and `stat` is a
        // plain-old-data struct that statvfs fully initializes on success.
        let mut stat: libc::statvfs = unsafe { std::mem::zeroed() };
        let ret = unsafe { libc::statvfs(c_path.as_ptr(), &mut stat) };
        if ret != 0 {
            return Err(io::Error::last_os_error());
        }

        let block_size = if stat.f_frsize != 0 {
            stat.f_frsize as u64
        } else {
            stat.f_bsize as u64
        };
        Ok(FsUsage {
            total_bytes: (stat.f_blocks as u64).saturating_mul(block_size),
            free_bytes: (stat.f_bfree as u64).saturating_mul(block_size),
            available_bytes: (stat.f_bavail as u64).saturating_mul(block_size),
        })
    }

    #[cfg(not(unix))]
    fn statvfs(&self, _path: &Path) -> io::Result<FsUsage> {
        Err(io::Error::new(
            io::ErrorKind::Unsupported,
            "statvfs is not available on this platform",
        ))
    }
}
