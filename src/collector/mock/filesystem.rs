//! In-memory mock filesystem for testing modules without real `/proc`.
//!
//! Clones of a `MockFs` share one backing store, so a test can hand a clone
//! to the engine and keep rewriting counter files between poll rounds.

use crate::collector::traits::{FileSystem, FsUsage};
use std::collections::{HashMap, HashSet};
use std::io;
use std::path::{Path, PathBuf};
use std::sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard};

#[derive(Debug, Default)]
struct MockFsState {
    /// Map from path to file contents.
    files: HashMap<PathBuf, String>,
    /// Set of directories (for read_dir support).
    directories: HashSet<PathBuf>,
    /// Mount points answering `statvfs`.
    mounts: HashMap<PathBuf, FsUsage>,
}

impl MockFsState {
    fn add_parents(&mut self, path: &Path) {
        let mut parent = path.parent();
        while let Some(p) = parent {
            if !p.as_os_str().is_empty() {
                self.directories.insert(p.to_path_buf());
            }
            parent = p.parent();
        }
    }
}

/// In-memory filesystem for testing.
#[derive(Debug, Clone, Default)]
pub struct MockFs {
    state: Arc<RwLock<MockFsState>>,
}

impl MockFs {
    /// Creates a new empty mock filesystem.
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds or replaces a file. Parent directories are created.
    pub fn add_file(&self, path: impl AsRef<Path>, content: impl Into<String>) {
        let path = path.as_ref().to_path_buf();
        let mut state = self.write();
        state.add_parents(&path);
        state.files.insert(path, content.into());
    }

    /// Removes a file, leaving its directory in place.
    pub fn remove_file(&self, path: impl AsRef<Path>) {
        self.write().files.remove(path.as_ref());
    }

    /// Adds an empty directory.
    pub fn add_dir(&self, path: impl AsRef<Path>) {
        let path = path.as_ref().to_path_buf();
        let mut state = self.write();
        state.add_parents(&path);
        state.directories.insert(path);
    }

    /// Registers or replaces the `statvfs` answer for `path`.
    pub fn set_mount(&self, path: impl AsRef<Path>, usage: FsUsage) {
        let path = path.as_ref().to_path_buf();
        let mut state = self.write();
        state.directories.insert(path.clone());
        state.mounts.insert(path, usage);
    }

    /// Makes `statvfs(path)` fail from now on.
    pub fn remove_mount(&self, path: impl AsRef<Path>) {
        self.write().mounts.remove(path.as_ref());
    }

    fn read(&self) -> RwLockReadGuard<'_, MockFsState> {
        self.state.read().unwrap_or_else(|e| e.into_inner())
    }

    fn write(&self) -> RwLockWriteGuard<'_, MockFsState> {
        self.state.write().unwrap_or_else(|e| e.into_inner())
    }
}

impl FileSystem for MockFs {
    fn read_to_string(&self, path: &Path) -> io::Result<String> {
        self.read().files.get(path).cloned().ok_or_else(|| {
            io::Error::new(
                io::ErrorKind::NotFound,
                format!("file not found: {:?}", path),
            )
        })
    }

    fn exists(&self, path: &Path) -> bool {
        let state = self.read();
        state.files.contains_key(path) || state.directories.contains(path)
    }

    fn read_dir(&self, path: &Path) -> io::Result<Vec<PathBuf>> {
        let state = self.read();
        if !state.directories.contains(path) {
            return Err(io::Error::new(
                io::ErrorKind::NotFound,
                format!("directory not found: {:?}", path),
            ));
        }

        let mut entries = HashSet::new();

        for file_path in state.files.keys() {
            if file_path.parent().is_some_and(|parent| parent == path) {
                entries.insert(file_path.clone());
            }
        }

        for dir_path in &state.directories {
            if dir_path.parent().is_some_and(|parent| parent == path) && dir_path != path {
                entries.insert(dir_path.clone());
            }
        }

        Ok(entries.into_iter().collect())
    }

    fn statvfs(&self, path: &Path) -> io::Result<FsUsage> {
        self.read().mounts.get(path).copied().ok_or_else(|| {
            io::Error::new(
                io::ErrorKind::NotFound,
                format!("no filesystem mounted at {:?}", path),
            )
        })
    }
}
