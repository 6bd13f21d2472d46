//! Filesystem capacity of one mount point via `statvfs`.

use std::path::PathBuf;

use tracing::debug;

use super::{CreateModule, Module, ModuleContext};
use crate::collector::{FileSystem, FsUsage};
use crate::error::{Result, SysmonError};
use crate::snapshot::SnapshotBuilder;

pub const NAME: &str = "storage";

const DEFAULT_PATH: &str = "/";

#[derive(Debug, Clone, Copy, Default, PartialEq)]
struct StorageUsage {
    total_bytes: u64,
    used_bytes: u64,
    free_bytes: u64,
    available_bytes: u64,
    used_percent: f64,
}

impl From<FsUsage> for StorageUsage {
    /// Used space counts everything that is not free, including blocks
    /// reserved for root.
    fn from(fs: FsUsage) -> Self {
        let used_bytes = fs.total_bytes.saturating_sub(fs.free_bytes);
        let used_percent = if fs.total_bytes > 0 {
            used_bytes as f64 * 100.0 / fs.total_bytes as f64
        } else {
            0.0
        };
        Self {
            total_bytes: fs.total_bytes,
            used_bytes,
            free_bytes: fs.free_bytes,
            available_bytes: fs.available_bytes,
            used_percent,
        }
    }
}

pub struct StorageModule<F> {
    fs: F,
    path: PathBuf,
    display_path: String,
    last: Option<StorageUsage>,
}

impl<F: FileSystem + Clone + 'static> CreateModule<F> for StorageModule<F> {
    fn create(ctx: &ModuleContext<'_, F>) -> Result<Self> {
        let display_path = ctx.option("path").unwrap_or(DEFAULT_PATH).to_string();
        let path = PathBuf::from(&display_path);
        ctx.fs.statvfs(&path).map_err(|e| {
            SysmonError::not_supported(format!("statvfs {} failed: {}", display_path, e))
        })?;

        debug!(path = %display_path, "storage module ready");
        Ok(Self {
            fs: ctx.fs.clone(),
            path,
            display_path,
            last: None,
        })
    }
}

impl<F: FileSystem> StorageModule<F> {
    fn refresh(&self) -> Result<StorageUsage> {
        let usage = self
            .fs
            .statvfs(&self.path)
            .map_err(|e| SysmonError::io(format!("statvfs {} failed", self.display_path), e))?;
        Ok(usage.into())
    }
}

impl<F: FileSystem + 'static> Module for StorageModule<F> {
    fn name(&self) -> &'static str {
        NAME
    }

    fn poll(
        &mut self,
        _now_ms: u64,
        refresh_due: bool,
        builder: &mut SnapshotBuilder,
    ) -> Result<()> {
        let usage = match self.last {
            Some(usage) if !refresh_due => usage,
            _ => {
                let usage = self.refresh()?;
                self.last = Some(usage);
                usage
            }
        };

        builder.add_string("storage.path", None, &self.display_path)?;
        builder.add_uint64("storage.total_bytes", Some("B"), usage.total_bytes)?;
        builder.add_uint64("storage.used_bytes", Some("B"), usage.used_bytes)?;
        builder.add_uint64("storage.free_bytes", Some("B"), usage.free_bytes)?;
        builder.add_uint64("storage.available_bytes", Some("B"), usage.available_bytes)?;
        builder.add_double("storage.used_percent", Some("%"), usage.used_percent)?;
        Ok(())
    }
}
