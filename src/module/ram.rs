//! Physical memory usage from `/proc/meminfo`.

use std::path::PathBuf;

use tracing::debug;

use super::{CreateModule, Module, ModuleContext, parse_failure, read_source, unsupported};
use crate::collector::FileSystem;
use crate::collector::procfs::{MemInfo, parse_meminfo};
use crate::error::{Result, SysmonError};
use crate::snapshot::SnapshotBuilder;

pub const NAME: &str = "ram";

#[derive(Debug, Clone, Copy, Default, PartialEq)]
struct RamSample {
    used_bytes: u64,
    free_bytes: u64,
    used_percent: f64,
}

impl RamSample {
    /// Free memory prefers `MemAvailable` and falls back to `MemFree` on
    /// kernels that do not report it. Free above total is treated as 0.
    fn from_meminfo(total_bytes: u64, info: &MemInfo) -> Self {
        let free_kb = if info.mem_available > 0 {
            info.mem_available
        } else {
            info.mem_free
        };
        let mut free_bytes = free_kb.saturating_mul(1024);
        if free_bytes > total_bytes {
            free_bytes = 0;
        }
        let used_bytes = total_bytes - free_bytes;
        let used_percent = if total_bytes > 0 {
            used_bytes as f64 * 100.0 / total_bytes as f64
        } else {
            0.0
        };
        Self {
            used_bytes,
            free_bytes,
            used_percent,
        }
    }
}

/// Memory usage. Total is read once at creation and never refreshed.
pub struct RamModule<F> {
    fs: F,
    meminfo_path: PathBuf,
    total_bytes: u64,
    last: Option<RamSample>,
}

impl<F: FileSystem + Clone + 'static> CreateModule<F> for RamModule<F> {
    fn create(ctx: &ModuleContext<'_, F>) -> Result<Self> {
        let meminfo_path = ctx.proc_path("meminfo");
        let content = read_source(ctx.fs, &meminfo_path).map_err(unsupported)?;
        let info = parse_meminfo(&content)
            .map_err(|e| unsupported(parse_failure(&meminfo_path, e)))?;
        if info.mem_total == 0 {
            return Err(SysmonError::not_supported(format!(
                "MemTotal not found in {}",
                meminfo_path.display()
            )));
        }

        let total_bytes = info.mem_total.saturating_mul(1024);
        debug!(total_bytes, "ram module ready");
        Ok(Self {
            fs: ctx.fs.clone(),
            meminfo_path,
            total_bytes,
            last: None,
        })
    }
}

impl<F: FileSystem> RamModule<F> {
    fn refresh(&self) -> Result<RamSample> {
        let content = read_source(&self.fs, &self.meminfo_path)?;
        let info = parse_meminfo(&content).map_err(|e| parse_failure(&self.meminfo_path, e))?;
        Ok(RamSample::from_meminfo(self.total_bytes, &info))
    }
}

impl<F: FileSystem + 'static> Module for RamModule<F> {
    fn name(&self) -> &'static str {
        NAME
    }

    fn poll(
        &mut self,
        _now_ms: u64,
        refresh_due: bool,
        builder: &mut SnapshotBuilder,
    ) -> Result<()> {
        let sample = match self.last {
            Some(sample) if !refresh_due => sample,
            _ => {
                let sample = self.refresh()?;
                self.last = Some(sample);
                sample
            }
        };

        builder.add_uint64("ram.total_bytes", Some("B"), self.total_bytes)?;
        builder.add_uint64("ram.used_bytes", Some("B"), sample.used_bytes)?;
        builder.add_uint64("ram.free_bytes", Some("B"), sample.free_bytes)?;
        if self.total_bytes > 0 {
            builder.add_double("ram.used_percent", Some("%"), sample.used_percent)?;
        }
        Ok(())
    }
}
