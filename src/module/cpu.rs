//! CPU utilisation from the aggregate tick counters in `/proc/stat`.

use std::path::PathBuf;

use tracing::debug;

use super::{CreateModule, Module, ModuleContext, parse_failure, read_source, unsupported};
use crate::collector::FileSystem;
use crate::collector::procfs::{CpuTimes, parse_cpu_stat};
use crate::error::Result;
use crate::snapshot::SnapshotBuilder;

pub const NAME: &str = "cpu";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct TickSample {
    total: u64,
    idle: u64,
}

impl From<CpuTimes> for TickSample {
    fn from(t: CpuTimes) -> Self {
        Self {
            total: t.total(),
            idle: t.idle_all(),
        }
    }
}

/// Tracks busy/idle ticks between refreshes.
///
/// The first sample only seeds the cache; usage stays 0 until a second
/// refresh provides a delta. Deltas where idle grew more than total (counter
/// reset or noise) leave the last valid percentage in place.
pub struct CpuModule<F> {
    fs: F,
    stat_path: PathBuf,
    core_count: u32,
    prev: Option<TickSample>,
    usage_percent: f64,
}

impl<F: FileSystem + Clone + 'static> CreateModule<F> for CpuModule<F> {
    fn create(ctx: &ModuleContext<'_, F>) -> Result<Self> {
        let stat_path = ctx.proc_path("stat");
        let content = read_source(ctx.fs, &stat_path).map_err(unsupported)?;
        let stat =
            parse_cpu_stat(&content).map_err(|e| unsupported(parse_failure(&stat_path, e)))?;

        debug!(cores = stat.core_count, "cpu module ready");
        Ok(Self {
            fs: ctx.fs.clone(),
            stat_path,
            core_count: stat.core_count,
            prev: None,
            usage_percent: 0.0,
        })
    }
}

impl<F: FileSystem> CpuModule<F> {
    fn read_ticks(&self) -> Result<TickSample> {
        let content = read_source(&self.fs, &self.stat_path)?;
        let stat = parse_cpu_stat(&content).map_err(|e| parse_failure(&self.stat_path, e))?;
        Ok(stat.aggregate.into())
    }

    fn update(&mut self, sample: TickSample) {
        if let Some(prev) = self.prev
            && let Some(percent) = usage_between(prev, sample)
        {
            self.usage_percent = percent;
        }
        self.prev = Some(sample);
    }
}

/// Busy share of the ticks elapsed between two samples, or `None` when the
/// delta is unusable.
fn usage_between(prev: TickSample, curr: TickSample) -> Option<f64> {
    let total_delta = curr.total.checked_sub(prev.total)?;
    let idle_delta = curr.idle.checked_sub(prev.idle)?;
    if total_delta == 0 || idle_delta > total_delta {
        return None;
    }
    let busy = (total_delta - idle_delta) as f64;
    Some((busy * 100.0 / total_delta as f64).clamp(0.0, 100.0))
}

impl<F: FileSystem + 'static> Module for CpuModule<F> {
    fn name(&self) -> &'static str {
        NAME
    }

    fn poll(
        &mut self,
        _now_ms: u64,
        refresh_due: bool,
        builder: &mut SnapshotBuilder,
    ) -> Result<()> {
        if refresh_due || self.prev.is_none() {
            let sample = self.read_ticks()?;
            self.update(sample);
        }

        builder.add_double("cpu.usage_percent", Some("%"), self.usage_percent)?;
        if self.core_count > 0 {
            builder.add_uint64("cpu.core_count", None, u64::from(self.core_count))?;
        }
        Ok(())
    }
}
