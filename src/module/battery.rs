//! Battery charge and state from `/sys/class/power_supply`.

use std::path::{Path, PathBuf};

use tracing::debug;

use super::{CreateModule, Module, ModuleContext, parse_failure, read_source};
use crate::collector::FileSystem;
use crate::collector::procfs::parse_sysfs_u32;
use crate::error::{Result, SysmonError};
use crate::snapshot::SnapshotBuilder;

pub const NAME: &str = "battery";

const UNKNOWN_STATUS: &str = "unknown";

#[derive(Debug, Clone, PartialEq)]
struct BatteryState {
    percent: f64,
    charging: bool,
    status: String,
}

impl Default for BatteryState {
    fn default() -> Self {
        Self {
            percent: 0.0,
            charging: false,
            status: UNKNOWN_STATUS.to_string(),
        }
    }
}

pub struct BatteryModule<F> {
    fs: F,
    capacity_path: PathBuf,
    status_path: PathBuf,
    state: BatteryState,
    sampled: bool,
}

/// First `BAT*` supply (by name) that exposes a `capacity` attribute.
fn find_battery<F: FileSystem>(fs: &F, supply_dir: &Path) -> Option<PathBuf> {
    let mut entries = fs.read_dir(supply_dir).ok()?;
    entries.sort();
    entries.into_iter().find(|entry| {
        entry
            .file_name()
            .and_then(|n| n.to_str())
            .is_some_and(|n| n.starts_with("BAT"))
            && fs.exists(&entry.join("capacity"))
    })
}

impl<F: FileSystem + Clone + 'static> CreateModule<F> for BatteryModule<F> {
    fn create(ctx: &ModuleContext<'_, F>) -> Result<Self> {
        let supply_dir = ctx.sys_path("class/power_supply");
        let battery = find_battery(ctx.fs, &supply_dir).ok_or_else(|| {
            SysmonError::not_supported(format!("no battery under {}", supply_dir.display()))
        })?;

        debug!(path = %battery.display(), "battery module ready");
        Ok(Self {
            fs: ctx.fs.clone(),
            capacity_path: battery.join("capacity"),
            status_path: battery.join("status"),
            state: BatteryState::default(),
            sampled: false,
        })
    }
}

impl<F: FileSystem> BatteryModule<F> {
    fn refresh(&self) -> Result<BatteryState> {
        let content = read_source(&self.fs, &self.capacity_path)?;
        let capacity =
            parse_sysfs_u32(&content).map_err(|e| parse_failure(&self.capacity_path, e))?;

        let status = self
            .fs
            .read_to_string(&self.status_path)
            .ok()
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .unwrap_or_else(|| UNKNOWN_STATUS.to_string());

        Ok(BatteryState {
            percent: f64::from(capacity.min(100)),
            charging: status.eq_ignore_ascii_case("Charging"),
            status,
        })
    }
}

impl<F: FileSystem + 'static> Module for BatteryModule<F> {
    fn name(&self) -> &'static str {
        NAME
    }

    fn poll(
        &mut self,
        _now_ms: u64,
        refresh_due: bool,
        builder: &mut SnapshotBuilder,
    ) -> Result<()> {
        if refresh_due || !self.sampled {
            self.state = self.refresh()?;
            self.sampled = true;
        }

        builder.add_double("battery.percent", Some("%"), self.state.percent)?;
        builder.add_int64("battery.is_charging", None, i64::from(self.state.charging))?;
        builder.add_string("battery.status", None, &self.state.status)?;
        Ok(())
    }
}
