//! Settings resolved from a [`ConfigSource`].

use std::time::Duration;

use super::ConfigSource;
use crate::error::{Result, SysmonError};

/// Poll interval used when `[sysmon] interval_ms` is absent.
pub const DEFAULT_INTERVAL_MS: u32 = 1000;

/// Default mount point of procfs.
pub const DEFAULT_PROC_PATH: &str = "/proc";

/// Default mount point of sysfs.
pub const DEFAULT_SYS_PATH: &str = "/sys";

const GLOBAL_SECTION: &str = "sysmon";

/// Returns the configuration section of a module, e.g. `module.cpu`.
pub fn module_section(name: &str) -> String {
    format!("module.{}", name)
}

/// Global engine settings from the `[sysmon]` section.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EngineConfig {
    /// Interval the caller should wait between poll rounds.
    pub interval_ms: u32,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            interval_ms: DEFAULT_INTERVAL_MS,
        }
    }
}

impl EngineConfig {
    pub fn from_source(source: &dyn ConfigSource) -> Result<Self> {
        let interval_ms = source.get_u32(GLOBAL_SECTION, "interval_ms", DEFAULT_INTERVAL_MS)?;
        if interval_ms == 0 {
            return Err(SysmonError::parse(
                "invalid sysmon.interval_ms (must be an integer > 0)",
            ));
        }
        Ok(Self { interval_ms })
    }

    pub fn interval(&self) -> Duration {
        Duration::from_millis(u64::from(self.interval_ms))
    }
}

/// Per-module settings shared by every module variant.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ModuleSettings {
    pub enabled: bool,
    /// Minimum milliseconds between source refreshes; 0 refreshes every round.
    pub refresh_ms: u32,
}

impl ModuleSettings {
    pub fn from_source(source: &dyn ConfigSource, module: &str) -> Result<Self> {
        let section = module_section(module);
        let enabled = source.get_bool(&section, "enabled", true);
        let refresh_ms = source.get_u32(&section, "refresh_ms", 0)?;
        Ok(Self {
            enabled,
            refresh_ms,
        })
    }
}

/// Filesystem roots the collectors read from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EngineOptions {
    pub proc_path: String,
    pub sys_path: String,
}

impl Default for EngineOptions {
    fn default() -> Self {
        Self {
            proc_path: DEFAULT_PROC_PATH.to_string(),
            sys_path: DEFAULT_SYS_PATH.to_string(),
        }
    }
}
