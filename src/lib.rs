//! sysmon - host metrics engine.
//!
//! Polls CPU, memory, battery, network and storage metrics through a set of
//! independent modules and returns one typed [`Snapshot`] per round.
//!
//! ```no_run
//! use sysmon::{Engine, EngineOptions, IniConfig, RealFs};
//!
//! let config = IniConfig::default();
//! let mut engine = Engine::new(&config, RealFs::new(), &EngineOptions::default())?;
//! let snapshot = engine.poll()?;
//! println!("{}", sysmon::fmt::format_human(&snapshot));
//! # Ok::<(), sysmon::SysmonError>(())
//! ```

pub mod clock;
pub mod collector;
pub mod config;
pub mod engine;
pub mod error;
pub mod fmt;
pub mod module;
pub mod snapshot;

pub use clock::{Clock, ManualClock, MonotonicClock};
pub use collector::{FileSystem, FsUsage, MockFs, RealFs};
pub use config::{ConfigSource, EngineConfig, EngineOptions, IniConfig};
pub use engine::{Engine, ModuleStatus};
pub use error::{ErrorKind, Result, SysmonError};
pub use snapshot::{Metric, MetricType, MetricValue, Snapshot, SnapshotBuilder};
