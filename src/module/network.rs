//! Throughput of a single interface from `/proc/net/dev`.

use std::path::PathBuf;

use tracing::{debug, info};

use super::{
    CreateModule, Module, ModuleContext, missing, parse_failure, read_source, unsupported,
};
use crate::collector::FileSystem;
use crate::collector::procfs::{NetDevStats, parse_net_dev};
use crate::error::{Result, SysmonError};
use crate::snapshot::SnapshotBuilder;

pub const NAME: &str = "network";

const LOOPBACK: &str = "lo";

#[derive(Debug, Clone, Copy, Default, PartialEq)]
struct Counters {
    rx_bytes: u64,
    tx_bytes: u64,
    at_ms: u64,
}

#[derive(Debug, Clone, Copy, Default, PartialEq)]
struct Rates {
    rx_per_sec: f64,
    tx_per_sec: f64,
}

/// Bytes per second between two samples. A counter that went backwards
/// contributes a zero delta.
fn rates_between(prev: Counters, curr: Counters) -> Rates {
    let Some(elapsed_ms) = curr.at_ms.checked_sub(prev.at_ms).filter(|ms| *ms > 0) else {
        return Rates::default();
    };
    let secs = elapsed_ms as f64 / 1000.0;
    let per_sec = |prev: u64, curr: u64| curr.checked_sub(prev).unwrap_or(0) as f64 / secs;
    Rates {
        rx_per_sec: per_sec(prev.rx_bytes, curr.rx_bytes),
        tx_per_sec: per_sec(prev.tx_bytes, curr.tx_bytes),
    }
}

/// Picks the interface to follow: the requested one by exact name, or the
/// first one the loopback policy allows.
fn select_interface<'a>(
    devices: &'a [NetDevStats],
    requested: Option<&str>,
    include_loopback: bool,
) -> Option<&'a NetDevStats> {
    match requested {
        Some(name) => devices.iter().find(|d| d.interface == name),
        None => devices
            .iter()
            .find(|d| include_loopback || d.interface != LOOPBACK),
    }
}

pub struct NetworkModule<F> {
    fs: F,
    dev_path: PathBuf,
    interface: String,
    prev: Option<Counters>,
    rates: Rates,
}

impl<F: FileSystem + Clone + 'static> CreateModule<F> for NetworkModule<F> {
    fn create(ctx: &ModuleContext<'_, F>) -> Result<Self> {
        let requested = ctx.option("interface");
        let include_loopback = ctx.option_bool("include_loopback", false);

        let dev_path = ctx.proc_path("net/dev");
        let content = read_source(ctx.fs, &dev_path).map_err(unsupported)?;
        let devices =
            parse_net_dev(&content).map_err(|e| unsupported(parse_failure(&dev_path, e)))?;

        let Some(device) = select_interface(&devices, requested, include_loopback) else {
            let msg = match requested {
                Some(name) => format!("interface {} not found", name),
                None => "no usable network interface".to_string(),
            };
            info!(?requested, include_loopback, "{}", msg);
            return Err(SysmonError::not_supported(msg));
        };

        debug!(interface = %device.interface, "network module ready");
        Ok(Self {
            fs: ctx.fs.clone(),
            dev_path,
            interface: device.interface.clone(),
            prev: None,
            rates: Rates::default(),
        })
    }
}

impl<F: FileSystem> NetworkModule<F> {
    fn read_counters(&self, now_ms: u64) -> Result<Counters> {
        let content = read_source(&self.fs, &self.dev_path)?;
        let devices = parse_net_dev(&content).map_err(|e| parse_failure(&self.dev_path, e))?;
        let device = devices
            .iter()
            .find(|d| d.interface == self.interface)
            .ok_or_else(|| {
                SysmonError::io(
                    format!("failed to read {}", self.dev_path.display()),
                    missing(format!("interface {} disappeared", self.interface)),
                )
            })?;
        Ok(Counters {
            rx_bytes: device.rx_bytes,
            tx_bytes: device.tx_bytes,
            at_ms: now_ms,
        })
    }
}

impl<F: FileSystem + 'static> Module for NetworkModule<F> {
    fn name(&self) -> &'static str {
        NAME
    }

    fn poll(&mut self, now_ms: u64, refresh_due: bool, builder: &mut SnapshotBuilder) -> Result<()> {
        let counters = match self.prev {
            Some(prev) if !refresh_due => prev,
            prev => {
                let curr = self.read_counters(now_ms)?;
                self.rates = prev.map_or_else(Rates::default, |p| rates_between(p, curr));
                self.prev = Some(curr);
                curr
            }
        };

        builder.add_string("network.interface", None, &self.interface)?;
        builder.add_uint64("network.rx_bytes", Some("B"), counters.rx_bytes)?;
        builder.add_uint64("network.tx_bytes", Some("B"), counters.tx_bytes)?;
        builder.add_double("network.rx_bytes_per_sec", Some("B/s"), self.rates.rx_per_sec)?;
        builder.add_double("network.tx_bytes_per_sec", Some("B/s"), self.rates.tx_per_sec)?;
        Ok(())
    }
}
