//! Pre-built mock filesystem scenarios for testing.
//!
//! Paths follow the default roots (`/proc`, `/sys`). Setters rewrite whole
//! files so a test can move counters between poll rounds.

use super::filesystem::MockFs;
use crate::collector::traits::FsUsage;

/// Number of `cpuN` lines written by [`MockFs::set_cpu_times`].
pub const MOCK_CORES: u64 = 4;

const NET_DEV_HEADER: &str = "\
Inter-|   Receive                                                |  Transmit
 face |bytes    packets errs drop fifo frame compressed multicast|bytes    packets errs drop fifo colls carrier compressed
";

impl MockFs {
    /// Laptop with a battery, loopback plus one wireless interface, and a
    /// root filesystem.
    pub fn typical_laptop() -> Self {
        let fs = Self::new();
        fs.set_cpu_times(1000, 9000);
        fs.set_meminfo(16384000, 8192000, 12000000);
        fs.set_net_dev(&[("lo", 5000, 5000), ("wlan0", 1_000_000, 250_000)]);
        fs.add_file("/sys/class/power_supply/AC/online", "0\n");
        fs.set_battery("BAT0", 87, "Discharging");
        fs.set_mount(
            "/",
            FsUsage {
                total_bytes: 500_000_000_000,
                free_bytes: 200_000_000_000,
                available_bytes: 175_000_000_000,
            },
        );
        fs
    }

    /// Server without any battery, wired interface listed after loopback.
    pub fn headless_server() -> Self {
        let fs = Self::new();
        fs.set_cpu_times(50_000, 150_000);
        fs.set_meminfo(65536000, 1024000, 0);
        fs.set_net_dev(&[
            ("lo", 12345678, 12345678),
            ("eth0", 987654321, 123456789),
        ]);
        fs.add_dir("/sys/class/power_supply");
        fs.set_mount(
            "/",
            FsUsage {
                total_bytes: 2_000_000_000_000,
                free_bytes: 1_500_000_000_000,
                available_bytes: 1_400_000_000_000,
            },
        );
        fs
    }

    /// Rewrites `/proc/stat` so the aggregate line has `busy` non-idle ticks
    /// (all accounted as user) and `idle` idle ticks.
    pub fn set_cpu_times(&self, busy: u64, idle: u64) {
        let mut content = format!("cpu  {} 0 0 {} 0 0 0 0 0 0\n", busy, idle);
        for id in 0..MOCK_CORES {
            content.push_str(&format!(
                "cpu{} {} 0 0 {} 0 0 0 0 0 0\n",
                id,
                busy / MOCK_CORES,
                idle / MOCK_CORES
            ));
        }
        content.push_str("ctxt 500000\nbtime 1700000000\nprocesses 10000\n");
        self.add_file("/proc/stat", content);
    }

    /// Rewrites `/proc/meminfo` with values in kB.
    pub fn set_meminfo(&self, total_kb: u64, free_kb: u64, available_kb: u64) {
        self.add_file(
            "/proc/meminfo",
            format!(
                "\
MemTotal:       {} kB
MemFree:        {} kB
MemAvailable:   {} kB
Buffers:          512000 kB
Cached:          2048000 kB
SwapTotal:       4096000 kB
SwapFree:        4096000 kB
",
                total_kb, free_kb, available_kb
            ),
        );
    }

    /// Rewrites `/proc/net/dev` with `(interface, rx_bytes, tx_bytes)` rows.
    pub fn set_net_dev(&self, interfaces: &[(&str, u64, u64)]) {
        let mut content = String::from(NET_DEV_HEADER);
        for (name, rx, tx) in interfaces {
            content.push_str(&format!(
                "{:>6}: {} 100 0 0 0 0 0 0 {} 80 0 0 0 0 0 0\n",
                name, rx, tx
            ));
        }
        self.add_file("/proc/net/dev", content);
    }

    /// Creates or updates `/sys/class/power_supply/<name>`.
    pub fn set_battery(&self, name: &str, capacity: u32, status: &str) {
        let base = format!("/sys/class/power_supply/{}", name);
        self.add_file(format!("{}/capacity", base), format!("{}\n", capacity));
        self.add_file(format!("{}/status", base), format!("{}\n", status));
    }
}
