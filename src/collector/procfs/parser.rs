//! Parsers for `/proc` and `/sys` files.
//!
//! These are pure functions that parse file contents into structured data.
//! They are designed to be easily testable with string inputs.

/// Error type for parsing failures.
#[derive(Debug, Clone, PartialEq)]
pub struct ParseError {
    pub message: String,
}

impl ParseError {
    pub fn new(msg: impl Into<String>) -> Self {
        Self {
            message: msg.into(),
        }
    }
}

impl std::fmt::Display for ParseError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Parse error: {}", self.message)
    }
}

impl std::error::Error for ParseError {}

/// Aggregate CPU tick counters from the `cpu` line of `/proc/stat`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CpuTimes {
    pub user: u64,
    pub nice: u64,
    pub system: u64,
    pub idle: u64,
    pub iowait: u64,
    pub irq: u64,
    pub softirq: u64,
    pub steal: u64,
}

impl CpuTimes {
    /// Ticks spent idle, including time waiting on I/O.
    pub fn idle_all(&self) -> u64 {
        self.idle.saturating_add(self.iowait)
    }

    /// All ticks. Guest time is already folded into user/nice by the kernel.
    pub fn total(&self) -> u64 {
        [
            self.user,
            self.nice,
            self.system,
            self.idle,
            self.iowait,
            self.irq,
            self.softirq,
            self.steal,
        ]
        .iter()
        .fold(0u64, |acc, v| acc.saturating_add(*v))
    }
}

/// CPU data from `/proc/stat`.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CpuStat {
    pub aggregate: CpuTimes,
    /// Number of per-core `cpuN` lines.
    pub core_count: u32,
}

/// Parses `/proc/stat` content.
///
/// The aggregate `cpu` line must carry at least user, nice, system and idle.
pub fn parse_cpu_stat(content: &str) -> Result<CpuStat, ParseError> {
    let mut aggregate = None;
    let mut core_count = 0u32;

    for line in content.lines() {
        let parts: Vec<&str> = line.split_whitespace().collect();
        let Some(label) = parts.first() else {
            continue;
        };

        if *label == "cpu" {
            let values: Vec<u64> = parts[1..]
                .iter()
                .map_while(|s| s.parse().ok())
                .collect();
            if values.len() < 4 {
                return Err(ParseError::new("unexpected /proc/stat cpu line format"));
            }
            let get_val = |idx: usize| -> u64 { values.get(idx).copied().unwrap_or(0) };
            aggregate = Some(CpuTimes {
                user: get_val(0),
                nice: get_val(1),
                system: get_val(2),
                idle: get_val(3),
                iowait: get_val(4),
                irq: get_val(5),
                softirq: get_val(6),
                steal: get_val(7),
            });
        } else if label
            .strip_prefix("cpu")
            .is_some_and(|id| !id.is_empty() && id.bytes().all(|b| b.is_ascii_digit()))
        {
            core_count += 1;
        }
    }

    let aggregate = aggregate.ok_or_else(|| ParseError::new("missing aggregate cpu line"))?;
    Ok(CpuStat {
        aggregate,
        core_count,
    })
}

/// Parsed data from `/proc/meminfo`, in kB.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MemInfo {
    pub mem_total: u64,
    pub mem_free: u64,
    pub mem_available: u64,
}

/// Parses `/proc/meminfo` content.
pub fn parse_meminfo(content: &str) -> Result<MemInfo, ParseError> {
    let mut info = MemInfo::default();

    let parse_kb = |line: &str| -> u64 {
        line.split_whitespace()
            .nth(1)
            .and_then(|s| s.parse().ok())
            .unwrap_or(0)
    };

    for line in content.lines() {
        if line.starts_with("MemTotal:") {
            info.mem_total = parse_kb(line);
        } else if line.starts_with("MemFree:") {
            info.mem_free = parse_kb(line);
        } else if line.starts_with("MemAvailable:") {
            info.mem_available = parse_kb(line);
        }
    }

    Ok(info)
}

/// Byte counters of one interface from `/proc/net/dev`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct NetDevStats {
    /// Interface name (eth0, lo, etc.)
    pub interface: String,
    pub rx_bytes: u64,
    pub tx_bytes: u64,
}

/// Parses `/proc/net/dev` content, preserving the kernel's interface order.
///
/// Format:
/// Inter-|   Receive                                                |  Transmit
///  face |bytes    packets errs drop fifo frame compressed multicast|bytes    packets errs drop fifo colls carrier compressed
///    lo: 1234567     1234    0    0    0     0          0         0  1234567     1234    0    0    0     0       0          0
pub fn parse_net_dev(content: &str) -> Result<Vec<NetDevStats>, ParseError> {
    let mut devices = Vec::new();

    for line in content.lines() {
        // Skip header lines
        if line.contains('|') || line.trim().is_empty() {
            continue;
        }

        let Some((name, counters)) = line.split_once(':') else {
            continue;
        };

        let values: Vec<&str> = counters.split_whitespace().collect();
        if values.len() < 9 {
            continue;
        }

        let get_val =
            |idx: usize| -> u64 { values.get(idx).and_then(|s| s.parse().ok()).unwrap_or(0) };

        devices.push(NetDevStats {
            interface: name.trim().to_string(),
            rx_bytes: get_val(0),
            tx_bytes: get_val(8),
        });
    }

    Ok(devices)
}

/// Parses a single unsigned integer sysfs attribute such as `capacity`.
pub fn parse_sysfs_u32(content: &str) -> Result<u32, ParseError> {
    let trimmed = content.trim();
    trimmed
        .parse()
        .map_err(|_| ParseError::new(format!("invalid integer attribute {:?}", trimmed)))
}
