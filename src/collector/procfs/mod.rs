//! Parsers for the Linux `/proc` and `/sys` files the modules read.

pub mod parser;

pub use parser::{
    CpuStat, CpuTimes, MemInfo, NetDevStats, ParseError, parse_cpu_stat, parse_meminfo,
    parse_net_dev, parse_sysfs_u32,
};
