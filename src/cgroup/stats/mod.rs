//! Parsers for the cgroup interface files the container sampler reads, and the
//! [`CgroupStats`] snapshot that bundles one read of all of them. v1 files are normalized
//! into the v2 types.
//!
//! The generic [`KeyValueStat`] / [`SingleLineStat`] traits are also used for procfs files
//! with the same shape (see [`crate::procfs`]).

mod cpu;
mod error;
mod io;
mod memory;
mod parser;
mod v1;

pub use cpu::{CpuLimit, CpuStat};
pub use error::StatParseError;
pub use io::{IoPressure, IoStat};
pub use memory::{MemoryLimit, MemoryUsage};
pub use parser::{KeyValueStat, SingleLineStat};
pub use v1::{BlkioStat, CfsPeriod, CfsQuota, CpuAcctUsage};

#[cfg(test)]
pub(crate) use error::extract_stat_parse_error;

use crate::procfs::NetworkStat;

/// One read of every cgroup file a [`crate::cgroup::Collector`] has open.
///
/// A file that could not be opened when the collector was built shows up as `None`.
#[derive(Debug, Clone, Default)]
pub struct CgroupStats {
    /// CPU usage from `cpu.stat` (v1: `cpuacct.usage`).
    pub cpu_stat: Option<CpuStat>,
    /// CPU bandwidth limit from `cpu.max` (v1: the CFS quota and period files).
    pub cpu_limit: Option<CpuLimit>,
    /// Charged memory from `memory.current` (v1: `memory.usage_in_bytes`).
    pub memory_usage: Option<MemoryUsage>,
    /// Memory limit from `memory.max` (v1: `memory.limit_in_bytes`).
    pub memory_limit: Option<MemoryLimit>,
    /// Block I/O byte counters from `io.stat` (v1: `blkio.throttle.io_service_bytes`).
    pub io_stat: Option<IoStat>,
    /// I/O stall share from `io.pressure` (v1: the host's `/proc/pressure/io`).
    pub io_pressure: Option<IoPressure>,
    /// Interface byte counters from `/proc/self/net/dev`.
    pub network_stat: Option<NetworkStat>,
}
