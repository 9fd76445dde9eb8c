//! Interface files of the cgroup v1 controllers, mapped onto the v2 stat types.
//!
//! - `cpuacct.usage` holds cumulative CPU time in nanoseconds ([`CpuAcctUsage`]).
//! - `cpu.cfs_quota_us` and `cpu.cfs_period_us` split what `cpu.max` holds in one line
//!   ([`CfsQuota`], [`CfsPeriod`]).
//! - `blkio.throttle.io_service_bytes` lists `Read` and `Write` bytes per device
//!   ([`BlkioStat`]).
//!
//! `memory.usage_in_bytes` and `memory.limit_in_bytes` share the format of their v2
//! counterparts and are read with [`MemoryUsage`](super::MemoryUsage) and
//! [`MemoryLimit`](super::MemoryLimit).

use std::collections::HashMap;
use std::io::BufRead;
use std::sync::LazyLock;

use super::{CpuLimit, CpuStat, IoStat, KeyValueStat, SingleLineStat, StatParseError};

fn read_value<R: BufRead>(buf: &mut R) -> std::io::Result<String> {
    let mut line = String::new();
    buf.read_line(&mut line)?;
    Ok(line.trim().to_owned())
}

fn parse_u64(value: &str) -> std::io::Result<u64> {
    value.parse::<u64>().map_err(|source| {
        StatParseError::InvalidValue {
            value: value.to_owned(),
            line: 1,
            source,
        }
        .into()
    })
}

/// Cumulative CPU time from `cpuacct.usage`.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct CpuAcctUsage {
    pub usage_nsec: u64,
}

impl SingleLineStat for CpuAcctUsage {
    fn from_reader<R: BufRead>(buf: &mut R) -> std::io::Result<Self> {
        let usage_nsec = parse_u64(&read_value(buf)?)?;
        Ok(CpuAcctUsage { usage_nsec })
    }
}

impl From<CpuAcctUsage> for CpuStat {
    fn from(usage: CpuAcctUsage) -> Self {
        CpuStat {
            usage_usec: usage.usage_nsec / 1_000,
            ..CpuStat::default()
        }
    }
}

/// `cpu.cfs_quota_us`; `-1` means unlimited.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct CfsQuota {
    pub quota_usec: Option<u64>,
}

impl SingleLineStat for CfsQuota {
    fn from_reader<R: BufRead>(buf: &mut R) -> std::io::Result<Self> {
        let value = read_value(buf)?;
        let quota_usec = match value.as_str() {
            "-1" => None,
            other => Some(parse_u64(other)?),
        };
        Ok(CfsQuota { quota_usec })
    }
}

/// `cpu.cfs_period_us`.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct CfsPeriod {
    pub period_usec: u64,
}

impl SingleLineStat for CfsPeriod {
    fn from_reader<R: BufRead>(buf: &mut R) -> std::io::Result<Self> {
        let period_usec = parse_u64(&read_value(buf)?)?;
        Ok(CfsPeriod { period_usec })
    }
}

impl CpuLimit {
    /// Combines the two CFS files; a missing period keeps the kernel default of 100ms.
    pub fn from_cfs(quota: CfsQuota, period: Option<CfsPeriod>) -> Self {
        let default = CpuLimit::default();
        CpuLimit {
            quota: quota.quota_usec,
            period: period.map_or(default.period, |p| p.period_usec),
        }
    }
}

/// `Read` and `Write` byte counters of `blkio.throttle.io_service_bytes`, summed over devices.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct BlkioStat {
    pub read_bytes: u64,
    pub write_bytes: u64,
}

type Accumulator = fn(&mut BlkioStat, u64);

static ACCUMULATORS: LazyLock<HashMap<&'static str, Accumulator>> = LazyLock::new(|| {
    let mut m: HashMap<&'static str, Accumulator> = HashMap::with_capacity(2);

    m.insert("Read", |s, v| s.read_bytes += v);
    m.insert("Write", |s, v| s.write_bytes += v);

    m
});

impl KeyValueStat for BlkioStat {
    const SPLIT_CHAR: Option<char> = None;
    // device column; the trailing `Total <n>` line has no key left after skipping it
    const SKIP_VALUES: usize = 1;
    const ALLOW_DUPLICATE_KEYS: bool = true;
    const ALLOW_MULTIPLE_KV_PER_LINE: bool = false;

    fn field_handlers() -> &'static HashMap<&'static str, fn(&mut Self, u64)> {
        &ACCUMULATORS
    }
}

impl From<BlkioStat> for IoStat {
    fn from(stat: BlkioStat) -> Self {
        IoStat {
            rbytes: stat.read_bytes,
            wbytes: stat.write_bytes,
        }
    }
}
