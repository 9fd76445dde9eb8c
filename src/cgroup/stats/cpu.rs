//! CPU accounting of a cgroup v2 directory.
//!
//! - `cpu.stat` is parsed into [`CpuStat`]; only the cumulative usage counters are kept.
//! - `cpu.max` is parsed into [`CpuLimit`], which also derives the effective core count a
//!   quota grants.
//!
//! # Examples
//!
//! ```rust
//! use resource_telemetry::cgroup::stats::{CpuStat, CpuLimit, KeyValueStat, SingleLineStat};
//!
//! let data = "usage_usec 1000000\nuser_usec 600000\nsystem_usec 400000\n";
//! let cpu_stat = CpuStat::from_reader(&mut data.as_bytes()).unwrap();
//! assert_eq!(cpu_stat.usage_usec, 1_000_000);
//!
//! let cpu_limit = CpuLimit::from_reader(&mut "150000 100000\n".as_bytes()).unwrap();
//! assert_eq!(cpu_limit.core_count(), Some(2));
//! ```

use std::collections::HashMap;
use std::io::BufRead;
use std::sync::LazyLock;

use super::{KeyValueStat, SingleLineStat};

/// Cumulative CPU time of a cgroup, in microseconds.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct CpuStat {
    /// Total time the cgroup used CPU (user + system).
    pub usage_usec: u64,
    /// Time spent in user space.
    pub user_usec: u64,
    /// Time spent in kernel space.
    pub system_usec: u64,
}

type Setter = fn(&mut CpuStat, u64);

static SETTERS: LazyLock<HashMap<&'static str, Setter>> = LazyLock::new(|| {
    let mut m: HashMap<&'static str, Setter> = HashMap::with_capacity(3);

    m.insert("usage_usec", |s, v| s.usage_usec = v);
    m.insert("user_usec", |s, v| s.user_usec = v);
    m.insert("system_usec", |s, v| s.system_usec = v);

    m
});

impl KeyValueStat for CpuStat {
    const SPLIT_CHAR: Option<char> = None;
    const SKIP_VALUES: usize = 0;
    const ALLOW_DUPLICATE_KEYS: bool = false;
    const ALLOW_MULTIPLE_KV_PER_LINE: bool = false;

    fn field_handlers() -> &'static HashMap<&'static str, fn(&mut Self, u64)> {
        &SETTERS
    }
}

/// CPU bandwidth limit from `cpu.max`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CpuLimit {
    /// Maximum CPU time in microseconds per period; `None` means `max` (unlimited).
    pub quota: Option<u64>,
    /// Enforcement period in microseconds, 100ms unless given.
    pub period: u64,
}

const DEFAULT_PERIOD: u64 = 100_000;

impl Default for CpuLimit {
    fn default() -> Self {
        Self {
            quota: None,
            period: DEFAULT_PERIOD,
        }
    }
}

impl CpuLimit {
    /// The fractional number of CPUs the quota grants, if limited.
    pub fn effective_cpus(&self) -> Option<f64> {
        match self.quota {
            Some(quota) if self.period > 0 => Some(quota as f64 / self.period as f64),
            _ => None,
        }
    }

    /// The quota rounded up to whole cores, if limited.
    pub fn core_count(&self) -> Option<u32> {
        let period = self.period;
        self.quota
            .filter(|_| period > 0)
            .map(|quota| quota.div_ceil(period).max(1) as u32)
    }
}

impl SingleLineStat for CpuLimit {
    /// Parses `<quota|max> [period]`.
    ///
    /// Never fails on content: an unparsable quota is treated as unlimited and an unparsable
    /// period falls back to 100ms.
    fn from_reader<R: BufRead>(buf: &mut R) -> std::io::Result<Self> {
        let mut line = String::new();
        buf.read_line(&mut line)?;
        let mut parts = line.split_whitespace();
        let quota = parts.next().and_then(|q| q.parse::<u64>().ok());
        let period = parts
            .next()
            .and_then(|p| p.parse::<u64>().ok())
            .unwrap_or(DEFAULT_PERIOD);

        Ok(CpuLimit { quota, period })
    }
}
