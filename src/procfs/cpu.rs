//! CPU tick counters from `/proc/stat` and the two-snapshot busy / io-wait computation.

use std::io::BufRead;
use std::path::PathBuf;
use std::time::Duration;

use crate::cgroup::stats::StatParseError;
use crate::fsutil;

/// Aggregate CPU tick counters (the `cpu` line of `/proc/stat`), in clock ticks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct CpuTicks {
    pub user: u64,
    pub nice: u64,
    pub system: u64,
    pub idle: u64,
    pub iowait: u64,
    pub irq: u64,
    pub softirq: u64,
}

impl CpuTicks {
    /// Parses the aggregate `cpu` line of a `/proc/stat`-formatted reader.
    ///
    /// Kernels older than 2.6 report fewer columns; missing columns read as zero.
    ///
    /// # Errors
    ///
    /// `InvalidData` if there is no `cpu` line or a column is not numeric.
    pub fn from_reader<R: BufRead>(buf: &mut R) -> std::io::Result<Self> {
        let mut line = String::new();
        let mut lineno = 0;
        while buf.read_line(&mut line)? != 0 {
            lineno += 1;
            let mut parts = line.split_whitespace();
            if parts.next() == Some("cpu") {
                let mut values = [0u64; 7];
                for (slot, raw) in values.iter_mut().zip(parts) {
                    *slot = raw
                        .parse::<u64>()
                        .map_err(|source| StatParseError::InvalidValue {
                            value: raw.to_string(),
                            line: lineno,
                            source,
                        })?;
                }
                let [user, nice, system, idle, iowait, irq, softirq] = values;
                return Ok(CpuTicks {
                    user,
                    nice,
                    system,
                    idle,
                    iowait,
                    irq,
                    softirq,
                });
            }
            line.clear();
        }

        Err(StatParseError::MissingField("cpu").into())
    }

    /// Per-category tick movement since `earlier`. A counter that went backwards (reset)
    /// counts as no movement.
    pub fn delta_since(&self, earlier: &CpuTicks) -> CpuTicks {
        CpuTicks {
            user: self.user.saturating_sub(earlier.user),
            nice: self.nice.saturating_sub(earlier.nice),
            system: self.system.saturating_sub(earlier.system),
            idle: self.idle.saturating_sub(earlier.idle),
            iowait: self.iowait.saturating_sub(earlier.iowait),
            irq: self.irq.saturating_sub(earlier.irq),
            softirq: self.softirq.saturating_sub(earlier.softirq),
        }
    }

    pub fn total(&self) -> u64 {
        self.user + self.nice + self.system + self.idle + self.iowait + self.irq + self.softirq
    }
}

/// CPU busy and io-wait share of one sampling window, in percent.
///
/// Both values are NaN when no tick moved during the window; formatting renders that as `0.00`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CpuUsage {
    pub cpu_usage: f64,
    pub io_wait: f64,
}

impl CpuUsage {
    pub fn between(before: &CpuTicks, after: &CpuTicks) -> Self {
        let delta = after.delta_since(before);
        let total = delta.total() as f64;
        CpuUsage {
            cpu_usage: (total - delta.idle as f64) * 100.0 / total,
            io_wait: delta.iowait as f64 * 100.0 / total,
        }
    }
}

/// Reads `/proc/stat` snapshots and turns pairs of them into [`CpuUsage`].
#[derive(Debug, Clone)]
pub struct TickDeltaSampler {
    stat_path: PathBuf,
    window: Duration,
}

impl TickDeltaSampler {
    pub fn new(stat_path: PathBuf, window: Duration) -> Self {
        Self { stat_path, window }
    }

    /// Reads the current tick counters.
    pub fn snapshot(&self) -> std::io::Result<CpuTicks> {
        fsutil::parse_file(&self.stat_path, CpuTicks::from_reader)
    }

    /// Takes two snapshots one sampling window apart, blocking for the window.
    pub fn cpu_and_io_wait(&self) -> std::io::Result<CpuUsage> {
        let before = self.snapshot()?;
        std::thread::sleep(self.window);
        let after = self.snapshot()?;
        Ok(CpuUsage::between(&before, &after))
    }
}
