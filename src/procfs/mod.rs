//! Host-wide readers for `/proc` and `/sys`.
//!
//! Every reader parses from a [`BufRead`](std::io::BufRead) so it can be fed in-memory data in
//! tests; [`ProcPaths`] maps the well-known locations under a configurable root.
mod cpu;
pub mod cpuinfo;
pub mod diskstats;
pub mod filesystem;
mod loadavg;
mod meminfo;
mod netdev;

use std::path::{Path, PathBuf};

pub use cpu::{CpuTicks, CpuUsage, TickDeltaSampler};
pub use diskstats::DiskIo;
pub use filesystem::FileSystemUsage;
pub use loadavg::LoadAverage;
pub use meminfo::MemInfo;
pub use netdev::NetworkStat;

use crate::fsutil;

/// Locations of the procfs and sysfs files the samplers read, below one root.
#[derive(Debug, Clone)]
pub struct ProcPaths {
    root: PathBuf,
}

impl ProcPaths {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn stat(&self) -> PathBuf {
        fsutil::rooted(&self.root, "/proc/stat")
    }

    pub fn loadavg(&self) -> PathBuf {
        fsutil::rooted(&self.root, "/proc/loadavg")
    }

    pub fn meminfo(&self) -> PathBuf {
        fsutil::rooted(&self.root, "/proc/meminfo")
    }

    pub fn cpuinfo(&self) -> PathBuf {
        fsutil::rooted(&self.root, "/proc/cpuinfo")
    }

    pub fn diskstats(&self) -> PathBuf {
        fsutil::rooted(&self.root, "/proc/diskstats")
    }

    pub fn net_dev(&self) -> PathBuf {
        fsutil::rooted(&self.root, "/proc/net/dev")
    }

    pub fn self_net_dev(&self) -> PathBuf {
        fsutil::rooted(&self.root, "/proc/self/net/dev")
    }

    pub fn self_mountinfo(&self) -> PathBuf {
        fsutil::rooted(&self.root, "/proc/self/mountinfo")
    }

    pub fn self_cgroup(&self) -> PathBuf {
        fsutil::rooted(&self.root, "/proc/self/cgroup")
    }

    /// Host-wide I/O pressure, used where the cgroup has no `io.pressure` of its own.
    pub fn pressure_io(&self) -> PathBuf {
        fsutil::rooted(&self.root, "/proc/pressure/io")
    }

    pub fn sys_block(&self) -> PathBuf {
        fsutil::rooted(&self.root, "/sys/block")
    }
}

impl Default for ProcPaths {
    fn default() -> Self {
        Self::new("/")
    }
}
