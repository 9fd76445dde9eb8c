use std::time::Instant;

use super::stats::{CgroupStats, KeyValueStat, SingleLineStat};
use super::{Collector, resolve_cgroup};
use crate::error::ResultOkLogExt;
use crate::fsutil;
use crate::netprobe::{self, Ethtool};
use crate::procfs::{LoadAverage, MemInfo, ProcPaths, cpuinfo, filesystem};
use crate::sampler::{ContainerStatsInfo, ContainerStatsProvider};

/// Counters remembered from the previous call, for rate computation.
#[derive(Debug, Clone, Copy)]
struct Previous {
    at: Instant,
    usage_usec: Option<u64>,
    net_bytes: Option<u64>,
}

/// [`ContainerStatsProvider`] backed by the process's own cgroup, v2 or v1.
#[derive(Debug)]
pub struct CgroupStatsProvider {
    collector: Collector,
    paths: ProcPaths,
    ethtool: Ethtool,
    interface: String,
    previous: Option<Previous>,
}

impl CgroupStatsProvider {
    /// Locates the cgroup of this process and opens its interface files.
    ///
    /// Without a resolvable hierarchy the provider still runs on host-level sources alone
    /// (load, meminfo, root filesystem, network); cgroup-only figures stay at zero.
    pub fn new(paths: ProcPaths, ethtool: Ethtool, interface: String) -> Self {
        let collector = match resolve_cgroup(&paths.self_mountinfo(), &paths.self_cgroup()) {
            Ok(layout) => {
                log::debug!("Reading container accounting from {layout:?}");
                Collector::for_layout(&layout, &paths)
            }
            Err(err) => {
                log::warn!("No cgroup hierarchy found, reporting host-level figures only: {err}");
                Collector::detached(&paths)
            }
        };
        Self::with_collector(collector, paths, ethtool, interface)
    }

    pub fn with_collector(
        collector: Collector,
        paths: ProcPaths,
        ethtool: Ethtool,
        interface: String,
    ) -> Self {
        Self {
            collector,
            paths,
            ethtool,
            interface,
            previous: None,
        }
    }

    fn link_speed(&self) -> u64 {
        let raw = self
            .ethtool
            .speed(&self.interface)
            .ok_log_at(log::Level::Debug, format_args!("probing speed of {}", self.interface))
            .unwrap_or(0);
        netprobe::effective_speed(raw)
    }

    fn host_memory(&self) -> Option<MemInfo> {
        fsutil::parse_file(self.paths.meminfo(), MemInfo::from_reader)
            .ok_log_at(log::Level::Debug, "reading meminfo")
            .filter(|m| m.total_bytes > 0)
    }

    fn fill_memory(&self, stats: &CgroupStats, info: &mut ContainerStatsInfo) {
        let host = self.host_memory();
        let limit = stats.memory_limit.as_ref().and_then(|l| l.limit_bytes);
        // v1 reports "no limit" as a near-u64::MAX value
        let total = match (limit, host.as_ref()) {
            (Some(limit), Some(host)) => limit.min(host.total_bytes),
            (Some(limit), None) => limit,
            (None, Some(host)) => host.total_bytes,
            (None, None) => return,
        };
        let used = match (stats.memory_usage.as_ref(), host.as_ref()) {
            (Some(usage), _) => usage.usage_bytes,
            (None, Some(host)) => host.total_bytes.saturating_sub(host.available_bytes),
            (None, None) => 0,
        };
        info.total_memory_bytes = total;
        info.available_memory_bytes = total.saturating_sub(used);
        info.memory_usage_percent = used as f64 * 100.0 / total as f64;
    }
}

impl ContainerStatsProvider for CgroupStatsProvider {
    fn stats(&mut self) -> std::io::Result<ContainerStatsInfo> {
        let now = Instant::now();
        let stats = self.collector.refresh_stats()?;
        let mut info = ContainerStatsInfo::default();

        let logical = cpuinfo::logical_cpu_count();
        let limit = stats.cpu_limit.as_ref();
        let effective_cpus = limit
            .and_then(|l| l.effective_cpus())
            .unwrap_or(f64::from(logical));
        info.core_count = limit.and_then(|l| l.core_count()).unwrap_or(logical);

        let usage_usec = stats.cpu_stat.as_ref().map(|s| s.usage_usec);
        let net_bytes = stats.network_stat.map(|n| n.total_bytes());
        let speed = self.link_speed();
        info.network_speed_mbps = speed / 1024 / 1024;

        // rates need a previous sample, so the first call reports zero
        if let Some(prev) = self.previous {
            let elapsed = now.saturating_duration_since(prev.at);
            if let (Some(before), Some(after)) = (prev.usage_usec, usage_usec) {
                let wall_usec = elapsed.as_micros() as f64;
                info.cpu_usage_percent =
                    after.saturating_sub(before) as f64 / (wall_usec * effective_cpus) * 100.0;
            }
            if let (Some(before), Some(after)) = (prev.net_bytes, net_bytes) {
                let per_sec = after.saturating_sub(before) as f64 / elapsed.as_secs_f64();
                info.network_usage_percent = per_sec / (speed as f64 / 8.0) * 100.0;
            }
        }
        self.previous = Some(Previous {
            at: now,
            usage_usec,
            net_bytes,
        });

        info.io_wait_percent = stats.io_pressure.as_ref().map_or(0.0, |p| p.some_avg10);
        if let Some(io) = stats.io_stat.as_ref() {
            info.disk_read_bytes = io.rbytes;
            info.disk_write_bytes = io.wbytes;
        }

        self.fill_memory(&stats, &mut info);

        if let Some(load) = fsutil::parse_file(self.paths.loadavg(), LoadAverage::from_reader)
            .ok_log_at(log::Level::Debug, "reading load average")
        {
            info.load1 = load.one;
            info.load5 = load.five;
            info.load15 = load.fifteen;
        }

        if let Some(fs) = filesystem::statvfs(self.paths.root())
            .ok_log_at(log::Level::Debug, "querying root filesystem")
        {
            info.total_disk_bytes = fs.total_bytes;
            info.usable_disk_bytes = fs.usable_bytes;
        }

        Ok(info)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cgroup::CollectorBuilder;
    use std::path::Path;
    use std::time::Duration;

    fn write(dir: &Path, name: &str, contents: &str) {
        let path = dir.join(name);
        std::fs::create_dir_all(path.parent().unwrap()).unwrap();
        std::fs::write(path, contents).unwrap();
    }

    fn provider(root: &Path) -> CgroupStatsProvider {
        let cg = root.join("cg");
        let mut builder = CollectorBuilder::default();
        builder
            .set_cpu_stat_file(cg.join("cpu.stat"))
            .set_cpu_limit_file(cg.join("cpu.max"))
            .set_memory_usage_file(cg.join("memory.current"))
            .set_memory_limit_file(cg.join("memory.max"))
            .set_io_stat_file(cg.join("io.stat"))
            .set_io_pressure_file(cg.join("io.pressure"));
        CgroupStatsProvider::with_collector(
            builder.build(),
            ProcPaths::new(root),
            Ethtool::new("false", Duration::from_secs(1)),
            "eth0".into(),
        )
    }

    #[test]
    fn test_first_call_then_rates() {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path();
        write(root, "cg/cpu.stat", "usage_usec 0\nuser_usec 0\nsystem_usec 0\n");
        write(root, "cg/cpu.max", "150000 100000\n");
        write(root, "cg/memory.current", "256\n");
        write(root, "cg/memory.max", "1024\n");
        write(root, "cg/io.stat", "8:0 rbytes=10 wbytes=20\n8:16 rbytes=1 wbytes=2\n");
        write(
            root,
            "cg/io.pressure",
            "some avg10=1.25 avg60=0.00 avg300=0.00 total=9\nfull avg10=0.50 avg60=0.00 avg300=0.00 total=3\n",
        );
        write(root, "proc/loadavg", "0.10 0.20 0.30 1/1 1\n");

        let mut provider = provider(root);
        let first = provider.stats().unwrap();
        assert_eq!(first.cpu_usage_percent, 0.0);
        assert_eq!(first.core_count, 2);
        assert_eq!(first.total_memory_bytes, 1024);
        assert_eq!(first.available_memory_bytes, 768);
        assert_eq!(first.memory_usage_percent, 25.0);
        assert_eq!(first.io_wait_percent, 1.25);
        assert_eq!(first.disk_read_bytes, 11);
        assert_eq!(first.disk_write_bytes, 22);
        assert_eq!(first.load15, 0.30);
        assert_eq!(first.network_speed_mbps, 10_000);
        assert!(first.total_disk_bytes > 0);

        std::thread::sleep(Duration::from_millis(20));
        write(root, "cg/cpu.stat", "usage_usec 1000000\nuser_usec 0\nsystem_usec 0\n");
        let second = provider.stats().unwrap();
        assert!(second.cpu_usage_percent > 0.0);
    }

    #[test]
    fn test_unlimited_memory_uses_host_total() {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path();
        write(root, "cg/memory.current", "1024\n");
        write(root, "cg/memory.max", "max\n");
        write(root, "proc/meminfo", "MemTotal: 4 kB\nMemAvailable: 1 kB\n");

        let info = provider(root).stats().unwrap();
        assert_eq!(info.total_memory_bytes, 4096);
        assert_eq!(info.available_memory_bytes, 3072);
        assert_eq!(info.memory_usage_percent, 25.0);
        assert!(info.core_count >= 1);
    }

    #[test]
    fn test_missing_hierarchy_reports_host_figures() {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path();
        write(root, "proc/self/mountinfo", "25 1 0:6 / /proc rw - proc proc rw\n");
        write(root, "proc/self/cgroup", "0::/\n");
        write(root, "proc/loadavg", "0.50 0.40 0.30 1/1 1\n");
        write(root, "proc/meminfo", "MemTotal: 8 kB\nMemAvailable: 6 kB\n");

        let mut provider = CgroupStatsProvider::new(
            ProcPaths::new(root),
            Ethtool::new("false", Duration::from_secs(1)),
            "eth0".into(),
        );
        let info = provider.stats().unwrap();
        assert_eq!(info.cpu_usage_percent, 0.0);
        assert_eq!(info.load1, 0.50);
        assert_eq!(info.total_memory_bytes, 8192);
        assert_eq!(info.available_memory_bytes, 6144);
        assert_eq!(info.memory_usage_percent, 25.0);
    }

    #[test]
    fn test_cgroup_v1_container() {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path();
        let base = root.join("sys/fs/cgroup");
        write(
            root,
            "proc/self/mountinfo",
            &format!(
                "\
33 30 0:28 /docker/abc {base}/cpu,cpuacct rw - cgroup cgroup rw,cpu,cpuacct
34 30 0:29 /docker/abc {base}/memory rw - cgroup cgroup rw,memory
35 30 0:30 /docker/abc {base}/blkio rw - cgroup cgroup rw,blkio
",
                base = base.display()
            ),
        );
        write(
            root,
            "proc/self/cgroup",
            "12:memory:/docker/abc\n4:cpu,cpuacct:/docker/abc\n3:blkio:/docker/abc\n",
        );
        write(root, "sys/fs/cgroup/cpu,cpuacct/cpuacct.usage", "0\n");
        write(root, "sys/fs/cgroup/cpu,cpuacct/cpu.cfs_quota_us", "-1\n");
        write(root, "sys/fs/cgroup/cpu,cpuacct/cpu.cfs_period_us", "100000\n");
        write(root, "sys/fs/cgroup/memory/memory.usage_in_bytes", "1024\n");
        write(
            root,
            "sys/fs/cgroup/memory/memory.limit_in_bytes",
            "9223372036854771712\n",
        );
        write(
            root,
            "sys/fs/cgroup/blkio/blkio.throttle.io_service_bytes",
            "8:0 Read 100\n8:0 Write 200\nTotal 300\n",
        );
        write(root, "proc/meminfo", "MemTotal: 4 kB\nMemAvailable: 2 kB\n");

        let mut provider = CgroupStatsProvider::new(
            ProcPaths::new(root),
            Ethtool::new("false", Duration::from_secs(1)),
            "eth0".into(),
        );
        let first = provider.stats().unwrap();
        // "unlimited" clamps to host memory
        assert_eq!(first.total_memory_bytes, 4096);
        assert_eq!(first.available_memory_bytes, 3072);
        assert_eq!(first.memory_usage_percent, 25.0);
        assert_eq!(first.disk_read_bytes, 100);
        assert_eq!(first.disk_write_bytes, 200);
        assert_eq!(first.core_count, cpuinfo::logical_cpu_count());

        std::thread::sleep(Duration::from_millis(20));
        write(root, "sys/fs/cgroup/cpu,cpuacct/cpuacct.usage", "1000000000\n");
        let second = provider.stats().unwrap();
        assert!(second.cpu_usage_percent > 0.0);
    }
}
