use std::time::{Duration, Instant};

use super::{MetricsSnapshot, RecordHeader, Sampler};
use crate::cgroup::stats::{KeyValueStat, SingleLineStat};
use crate::environment::RuntimeEnvironment;
use crate::error::{Result, ResultOkLogExt};
use crate::fsutil;
use crate::netprobe::NetworkProbe;
use crate::procfs::{
    CpuUsage, DiskIo, LoadAverage, MemInfo, ProcPaths, TickDeltaSampler, cpuinfo, diskstats,
    filesystem,
};

/// How long filesystem warnings stay muted after one was logged.
pub const FILESYSTEM_WARN_COOLDOWN: Duration = Duration::from_secs(10 * 60);

/// Lets a warning through at most once per `period`.
#[derive(Debug)]
pub struct WarnCooldown {
    period: Duration,
    last: Option<Instant>,
}

impl WarnCooldown {
    pub fn new(period: Duration) -> Self {
        Self { period, last: None }
    }

    pub fn should_log(&mut self, now: Instant) -> bool {
        match self.last {
            Some(last) if now.saturating_duration_since(last) < self.period => false,
            _ => {
                self.last = Some(now);
                true
            }
        }
    }
}

/// Samples the whole machine from `/proc`, `/sys` and `ethtool`.
///
/// Every sub-query is independent; one that fails leaves its fields at zero.
#[derive(Debug)]
pub struct HostSampler {
    paths: ProcPaths,
    ticks: TickDeltaSampler,
    network: NetworkProbe,
    window: Duration,
    report_rates: bool,
    filesystem_warnings: WarnCooldown,
}

impl HostSampler {
    /// `report_rates` enables the io-wait and network-utilization columns, which otherwise
    /// render as a bare `0`.
    pub fn new(
        paths: ProcPaths,
        network: NetworkProbe,
        window: Duration,
        report_rates: bool,
    ) -> Self {
        Self {
            ticks: TickDeltaSampler::new(paths.stat(), window),
            paths,
            network,
            window,
            report_rates,
            filesystem_warnings: WarnCooldown::new(FILESYSTEM_WARN_COOLDOWN),
        }
    }

    fn core_count(&self) -> u32 {
        fsutil::parse_file(self.paths.cpuinfo(), |r| cpuinfo::physical_core_count(r))
            .ok_log_at(log::Level::Debug, "reading cpu topology")
            .flatten()
            .unwrap_or_else(cpuinfo::logical_cpu_count)
    }

    /// CPU and network deltas share one window so a tick sleeps only once.
    fn sample_rates(&self, snapshot: &mut MetricsSnapshot) {
        if self.report_rates {
            snapshot.io_wait_percent = Some(0.0);
            snapshot.network_rate_percent = Some(0.0);
        }

        let cpu_before = self
            .ticks
            .snapshot()
            .ok_log_at(log::Level::Debug, "reading cpu ticks");
        let network_window = self.network.begin();

        std::thread::sleep(self.window);

        if let Some(before) = cpu_before {
            if let Some(after) = self
                .ticks
                .snapshot()
                .ok_log_at(log::Level::Debug, "reading cpu ticks")
            {
                let usage = CpuUsage::between(&before, &after);
                snapshot.cpu_usage_percent = usage.cpu_usage;
                if self.report_rates {
                    snapshot.io_wait_percent = Some(usage.io_wait);
                }
            }
        }

        if let Some(reading) = network_window.and_then(|w| self.network.finish(w)) {
            snapshot.network_bandwidth_mbps = reading.bandwidth_mbps();
            if self.report_rates {
                snapshot.network_rate_percent = Some(reading.utilization_percent);
            }
        }
    }

    fn sample_filesystems(&mut self, snapshot: &mut MetricsSnapshot) {
        match filesystem::mounted_filesystem_usage(&self.paths.self_mountinfo(), self.paths.root())
        {
            Ok(usage) => {
                snapshot.total_disk_bytes = usage.total_bytes;
                snapshot.usable_disk_bytes = usage.usable_bytes;
            }
            Err(err) => {
                if self.filesystem_warnings.should_log(Instant::now()) {
                    log::warn!("Failed to query filesystem capacity: {err}");
                } else {
                    log::debug!("Failed to query filesystem capacity: {err}");
                }
            }
        }
    }
}

impl Sampler for HostSampler {
    fn sample(&mut self, header: RecordHeader) -> Result<MetricsSnapshot> {
        let mut snapshot = MetricsSnapshot::new(header, RuntimeEnvironment::Host);
        snapshot.core_count = self.core_count();

        self.sample_rates(&mut snapshot);

        if let Some(load) = fsutil::parse_file(self.paths.loadavg(), LoadAverage::from_reader)
            .ok_log_at(log::Level::Debug, "reading load average")
        {
            snapshot.load1 = load.one;
            snapshot.load5 = load.five;
            snapshot.load15 = load.fifteen;
        }

        if let Some(mem) = fsutil::parse_file(self.paths.meminfo(), MemInfo::from_reader)
            .ok_log_at(log::Level::Debug, "reading meminfo")
        {
            snapshot.memory_usage_percent = mem.usage_percent();
            snapshot.total_memory_bytes = mem.total_bytes;
            snapshot.available_memory_bytes = mem.available_bytes;
        }

        self.sample_filesystems(&mut snapshot);

        let sys_block = self.paths.sys_block();
        if let Some(io) = fsutil::parse_file(self.paths.diskstats(), |r| {
            DiskIo::from_reader(r, |name| diskstats::is_whole_disk(&sys_block, name))
        })
        .ok_log_at(log::Level::Debug, "reading diskstats")
        {
            snapshot.disk_read_bytes = io.read_bytes;
            snapshot.disk_write_bytes = io.write_bytes;
        }

        Ok(snapshot)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::netprobe::{Ethtool, InterfaceSelection};
    use std::path::Path;

    const WINDOW: Duration = Duration::from_millis(5);

    fn write(root: &Path, rel: &str, contents: &str) {
        let path = root.join(rel);
        std::fs::create_dir_all(path.parent().unwrap()).unwrap();
        std::fs::write(path, contents).unwrap();
    }

    fn sampler(root: &Path, report_rates: bool) -> HostSampler {
        let paths = ProcPaths::new(root);
        let network = NetworkProbe::new(
            Ethtool::new("false", Duration::from_secs(1)),
            paths.net_dev(),
            InterfaceSelection::Named("eth0".into()),
            WINDOW,
        );
        HostSampler::new(paths, network, WINDOW, report_rates)
    }

    fn fake_root() -> tempfile::TempDir {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path();
        write(root, "proc/stat", "cpu  100 0 50 800 50 0 0 0 0 0\n");
        write(root, "proc/loadavg", "1.25 0.50 0.25 1/100 42\n");
        write(
            root,
            "proc/meminfo",
            "MemTotal:  2000 kB\nMemFree:  100 kB\nMemAvailable:  500 kB\n",
        );
        write(
            root,
            "proc/cpuinfo",
            "physical id\t: 0\ncore id\t\t: 0\n\nphysical id\t: 0\ncore id\t\t: 1\n\n",
        );
        write(
            root,
            "proc/diskstats",
            "   8       0 sda 10 0 4 0 10 0 8 0 0 0 0\n   8       1 sda1 10 0 4 0 10 0 8 0 0 0 0\n",
        );
        std::fs::create_dir_all(root.join("sys/block/sda")).unwrap();
        write(
            root,
            "proc/net/dev",
            "h1\nh2\n  eth0: 100 1 0 0 0 0 0 0 100 1 0 0 0 0 0 0\n",
        );
        write(
            root,
            "proc/self/mountinfo",
            "22 1 8:1 / / rw - ext4 /dev/sda1 rw\n",
        );
        dir
    }

    #[test]
    fn test_host_snapshot_from_fake_root() {
        let root = fake_root();
        let snap = sampler(root.path(), false)
            .sample(RecordHeader::default())
            .unwrap();

        assert_eq!(snap.mode, RuntimeEnvironment::Host);
        assert_eq!(snap.core_count, 2);
        assert_eq!(snap.load1, 1.25);
        assert_eq!(snap.load15, 0.25);
        assert_eq!(snap.total_memory_bytes, 2000 * 1024);
        assert_eq!(snap.available_memory_bytes, 500 * 1024);
        assert_eq!(snap.memory_usage_percent, 75.0);
        assert_eq!(snap.disk_read_bytes, 4 * 512);
        assert_eq!(snap.disk_write_bytes, 8 * 512);
        // "/" resolves to the temp dir itself
        assert!(snap.total_disk_bytes > 0);
        // counters did not move: undefined cpu, reported as NaN until formatting
        assert!(snap.cpu_usage_percent.is_nan());
        assert_eq!(snap.io_wait_percent, None);
        assert_eq!(snap.network_bandwidth_mbps, 10_000);
        assert_eq!(snap.network_rate_percent, None);
    }

    #[test]
    fn test_rates_reported_when_enabled() {
        let root = fake_root();
        let snap = sampler(root.path(), true)
            .sample(RecordHeader::default())
            .unwrap();
        assert!(snap.io_wait_percent.is_some_and(f64::is_nan));
        assert_eq!(snap.network_rate_percent, Some(0.0));
    }

    #[test]
    fn test_empty_root_still_emits() {
        let root = tempfile::tempdir().unwrap();
        let snap = sampler(root.path(), false)
            .sample(RecordHeader::default())
            .unwrap();
        assert_eq!(snap.total_memory_bytes, 0);
        assert_eq!(snap.load5, 0.0);
        assert_eq!(snap.total_disk_bytes, 0);
        assert_eq!(snap.network_bandwidth_mbps, 0);
        assert!(snap.core_count >= 1);
    }

    #[test]
    fn test_filesystem_failure_warns_once_per_cooldown() {
        crate::testlog::capture();
        let root = fake_root();
        std::fs::remove_file(root.path().join("proc/self/mountinfo")).unwrap();
        let mut sampler = sampler(root.path(), false);

        for _ in 0..2 {
            let snap = sampler.sample(RecordHeader::default()).unwrap();
            assert_eq!(snap.total_disk_bytes, 0);
            assert_eq!(snap.load1, 1.25);
        }

        let needle = "Failed to query filesystem capacity";
        assert_eq!(crate::testlog::count(log::Level::Warn, needle), 1);
        assert_eq!(crate::testlog::count(log::Level::Debug, needle), 1);
    }

    #[test]
    fn test_warn_cooldown() {
        let mut cooldown = WarnCooldown::new(Duration::from_secs(600));
        let t0 = Instant::now();
        assert!(cooldown.should_log(t0));
        assert!(!cooldown.should_log(t0 + Duration::from_secs(599)));
        assert!(cooldown.should_log(t0 + Duration::from_secs(600)));
        assert!(!cooldown.should_log(t0 + Duration::from_secs(601)));
    }
}
