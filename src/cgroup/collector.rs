use super::stats::{
    BlkioStat, CfsPeriod, CfsQuota, CgroupStats, CpuAcctUsage, CpuLimit, CpuStat, IoPressure,
    IoStat, KeyValueStat, MemoryLimit, MemoryUsage, SingleLineStat,
};
use super::{CgroupLayout, LegacyDirs};
use crate::procfs::{NetworkStat, ProcPaths};
use std::fs::File;
use std::io::BufReader;
use std::path::Path;

use super::utils;

type Handle = Option<BufReader<File>>;

/// Keeps the cgroup and procfs files of one container open and re-reads them on demand.
///
/// v2 and v1 files share the collector; for each figure the v2 file is read when open and
/// the v1 file otherwise.
#[derive(Debug)]
pub struct Collector {
    cpu_stat_file: Handle,
    cpu_limit_file: Handle,
    memory_usage_file: Handle,
    memory_limit_file: Handle,
    io_stat_file: Handle,
    io_pressure_file: Handle,
    network_stat_file: Handle,
    cpuacct_usage_file: Handle,
    cfs_quota_file: Handle,
    cfs_period_file: Handle,
    blkio_file: Handle,
}

impl Collector {
    /// Builds a collector for the cgroup v2 directory `cgroup_dir`, reading interface counters
    /// from `net_dev`.
    pub fn for_cgroup(cgroup_dir: &Path, net_dev: &Path) -> Self {
        let mut builder = CollectorBuilder::default();
        builder
            .set_cpu_stat_file(cgroup_dir.join("cpu.stat"))
            .set_cpu_limit_file(cgroup_dir.join("cpu.max"))
            .set_memory_usage_file(cgroup_dir.join("memory.current"))
            .set_memory_limit_file(cgroup_dir.join("memory.max"))
            .set_io_stat_file(cgroup_dir.join("io.stat"))
            .set_io_pressure_file(cgroup_dir.join("io.pressure"))
            .set_network_stat_file(net_dev);
        builder.build()
    }

    /// Builds a collector over per-controller cgroup v1 directories. I/O pressure falls back
    /// to the host-wide PSI file, which v1 cgroups lack.
    pub fn for_legacy(dirs: &LegacyDirs, paths: &ProcPaths) -> Self {
        let mut builder = CollectorBuilder::default();
        if let Some(cpu) = &dirs.cpu {
            builder
                .set_cfs_quota_file(cpu.join("cpu.cfs_quota_us"))
                .set_cfs_period_file(cpu.join("cpu.cfs_period_us"));
        }
        if let Some(cpuacct) = &dirs.cpuacct {
            builder.set_cpuacct_usage_file(cpuacct.join("cpuacct.usage"));
        }
        if let Some(memory) = &dirs.memory {
            builder
                .set_memory_usage_file(memory.join("memory.usage_in_bytes"))
                .set_memory_limit_file(memory.join("memory.limit_in_bytes"));
        }
        if let Some(blkio) = &dirs.blkio {
            builder.set_blkio_file(blkio.join("blkio.throttle.io_service_bytes"));
        }
        builder
            .set_io_pressure_file(paths.pressure_io())
            .set_network_stat_file(paths.self_net_dev());
        builder.build()
    }

    pub fn for_layout(layout: &CgroupLayout, paths: &ProcPaths) -> Self {
        match layout {
            CgroupLayout::Unified(dir) => Self::for_cgroup(dir, &paths.self_net_dev()),
            CgroupLayout::Legacy(dirs) => Self::for_legacy(dirs, paths),
        }
    }

    /// A collector without any cgroup files, for when no hierarchy could be resolved.
    pub fn detached(paths: &ProcPaths) -> Self {
        Self::for_legacy(&LegacyDirs::default(), paths)
    }

    /// Collects and returns resource usage statistics for the container.
    ///
    /// # Errors
    ///
    /// Returns an I/O error if reading or parsing any open stat file fails.
    pub fn refresh_stats(&mut self) -> std::io::Result<CgroupStats> {
        Ok(CgroupStats {
            cpu_stat: self.read_cpu_stat()?,
            cpu_limit: self.read_cpu_limit()?,
            memory_usage: utils::read_and_rewind(
                self.memory_usage_file.as_mut(),
                MemoryUsage::from_reader,
            )?,
            memory_limit: utils::read_and_rewind(
                self.memory_limit_file.as_mut(),
                MemoryLimit::from_reader,
            )?,
            io_stat: self.read_io_stat()?,
            io_pressure: utils::read_and_rewind(
                self.io_pressure_file.as_mut(),
                IoPressure::from_reader,
            )?,
            network_stat: utils::read_and_rewind(
                self.network_stat_file.as_mut(),
                NetworkStat::from_reader,
            )?,
        })
    }

    fn read_cpu_stat(&mut self) -> std::io::Result<Option<CpuStat>> {
        if let Some(stat) =
            utils::read_and_rewind(self.cpu_stat_file.as_mut(), CpuStat::from_reader)?
        {
            return Ok(Some(stat));
        }
        let usage =
            utils::read_and_rewind(self.cpuacct_usage_file.as_mut(), CpuAcctUsage::from_reader)?;
        Ok(usage.map(CpuStat::from))
    }

    fn read_cpu_limit(&mut self) -> std::io::Result<Option<CpuLimit>> {
        if let Some(limit) =
            utils::read_and_rewind(self.cpu_limit_file.as_mut(), CpuLimit::from_reader)?
        {
            return Ok(Some(limit));
        }
        let quota =
            utils::read_and_rewind(self.cfs_quota_file.as_mut(), CfsQuota::from_reader)?;
        let period =
            utils::read_and_rewind(self.cfs_period_file.as_mut(), CfsPeriod::from_reader)?;
        Ok(quota.map(|quota| CpuLimit::from_cfs(quota, period)))
    }

    fn read_io_stat(&mut self) -> std::io::Result<Option<IoStat>> {
        if let Some(stat) =
            utils::read_and_rewind(self.io_stat_file.as_mut(), IoStat::from_reader)?
        {
            return Ok(Some(stat));
        }
        let blkio = utils::read_and_rewind(self.blkio_file.as_mut(), BlkioStat::from_reader)?;
        Ok(blkio.map(IoStat::from))
    }
}

#[derive(Debug, Default)]
pub struct CollectorBuilder {
    cpu_stat_file: Handle,
    cpu_limit_file: Handle,
    memory_usage_file: Handle,
    memory_limit_file: Handle,
    io_stat_file: Handle,
    io_pressure_file: Handle,
    network_stat_file: Handle,
    cpuacct_usage_file: Handle,
    cfs_quota_file: Handle,
    cfs_period_file: Handle,
    blkio_file: Handle,
}

impl CollectorBuilder {
    /// Sets the path to the `cpu.stat` file.
    pub fn set_cpu_stat_file(&mut self, path: impl AsRef<Path>) -> &mut Self {
        self.cpu_stat_file = utils::open_file(path);
        self
    }

    /// Sets the path to the CPU limit file (`cpu.max`).
    pub fn set_cpu_limit_file(&mut self, path: impl AsRef<Path>) -> &mut Self {
        self.cpu_limit_file = utils::open_file(path);
        self
    }

    /// Sets the path to the current memory usage file (`memory.current` or
    /// `memory.usage_in_bytes`).
    pub fn set_memory_usage_file(&mut self, path: impl AsRef<Path>) -> &mut Self {
        self.memory_usage_file = utils::open_file(path);
        self
    }

    /// Sets the path to the memory limit file (`memory.max` or `memory.limit_in_bytes`).
    pub fn set_memory_limit_file(&mut self, path: impl AsRef<Path>) -> &mut Self {
        self.memory_limit_file = utils::open_file(path);
        self
    }

    /// Sets the path to the I/O statistics file (`io.stat`).
    pub fn set_io_stat_file(&mut self, path: impl AsRef<Path>) -> &mut Self {
        self.io_stat_file = utils::open_file(path);
        self
    }

    /// Sets the path to the I/O pressure file (`io.pressure`).
    pub fn set_io_pressure_file(&mut self, path: impl AsRef<Path>) -> &mut Self {
        self.io_pressure_file = utils::open_file(path);
        self
    }

    /// Sets the path to the network statistics file (e.g., `/proc/self/net/dev`).
    pub fn set_network_stat_file(&mut self, path: impl AsRef<Path>) -> &mut Self {
        self.network_stat_file = utils::open_file(path);
        self
    }

    pub fn set_cpuacct_usage_file(&mut self, path: impl AsRef<Path>) -> &mut Self {
        self.cpuacct_usage_file = utils::open_file(path);
        self
    }

    pub fn set_cfs_quota_file(&mut self, path: impl AsRef<Path>) -> &mut Self {
        self.cfs_quota_file = utils::open_file(path);
        self
    }

    pub fn set_cfs_period_file(&mut self, path: impl AsRef<Path>) -> &mut Self {
        self.cfs_period_file = utils::open_file(path);
        self
    }

    /// Sets the path to `blkio.throttle.io_service_bytes`.
    pub fn set_blkio_file(&mut self, path: impl AsRef<Path>) -> &mut Self {
        self.blkio_file = utils::open_file(path);
        self
    }

    /// Builds the [`Collector`]. Files that were not set or could not be opened stay `None`.
    pub fn build(self) -> Collector {
        Collector {
            cpu_stat_file: self.cpu_stat_file,
            cpu_limit_file: self.cpu_limit_file,
            memory_usage_file: self.memory_usage_file,
            memory_limit_file: self.memory_limit_file,
            io_stat_file: self.io_stat_file,
            io_pressure_file: self.io_pressure_file,
            network_stat_file: self.network_stat_file,
            cpuacct_usage_file: self.cpuacct_usage_file,
            cfs_quota_file: self.cfs_quota_file,
            cfs_period_file: self.cfs_period_file,
            blkio_file: self.blkio_file,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn write(dir: &Path, name: &str, contents: &str) {
        std::fs::write(dir.join(name), contents).unwrap();
    }

    #[test]
    fn test_refresh_reads_every_file_and_rereads_after_change() {
        let dir = tempfile::tempdir().unwrap();
        let cg = dir.path();
        write(cg, "cpu.stat", "usage_usec 1000\nuser_usec 600\nsystem_usec 400\n");
        write(cg, "cpu.max", "200000 100000\n");
        write(cg, "memory.current", "4096\n");
        write(cg, "memory.max", "max\n");
        write(cg, "io.stat", "8:0 rbytes=10 wbytes=20\n");
        write(
            cg,
            "io.pressure",
            "some avg10=2.50 avg60=0.00 avg300=0.00 total=1\n",
        );
        write(
            cg,
            "net_dev",
            "\
Inter-|   Receive                                                |  Transmit
 face |bytes    packets errs drop fifo frame compressed multicast|bytes    packets errs drop fifo colls carrier compressed
  eth0: 100 1 0 0 0 0 0 0 200 2 0 0 0 0 0 0
",
        );

        let mut collector = Collector::for_cgroup(cg, &cg.join("net_dev"));
        let stats = collector.refresh_stats().unwrap();
        assert_eq!(stats.cpu_stat.unwrap().usage_usec, 1000);
        assert_eq!(stats.cpu_limit.unwrap().core_count(), Some(2));
        assert_eq!(stats.memory_usage.unwrap().usage_bytes, 4096);
        assert_eq!(stats.memory_limit.unwrap().limit_bytes, None);
        assert_eq!(stats.io_stat.unwrap().wbytes, 20);
        assert_eq!(stats.io_pressure.unwrap().some_avg10, 2.5);
        let net = stats.network_stat.unwrap();
        assert_eq!((net.rx_bytes, net.tx_bytes), (100, 200));

        // the same open handle must observe the new contents
        write(cg, "memory.current", "8192\n");
        let stats = collector.refresh_stats().unwrap();
        assert_eq!(stats.memory_usage.unwrap().usage_bytes, 8192);
    }

    #[test]
    fn test_legacy_files_fill_the_same_stats() {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path();
        for sub in ["cpu", "memory", "blkio", "proc/self/net", "proc/pressure"] {
            std::fs::create_dir_all(root.join(sub)).unwrap();
        }
        write(root, "cpu/cpuacct.usage", "3000000\n");
        write(root, "cpu/cpu.cfs_quota_us", "50000\n");
        write(root, "cpu/cpu.cfs_period_us", "100000\n");
        write(root, "memory/memory.usage_in_bytes", "2048\n");
        write(root, "memory/memory.limit_in_bytes", "9223372036854771712\n");
        write(
            root,
            "blkio/blkio.throttle.io_service_bytes",
            "8:0 Read 7\n8:0 Write 9\nTotal 16\n",
        );
        write(
            root,
            "proc/pressure/io",
            "some avg10=0.75 avg60=0.00 avg300=0.00 total=1\n",
        );

        let dirs = LegacyDirs {
            cpu: Some(root.join("cpu")),
            cpuacct: Some(root.join("cpu")),
            memory: Some(root.join("memory")),
            blkio: Some(root.join("blkio")),
        };
        let mut collector = Collector::for_legacy(&dirs, &ProcPaths::new(root));
        let stats = collector.refresh_stats().unwrap();
        assert_eq!(stats.cpu_stat.unwrap().usage_usec, 3000);
        assert_eq!(stats.cpu_limit.unwrap().effective_cpus(), Some(0.5));
        assert_eq!(stats.memory_usage.unwrap().usage_bytes, 2048);
        assert_eq!(
            stats.memory_limit.unwrap().limit_bytes,
            Some(9_223_372_036_854_771_712)
        );
        let io = stats.io_stat.unwrap();
        assert_eq!((io.rbytes, io.wbytes), (7, 9));
        assert_eq!(stats.io_pressure.unwrap().some_avg10, 0.75);
        assert!(stats.network_stat.is_none());
    }

    #[test]
    fn test_detached_collector_reads_no_cgroup_files() {
        let dir = tempfile::tempdir().unwrap();
        let mut collector = Collector::detached(&ProcPaths::new(dir.path()));
        let stats = collector.refresh_stats().unwrap();
        assert!(stats.cpu_stat.is_none());
        assert!(stats.cpu_limit.is_none());
        assert!(stats.memory_usage.is_none());
        assert!(stats.io_stat.is_none());
    }

    #[test]
    fn test_missing_files_are_none() {
        let dir = tempfile::tempdir().unwrap();
        let mut collector = Collector::for_cgroup(dir.path(), &dir.path().join("net_dev"));
        let stats = collector.refresh_stats().unwrap();
        assert!(stats.cpu_stat.is_none());
        assert!(stats.network_stat.is_none());
    }
}
