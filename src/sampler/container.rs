use super::{MetricsSnapshot, RecordHeader, Sampler};
use crate::environment::RuntimeEnvironment;
use crate::error::{Error, Result};

/// Pre-aggregated container figures, one call per tick.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct ContainerStatsInfo {
    pub cpu_usage_percent: f64,
    pub load1: f64,
    pub load5: f64,
    pub load15: f64,
    pub memory_usage_percent: f64,
    pub total_memory_bytes: u64,
    pub available_memory_bytes: u64,
    pub io_wait_percent: f64,
    pub network_usage_percent: f64,
    pub network_speed_mbps: u64,
    pub core_count: u32,
    pub total_disk_bytes: u64,
    pub usable_disk_bytes: u64,
    pub disk_read_bytes: u64,
    pub disk_write_bytes: u64,
}

/// Source of container-scoped accounting.
pub trait ContainerStatsProvider: Send {
    fn stats(&mut self) -> std::io::Result<ContainerStatsInfo>;
}

pub type ProviderFactory =
    Box<dyn FnMut() -> std::io::Result<Box<dyn ContainerStatsProvider>> + Send>;

/// Maps a [`ContainerStatsProvider`] onto snapshots.
///
/// The provider is built on the first tick rather than at construction; if building fails the
/// tick fails and the next one tries again.
pub struct ContainerSampler {
    factory: ProviderFactory,
    provider: Option<Box<dyn ContainerStatsProvider>>,
}

impl ContainerSampler {
    pub fn new(factory: ProviderFactory) -> Self {
        Self {
            factory,
            provider: None,
        }
    }

    fn provider(&mut self) -> Result<&mut Box<dyn ContainerStatsProvider>> {
        if self.provider.is_none() {
            let built = (self.factory)().map_err(Error::ProviderInit)?;
            log::debug!("Container stats provider initialized");
            self.provider = Some(built);
        }
        self.provider
            .as_mut()
            .ok_or_else(|| Error::ProviderInit(std::io::Error::other("provider unavailable")))
    }
}

impl std::fmt::Debug for ContainerSampler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ContainerSampler")
            .field("initialized", &self.provider.is_some())
            .finish()
    }
}

impl Sampler for ContainerSampler {
    fn sample(&mut self, header: RecordHeader) -> Result<MetricsSnapshot> {
        let info = self.provider()?.stats().map_err(Error::ContainerStats)?;

        let mut snapshot = MetricsSnapshot::new(header, RuntimeEnvironment::Container);
        snapshot.cpu_usage_percent = info.cpu_usage_percent;
        snapshot.load1 = info.load1;
        snapshot.load5 = info.load5;
        snapshot.load15 = info.load15;
        snapshot.memory_usage_percent = info.memory_usage_percent;
        snapshot.total_memory_bytes = info.total_memory_bytes;
        snapshot.available_memory_bytes = info.available_memory_bytes;
        snapshot.io_wait_percent = Some(info.io_wait_percent);
        snapshot.network_rate_percent = Some(info.network_usage_percent);
        snapshot.network_bandwidth_mbps = info.network_speed_mbps;
        snapshot.core_count = info.core_count;
        snapshot.total_disk_bytes = info.total_disk_bytes;
        snapshot.usable_disk_bytes = info.usable_disk_bytes;
        snapshot.disk_read_bytes = info.disk_read_bytes;
        snapshot.disk_write_bytes = info.disk_write_bytes;
        Ok(snapshot)
    }
}
