//! Producing [`MetricsSnapshot`]s and turning them into wire records.
//!
//! Exactly one [`Sampler`] runs per process, chosen by runtime environment:
//! [`HostSampler`] on bare metal, [`ContainerSampler`] inside a container.
mod container;
pub mod format;
mod host;
pub mod record;
mod snapshot;

pub use container::{ContainerSampler, ContainerStatsInfo, ContainerStatsProvider, ProviderFactory};
pub use format::format_decimal;
pub use host::{FILESYSTEM_WARN_COOLDOWN, HostSampler, WarnCooldown};
pub use record::{FIELD_COUNT, format_record};
pub use snapshot::{Identity, MetricsSnapshot, RecordHeader, SCHEMA_VERSION};

use crate::cgroup::CgroupStatsProvider;
use crate::config::Config;
use crate::environment::RuntimeEnvironment;
use crate::error::Result;
use crate::netprobe::{Ethtool, InterfaceSelection, NetworkProbe};
use crate::procfs::ProcPaths;

/// Produces one snapshot per call. Blocking: implementations may sleep for a sampling window.
pub trait Sampler: Send {
    fn sample(&mut self, header: RecordHeader) -> Result<MetricsSnapshot>;
}

/// Builds the sampler matching the detected environment.
pub trait SamplerFactory: Send + Sync {
    fn build(&self, environment: RuntimeEnvironment) -> Box<dyn Sampler>;
}

/// The default factory, reading the live system.
#[derive(Debug, Clone)]
pub struct PlatformSamplers {
    paths: ProcPaths,
    ethtool: Ethtool,
    selection: InterfaceSelection,
    fallback_interface: String,
    window: std::time::Duration,
    report_host_rates: bool,
}

impl PlatformSamplers {
    pub fn from_config(config: &Config) -> Self {
        Self {
            paths: ProcPaths::new(&config.rootfs),
            ethtool: Ethtool::new(config.ethtool.clone(), config.ethtool_timeout),
            selection: InterfaceSelection::new(config.host_ip, config.interface.clone()),
            fallback_interface: config.interface.clone(),
            window: config.window,
            report_host_rates: config.report_host_rates,
        }
    }
}

impl SamplerFactory for PlatformSamplers {
    fn build(&self, environment: RuntimeEnvironment) -> Box<dyn Sampler> {
        match environment {
            RuntimeEnvironment::Host => {
                let network = NetworkProbe::new(
                    self.ethtool.clone(),
                    self.paths.net_dev(),
                    self.selection.clone(),
                    self.window,
                );
                Box::new(HostSampler::new(
                    self.paths.clone(),
                    network,
                    self.window,
                    self.report_host_rates,
                ))
            }
            RuntimeEnvironment::Container => {
                let paths = self.paths.clone();
                let ethtool = self.ethtool.clone();
                let interface = self.fallback_interface.clone();
                Box::new(ContainerSampler::new(Box::new(move || {
                    let provider =
                        CgroupStatsProvider::new(paths.clone(), ethtool.clone(), interface.clone());
                    Ok(Box::new(provider) as Box<dyn ContainerStatsProvider>)
                })))
            }
        }
    }
}
