//! Resource Telemetry: a background sampler that periodically measures host or container CPU,
//! memory, disk and network utilization and emits one pipe-delimited record per tick.
//!
//! On bare metal the figures come from `/proc`, `/sys` and `ethtool`; inside a container from
//! the process's cgroup v2 files. The choice is made once, when the scheduler starts.

use std::sync::Arc;

use config::Config;
use sampler::PlatformSamplers;
use scheduler::{
    EnabledFlag, FileSink, MonitorScheduler, RecordSink, StaticIdentity, StdoutSink, TokioExecutor,
};

pub mod cgroup;
pub mod config;
pub mod environment;
pub mod error;
pub mod fsutil;
pub mod mountinfo;
pub mod netprobe;
pub mod procfs;
pub mod sampler;
pub mod scheduler;

#[cfg(test)]
mod testlog;

/// Runs the sampler until Ctrl-C.
///
/// Loads [`Config`] from the environment, wires the default collaborators, starts the
/// scheduler and stops it on shutdown.
///
/// # Errors
///
/// Possible errors include:
/// - An unparsable `TELEMETRY_*` environment variable.
/// - An output file that cannot be opened for appending.
/// - Failure to install the Ctrl-C handler.
pub async fn run() -> Result<(), Box<dyn std::error::Error>> {
    let config = Config::from_env()?;
    log::debug!("Configuration: {config:?}");

    let sink: Arc<dyn RecordSink> = match &config.output {
        Some(path) => Arc::new(FileSink::open(path)?),
        None => Arc::new(StdoutSink),
    };

    let scheduler = MonitorScheduler::new(
        config.schedule(),
        Box::new(PlatformSamplers::from_config(&config)),
        sink,
        Arc::new(EnabledFlag::new(config.enabled)),
        Arc::new(StaticIdentity(config.identity.clone())),
        TokioExecutor::current(),
    );

    scheduler.start();
    tokio::signal::ctrl_c().await?;
    log::debug!("Received Ctrl-C, shutting down");
    scheduler.stop();
    Ok(())
}
