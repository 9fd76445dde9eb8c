//! Network link capacity and utilization.
//!
//! Capacity comes from `ethtool`, utilization from the byte counters of `/proc/net/dev` taken at
//! both ends of a sampling window. Failures never propagate: an unknown speed falls back to
//! [`DEFAULT_SPEED_BYTES`] and a missing interface leaves the figures unset.
mod interfaces;
mod speed;

use std::net::Ipv4Addr;
use std::path::PathBuf;
use std::time::Duration;

pub use interfaces::{interface_with_address, ipv4_bindings};
pub use speed::{Ethtool, SpeedError, parse_speed, parse_speed_line};

use crate::error::ResultOkLogExt;
use crate::fsutil;
use crate::procfs::NetworkStat;

/// Nominal link speed assumed when `ethtool` cannot tell: 10 Gb/s, in bytes per second.
pub const DEFAULT_SPEED_BYTES: u64 = 10_000 * 1024 * 1024;

/// How the monitored interface is chosen.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InterfaceSelection {
    /// The interface bound to this IPv4 address.
    HostIp(Ipv4Addr),
    /// A fixed interface name.
    Named(String),
}

impl InterfaceSelection {
    pub fn new(host_ip: Option<Ipv4Addr>, fallback: impl Into<String>) -> Self {
        match host_ip {
            Some(ip) => InterfaceSelection::HostIp(ip),
            None => InterfaceSelection::Named(fallback.into()),
        }
    }
}

/// Link capacity and the share of it used over one window.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct NetworkReading {
    pub speed_bytes_per_sec: u64,
    pub utilization_percent: f64,
}

impl NetworkReading {
    /// Nominal capacity in megabits per second (binary mega).
    pub fn bandwidth_mbps(&self) -> u64 {
        self.speed_bytes_per_sec / 1024 / 1024
    }
}

/// An open measurement: the interface and its byte count at window start.
#[derive(Debug, Clone)]
pub struct NetworkWindow {
    interface: String,
    start_bytes: u64,
}

/// `100 * bytes / (speed / 8) / window_ms * 1000`.
pub fn utilization_percent(bytes: u64, speed_bytes_per_sec: u64, window: Duration) -> f64 {
    let window_ms = window.as_millis() as f64;
    100.0 * bytes as f64 / (speed_bytes_per_sec as f64 / 8.0) / window_ms * 1000.0
}

/// Replaces an unknown (zero) speed with [`DEFAULT_SPEED_BYTES`].
pub fn effective_speed(raw: u64) -> u64 {
    if raw == 0 { DEFAULT_SPEED_BYTES } else { raw }
}

#[derive(Debug, Clone)]
pub struct NetworkProbe {
    ethtool: Ethtool,
    net_dev: PathBuf,
    selection: InterfaceSelection,
    window: Duration,
}

impl NetworkProbe {
    pub fn new(
        ethtool: Ethtool,
        net_dev: PathBuf,
        selection: InterfaceSelection,
        window: Duration,
    ) -> Self {
        Self {
            ethtool,
            net_dev,
            selection,
            window,
        }
    }

    /// Raw link speed of `interface` in bytes per second; `0` on any failure.
    pub fn link_speed(&self, interface: &str) -> u64 {
        self.ethtool
            .speed(interface)
            .ok_log_at(log::Level::Debug, format_args!("probing speed of {interface}"))
            .unwrap_or(0)
    }

    /// Resolves the interface to monitor for this tick.
    pub fn resolve_interface(&self) -> Option<String> {
        match &self.selection {
            InterfaceSelection::Named(name) => Some(name.clone()),
            InterfaceSelection::HostIp(ip) => {
                let bindings = ipv4_bindings()
                    .ok_log_at(log::Level::Debug, "listing interface addresses")?;
                let found = interface_with_address(&bindings, *ip).map(str::to_owned);
                if found.is_none() {
                    log::debug!("No interface carries host address {ip}");
                }
                found
            }
        }
    }

    /// Opens a measurement window on the selected interface.
    pub fn begin(&self) -> Option<NetworkWindow> {
        let interface = self.resolve_interface()?;
        let start_bytes = self.interface_bytes(&interface)?;
        Some(NetworkWindow {
            interface,
            start_bytes,
        })
    }

    /// Closes `window` one sampling window after [`begin`](Self::begin) and derives the reading.
    pub fn finish(&self, window: NetworkWindow) -> Option<NetworkReading> {
        let end_bytes = self.interface_bytes(&window.interface)?;
        let speed = effective_speed(self.link_speed(&window.interface));
        Some(NetworkReading {
            speed_bytes_per_sec: speed,
            utilization_percent: utilization_percent(
                end_bytes.saturating_sub(window.start_bytes),
                speed,
                self.window,
            ),
        })
    }

    /// Measures over one window of its own, blocking for its duration.
    pub fn bandwidth_and_utilization(&self) -> Option<NetworkReading> {
        let window = self.begin()?;
        std::thread::sleep(self.window);
        self.finish(window)
    }

    fn interface_bytes(&self, interface: &str) -> Option<u64> {
        let stat = fsutil::parse_file(&self.net_dev, |r| NetworkStat::for_interface(r, interface))
            .ok_log_at(log::Level::Debug, "reading interface counters")?;
        if stat.is_none() {
            log::debug!("Interface {interface} not listed in {}", self.net_dev.display());
        }
        stat.map(|s| s.total_bytes())
    }
}
