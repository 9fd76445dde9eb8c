use crate::environment::RuntimeEnvironment;

/// Version of the record layout. Bump on any field change.
pub const SCHEMA_VERSION: u32 = 1;

/// Who the emitting process is. Supplied from outside; empty strings when unknown.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Identity {
    pub app_name: String,
    pub tenant_key: String,
    pub env_code: String,
    pub user_id: String,
    pub agent_id: String,
}

/// Identity plus the tick's start time, handed to a sampler.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RecordHeader {
    pub identity: Identity,
    pub timestamp_secs: u64,
}

/// One tick's worth of measurements.
///
/// Every numeric field starts at zero and stays there when its source is unavailable. Percent
/// fields may hold NaN after a degenerate division; the record formatter renders that as zero.
#[derive(Debug, Clone, PartialEq)]
pub struct MetricsSnapshot {
    pub header: RecordHeader,
    pub cpu_usage_percent: f64,
    pub load1: f64,
    pub load5: f64,
    pub load15: f64,
    pub memory_usage_percent: f64,
    pub total_memory_bytes: u64,
    pub available_memory_bytes: u64,
    /// `None` when host rates are not reported; rendered as a bare `0`.
    pub io_wait_percent: Option<f64>,
    /// Host: link utilization over the window. Container: combined usage of the link.
    /// `None` when host rates are not reported.
    pub network_rate_percent: Option<f64>,
    /// Nominal link capacity in Mb/s.
    pub network_bandwidth_mbps: u64,
    pub core_count: u32,
    pub total_disk_bytes: u64,
    pub usable_disk_bytes: u64,
    pub disk_read_bytes: u64,
    pub disk_write_bytes: u64,
    pub mode: RuntimeEnvironment,
}

impl MetricsSnapshot {
    /// A snapshot with every measurement at its sentinel.
    pub fn new(header: RecordHeader, mode: RuntimeEnvironment) -> Self {
        Self {
            header,
            cpu_usage_percent: 0.0,
            load1: 0.0,
            load5: 0.0,
            load15: 0.0,
            memory_usage_percent: 0.0,
            total_memory_bytes: 0,
            available_memory_bytes: 0,
            io_wait_percent: None,
            network_rate_percent: None,
            network_bandwidth_mbps: 0,
            core_count: 0,
            total_disk_bytes: 0,
            usable_disk_bytes: 0,
            disk_read_bytes: 0,
            disk_write_bytes: 0,
            mode,
        }
    }
}
