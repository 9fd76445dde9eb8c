//! The pipe-delimited wire record.

use std::fmt::Write;

use super::format::format_decimal;
use super::snapshot::{MetricsSnapshot, SCHEMA_VERSION};
use crate::environment::RuntimeEnvironment;

pub const FIELD_SEPARATOR: char = '|';
pub const FIELD_COUNT: usize = 23;

const PERCENT_PLACES: usize = 2;
const HOST_RATE_PLACES: usize = 7;

/// Replaces characters that would break the positional layout.
fn sanitize(value: &str) -> std::borrow::Cow<'_, str> {
    if value.contains(['|', '\n', '\r']) {
        value.replace(['|', '\n', '\r'], "_").into()
    } else {
        value.into()
    }
}

/// Renders `snapshot` as one `\n`-terminated line of [`FIELD_COUNT`] fields.
pub fn format_record(snapshot: &MetricsSnapshot) -> String {
    let identity = &snapshot.header.identity;
    let rate_places = match snapshot.mode {
        RuntimeEnvironment::Host => HOST_RATE_PLACES,
        RuntimeEnvironment::Container => PERCENT_PLACES,
    };
    let pct = |v: f64| format_decimal(v, PERCENT_PLACES);
    let unreported = || "0".to_owned();

    let fields: [String; FIELD_COUNT] = [
        sanitize(&identity.app_name).into_owned(),
        snapshot.header.timestamp_secs.to_string(),
        sanitize(&identity.tenant_key).into_owned(),
        sanitize(&identity.env_code).into_owned(),
        sanitize(&identity.user_id).into_owned(),
        sanitize(&identity.agent_id).into_owned(),
        pct(snapshot.cpu_usage_percent),
        pct(snapshot.load1),
        pct(snapshot.load5),
        pct(snapshot.load15),
        pct(snapshot.memory_usage_percent),
        snapshot.total_memory_bytes.to_string(),
        snapshot.available_memory_bytes.to_string(),
        snapshot.io_wait_percent.map_or_else(unreported, pct),
        snapshot
            .network_rate_percent
            .map_or_else(unreported, |v| format_decimal(v, rate_places)),
        snapshot.network_bandwidth_mbps.to_string(),
        snapshot.core_count.to_string(),
        snapshot.total_disk_bytes.to_string(),
        snapshot.usable_disk_bytes.to_string(),
        snapshot.disk_read_bytes.to_string(),
        snapshot.disk_write_bytes.to_string(),
        snapshot.mode.mode_flag().to_string(),
        SCHEMA_VERSION.to_string(),
    ];

    let mut line = String::with_capacity(256);
    for (i, field) in fields.iter().enumerate() {
        if i > 0 {
            line.push(FIELD_SEPARATOR);
        }
        line.push_str(field);
    }
    let _ = writeln!(line);
    line
}
