use std::collections::HashMap;
use std::sync::LazyLock;

use crate::cgroup::stats::KeyValueStat;

/// Memory figures from `/proc/meminfo`, converted from kB to bytes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct MemInfo {
    pub total_bytes: u64,
    pub available_bytes: u64,
}

impl MemInfo {
    /// `(total - available) * 100 / total`; NaN when the total is unknown.
    pub fn usage_percent(&self) -> f64 {
        self.total_bytes.saturating_sub(self.available_bytes) as f64 * 100.0
            / self.total_bytes as f64
    }
}

type Setter = fn(&mut MemInfo, u64);

static SETTERS: LazyLock<HashMap<&'static str, Setter>> = LazyLock::new(|| {
    let mut m: HashMap<&'static str, Setter> = HashMap::with_capacity(2);

    m.insert("MemTotal:", |s, kb| s.total_bytes = kb * 1024);
    m.insert("MemAvailable:", |s, kb| s.available_bytes = kb * 1024);

    m
});

impl KeyValueStat for MemInfo {
    const SPLIT_CHAR: Option<char> = None;
    const SKIP_VALUES: usize = 0;
    const ALLOW_DUPLICATE_KEYS: bool = false;
    const ALLOW_MULTIPLE_KV_PER_LINE: bool = false;

    fn field_handlers() -> &'static HashMap<&'static str, fn(&mut Self, u64)> {
        &SETTERS
    }
}
