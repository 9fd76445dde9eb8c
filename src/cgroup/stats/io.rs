//! Block I/O accounting of a cgroup v2 directory.
//!
//! - `io.stat` lists one line per device (`8:0 rbytes=1024 wbytes=2048 ...`); [`IoStat`] sums
//!   the byte counters across devices.
//! - `io.pressure` is the PSI file; [`IoPressure`] keeps the share of wall time in the last 10
//!   seconds during which some task of the cgroup was stalled on I/O, the cgroup analogue of
//!   the host's io-wait percentage.
//!
//! ```rust
//! use resource_telemetry::cgroup::stats::{IoStat, KeyValueStat};
//!
//! let data = "\
//! 8:0 rbytes=1024 wbytes=2048 rios=12 wios=24
//! 254:0 rbytes=1024 wbytes=2048 rios=12 wios=24
//! ";
//! let io_stat = IoStat::from_reader(&mut data.as_bytes()).unwrap();
//!
//! assert_eq!(io_stat.rbytes, 2048);
//! assert_eq!(io_stat.wbytes, 4096);
//! ```

use std::collections::HashMap;
use std::io::BufRead;
use std::sync::LazyLock;

use super::parser::KeyValueStat;
use super::{SingleLineStat, StatParseError};

/// Byte counters from `io.stat`, summed over all devices.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct IoStat {
    /// Total number of bytes read across all devices.
    pub rbytes: u64,
    /// Total number of bytes written across all devices.
    pub wbytes: u64,
}

type Accumulator = fn(&mut IoStat, u64);

static ACCUMULATORS: LazyLock<HashMap<&'static str, Accumulator>> = LazyLock::new(|| {
    let mut m: HashMap<&'static str, Accumulator> = HashMap::with_capacity(2);

    m.insert("rbytes", |s, v| s.rbytes += v);
    m.insert("wbytes", |s, v| s.wbytes += v);

    m
});

impl KeyValueStat for IoStat {
    const SPLIT_CHAR: Option<char> = Some('=');
    const SKIP_VALUES: usize = 1;
    const ALLOW_DUPLICATE_KEYS: bool = true;
    const ALLOW_MULTIPLE_KV_PER_LINE: bool = true;
    #[inline]
    fn field_handlers() -> &'static HashMap<&'static str, fn(&mut Self, u64)> {
        &ACCUMULATORS
    }
}

/// The `some avg10` figure of `io.pressure`, in percent.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct IoPressure {
    pub some_avg10: f64,
}

impl SingleLineStat for IoPressure {
    /// Parses the `some` line of a PSI file.
    ///
    /// # Errors
    ///
    /// Returns `InvalidData` if the `some` line or its `avg10` entry is missing or malformed.
    fn from_reader<R: BufRead>(buf: &mut R) -> std::io::Result<Self> {
        let mut line = String::new();
        while buf.read_line(&mut line)? != 0 {
            let mut parts = line.split_whitespace();
            if parts.next() == Some("some") {
                let value = parts
                    .find_map(|p| p.strip_prefix("avg10="))
                    .ok_or(StatParseError::MissingField("avg10"))?;
                let some_avg10 =
                    value
                        .parse::<f64>()
                        .map_err(|source| StatParseError::InvalidDecimal {
                            key: "avg10".to_string(),
                            value: value.to_string(),
                            source,
                        })?;
                return Ok(IoPressure { some_avg10 });
            }
            line.clear();
        }

        Err(StatParseError::MissingField("some").into())
    }
}
