//! Memory accounting of a cgroup v2 directory.
//!
//! `memory.current` holds the bytes charged to the cgroup and `memory.max` its limit, where the
//! keyword `max` means "no limit". Both are single-line files.
//!
//! ```rust
//! use resource_telemetry::cgroup::stats::{MemoryUsage, MemoryLimit, SingleLineStat};
//!
//! let usage = MemoryUsage::from_reader(&mut "8192\n".as_bytes()).unwrap();
//! assert_eq!(usage.usage_bytes, 8192);
//!
//! let limit = MemoryLimit::from_reader(&mut "max\n".as_bytes()).unwrap();
//! assert_eq!(limit.limit_bytes, None);
//! ```

use std::io::BufRead;

use super::{SingleLineStat, StatParseError};

/// Bytes currently charged to the cgroup (`memory.current`).
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct MemoryUsage {
    pub usage_bytes: u64,
}

impl SingleLineStat for MemoryUsage {
    /// # Errors
    ///
    /// Returns an error of kind `InvalidData` if the value cannot be parsed as a `u64`.
    fn from_reader<R: BufRead>(buf: &mut R) -> std::io::Result<Self> {
        let mut line = String::new();
        buf.read_line(&mut line)?;
        let line = line.trim();
        let usage_bytes = line
            .parse::<u64>()
            .map_err(|source| StatParseError::InvalidValue {
                value: line.to_string(),
                line: 1,
                source,
            })?;

        Ok(MemoryUsage { usage_bytes })
    }
}

/// Memory limit of the cgroup (`memory.max`).
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct MemoryLimit {
    /// `None` represents `max`, meaning no limit is set.
    pub limit_bytes: Option<u64>,
}

impl SingleLineStat for MemoryLimit {
    fn from_reader<R: BufRead>(buf: &mut R) -> std::io::Result<Self> {
        let mut line = String::new();
        buf.read_line(&mut line)?;
        let limit_bytes = match line.trim() {
            "max" => None,
            value => value.parse::<u64>().ok(),
        };

        Ok(MemoryLimit { limit_bytes })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cgroup::stats::error::extract_stat_parse_error;

    #[test]
    fn test_parse_empty_memory_usage() {
        let err = MemoryUsage::from_reader(&mut "".as_bytes()).unwrap_err();
        assert_eq!(err.kind(), std::io::ErrorKind::InvalidData);
        match extract_stat_parse_error(&err) {
            StatParseError::InvalidValue { value, line, .. } => {
                assert_eq!(value, "");
                assert_eq!(*line, 1);
            }
            _ => panic!("Expected InvalidValue Error"),
        }
    }

    #[test]
    fn test_parse_invalid_memory_usage() {
        let err = MemoryUsage::from_reader(&mut "abcd\n".as_bytes()).unwrap_err();
        assert_eq!(err.kind(), std::io::ErrorKind::InvalidData);
    }

    #[test]
    fn test_parse_memory_limit() {
        let limit = MemoryLimit::from_reader(&mut "max\n".as_bytes()).unwrap();
        assert_eq!(limit.limit_bytes, None);

        let limit = MemoryLimit::from_reader(&mut "104857600\n".as_bytes()).unwrap();
        assert_eq!(limit.limit_bytes, Some(104857600));
    }

    #[test]
    fn test_invalid_memory_limit_is_unlimited() {
        let limit = MemoryLimit::from_reader(&mut "abc\n".as_bytes()).unwrap();
        assert_eq!(limit, MemoryLimit::default());
    }
}
