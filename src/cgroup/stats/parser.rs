//! Generic traits for parsing Linux statistics files into structured types.
//!
//! The same machinery serves cgroup files (`cpu.stat`, `io.stat`) and procfs files
//! (`/proc/meminfo`), which all share the "key value" or "key=value" line shape.
//!
//! # Traits
//!
//! - [`KeyValueStat`]: multi-line, key-value formatted stat files, configurable via associated
//!   constants (space-separated vs. `=`-separated, skipped columns, duplicate handling).
//! - [`SingleLineStat`]: single-line files such as `memory.current`, `memory.max` or
//!   `/proc/loadavg`.
//!
//! # Example: Implementing `KeyValueStat`
//!
//! ```rust
//! use std::collections::HashMap;
//! use resource_telemetry::cgroup::stats::KeyValueStat;
//! use std::sync::OnceLock;
//!
//! #[derive(Default)]
//! struct MyStat {
//!     foo: u64,
//! }
//!
//! static HANDLERS: OnceLock<HashMap<&'static str, fn(&mut MyStat, u64)>> = OnceLock::new();
//!
//! impl KeyValueStat for MyStat {
//!     const SPLIT_CHAR: Option<char> = Some('=');
//!     const SKIP_VALUES: usize = 0;
//!     const ALLOW_DUPLICATE_KEYS: bool = false;
//!     const ALLOW_MULTIPLE_KV_PER_LINE: bool = true;
//!
//!     fn field_handlers() -> &'static HashMap<&'static str, fn(&mut Self, u64)> {
//!         HANDLERS.get_or_init(|| {
//!             let mut map = HashMap::new();
//!             map.insert("foo", (|s: &mut MyStat, v: u64| s.foo = v) as fn(&mut MyStat, u64));
//!             map
//!         })
//!     }
//! }
//!
//! let stat = MyStat::from_reader(&mut "foo=3\n".as_bytes()).unwrap();
//! assert_eq!(stat.foo, 3);
//! ```

use std::collections::{HashMap, HashSet};
use std::io::BufRead;

use super::StatParseError;

type Handlers<S> = HashMap<&'static str, fn(&mut S, u64)>;

/// A trait for parsing structured key-value style stat files.
///
/// Implementors define a set of known keys and how to apply values for them. Unknown keys are
/// ignored; a known key with a non-numeric value is an error.
pub trait KeyValueStat: Default
where
    Self: 'static,
{
    /// If `Some(c)`, each pair is `key<c>value` (e.g. `rbytes=1024`); if `None`, key and value
    /// are consecutive whitespace-separated tokens (e.g. `usage_usec 1000`).
    const SPLIT_CHAR: Option<char>;

    /// The number of whitespace-separated tokens to skip at the start of *each line*
    /// (e.g. the `8:0` device column of `io.stat`).
    const SKIP_VALUES: usize;

    /// If `false`, seeing the same known key twice is a [`StatParseError::DuplicateField`].
    const ALLOW_DUPLICATE_KEYS: bool;

    /// If `false`, only the first pair on each line is consumed.
    const ALLOW_MULTIPLE_KV_PER_LINE: bool;

    /// Known field names and the functions that apply a parsed value to the struct.
    fn field_handlers() -> &'static HashMap<&'static str, fn(&mut Self, u64)>;

    /// Parses a key-value formatted buffer.
    ///
    /// # Errors
    /// Returns an `io::Error` if reading fails, or a [`StatParseError`] wrapped in an `io::Error`
    /// with kind `InvalidData` if parsing fails.
    fn from_reader<R: BufRead>(buf: &mut R) -> std::io::Result<Self> {
        let mut stat = Self::default();
        let handlers = Self::field_handlers();
        let mut seen_keys = HashSet::with_capacity(handlers.len());

        let mut line = String::new();
        let mut lineno = 0;
        while buf.read_line(&mut line)? != 0 {
            lineno += 1;
            let mut parts = line.split_whitespace().skip(Self::SKIP_VALUES);
            loop {
                let pair = match Self::SPLIT_CHAR {
                    Some(split_char) => parts.next().map(|p| p.split_once(split_char)),
                    None => match (parts.next(), parts.next()) {
                        (Some(key), Some(val)) => Some(Some((key, val))),
                        _ => None,
                    },
                };
                match pair {
                    None => break,
                    Some(Some((key, val))) => {
                        Self::parse_and_set(key, val, &mut stat, lineno, handlers, &mut seen_keys)?
                    }
                    // malformed `key=value` token
                    Some(None) => {}
                }
                if !Self::ALLOW_MULTIPLE_KV_PER_LINE {
                    break;
                }
            }

            if !Self::ALLOW_DUPLICATE_KEYS && seen_keys.len() == handlers.len() {
                break;
            }
            line.clear();
        }

        Ok(stat)
    }

    /// Parses a single key-value pair and applies it via the field handler.
    ///
    /// # Errors
    /// Returns a `StatParseError::InvalidKeyValue` if the value cannot be parsed as `u64`,
    /// or `StatParseError::DuplicateField` if the key repeats and duplicates are disallowed.
    fn parse_and_set(
        key: &str,
        val: &str,
        stat: &mut Self,
        lineno: usize,
        handlers: &Handlers<Self>,
        seen_keys: &mut HashSet<&'static str>,
    ) -> std::io::Result<()> {
        let Some((k, handler)) = handlers.get_key_value(key) else {
            return Ok(());
        };
        let parsed = val
            .parse::<u64>()
            .map_err(|source| StatParseError::InvalidKeyValue {
                key: key.to_string(),
                value: val.to_string(),
                line: lineno,
                source,
            })?;
        if !Self::ALLOW_DUPLICATE_KEYS && !seen_keys.insert(*k) {
            return Err(StatParseError::DuplicateField {
                field: key.to_string(),
                line: lineno,
            }
            .into());
        }
        handler(stat, parsed);
        Ok(())
    }
}

/// A trait for parsing single-line statistics such as `memory.current`, `memory.max` or
/// `/proc/loadavg`.
pub trait SingleLineStat: Sized + Default {
    /// Parses the statistic from the first line of `buf`.
    fn from_reader<R: BufRead>(buf: &mut R) -> std::io::Result<Self>;
}
