use std::io::BufRead;

use crate::cgroup::stats::{SingleLineStat, StatParseError};

/// System load averages from `/proc/loadavg`.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct LoadAverage {
    pub one: f64,
    pub five: f64,
    pub fifteen: f64,
}

impl SingleLineStat for LoadAverage {
    fn from_reader<R: BufRead>(buf: &mut R) -> std::io::Result<Self> {
        let mut line = String::new();
        buf.read_line(&mut line)?;
        let mut parts = line.split_whitespace();
        let mut next = |key: &'static str| -> Result<f64, StatParseError> {
            let raw = parts.next().ok_or(StatParseError::MissingField(key))?;
            raw.parse::<f64>()
                .map_err(|source| StatParseError::InvalidDecimal {
                    key: key.to_string(),
                    value: raw.to_string(),
                    source,
                })
        };

        Ok(LoadAverage {
            one: next("load1")?,
            five: next("load5")?,
            fifteen: next("load15")?,
        })
    }
}
