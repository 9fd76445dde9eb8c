//! Runtime configuration from `TELEMETRY_*` environment variables.

use std::ffi::OsString;
use std::net::Ipv4Addr;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use crate::sampler::Identity;
use crate::scheduler::Schedule;

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("environment variable `{name}` is not valid unicode")]
    NotUnicode { name: &'static str },
    #[error("invalid value `{value}` for `{name}`: {reason}")]
    Invalid {
        name: &'static str,
        value: String,
        reason: String,
    },
}

#[derive(Debug, Clone)]
pub struct Config {
    /// Prefix under which `/proc` and `/sys` are read.
    pub rootfs: PathBuf,
    pub cgroup_file: PathBuf,
    pub initial_delay: Duration,
    pub period: Duration,
    pub window: Duration,
    pub host_ip: Option<Ipv4Addr>,
    pub interface: String,
    pub ethtool: String,
    pub ethtool_timeout: Duration,
    pub report_host_rates: bool,
    pub enabled: bool,
    /// Append records here instead of stdout.
    pub output: Option<PathBuf>,
    pub identity: Identity,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            rootfs: PathBuf::from("/"),
            cgroup_file: PathBuf::from("/proc/1/cgroup"),
            initial_delay: Duration::from_secs(5),
            period: Duration::from_secs(1),
            window: Duration::from_millis(450),
            host_ip: None,
            interface: "eth0".to_owned(),
            ethtool: "ethtool".to_owned(),
            ethtool_timeout: Duration::from_millis(2000),
            report_host_rates: false,
            enabled: true,
            output: None,
            identity: Identity::default(),
        }
    }
}

impl Config {
    /// Reads the process environment.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] for a variable that is set but cannot be parsed.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(std::env::var_os)
    }

    /// Builds a configuration from an arbitrary variable lookup; unset variables keep defaults.
    pub fn from_lookup(
        lookup: impl Fn(&'static str) -> Option<OsString>,
    ) -> Result<Self, ConfigError> {
        let vars = Vars(lookup);
        let defaults = Config::default();

        let period = vars.secs("TELEMETRY_PERIOD_SECS")?.unwrap_or(defaults.period);
        if period.is_zero() {
            return Err(ConfigError::Invalid {
                name: "TELEMETRY_PERIOD_SECS",
                value: "0".to_owned(),
                reason: "period must be positive".to_owned(),
            });
        }

        Ok(Config {
            rootfs: vars.path("TELEMETRY_ROOTFS").unwrap_or(defaults.rootfs),
            cgroup_file: vars
                .path("TELEMETRY_CGROUP_FILE")
                .unwrap_or(defaults.cgroup_file),
            initial_delay: vars
                .secs("TELEMETRY_INITIAL_DELAY_SECS")?
                .unwrap_or(defaults.initial_delay),
            period,
            window: vars.millis("TELEMETRY_WINDOW_MS")?.unwrap_or(defaults.window),
            host_ip: vars.parsed("TELEMETRY_HOST_IP")?,
            interface: vars.string("TELEMETRY_INTERFACE")?.unwrap_or(defaults.interface),
            ethtool: vars.string("TELEMETRY_ETHTOOL")?.unwrap_or(defaults.ethtool),
            ethtool_timeout: vars
                .millis("TELEMETRY_ETHTOOL_TIMEOUT_MS")?
                .unwrap_or(defaults.ethtool_timeout),
            report_host_rates: vars
                .bool("TELEMETRY_REPORT_HOST_RATES")?
                .unwrap_or(defaults.report_host_rates),
            enabled: vars.bool("TELEMETRY_ENABLED")?.unwrap_or(defaults.enabled),
            output: vars.path("TELEMETRY_OUTPUT"),
            identity: Identity {
                app_name: vars.string("TELEMETRY_APP_NAME")?.unwrap_or_default(),
                tenant_key: vars.string("TELEMETRY_TENANT_KEY")?.unwrap_or_default(),
                env_code: vars.string("TELEMETRY_ENV_CODE")?.unwrap_or_default(),
                user_id: vars.string("TELEMETRY_USER_ID")?.unwrap_or_default(),
                agent_id: vars.string("TELEMETRY_AGENT_ID")?.unwrap_or_default(),
            },
        })
    }

    pub fn schedule(&self) -> Schedule {
        Schedule {
            initial_delay: self.initial_delay,
            period: self.period,
            cgroup_file: self.cgroup_file.clone(),
        }
    }
}

struct Vars<F>(F);

impl<F: Fn(&'static str) -> Option<OsString>> Vars<F> {
    fn path(&self, name: &'static str) -> Option<PathBuf> {
        (self.0)(name).filter(|v| !v.is_empty()).map(PathBuf::from)
    }

    fn string(&self, name: &'static str) -> Result<Option<String>, ConfigError> {
        (self.0)(name)
            .map(|v| {
                v.into_string()
                    .map_err(|_| ConfigError::NotUnicode { name })
                    .map(|s| s.trim().to_owned())
            })
            .transpose()
    }

    fn parsed<T>(&self, name: &'static str) -> Result<Option<T>, ConfigError>
    where
        T: FromStr,
        T::Err: std::fmt::Display,
    {
        let Some(raw) = self.string(name)?.filter(|s| !s.is_empty()) else {
            return Ok(None);
        };
        raw.parse::<T>()
            .map(Some)
            .map_err(|err| ConfigError::Invalid {
                name,
                value: raw.clone(),
                reason: err.to_string(),
            })
    }

    fn secs(&self, name: &'static str) -> Result<Option<Duration>, ConfigError> {
        Ok(self.parsed::<u64>(name)?.map(Duration::from_secs))
    }

    fn millis(&self, name: &'static str) -> Result<Option<Duration>, ConfigError> {
        Ok(self.parsed::<u64>(name)?.map(Duration::from_millis))
    }

    fn bool(&self, name: &'static str) -> Result<Option<bool>, ConfigError> {
        let Some(raw) = self.string(name)?.filter(|s| !s.is_empty()) else {
            return Ok(None);
        };
        match raw.to_ascii_lowercase().as_str() {
            "1" | "true" | "yes" | "on" => Ok(Some(true)),
            "0" | "false" | "no" | "off" => Ok(Some(false)),
            _ => Err(ConfigError::Invalid {
                name,
                value: raw,
                reason: "expected a boolean".to_owned(),
            }),
        }
    }
}
