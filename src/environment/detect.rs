use std::path::Path;

use super::checks::matches_container_cgroup;

/// Available runtime environments for the sampler.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RuntimeEnvironment {
    /// Running directly on the host.
    Host,
    /// Running inside a containerized environment (e.g., Docker, Kubernetes, Podman).
    Container,
}

impl RuntimeEnvironment {
    /// The value of the `mode` column in the emitted record.
    pub fn mode_flag(self) -> u8 {
        match self {
            RuntimeEnvironment::Host => 0,
            RuntimeEnvironment::Container => 1,
        }
    }
}

/// Detects whether the current process is running in a container or on the host.
///
/// Reads the control-group descriptor at `cgroup_file` (normally `/proc/1/cgroup`) and looks for
/// container-runtime markers. A missing or unreadable file yields [`RuntimeEnvironment::Host`];
/// "not containerized" and "cannot tell" are not distinguished.
///
/// # Arguments
///
/// * `cgroup_file` - Path of the cgroup descriptor to inspect.
pub fn detect_runtime_environment(cgroup_file: impl AsRef<Path>) -> RuntimeEnvironment {
    match matches_container_cgroup(cgroup_file) {
        Ok(true) => RuntimeEnvironment::Container,
        Ok(false) => RuntimeEnvironment::Host,
        Err(err) => {
            log::debug!("Cgroup analysis failed during runtime detection: {}", err);
            RuntimeEnvironment::Host
        }
    }
}

/// Shorthand for `detect_runtime_environment(path) == Container`.
pub fn is_container(cgroup_file: impl AsRef<Path>) -> bool {
    detect_runtime_environment(cgroup_file) == RuntimeEnvironment::Container
}
