//! Container-scoped resource accounting via the cgroup filesystem.
//!
//! # Key Components
//!
//! - [`Collector`] — keeps a container's stat files open and re-reads them per tick.
//! - [`CgroupStatsProvider`] — turns two consecutive reads into container rates.
//! - [`resolve_cgroup`] — locates the calling process's own cgroup, v1 or v2.
//! - [`stats`] — parsers for the individual interface files.
//!
//! # Supported Stats
//!
//! | v2 | v1 |
//! |---|---|
//! | `cpu.stat` | `cpuacct.usage` |
//! | `cpu.max` | `cpu.cfs_quota_us`, `cpu.cfs_period_us` |
//! | `memory.current`, `memory.max` | `memory.usage_in_bytes`, `memory.limit_in_bytes` |
//! | `io.stat`, `io.pressure` | `blkio.throttle.io_service_bytes`, `/proc/pressure/io` |
//!
//! Network counters come from `/proc/self/net/dev` in both cases.
mod collector;
mod provider;
pub mod stats;
mod utils;

use std::io::BufRead;
use std::path::{Path, PathBuf};

pub use collector::{Collector, CollectorBuilder};
pub use provider::CgroupStatsProvider;

use crate::{fsutil, mountinfo};

/// Errors that may occur while locating the process's cgroup directory.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error(transparent)]
    MountInfo(#[from] mountinfo::Error),
    #[error(transparent)]
    FileOpen(#[from] fsutil::FileOpenError),
    #[error("failed to read `{path}`: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("no cgroup v2 entry in `{path}`")]
    MissingUnifiedEntry { path: PathBuf },
}

/// Where the process's cgroup accounting lives.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CgroupLayout {
    /// One cgroup v2 directory holding every controller.
    Unified(PathBuf),
    /// One directory per cgroup v1 controller.
    Legacy(LegacyDirs),
}

/// Per-controller cgroup v1 directories; a controller that is not mounted stays `None`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LegacyDirs {
    pub cpu: Option<PathBuf>,
    pub cpuacct: Option<PathBuf>,
    pub memory: Option<PathBuf>,
    pub blkio: Option<PathBuf>,
}

impl LegacyDirs {
    fn is_empty(&self) -> bool {
        self.cpu.is_none()
            && self.cpuacct.is_none()
            && self.memory.is_none()
            && self.blkio.is_none()
    }
}

/// Resolves the cgroup of the current process.
///
/// v1 controller mounts win when present, which also covers hybrid hosts where an empty v2
/// hierarchy is mounted next to them. Otherwise the v2 directory is resolved with
/// [`resolve_cgroup_dir`].
///
/// # Errors
///
/// Returns [`Error`] when neither hierarchy can be resolved.
pub fn resolve_cgroup(
    mountinfo_path: &Path,
    self_cgroup_path: &Path,
) -> Result<CgroupLayout, Error> {
    let v1_mounts = mountinfo::read_cgroup1_mounts(mountinfo_path)?;
    if !v1_mounts.is_empty() {
        let memberships = legacy_memberships(self_cgroup_path)?;
        let dirs = LegacyDirs {
            cpu: controller_dir(&v1_mounts, &memberships, "cpu"),
            cpuacct: controller_dir(&v1_mounts, &memberships, "cpuacct"),
            memory: controller_dir(&v1_mounts, &memberships, "memory"),
            blkio: controller_dir(&v1_mounts, &memberships, "blkio"),
        };
        if !dirs.is_empty() {
            return Ok(CgroupLayout::Legacy(dirs));
        }
    }
    resolve_cgroup_dir(mountinfo_path, self_cgroup_path).map(CgroupLayout::Unified)
}

/// Resolves the cgroup v2 directory of the current process.
///
/// Combines the `cgroup2` mount point from `mountinfo` with the `0::<path>` entry of the
/// process's cgroup descriptor. Inside a container with its own cgroup namespace the entry is
/// `0::/`, which resolves to the mount point itself.
///
/// # Errors
///
/// Returns [`Error`] when either file is unreadable, no `cgroup2` mount exists, or the process
/// is not attached to the unified hierarchy.
pub fn resolve_cgroup_dir(
    mountinfo_path: &Path,
    self_cgroup_path: &Path,
) -> Result<PathBuf, Error> {
    let mount_point = mountinfo::detect_validated_cgroup2_mount_point(mountinfo_path)?;
    let relative = unified_cgroup_path(self_cgroup_path)?;
    Ok(mount_point.join(relative.trim_start_matches('/')))
}

/// One `<id>:<controllers>:<path>` line of a v1 cgroup descriptor.
#[derive(Debug)]
struct Membership {
    controllers: String,
    path: String,
}

fn legacy_memberships(path: &Path) -> Result<Vec<Membership>, Error> {
    let reader = fsutil::open_file_reader(path)?;
    let mut memberships = Vec::new();
    for line in reader.lines() {
        let line = line.map_err(|source| Error::Read {
            path: path.to_path_buf(),
            source,
        })?;
        let mut parts = line.trim_end().splitn(3, ':');
        let (Some(_id), Some(controllers), Some(cgroup)) =
            (parts.next(), parts.next(), parts.next())
        else {
            continue;
        };
        // the unified `0::` entry has no controllers
        if !controllers.is_empty() {
            memberships.push(Membership {
                controllers: controllers.to_owned(),
                path: cgroup.to_owned(),
            });
        }
    }
    Ok(memberships)
}

/// Maps the process's path in `controller`'s hierarchy onto that hierarchy's mount.
fn controller_dir(
    mounts: &[mountinfo::CgroupV1Mount],
    memberships: &[Membership],
    controller: &str,
) -> Option<PathBuf> {
    let mount = mounts.iter().find(|m| m.has_controller(controller))?;
    let membership = memberships
        .iter()
        .find(|m| m.controllers.split(',').any(|c| c == controller))?;

    // a runtime that bind-mounts the container's subtree exposes it as the mount root
    let relative = if mount.root == "/" {
        membership.path.as_str()
    } else {
        match membership.path.strip_prefix(mount.root.as_str()) {
            Some(rest) if rest.is_empty() || rest.starts_with('/') => rest,
            _ => "",
        }
    };
    Some(mount.mount_point.join(relative.trim_start_matches('/')))
}

fn unified_cgroup_path(path: &Path) -> Result<String, Error> {
    let mut reader = fsutil::open_file_reader(path)?;
    let mut line = String::new();
    loop {
        line.clear();
        let read = reader.read_line(&mut line).map_err(|source| Error::Read {
            path: path.to_path_buf(),
            source,
        })?;
        if read == 0 {
            return Err(Error::MissingUnifiedEntry {
                path: path.to_path_buf(),
            });
        }
        if let Some(rest) = line.trim_end().strip_prefix("0::") {
            return Ok(rest.to_owned());
        }
    }
}
