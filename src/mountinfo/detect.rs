use crate::fsutil;

use super::parser::parse_mount_info_line;
use super::{Error, Result};
use std::io::BufRead;
use std::path::{Path, PathBuf};

/// An owned mount table entry, as needed for filesystem accounting.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MountEntry {
    /// Major:Minor device identifier; bind mounts of one device share it.
    pub device: String,
    /// Decoded mount point.
    pub mount_point: PathBuf,
    /// Filesystem type.
    pub fs_type: String,
}

/// A cgroup v1 hierarchy mount.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CgroupV1Mount {
    /// Cgroup path the mount exposes; `/docker/<id>` when a runtime bind-mounts a subtree.
    pub root: String,
    /// Decoded mount point.
    pub mount_point: PathBuf,
    /// Controllers attached to the hierarchy, e.g. `cpu` and `cpuacct`.
    pub controllers: Vec<String>,
}

impl CgroupV1Mount {
    pub fn has_controller(&self, controller: &str) -> bool {
        self.controllers.iter().any(|c| c == controller)
    }
}

/// Detects and validates the cgroup v2 mount point by parsing the given `mountinfo` file.
///
/// This function returns the canonicalized absolute path of the cgroup v2 mount point,
/// ensuring the path exists and is a directory.
///
/// # Errors
///
/// Returns errors from [`detect_cgroup2_mount_point`] and:
///
/// - [`Error::Canonicalization`] if the path cannot be canonicalized.
/// - [`Error::NotADirectory`] if the resolved path is not a directory.
pub fn detect_validated_cgroup2_mount_point(path: impl AsRef<Path>) -> Result<PathBuf> {
    let raw = detect_cgroup2_mount_point(&path)?;
    let canonical = std::fs::canonicalize(&raw).map_err(|e| Error::Canonicalization {
        path: raw.clone(),
        source: e,
    })?;

    if !canonical.is_dir() {
        return Err(Error::NotADirectory { path: canonical });
    }

    Ok(canonical)
}

/// Detects the cgroup v2 mount point by parsing a Linux `mountinfo` file.
///
/// If multiple `cgroup2` entries exist, the first one is returned.
///
/// # Errors
///
/// - [`Error::FileOpen`] if the file can't be opened.
/// - [`Error::ReadLine`] if reading from the file fails.
/// - [`Error::Parse`] if parsing any line fails.
/// - [`Error::MissingCgroup2Mount`] if no `cgroup2` mount is found.
///
/// # Example
///
/// ```no_run
/// use resource_telemetry::mountinfo::detect_cgroup2_mount_point;
///
/// let root = detect_cgroup2_mount_point("/proc/self/mountinfo").unwrap();
/// println!("cgroup2 root: {}", root.display());
/// ```
pub fn detect_cgroup2_mount_point(path: impl AsRef<Path>) -> Result<PathBuf> {
    let path = path.as_ref();
    let buf = fsutil::open_file_reader(path)?;

    let mut mount_point = None;
    for_each_line(buf, path, |line| {
        let mount_info = parse_mount_info_line(line).map_err(|source| Error::Parse {
            path: path.to_path_buf(),
            source,
        })?;
        if mount_info.fs_type == "cgroup2" {
            log::debug!(
                "Found `cgroup2` mount point with root `{}`: {}",
                mount_info.root,
                mount_info.mount_point
            );
            mount_point = Some(PathBuf::from(mount_info.decoded_mount_point().as_ref()));
            return Ok(false);
        }
        Ok(true)
    })?;

    mount_point.ok_or_else(|| Error::MissingCgroup2Mount {
        path: path.to_path_buf(),
    })
}

/// Reads every entry of a `mountinfo` file.
///
/// # Errors
///
/// - [`Error::FileOpen`] if the file can't be opened.
/// - [`Error::ReadLine`] if reading from the file fails.
/// - [`Error::Parse`] if parsing any line fails.
pub fn read_mounts(path: impl AsRef<Path>) -> Result<Vec<MountEntry>> {
    let path = path.as_ref();
    let buf = fsutil::open_file_reader(path)?;
    read_mounts_from_reader(buf, path)
}

/// Lists every cgroup v1 (`cgroup` filesystem type) mount in a `mountinfo` file.
///
/// An empty list means the host runs the unified hierarchy only.
///
/// # Errors
///
/// Same as [`read_mounts`].
pub fn read_cgroup1_mounts(path: impl AsRef<Path>) -> Result<Vec<CgroupV1Mount>> {
    let path = path.as_ref();
    let buf = fsutil::open_file_reader(path)?;
    let mut mounts = Vec::new();
    for_each_line(buf, path, |line| {
        let info = parse_mount_info_line(line).map_err(|source| Error::Parse {
            path: path.to_path_buf(),
            source,
        })?;
        if info.fs_type == "cgroup" {
            mounts.push(CgroupV1Mount {
                root: info.root.to_owned(),
                mount_point: PathBuf::from(info.decoded_mount_point().as_ref()),
                controllers: info.super_options.split(',').map(str::to_owned).collect(),
            });
        }
        Ok(true)
    })?;
    Ok(mounts)
}

fn read_mounts_from_reader<R: BufRead>(reader: R, origin: &Path) -> Result<Vec<MountEntry>> {
    let mut mounts = Vec::new();
    for_each_line(reader, origin, |line| {
        let info = parse_mount_info_line(line).map_err(|source| Error::Parse {
            path: origin.to_path_buf(),
            source,
        })?;
        mounts.push(MountEntry {
            device: info.major_minor.to_owned(),
            mount_point: PathBuf::from(info.decoded_mount_point().as_ref()),
            fs_type: info.fs_type.to_owned(),
        });
        Ok(true)
    })?;
    Ok(mounts)
}

/// Feeds each non-empty line to `visit` until it returns `Ok(false)` or input ends.
fn for_each_line<R: BufRead>(
    mut reader: R,
    origin: &Path,
    mut visit: impl FnMut(&str) -> Result<bool>,
) -> Result<()> {
    let mut line = String::with_capacity(256);

    while reader
        .read_line(&mut line)
        .map_err(|source| Error::ReadLine {
            path: origin.to_path_buf(),
            source,
        })?
        != 0
    {
        if !line.trim().is_empty() && !visit(&line)? {
            break;
        }
        line.clear();
    }

    Ok(())
}
