//! Filesystem capacity via `statvfs`, summed over the mount table.

use std::collections::HashSet;
use std::ffi::CString;
use std::os::unix::ffi::OsStrExt;
use std::path::{Path, PathBuf};

use crate::{fsutil, mountinfo};

/// Virtual or memory-backed filesystems that carry no disk capacity.
const PSEUDO_FILESYSTEMS: [&str; 22] = [
    "autofs",
    "binfmt_misc",
    "bpf",
    "cgroup",
    "cgroup2",
    "configfs",
    "debugfs",
    "devpts",
    "devtmpfs",
    "efivarfs",
    "fusectl",
    "hugetlbfs",
    "mqueue",
    "nsfs",
    "proc",
    "pstore",
    "ramfs",
    "securityfs",
    "squashfs",
    "sysfs",
    "tmpfs",
    "tracefs",
];

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error(transparent)]
    MountInfo(#[from] mountinfo::Error),
    #[error("statvfs on `{path}` failed: {source}")]
    Statvfs {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("no disk-backed filesystem is mounted")]
    NoFilesystems,
}

/// Capacity of one or more filesystems, in bytes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct FileSystemUsage {
    pub total_bytes: u64,
    /// Space available to unprivileged users.
    pub usable_bytes: u64,
}

impl std::ops::AddAssign for FileSystemUsage {
    fn add_assign(&mut self, rhs: Self) {
        self.total_bytes = self.total_bytes.saturating_add(rhs.total_bytes);
        self.usable_bytes = self.usable_bytes.saturating_add(rhs.usable_bytes);
    }
}

/// Capacity of the filesystem holding `path`.
pub fn statvfs(path: &Path) -> Result<FileSystemUsage, Error> {
    let to_err = |source| Error::Statvfs {
        path: path.to_path_buf(),
        source,
    };
    let c_path = CString::new(path.as_os_str().as_bytes())
        .map_err(|e| to_err(std::io::Error::new(std::io::ErrorKind::InvalidInput, e)))?;

    let mut stat: libc::statvfs = unsafe { std::mem::zeroed() };
    let ret = unsafe { libc::statvfs(c_path.as_ptr(), &mut stat) };
    if ret != 0 {
        return Err(to_err(std::io::Error::last_os_error()));
    }

    let block_size = stat.f_frsize as u64;
    Ok(FileSystemUsage {
        total_bytes: (stat.f_blocks as u64).saturating_mul(block_size),
        usable_bytes: (stat.f_bavail as u64).saturating_mul(block_size),
    })
}

/// Sums capacity over every disk-backed mount in `mountinfo_path`, counting each device once.
///
/// Mount points are resolved under `root` so a host root filesystem mounted elsewhere can be
/// inspected. Mounts whose `statvfs` fails (stale network mounts, permission) are skipped.
///
/// # Errors
///
/// Fails if the mount table cannot be read or not a single filesystem could be queried.
pub fn mounted_filesystem_usage(
    mountinfo_path: &Path,
    root: &Path,
) -> Result<FileSystemUsage, Error> {
    let mounts = mountinfo::read_mounts(mountinfo_path)?;
    let mut seen_devices = HashSet::with_capacity(mounts.len());
    let mut usage = FileSystemUsage::default();
    let mut queried = 0usize;

    for mount in mounts
        .iter()
        .filter(|m| !PSEUDO_FILESYSTEMS.contains(&m.fs_type.as_str()))
    {
        if !seen_devices.insert(mount.device.as_str()) {
            continue;
        }
        let target = fsutil::rooted(root, &mount.mount_point.to_string_lossy());
        match statvfs(&target) {
            Ok(fs) => {
                usage += fs;
                queried += 1;
            }
            Err(err) => log::debug!("Skipping mount {}: {err}", mount.mount_point.display()),
        }
    }

    if queried == 0 {
        return Err(Error::NoFilesystems);
    }
    Ok(usage)
}
