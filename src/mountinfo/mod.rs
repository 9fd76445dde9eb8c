//! Parsing of `/proc/<pid>/mountinfo`.
//!
//! Used to locate the cgroup hierarchy (v2, or the v1 controller mounts) for container
//! sampling and to enumerate mounted filesystems for host disk totals.
mod detect;
mod error;
mod parser;

pub use detect::{
    CgroupV1Mount, MountEntry, detect_cgroup2_mount_point, detect_validated_cgroup2_mount_point,
    read_cgroup1_mounts, read_mounts,
};
pub use error::{Error, Result};
pub use parser::{MountInfo, MountInfoField, ParseError, parse_mount_info_line};
