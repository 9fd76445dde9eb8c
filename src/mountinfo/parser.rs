//! Mountinfo line parser for Linux systems.
//!
//! Parses lines in `/proc/[pid]/mountinfo` format. See
//! [`proc_pid_mountinfo(5)`](https://man7.org/linux/man-pages/man5/proc_pid_mountinfo.5.html)
//! for details on the structure.

use std::borrow::Cow;

/// Represents a parsed mountinfo line.
#[derive(Debug, PartialEq, Eq)]
pub struct MountInfo<'a> {
    /// Major:Minor device identifier.
    pub major_minor: &'a str,
    /// Root of the mount within the filesystem.
    pub root: &'a str,
    /// Mount point relative to the process's root, with octal escapes still in place.
    pub mount_point: &'a str,
    /// Filesystem type (e.g., `ext4`, `cgroup2`).
    pub fs_type: &'a str,
    /// Source of the mount (e.g., device).
    pub source: &'a str,
    /// Per-superblock options; for cgroup v1 mounts these name the attached controllers.
    pub super_options: &'a str,
}

impl MountInfo<'_> {
    /// The mount point with the kernel's `\040`-style escapes decoded.
    pub fn decoded_mount_point(&self) -> Cow<'_, str> {
        unescape_octal(self.mount_point)
    }
}

/// Named fields in a mountinfo line.
#[derive(Debug, Clone, Copy)]
pub enum MountInfoField {
    MountId,
    ParentId,
    MajorMinor,
    Root,
    MountPoint,
    FsType,
    Source,
}

impl std::fmt::Display for MountInfoField {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            MountInfoField::MountId => "mount_id",
            MountInfoField::ParentId => "parent_id",
            MountInfoField::MajorMinor => "major:minor",
            MountInfoField::Root => "root",
            MountInfoField::MountPoint => "mount_point",
            MountInfoField::FsType => "fs_type",
            MountInfoField::Source => "source",
        };
        write!(f, "{name}")
    }
}

/// Errors that may occur when parsing a mountinfo line.
#[derive(Debug, thiserror::Error)]
#[allow(clippy::enum_variant_names)]
pub enum ParseError {
    #[error("missing separator ` - ` in line: `{0}`")]
    MissingSeparator(String),

    #[error("missing `{field}` in pre-separator section of line: `{line}`")]
    MissingPreSeparatorField { field: MountInfoField, line: String },

    #[error("missing `{field}` in post-separator section of line: `{line}`")]
    MissingPostSeparatorField { field: MountInfoField, line: String },
}

/// Parses a single line of mountinfo data.
///
/// Only the fields the sampler needs are kept; optional fields and options are skipped.
///
/// # Errors
///
/// Returns [`ParseError`] variants for missing separator or required fields.
pub fn parse_mount_info_line(line: &str) -> Result<MountInfo<'_>, ParseError> {
    let line = line.trim_end_matches('\n');
    let (pre, post) = line
        .split_once(" - ")
        .ok_or_else(|| ParseError::MissingSeparator(line.to_owned()))?;

    let mut pre_fields = pre.split_whitespace();
    let mut pre_field = |field| {
        pre_fields
            .next()
            .ok_or_else(|| ParseError::MissingPreSeparatorField {
                field,
                line: line.to_owned(),
            })
    };
    pre_field(MountInfoField::MountId)?;
    pre_field(MountInfoField::ParentId)?;
    let major_minor = pre_field(MountInfoField::MajorMinor)?;
    let root = pre_field(MountInfoField::Root)?;
    let mount_point = pre_field(MountInfoField::MountPoint)?;

    let mut post_fields = post.split_whitespace();
    let mut post_field = |field| {
        post_fields
            .next()
            .ok_or_else(|| ParseError::MissingPostSeparatorField {
                field,
                line: line.to_owned(),
            })
    };
    let fs_type = post_field(MountInfoField::FsType)?;
    let source = post_field(MountInfoField::Source)?;
    let super_options = post_fields.next().unwrap_or("");

    Ok(MountInfo {
        major_minor,
        root,
        mount_point,
        fs_type,
        source,
        super_options,
    })
}

/// Decodes the `\ooo` octal escapes the kernel uses for whitespace and backslashes in paths.
fn unescape_octal(raw: &str) -> Cow<'_, str> {
    if !raw.contains('\\') {
        return Cow::Borrowed(raw);
    }

    let bytes = raw.as_bytes();
    let mut out = Vec::with_capacity(bytes.len());
    let mut i = 0;
    while i < bytes.len() {
        if bytes[i] == b'\\' && i + 4 <= bytes.len() {
            let digits = &bytes[i + 1..i + 4];
            if digits.iter().all(|b| (b'0'..=b'7').contains(b)) {
                let value = digits
                    .iter()
                    .fold(0u32, |acc, b| acc * 8 + u32::from(b - b'0'));
                if let Ok(value) = u8::try_from(value) {
                    out.push(value);
                    i += 4;
                    continue;
                }
            }
        }
        out.push(bytes[i]);
        i += 1;
    }

    Cow::Owned(String::from_utf8_lossy(&out).into_owned())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_valid_mountinfo_line() {
        let line = "42 35 0:22 / /mnt rw,nosuid - ext4 /dev/sda1 rw,data=ordered";
        let result = parse_mount_info_line(line).unwrap();

        assert_eq!(result.major_minor, "0:22");
        assert_eq!(result.root, "/");
        assert_eq!(result.mount_point, "/mnt");
        assert_eq!(result.fs_type, "ext4");
        assert_eq!(result.source, "/dev/sda1");
        assert_eq!(result.super_options, "rw,data=ordered");
    }

    #[test]
    fn parses_cgroup_v1_controllers() {
        let line = "33 25 0:28 /docker/abc /sys/fs/cgroup/cpu,cpuacct ro,nosuid - cgroup cgroup rw,cpu,cpuacct";
        let result = parse_mount_info_line(line).unwrap();
        assert_eq!(result.root, "/docker/abc");
        assert_eq!(result.fs_type, "cgroup");
        assert_eq!(result.super_options, "rw,cpu,cpuacct");
    }

    #[test]
    fn parses_line_with_trailing_newline_and_optional_fields() {
        let line = "70 56 8:17 / /var rw,relatime shared:20 - ext4 /dev/sdb1 rw\n";
        let result = parse_mount_info_line(line).unwrap();
        assert_eq!(result.mount_point, "/var");
        assert_eq!(result.fs_type, "ext4");
    }

    #[test]
    fn error_on_missing_separator() {
        let line = "42 35 0:22 / /mnt rw,nosuid ext4 /dev/sda1 rw";
        let err = parse_mount_info_line(line).unwrap_err();
        assert!(matches!(err, ParseError::MissingSeparator(_)));
    }

    #[test]
    fn error_on_missing_mount_point() {
        let line = "42 35 0:22 / - ext4 /dev/sda1 rw";
        let err = parse_mount_info_line(line).unwrap_err();
        match err {
            ParseError::MissingPreSeparatorField { field, .. } => {
                assert_eq!(field.to_string(), "mount_point");
            }
            _ => panic!("Expected MissingPreSeparatorField"),
        }
    }

    #[test]
    fn error_on_missing_source() {
        let line = "42 35 0:22 / /mnt rw - ext4";
        let err = parse_mount_info_line(line).unwrap_err();
        match err {
            ParseError::MissingPostSeparatorField { field, .. } => {
                assert_eq!(field.to_string(), "source");
            }
            _ => panic!("Expected MissingPostSeparatorField"),
        }
    }

    #[test]
    fn error_on_empty_line() {
        let err = parse_mount_info_line("").unwrap_err();
        assert!(matches!(err, ParseError::MissingSeparator(_)));
    }

    #[test]
    fn decodes_escaped_mount_point() {
        let line = r"90 35 8:3 / /media/usb\040stick rw - vfat /dev/sdc1 rw";
        let result = parse_mount_info_line(line).unwrap();
        assert_eq!(result.decoded_mount_point(), "/media/usb stick");
    }

    #[test]
    fn leaves_unescaped_mount_point_borrowed() {
        assert!(matches!(unescape_octal("/home"), Cow::Borrowed("/home")));
        assert_eq!(unescape_octal(r"/a\\b"), r"/a\\b");
    }
}
