use super::{Error, Result};
use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;

/// Substrings of a control-group path that only appear when a container runtime created it.
pub const CONTAINER_MARKERS: [&str; 4] = ["/docker", "/kubepods", "/containerd", "/libpod"];

/// Returns true if the cgroup descriptor at `path` references a container runtime.
///
/// # Arguments
///
/// * `path` - A `/proc/<pid>/cgroup`-style file, usually `/proc/1/cgroup`.
///
/// # Errors
///
/// * [`Error::FileOpen`] if the file cannot be opened.
/// * [`Error::ReadLine`] if a line from the file cannot be read.
pub fn matches_container_cgroup(path: impl AsRef<Path>) -> Result<bool> {
    let path = path.as_ref();
    let buf = BufReader::new(File::open(path).map_err(|source| Error::FileOpen {
        path: path.to_path_buf(),
        source,
    })?);

    matches_container_cgroup_from_reader(buf, path)
}

pub(super) fn matches_container_cgroup_from_reader<R: BufRead>(
    mut buf: R,
    origin: &Path,
) -> Result<bool> {
    let mut line = String::with_capacity(256);

    while buf.read_line(&mut line).map_err(|source| Error::ReadLine {
        path: origin.to_path_buf(),
        source,
    })? != 0
    {
        if CONTAINER_MARKERS.iter().any(|marker| line.contains(marker)) {
            return Ok(true);
        }

        line.clear();
    }

    Ok(false)
}
