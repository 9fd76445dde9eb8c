use std::fs::File;
use std::io::{self, BufReader};
use std::path::{Path, PathBuf};

/// Error that occurs when opening a file fails.
#[derive(Debug, thiserror::Error)]
#[error("failed to open file `{path}`: {source}")]
pub struct FileOpenError {
    pub path: PathBuf,
    #[source]
    pub source: io::Error,
}

/// Error that occurs when a procfs/sysfs file was opened but could not be parsed.
#[derive(Debug, thiserror::Error)]
#[error("failed to read file `{path}`: {source}")]
pub struct FileReadError {
    pub path: PathBuf,
    #[source]
    pub source: io::Error,
}

/// Opens a file at the given path and wraps it in a [`BufReader`].
///
/// # Errors
///
/// Returns a [`FileOpenError`] if the file cannot be opened.
///
/// # Example
/// ```no_run
/// # use resource_telemetry::fsutil;
/// let reader = fsutil::open_file_reader("/proc/stat")?;
/// # Ok::<(), fsutil::FileOpenError>(())
/// ```
pub fn open_file_reader(path: impl AsRef<Path>) -> Result<BufReader<File>, FileOpenError> {
    let path = path.as_ref();
    let file = File::open(path).map_err(|source| FileOpenError {
        path: path.to_path_buf(),
        source,
    })?;
    Ok(BufReader::new(file))
}

/// Opens `path` and runs `parse` over a buffered reader of its contents.
///
/// Both failure modes are flattened into an [`io::Error`] that keeps the path in its message,
/// which is what the samplers log.
pub fn parse_file<T>(
    path: impl AsRef<Path>,
    parse: impl FnOnce(&mut BufReader<File>) -> io::Result<T>,
) -> io::Result<T> {
    let path = path.as_ref();
    let mut reader = open_file_reader(path).map_err(|err| io::Error::new(err.source.kind(), err))?;
    parse(&mut reader).map_err(|source| {
        io::Error::new(
            source.kind(),
            FileReadError {
                path: path.to_path_buf(),
                source,
            },
        )
    })
}

/// Joins an absolute host path such as `/proc/stat` onto a root prefix.
///
/// With a root of `/` the path is returned unchanged.
pub fn rooted(root: &Path, absolute: &str) -> PathBuf {
    root.join(absolute.trim_start_matches('/'))
}

#[cfg(test)]
mod tests {

    use super::*;
    use std::io::{BufRead, Write};

    #[test]
    fn test_open_file_reader_success() {
        let tmp = tempfile::NamedTempFile::new().expect("failed to create temp file");
        let path = tmp.path();
        let reader = open_file_reader(path).expect("should open test file");
        let metadata = reader.get_ref().metadata().unwrap();
        assert!(metadata.is_file());
    }

    #[test]
    fn test_open_file_reader_error() {
        let result = open_file_reader("/definitely/does/not/exist");
        assert!(result.is_err());
        let err = result.unwrap_err();
        assert_eq!(err.path, PathBuf::from("/definitely/does/not/exist"));
        assert_eq!(err.source.kind(), std::io::ErrorKind::NotFound);
    }

    #[test]
    fn test_parse_file_keeps_kind_and_path() {
        let err = parse_file("/definitely/does/not/exist", |_| Ok(())).unwrap_err();
        assert_eq!(err.kind(), std::io::ErrorKind::NotFound);
        assert!(err.to_string().contains("/definitely/does/not/exist"));

        let mut tmp = tempfile::NamedTempFile::new().unwrap();
        writeln!(tmp, "42").unwrap();
        let value = parse_file(tmp.path(), |r| {
            let mut line = String::new();
            r.read_line(&mut line)?;
            line.trim()
                .parse::<u64>()
                .map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))
        })
        .unwrap();
        assert_eq!(value, 42);
    }

    #[test]
    fn test_rooted() {
        assert_eq!(rooted(Path::new("/"), "/proc/stat"), PathBuf::from("/proc/stat"));
        assert_eq!(
            rooted(Path::new("/rootfs"), "/proc/stat"),
            PathBuf::from("/rootfs/proc/stat")
        );
    }
}
