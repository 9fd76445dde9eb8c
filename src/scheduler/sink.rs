use std::fs::{File, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

/// Destination for formatted records. Lines arrive `\n`-terminated.
pub trait RecordSink: Send + Sync {
    fn emit(&self, line: &str);
}

/// Writes records to standard output.
#[derive(Debug, Default)]
pub struct StdoutSink;

impl RecordSink for StdoutSink {
    fn emit(&self, line: &str) {
        let mut out = std::io::stdout().lock();
        if let Err(err) = out.write_all(line.as_bytes()).and_then(|()| out.flush()) {
            log::debug!("Failed to write record to stdout: {err}");
        }
    }
}

/// Appends records to a file, creating it if needed.
#[derive(Debug)]
pub struct FileSink {
    path: PathBuf,
    file: Mutex<File>,
}

impl FileSink {
    pub fn open(path: impl AsRef<Path>) -> std::io::Result<Self> {
        let path = path.as_ref();
        let file = OpenOptions::new().create(true).append(true).open(path)?;
        Ok(Self {
            path: path.to_path_buf(),
            file: Mutex::new(file),
        })
    }
}

impl RecordSink for FileSink {
    fn emit(&self, line: &str) {
        let mut file = self
            .file
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner);
        if let Err(err) = file.write_all(line.as_bytes()) {
            log::warn!("Failed to append record to {}: {err}", self.path.display());
        }
    }
}
