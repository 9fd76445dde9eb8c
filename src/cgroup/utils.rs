use std::io::{BufRead, BufReader, Seek, SeekFrom};

/// Reads from a file, applies the given reader function, and rewinds the file cursor to the start.
///
/// Returns `Ok(None)` if the file is `None`.
pub fn read_and_rewind<T, R>(
    file: Option<&mut R>,
    reader: impl FnOnce(&mut R) -> std::io::Result<T>,
) -> std::io::Result<Option<T>>
where
    R: BufRead + Seek,
{
    let Some(f) = file else {
        return Ok(None);
    };
    let result = reader(f);
    // rewind even when parsing failed, or the next tick reads from mid-file
    f.seek(SeekFrom::Start(0))?;
    result.map(Some)
}

/// Opens a file for repeated reading, or `None` if it does not exist for this cgroup.
#[inline]
pub fn open_file(path: impl AsRef<std::path::Path>) -> Option<BufReader<std::fs::File>> {
    let path = path.as_ref();
    match std::fs::File::open(path) {
        Ok(file) => Some(BufReader::new(file)),
        Err(err) => {
            log::debug!("cgroup file `{}` unavailable: {}", path.display(), err);
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::{Cursor, Read};

    #[test]
    fn test_read_and_rewind_none() {
        let out = read_and_rewind(None::<&mut Cursor<Vec<u8>>>, |_| Ok(1)).unwrap();
        assert_eq!(out, None);
    }

    #[test]
    fn test_read_and_rewind_rewinds_after_error() {
        let mut cursor = Cursor::new(b"abc".to_vec());
        let err = read_and_rewind(Some(&mut cursor), |c| {
            let mut s = String::new();
            c.read_to_string(&mut s)?;
            Err::<(), _>(std::io::Error::other("bad"))
        })
        .unwrap_err();
        assert_eq!(err.to_string(), "bad");
        assert_eq!(cursor.position(), 0);
    }

    #[test]
    fn test_open_missing_file() {
        assert!(open_file("/definitely/does/not/exist").is_none());
    }
}
