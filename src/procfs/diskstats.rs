use std::io::BufRead;
use std::path::Path;

const SECTOR_SIZE: u64 = 512;

/// Cumulative bytes read from and written to block devices since boot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct DiskIo {
    pub read_bytes: u64,
    pub write_bytes: u64,
}

impl DiskIo {
    /// Sums sectors read (column 6) and written (column 10) of every device accepted by
    /// `is_whole_disk`. Partitions must be rejected by the predicate, or their traffic is counted
    /// twice.
    pub fn from_reader<R: BufRead>(
        buf: &mut R,
        mut is_whole_disk: impl FnMut(&str) -> bool,
    ) -> std::io::Result<Self> {
        let mut io = DiskIo::default();
        let mut line = String::new();
        while buf.read_line(&mut line)? != 0 {
            let fields: Vec<&str> = line.split_whitespace().collect();
            if fields.len() >= 10 && is_whole_disk(fields[2]) {
                let sectors = |idx: usize| fields[idx].parse::<u64>().unwrap_or(0);
                io.read_bytes = io
                    .read_bytes
                    .saturating_add(sectors(5).saturating_mul(SECTOR_SIZE));
                io.write_bytes = io
                    .write_bytes
                    .saturating_add(sectors(9).saturating_mul(SECTOR_SIZE));
            }
            line.clear();
        }
        Ok(io)
    }
}

/// Whether `name` is a real whole-disk device: present in `sys_block` (which lists no
/// partitions) and neither a loop nor a ram device.
pub fn is_whole_disk(sys_block: &Path, name: &str) -> bool {
    !name.starts_with("loop") && !name.starts_with("ram") && sys_block.join(name).exists()
}
