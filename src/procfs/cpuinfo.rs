use std::collections::HashSet;
use std::io::BufRead;

/// Counts physical cores in a `/proc/cpuinfo` listing as distinct `(physical id, core id)` pairs.
///
/// Returns `None` when the listing carries no topology (some virtual machines and non-x86
/// kernels); callers fall back to the logical CPU count.
pub fn physical_core_count<R: BufRead>(buf: &mut R) -> std::io::Result<Option<u32>> {
    let mut cores = HashSet::new();
    let mut physical_id: Option<String> = None;
    let mut core_id: Option<String> = None;

    let mut line = String::new();
    loop {
        line.clear();
        let eof = buf.read_line(&mut line)? == 0;

        match line.split_once(':') {
            Some((key, value)) if key.trim() == "physical id" => {
                physical_id = Some(value.trim().to_owned());
            }
            Some((key, value)) if key.trim() == "core id" => {
                core_id = Some(value.trim().to_owned());
            }
            // blank line closes a processor block
            None if line.trim().is_empty() => {
                if let (Some(p), Some(c)) = (physical_id.take(), core_id.take()) {
                    cores.insert((p, c));
                }
            }
            _ => {}
        }

        if eof {
            break;
        }
    }

    Ok(u32::try_from(cores.len()).ok().filter(|n| *n > 0))
}

/// Logical CPUs available to this process, at least 1.
pub fn logical_cpu_count() -> u32 {
    std::thread::available_parallelism()
        .map(|n| u32::try_from(n.get()).unwrap_or(u32::MAX))
        .unwrap_or(1)
}
