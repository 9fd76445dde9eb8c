//! Link speed as reported by `ethtool <interface>`.

use std::io::Read;
use std::num::ParseIntError;
use std::process::{ChildStdout, ExitStatus, Stdio};
use std::sync::mpsc;
use std::time::{Duration, Instant};

const MEBI: u64 = 1024 * 1024;
const GIBI: u64 = 1024 * 1024 * 1024;
const POLL_INTERVAL: Duration = Duration::from_millis(5);

#[derive(Debug, thiserror::Error)]
pub enum SpeedError {
    #[error("failed to spawn `{program}`: {source}")]
    Spawn {
        program: String,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to wait for `{program}`: {source}")]
    Wait {
        program: String,
        #[source]
        source: std::io::Error,
    },
    #[error("`{program}` exited with {status}")]
    ExitStatus { program: String, status: ExitStatus },
    #[error("`{program}` did not finish within {timeout:?}")]
    TimedOut { program: String, timeout: Duration },
    #[error("no `Speed:` line in output")]
    MissingSpeedLine,
    #[error("unknown speed unit in `{0}`")]
    UnknownUnit(String),
    #[error("invalid speed value `{value}`: {source}")]
    InvalidNumber {
        value: String,
        #[source]
        source: ParseIntError,
    },
}

/// Parses one `Speed: <n>Mb/s` or `Speed: <n>Gb/s` line into bytes per second, with binary
/// multipliers (`Mb/s` is 1024², `Gb/s` 1024³).
pub fn parse_speed_line(line: &str) -> Result<u64, SpeedError> {
    let value = line
        .trim()
        .strip_prefix("Speed:")
        .ok_or(SpeedError::MissingSpeedLine)?
        .trim();

    let (number, multiplier) = if let Some(n) = value.strip_suffix("Mb/s") {
        (n, MEBI)
    } else if let Some(n) = value.strip_suffix("Gb/s") {
        (n, GIBI)
    } else {
        return Err(SpeedError::UnknownUnit(value.to_owned()));
    };

    let n = number
        .trim()
        .parse::<u64>()
        .map_err(|source| SpeedError::InvalidNumber {
            value: number.to_owned(),
            source,
        })?;
    Ok(n.saturating_mul(multiplier))
}

/// Finds the first `Speed:` line in a full `ethtool` listing and parses it.
pub fn parse_speed(output: &str) -> Result<u64, SpeedError> {
    output
        .lines()
        .find(|line| line.trim_start().starts_with("Speed:"))
        .ok_or(SpeedError::MissingSpeedLine)
        .and_then(parse_speed_line)
}

/// Runs `ethtool` with a deadline. A child that outlives it is killed and reaped.
#[derive(Debug, Clone)]
pub struct Ethtool {
    program: String,
    timeout: Duration,
}

impl Ethtool {
    pub fn new(program: impl Into<String>, timeout: Duration) -> Self {
        Self {
            program: program.into(),
            timeout,
        }
    }

    /// Link speed of `interface` in bytes per second.
    pub fn speed(&self, interface: &str) -> Result<u64, SpeedError> {
        let output = self.run(interface)?;
        parse_speed(&output)
    }

    fn run(&self, interface: &str) -> Result<String, SpeedError> {
        let mut child = std::process::Command::new(&self.program)
            .arg(interface)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::null())
            .spawn()
            .map_err(|source| SpeedError::Spawn {
                program: self.program.clone(),
                source,
            })?;

        // drain stdout while polling, or a chatty child blocks on a full pipe
        let output = drain(child.stdout.take());

        let start = Instant::now();
        loop {
            let polled = child.try_wait().map_err(|source| SpeedError::Wait {
                program: self.program.clone(),
                source,
            });
            match polled {
                Ok(Some(status)) => {
                    if !status.success() {
                        return Err(SpeedError::ExitStatus {
                            program: self.program.clone(),
                            status,
                        });
                    }
                    let remaining = self.timeout.saturating_sub(start.elapsed());
                    let out = output.recv_timeout(remaining).map_err(|_| SpeedError::TimedOut {
                        program: self.program.clone(),
                        timeout: self.timeout,
                    })?;
                    return Ok(String::from_utf8_lossy(&out).into_owned());
                }
                Ok(None) if start.elapsed() >= self.timeout => {
                    let _ = child.kill();
                    let _ = child.wait();
                    return Err(SpeedError::TimedOut {
                        program: self.program.clone(),
                        timeout: self.timeout,
                    });
                }
                Ok(None) => std::thread::sleep(POLL_INTERVAL),
                Err(err) => {
                    let _ = child.kill();
                    let _ = child.wait();
                    return Err(err);
                }
            }
        }
    }
}

/// Reads `stdout` to the end on a helper thread; the bytes arrive once the pipe closes.
fn drain(stdout: Option<ChildStdout>) -> mpsc::Receiver<Vec<u8>> {
    let (tx, rx) = mpsc::channel();
    std::thread::spawn(move || {
        let mut out = Vec::new();
        if let Some(mut stdout) = stdout {
            let _ = stdout.read_to_end(&mut out);
        }
        let _ = tx.send(out);
    });
    rx
}
