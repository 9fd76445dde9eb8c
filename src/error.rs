use std::fmt::Display;

/// Errors that abort a whole sampling tick.
///
/// Sub-query failures (a single procfs file, `statvfs`, `ethtool`) never surface here; they are
/// absorbed at their own boundary and leave the affected fields at their sentinel values.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("failed to initialize container stats provider: {0}")]
    ProviderInit(#[source] std::io::Error),
    #[error("failed to read container stats: {0}")]
    ContainerStats(#[source] std::io::Error),
    #[error("failed to read system clock: {0}")]
    Clock(#[from] std::time::SystemTimeError),
    #[error("sampler panicked: {0}")]
    Panicked(String),
}

pub type Result<T> = std::result::Result<T, Error>;

pub trait ResultOkLogExt<T, E> {
    /// Converts to an `Option`, logging the error at error level.
    fn ok_log(self) -> Option<T>;

    /// Converts to an `Option`, logging the error at `level` with some `context`.
    fn ok_log_at(self, level: log::Level, context: impl Display) -> Option<T>;
}

impl<T, E> ResultOkLogExt<T, E> for std::result::Result<T, E>
where
    E: std::error::Error,
{
    fn ok_log(self) -> Option<T> {
        match self {
            Ok(ok) => Some(ok),
            Err(err) => {
                log::error!("{err}");
                None
            }
        }
    }

    fn ok_log_at(self, level: log::Level, context: impl Display) -> Option<T> {
        match self {
            Ok(ok) => Some(ok),
            Err(err) => {
                log::log!(level, "{context}: {err}");
                None
            }
        }
    }
}
