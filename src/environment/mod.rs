//! Environment detection module.
//!
//! Determines whether the program is running on the host or inside a container, which decides
//! the sampling strategy for the lifetime of the scheduler.
mod checks;
mod detect;
mod error;

pub use checks::CONTAINER_MARKERS;
pub use detect::{RuntimeEnvironment, detect_runtime_environment, is_container};
pub use error::{Error, Result};
