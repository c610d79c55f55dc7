//! Error types for the lockrun CLI.
//!
//! Uses thiserror for derive macros and provides user-actionable error messages.

use crate::exit_codes;
use std::io;
use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;

/// Main error type for lockrun operations.
///
/// Each variant maps to a specific exit code via [`LockrunError::exit_code`].
#[derive(Error, Debug)]
pub enum LockrunError {
    /// The lock file could not be opened or created.
    #[error("cannot open lock file '{}': {source}", path.display())]
    CannotOpen {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    /// `--existing` was given and the lock file does not exist.
    #[error("lock file '{}' does not exist", path.display())]
    LockFileMissing { path: PathBuf },

    /// The lock file holds content that is not the lockrun signature.
    #[error(
        "lock file '{}' has unexpected content (signature mismatch), refusing to use it",
        path.display()
    )]
    SignatureMismatch { path: PathBuf },

    /// The lock is held elsewhere and `--no-wait` was given.
    #[error("unable to acquire lock on '{}'", path.display())]
    AcquisitionRefused { path: PathBuf },

    /// The deadline expired before the lock could be acquired.
    #[error(
        "timed out after {} waiting for lock on '{}'",
        format_duration(*timeout),
        path.display()
    )]
    AcquisitionTimedOut { path: PathBuf, timeout: Duration },

    /// A lock or unlock system call failed for a reason other than contention.
    #[error("lock operation on '{}' failed: {source}", path.display())]
    LockFailed {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    /// Stat, read or write of the lock file failed.
    #[error("cannot access lock file '{}': {source}", path.display())]
    LockFileIo {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    /// The guarded command could not be spawned.
    #[error("cannot run '{program}': {source}")]
    ChildLaunchFailure {
        program: String,
        #[source]
        source: io::Error,
    },

    /// Waiting for the guarded command failed.
    #[error("waiting for '{program}' failed: {source}")]
    ChildWaitFailure {
        program: String,
        #[source]
        source: io::Error,
    },

    /// Invalid option or option value.
    #[error("{0}")]
    UsageError(String),
}

impl LockrunError {
    /// Returns the appropriate exit code for this error type.
    pub fn exit_code(&self) -> i32 {
        match self {
            LockrunError::CannotOpen { .. }
            | LockrunError::LockFileMissing { .. }
            | LockrunError::SignatureMismatch { .. }
            | LockrunError::AcquisitionRefused { .. }
            | LockrunError::AcquisitionTimedOut { .. }
            | LockrunError::LockFailed { .. }
            | LockrunError::LockFileIo { .. }
            | LockrunError::ChildWaitFailure { .. } => exit_codes::LOCK_FAILURE,
            LockrunError::ChildLaunchFailure { .. } => exit_codes::LAUNCH_FAILURE,
            LockrunError::UsageError(_) => exit_codes::USAGE_ERROR,
        }
    }

    /// Whether this is ordinary lock contention rather than a fault.
    pub fn is_contention(&self) -> bool {
        matches!(
            self,
            LockrunError::AcquisitionRefused { .. } | LockrunError::AcquisitionTimedOut { .. }
        )
    }
}

/// Render a duration the way users type it on the command line.
pub fn format_duration(duration: Duration) -> String {
    let millis = duration.as_millis();
    if millis % 1000 == 0 {
        format!("{}s", duration.as_secs())
    } else if duration.as_secs() == 0 {
        format!("{}ms", millis)
    } else {
        format!("{:.3}s", duration.as_secs_f64())
    }
}

/// Result type alias for lockrun operations.
pub type Result<T> = std::result::Result<T, LockrunError>;
