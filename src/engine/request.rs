//! Lock request definitions.

use crate::lockfile::LockMode;
use std::time::Duration;

/// How long to wait when the lock is held by someone else.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum WaitPolicy {
    /// Give up immediately.
    NonBlocking,
    /// Wait as long as it takes.
    #[default]
    BlockIndefinitely,
    /// Wait at most this long.
    BlockWithDeadline(Duration),
}

/// Everything the engine needs to know about one acquisition.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct LockRequest {
    pub mode: LockMode,
    pub wait: WaitPolicy,
    /// Create the lock file with a signature and remove it when unneeded.
    pub create_unlink: bool,
    /// Never create the lock file; a missing file is fatal.
    pub fail_if_missing: bool,
}
