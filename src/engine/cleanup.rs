//! Post-run release of the lock and removal of create-unlink lock files.

use super::acquire::HeldLock;
use super::request::LockRequest;
use crate::error::Result;
use crate::lockfile::{LockMode, SignatureState, TryLock, check_signature};
use tracing::debug;

/// What happened to the lock file on release.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CleanupOutcome {
    /// Not in create-unlink mode; the file is left alone.
    NotManaged,
    /// The file was removed.
    Removed,
    /// Another invocation still holds the file; it will clean up.
    InUse,
    /// The path now names a different file; it is not ours to remove.
    Replaced,
    /// The file does not carry an intact signature.
    Unsigned,
}

/// Release a held lock once the guarded command has finished.
///
/// In create-unlink mode the file is removed if an exclusive lock can be
/// taken without waiting, the path still names the locked file, and the
/// signature is intact. The handle is closed on return either way.
pub fn release(held: HeldLock, request: &LockRequest) -> Result<CleanupOutcome> {
    let mut file = held.into_file();

    if !request.create_unlink {
        file.unlock()?;
        return Ok(CleanupOutcome::NotManaged);
    }

    let outcome = if file.try_lock(LockMode::Exclusive)? == TryLock::WouldBlock {
        CleanupOutcome::InUse
    } else if !file.is_current()? {
        CleanupOutcome::Replaced
    } else if check_signature(&mut file).map_err(|e| file.io_error(e))? != SignatureState::Present
    {
        CleanupOutcome::Unsigned
    } else {
        file.unlink()?;
        CleanupOutcome::Removed
    };

    debug!(path = %file.path().display(), ?outcome, "lock released");
    file.unlock()?;
    Ok(outcome)
}
