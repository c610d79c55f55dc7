//! Lock acquisition state machine.

use super::deadline::Deadline;
use super::request::{LockRequest, WaitPolicy};
use crate::error::{LockrunError, Result};
use crate::feedback::WaitFeedback;
use crate::lockfile::{
    FileIdentity, LockFile, LockMode, SignatureState, TryLock, check_signature,
    may_hold_signature, write_signature,
};
use std::path::Path;
use std::thread;
use std::time::Duration;
use tracing::debug;

/// First sleep between lock polls while a deadline is armed.
const INITIAL_POLL: Duration = Duration::from_millis(10);

/// Upper bound for the sleep between lock polls.
const MAX_POLL: Duration = Duration::from_millis(200);

/// A lock that has been acquired and identity-verified.
///
/// The lock stays held for as long as this value lives. Pass it to
/// [`super::release`] once the guarded command has finished.
#[derive(Debug)]
pub struct HeldLock {
    file: LockFile,
    mode: LockMode,
    identity: FileIdentity,
    signature: SignatureState,
}

impl HeldLock {
    pub fn path(&self) -> &Path {
        self.file.path()
    }

    pub fn mode(&self) -> LockMode {
        self.mode
    }

    /// Device and inode of the locked file, captured once the lock was held.
    pub fn identity(&self) -> FileIdentity {
        self.identity
    }

    /// Signature state observed while holding the lock.
    pub fn signature(&self) -> SignatureState {
        self.signature
    }

    pub(super) fn into_file(self) -> LockFile {
        self.file
    }
}

/// Result of one pass through open, lock and verify.
enum Attempt {
    Acquired(HeldLock),
    /// The path no longer names the file we locked.
    Replaced,
}

/// Acquire the lock described by `request` on `path`.
///
/// Each pass opens a fresh handle; a pass that ends up holding a lock on a
/// file no longer reachable through `path` drops its handle and starts over.
///
/// # Returns
///
/// * `Ok(HeldLock)` - The lock is held on the file `path` currently names
/// * `Err(LockrunError::AcquisitionRefused)` - Contended and `NonBlocking`
/// * `Err(LockrunError::AcquisitionTimedOut)` - The deadline expired
/// * `Err(LockrunError::SignatureMismatch)` - The file is not ours to use
/// * `Err(..)` - Open, lock or stat failures
pub fn acquire(
    path: &Path,
    request: &LockRequest,
    feedback: &mut dyn WaitFeedback,
) -> Result<HeldLock> {
    let deadline = Deadline::for_policy(request.wait);
    let mut retries = 0u32;

    loop {
        match attempt(path, request, &deadline, feedback)? {
            Attempt::Acquired(held) => {
                debug!(
                    path = %path.display(),
                    mode = held.mode.as_str(),
                    identity = %held.identity,
                    retries,
                    "lock acquired"
                );
                feedback.acquired(path);
                return Ok(held);
            }
            Attempt::Replaced => {
                retries += 1;
                debug!(path = %path.display(), retries, "lock file replaced while locking, retrying");
            }
        }
    }
}

fn attempt(
    path: &Path,
    request: &LockRequest,
    deadline: &Deadline,
    feedback: &mut dyn WaitFeedback,
) -> Result<Attempt> {
    let mut file = open_lock_file(path, request)?;

    let verified = if request.create_unlink {
        bootstrap_signature(&mut file)?
    } else {
        Some(verify_signature(&mut file)?)
    };

    lock_or_wait(&file, request, deadline, feedback)?;

    let identity = file.identity()?;
    let current = file.path_identity()?;
    if current != Some(identity) {
        debug!(
            held = %identity,
            current = ?current.map(|id| id.to_string()),
            "identity mismatch"
        );
        return Ok(Attempt::Replaced);
    }

    let signature = match verified {
        Some(state) => state,
        None => settle_deferred_signature(&mut file, request.mode)?,
    };

    Ok(Attempt::Acquired(HeldLock {
        file,
        mode: request.mode,
        identity,
        signature,
    }))
}

fn open_lock_file(path: &Path, request: &LockRequest) -> Result<LockFile> {
    let create = !request.fail_if_missing;
    if request.create_unlink {
        // The signature may need writing.
        LockFile::open(path, create)
    } else {
        LockFile::open_allow_read_only(path, create)
    }
}

/// Check the signature, rejecting foreign content.
fn verify_signature(file: &mut LockFile) -> Result<SignatureState> {
    match check_signature(file).map_err(|e| file.io_error(e))? {
        SignatureState::Mismatch => Err(LockrunError::SignatureMismatch {
            path: file.path().to_path_buf(),
        }),
        state => Ok(state),
    }
}

/// Verify or write the signature under a transient exclusive lock.
///
/// Returns `None` when the exclusive lock was not available; somebody else
/// holds the file and the full check is repeated once our own lock is held.
/// Content that can never become the signature is rejected right away, so a
/// foreign file held by another tool is not waited on.
fn bootstrap_signature(file: &mut LockFile) -> Result<Option<SignatureState>> {
    if file.try_lock(LockMode::Exclusive)? == TryLock::WouldBlock {
        if !may_hold_signature(file).map_err(|e| file.io_error(e))? {
            return Err(LockrunError::SignatureMismatch {
                path: file.path().to_path_buf(),
            });
        }
        debug!(path = %file.path().display(), "lock file busy, deferring signature check");
        return Ok(None);
    }

    let state = match verify_signature(file)? {
        SignatureState::Absent => {
            write_signature(file).map_err(|e| file.io_error(e))?;
            debug!(path = %file.path().display(), "signature written");
            SignatureState::Present
        }
        state => state,
    };

    file.unlock()?;
    Ok(Some(state))
}

/// Signature check for a bootstrap that could not run, now that the real lock
/// is held. Only an exclusive holder may write.
fn settle_deferred_signature(file: &mut LockFile, mode: LockMode) -> Result<SignatureState> {
    match verify_signature(file)? {
        SignatureState::Absent if mode == LockMode::Exclusive => {
            write_signature(file).map_err(|e| file.io_error(e))?;
            Ok(SignatureState::Present)
        }
        state => Ok(state),
    }
}

fn lock_or_wait(
    file: &LockFile,
    request: &LockRequest,
    deadline: &Deadline,
    feedback: &mut dyn WaitFeedback,
) -> Result<()> {
    if file.try_lock(request.mode)? == TryLock::Locked {
        return Ok(());
    }

    if request.wait == WaitPolicy::NonBlocking {
        return Err(LockrunError::AcquisitionRefused {
            path: file.path().to_path_buf(),
        });
    }

    feedback.waiting(file.path());
    wait_for_lock(file, request.mode, deadline)
}

/// Block until locked. With a deadline, poll with backoff and give up at
/// expiry; without one, sleep in the kernel.
fn wait_for_lock(file: &LockFile, mode: LockMode, deadline: &Deadline) -> Result<()> {
    let Some(limit) = deadline.limit() else {
        debug!(path = %file.path().display(), mode = mode.as_str(), "blocking for lock");
        return file.wait_lock(mode);
    };

    let mut interval = INITIAL_POLL;
    loop {
        if file.try_lock(mode)? == TryLock::Locked {
            return Ok(());
        }

        if deadline.is_expired() {
            return Err(LockrunError::AcquisitionTimedOut {
                path: file.path().to_path_buf(),
                timeout: limit,
            });
        }

        thread::sleep(interval.min(deadline.remaining().unwrap_or(interval)));
        interval = (interval * 2).min(MAX_POLL);
    }
}
