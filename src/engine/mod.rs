//! Lock acquisition engine for lockrun.
//!
//! The engine turns a [`LockRequest`] into a held lock on the lock file and,
//! once the guarded command has finished, releases it again:
//!
//! 1. Open (or create) the lock file
//! 2. In create-unlink mode, bootstrap the signature under a transient
//!    exclusive lock
//! 3. Try the requested lock without blocking; on contention either refuse
//!    (no-wait) or block until acquired or the [`Deadline`] expires
//! 4. Compare the identity of the locked handle with what the path names now;
//!    if the file was replaced, start over with a fresh handle
//!
//! # Create-unlink mode
//!
//! The lock file is created lazily and removed by whichever invocation can
//! take an exclusive lock on it after its command finishes. There is a
//! narrow window between that invocation's final exclusive attempt and its
//! unlink in which a newcomer may open the path; the identity recheck makes
//! such a newcomer retry on a fresh file rather than run on the unlinked one.

mod acquire;
mod cleanup;
mod deadline;
mod request;

#[cfg(test)]
mod tests;

pub use acquire::{HeldLock, acquire};
pub use cleanup::{CleanupOutcome, release};
pub use deadline::{Deadline, MAX_TIMEOUT};
pub use request::{LockRequest, WaitPolicy};
