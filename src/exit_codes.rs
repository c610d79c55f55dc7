//! Exit code constants for the lockrun CLI.
//!
//! lockrun passes the guarded command's own exit code through. The codes
//! below are the ones lockrun produces itself:
//! - 0: Success
//! - 1: Lock not acquired (refused or timed out) or fatal lock-file fault
//! - 2: Usage error (bad options)
//! - 127: Guarded command could not be launched
//! - 128+N: Guarded command was killed by signal N

/// Successful execution.
pub const SUCCESS: i32 = 0;

/// Lock acquisition failure: refused under `--no-wait`, timed out, or a fatal
/// error opening, verifying or locking the lock file.
pub const LOCK_FAILURE: i32 = 1;

/// Usage error: invalid options or option values.
pub const USAGE_ERROR: i32 = 2;

/// The guarded command could not be spawned.
pub const LAUNCH_FAILURE: i32 = 127;

/// Base added to the signal number when the guarded command was killed.
pub const SIGNAL_BASE: i32 = 128;
