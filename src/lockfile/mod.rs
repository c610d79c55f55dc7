//! Lock file subsystem for lockrun.
//!
//! This module owns everything that touches the lock file itself:
//! - Opening or creating the lock file (`LockFile::open`)
//! - Whole-file advisory locks in shared or exclusive mode
//! - File identity (device + inode) via path-based and handle-based stat
//! - The ownership signature written at offset 0 in create-unlink mode
//!
//! # Lock Semantics
//!
//! Locks are `flock(2)` locks taken through `fs2`. They belong to the open
//! file description, so two `LockFile` values for the same path contend with
//! each other even inside one process. The descriptor is close-on-exec, so
//! the guarded command never inherits it.
//!
//! # Signature
//!
//! A lock file is either empty, or holds exactly [`SIGNATURE`]. Any other
//! content means the file belongs to somebody else and must not be used.

mod handle;
mod signature;


pub use handle::{FileIdentity, LockFile, LockMode, TryLock};
pub use signature::{
    SIGNATURE, SignatureState, check_signature, may_hold_signature, write_signature,
};
