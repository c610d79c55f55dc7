//! Configuration model for one lockrun invocation.

use crate::engine::LockRequest;
use crate::runner::EnvMarker;
use std::ffi::OsString;
use std::os::fd::RawFd;
use std::path::PathBuf;

/// Diagnostics settings.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DiagnosticsConfig {
    /// `--verbose` count minus `--quiet` count.
    pub verbosity: i8,

    /// Written verbatim once the process starts blocking.
    pub wait_text: Option<String>,

    /// Written verbatim after the lock is obtained, if `wait_text` was shown.
    pub clear_text: Option<String>,

    /// Descriptor to write diagnostics to instead of stderr.
    pub log_fd: Option<RawFd>,
}

/// Fully resolved settings for one invocation.
#[derive(Debug, Clone)]
pub struct RunConfig {
    /// Path of the lock file.
    pub lock_path: PathBuf,

    /// Lock mode, wait policy and file lifecycle flags.
    pub request: LockRequest,

    /// The guarded command and its arguments.
    pub command: Vec<OsString>,

    pub diagnostics: DiagnosticsConfig,

    /// Variable exported to the child, if requested.
    pub env_marker: Option<EnvMarker>,
}
