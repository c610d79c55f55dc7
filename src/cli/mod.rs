//! CLI argument parsing for lockrun.
//!
//! Uses clap derive macros for declarative argument definitions.
//! Values are resolved into a `RunConfig` by the `config` module.

use clap::{ArgAction, Parser};
use std::ffi::OsString;
use std::path::PathBuf;

/// Run a command while holding an advisory lock on LOCKFILE.
///
/// Invocations sharing a lock file never run concurrently in exclusive mode;
/// in shared mode they run together but exclude exclusive holders.
#[derive(Parser, Debug)]
#[command(name = "lockrun")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Terminate immediately if the lock cannot be acquired.
    #[arg(short = 'n', long = "no-wait", overrides_with = "wait")]
    pub no_wait: bool,

    /// Wait for the lock (default).
    #[arg(short = 'w', long = "wait", overrides_with = "no_wait")]
    pub wait: bool,

    /// Take a shared (read) lock.
    #[arg(short = 's', long, overrides_with = "exclusive")]
    pub shared: bool,

    /// Take an exclusive (write) lock (default).
    #[arg(short = 'x', long, overrides_with = "shared")]
    pub exclusive: bool,

    /// Create the lock file with a signature and remove it when no longer used.
    ///
    /// In every mode the lock file must be empty or carry the lockrun
    /// signature; a file with other content (such as a script locking
    /// itself) is refused.
    #[arg(short = 'u', long = "unlink")]
    pub create_unlink: bool,

    /// Fail if the lock file does not already exist.
    #[arg(short = 'e', long = "existing")]
    pub fail_if_missing: bool,

    /// Give up waiting after this long (e.g. 30, 1.5, 500ms, 5m, 1h30m; 0 = forever).
    #[arg(short = 't', long, value_name = "SPEC")]
    pub timeout: Option<String>,

    /// More diagnostics (repeatable).
    #[arg(short = 'v', long, action = ArgAction::Count)]
    pub verbose: u8,

    /// Fewer diagnostics (repeatable).
    #[arg(short = 'q', long, action = ArgAction::Count)]
    pub quiet: u8,

    /// Text written once when starting to wait for the lock.
    #[arg(long, value_name = "TEXT")]
    pub wait_text: Option<String>,

    /// Text written after the lock was obtained, if the wait text was shown.
    #[arg(long, value_name = "TEXT")]
    pub clear_text: Option<String>,

    /// Write diagnostics to this open file descriptor instead of stderr.
    #[arg(short = 'l', long, value_name = "FD")]
    pub log_fd: Option<i32>,

    /// Export NAME=<lockrun pid><suffix> to the command.
    #[arg(long = "env", value_name = "NAME")]
    pub env_name: Option<String>,

    /// Suffix appended to the pid in the exported variable.
    #[arg(long, value_name = "TAG", requires = "env_name")]
    pub env_suffix: Option<String>,

    /// Lock file path. Must be empty, missing, or created by lockrun.
    #[arg(value_name = "LOCKFILE")]
    pub lock_file: PathBuf,

    /// Command to run while the lock is held, with its arguments.
    #[arg(
        value_name = "COMMAND",
        required = true,
        num_args = 1..,
        trailing_var_arg = true,
        allow_hyphen_values = true
    )]
    pub command: Vec<OsString>,
}

impl Cli {
    /// Parse command-line arguments.
    pub fn parse_args() -> Self {
        Self::parse()
    }
}
