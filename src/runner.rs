//! Child process runner for the guarded command.
//!
//! Spawns the command with inherited stdio, optionally exporting the pid
//! marker variable, and waits for exactly that child.

use crate::error::{LockrunError, Result};
use crate::exit_codes;
use std::ffi::OsString;
use std::os::unix::process::ExitStatusExt;
use std::process::{Child, Command, ExitStatus};

/// Environment variable handed to the child so it can detect that it runs
/// under lockrun.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EnvMarker {
    pub name: String,
    pub suffix: String,
}

impl EnvMarker {
    /// Value exported for the current process.
    pub fn value(&self) -> String {
        format!("{}{}", std::process::id(), self.suffix)
    }
}

/// How the guarded command ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChildOutcome {
    /// Exit code lockrun should return.
    pub exit_code: i32,
    /// Human-readable reason when the command did not exit with 0.
    pub cause: Option<String>,
}

impl ChildOutcome {
    pub fn is_success(&self) -> bool {
        self.exit_code == exit_codes::SUCCESS
    }

    /// Translate a wait status.
    pub fn from_status(status: ExitStatus) -> Self {
        if let Some(code) = status.code() {
            return Self {
                exit_code: code,
                cause: (code != 0).then(|| format!("exit status {}", code)),
            };
        }

        match status.signal() {
            Some(signal) => {
                let core = if status.core_dumped() { " (core dumped)" } else { "" };
                Self {
                    exit_code: exit_codes::SIGNAL_BASE + signal,
                    cause: Some(format!("killed by signal {}{}", signal, core)),
                }
            }
            None => Self {
                exit_code: exit_codes::LOCK_FAILURE,
                cause: Some(format!("ended abnormally ({})", status)),
            },
        }
    }
}

/// Display name of the command for messages.
pub fn program_name(argv: &[OsString]) -> String {
    argv.first()
        .map(|program| program.to_string_lossy().into_owned())
        .unwrap_or_default()
}

/// Start the guarded command.
///
/// # Errors
///
/// * `LockrunError::ChildLaunchFailure` - `argv` is empty or spawning failed
pub fn spawn(argv: &[OsString], marker: Option<&EnvMarker>) -> Result<Child> {
    let Some((program, args)) = argv.split_first() else {
        return Err(LockrunError::ChildLaunchFailure {
            program: String::new(),
            source: std::io::Error::new(std::io::ErrorKind::InvalidInput, "empty command"),
        });
    };

    let mut command = Command::new(program);
    command.args(args);
    if let Some(marker) = marker {
        command.env(&marker.name, marker.value());
    }

    command
        .spawn()
        .map_err(|source| LockrunError::ChildLaunchFailure {
            program: program_name(argv),
            source,
        })
}

/// Wait for the given child and translate its status.
pub fn wait_exact(child: &mut Child, program: &str) -> Result<ChildOutcome> {
    child
        .wait()
        .map(ChildOutcome::from_status)
        .map_err(|source| LockrunError::ChildWaitFailure {
            program: program.to_string(),
            source,
        })
}
