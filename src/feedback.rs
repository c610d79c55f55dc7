//! User-visible diagnostics: the waiting indicator and verbosity-gated
//! status lines.
//!
//! Diagnostics go to stderr or to a descriptor given with `--log-fd`. Write
//! failures are ignored; a broken diagnostics stream must not change the
//! outcome of the guarded command.

use crate::config::DiagnosticsConfig;
use crate::error::{LockrunError, Result};
use std::ffi::OsString;
use std::fmt;
use std::fs::File;
use std::io::{self, Write};
use std::os::fd::{FromRawFd, RawFd};
use std::path::Path;

/// Hooks the acquisition engine calls around blocking.
pub trait WaitFeedback {
    /// The lock is contended and the engine is about to block.
    fn waiting(&mut self, path: &Path);

    /// The lock is held and verified.
    fn acquired(&mut self, path: &Path);
}

/// Diagnostics writer for one invocation.
pub struct Reporter {
    verbosity: i8,
    label: String,
    wait_text: Option<String>,
    clear_text: Option<String>,
    sink: Box<dyn Write>,
    waiting_shown: bool,
}

impl Reporter {
    /// Create a reporter writing to the configured destination.
    ///
    /// `label` prefixes every status line, normally the command name.
    pub fn open(config: &DiagnosticsConfig, label: &str) -> Result<Self> {
        let sink: Box<dyn Write> = match config.log_fd {
            Some(fd) => Box::new(open_log_fd(fd)?),
            None => Box::new(io::stderr()),
        };
        Ok(Self::with_sink(config, label, sink))
    }

    /// Create a reporter writing to an arbitrary sink.
    pub fn with_sink(config: &DiagnosticsConfig, label: &str, sink: Box<dyn Write>) -> Self {
        Self {
            verbosity: config.verbosity,
            label: label.to_string(),
            wait_text: config.wait_text.clone(),
            clear_text: config.clear_text.clone(),
            sink,
            waiting_shown: false,
        }
    }

    /// The guarded command has been started.
    pub fn running(&mut self, argv: &[OsString], pid: u32) {
        if self.verbosity > 0 {
            let words: Vec<String> = argv
                .iter()
                .map(|arg| arg.to_string_lossy().into_owned())
                .collect();
            self.line(format_args!(
                "running `{}` as PID {}",
                shell_words::join(&words),
                pid
            ));
        }
    }

    /// The guarded command ended abnormally or with a nonzero status.
    pub fn child_status(&mut self, cause: &str) {
        if self.verbosity >= 0 {
            self.line(format_args!("{}", cause));
        }
    }

    /// Report an error that ends the invocation.
    ///
    /// A no-wait refusal is expected contention and is only reported when
    /// verbose.
    pub fn error(&mut self, err: &LockrunError) {
        match err {
            LockrunError::AcquisitionRefused { path } => {
                if self.verbosity > 0 {
                    self.line(format_args!("unable to acquire lock on {}", path.display()));
                }
            }
            _ => {
                let _ = writeln!(self.sink, "lockrun: error: {}", err);
                let _ = self.sink.flush();
            }
        }
    }

    fn line(&mut self, msg: fmt::Arguments<'_>) {
        let _ = writeln!(self.sink, "{}: {}", self.label, msg);
        let _ = self.sink.flush();
    }

    fn raw(&mut self, text: &str) {
        let _ = self.sink.write_all(text.as_bytes());
        let _ = self.sink.flush();
    }
}

impl WaitFeedback for Reporter {
    fn waiting(&mut self, path: &Path) {
        if self.waiting_shown {
            return;
        }
        self.waiting_shown = true;

        if let Some(text) = self.wait_text.clone() {
            self.raw(&text);
        } else if self.verbosity > 0 {
            self.line(format_args!("waiting for lock on {}", path.display()));
        }
    }

    fn acquired(&mut self, path: &Path) {
        if self.waiting_shown
            && let Some(text) = self.clear_text.clone()
        {
            self.raw(&text);
        }
        if self.verbosity > 0 {
            self.line(format_args!("got lock on {}", path.display()));
        }
    }
}

/// Adopt an inherited descriptor as the diagnostics stream.
fn open_log_fd(fd: RawFd) -> Result<File> {
    // SAFETY: F_GETFD only reads the descriptor flags; it is valid to call on
    // any integer and fails with EBADF for descriptors that are not open.
    let flags = unsafe { libc::fcntl(fd, libc::F_GETFD) };
    if flags == -1 {
        return Err(LockrunError::UsageError(format!(
            "log descriptor {} is not usable: {}",
            fd,
            io::Error::last_os_error()
        )));
    }
    // SAFETY: the descriptor is open (checked above) and nothing else in this
    // process owns or closes it; the File takes ownership until exit.
    Ok(unsafe { File::from_raw_fd(fd) })
}
