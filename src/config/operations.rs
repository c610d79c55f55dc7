//! Resolution and validation of command-line values.

use super::model::{DiagnosticsConfig, RunConfig};
use super::timeout::parse_timeout;
use crate::cli::Cli;
use crate::engine::{LockRequest, WaitPolicy};
use crate::error::{LockrunError, Result};
use crate::lockfile::LockMode;
use crate::runner::EnvMarker;
use std::time::Duration;
use tracing::debug;

impl RunConfig {
    /// Resolve parsed arguments into a validated configuration.
    ///
    /// Validation rules:
    /// - the lock file path must be non-empty
    /// - `--timeout` must be a valid time spec
    /// - `--log-fd` must not be negative
    /// - `--env` must name a valid variable; the suffix must not contain NUL
    pub fn from_cli(cli: Cli) -> Result<Self> {
        if cli.lock_file.as_os_str().is_empty() {
            return Err(LockrunError::UsageError(
                "lock file path must not be empty".to_string(),
            ));
        }

        let timeout = cli.timeout.as_deref().map(parse_timeout).transpose()?;
        let wait = resolve_wait_policy(cli.no_wait, timeout);

        let mode = if cli.shared {
            LockMode::Shared
        } else {
            LockMode::Exclusive
        };

        if let Some(fd) = cli.log_fd
            && fd < 0
        {
            return Err(LockrunError::UsageError(format!(
                "log descriptor must not be negative: {}",
                fd
            )));
        }

        let env_marker = match cli.env_name {
            Some(name) => Some(env_marker(name, cli.env_suffix.unwrap_or_default())?),
            None => None,
        };

        let verbosity = (i16::from(cli.verbose) - i16::from(cli.quiet))
            .clamp(i16::from(i8::MIN), i16::from(i8::MAX)) as i8;

        Ok(Self {
            lock_path: cli.lock_file,
            request: LockRequest {
                mode,
                wait,
                create_unlink: cli.create_unlink,
                fail_if_missing: cli.fail_if_missing,
            },
            command: cli.command,
            diagnostics: DiagnosticsConfig {
                verbosity,
                wait_text: cli.wait_text,
                clear_text: cli.clear_text,
                log_fd: cli.log_fd,
            },
            env_marker,
        })
    }
}

/// No-wait wins over a timeout; a zero timeout means wait forever.
fn resolve_wait_policy(no_wait: bool, timeout: Option<Duration>) -> WaitPolicy {
    let timeout = timeout.filter(|t| !t.is_zero());
    if no_wait {
        if timeout.is_some() {
            debug!("--timeout has no effect together with --no-wait");
        }
        return WaitPolicy::NonBlocking;
    }
    match timeout {
        Some(limit) => WaitPolicy::BlockWithDeadline(limit),
        None => WaitPolicy::BlockIndefinitely,
    }
}

fn env_marker(name: String, suffix: String) -> Result<EnvMarker> {
    if name.is_empty() || name.contains('=') || name.contains('\0') {
        return Err(LockrunError::UsageError(format!(
            "invalid environment variable name '{}'",
            name.escape_default()
        )));
    }
    if suffix.contains('\0') {
        return Err(LockrunError::UsageError(
            "environment suffix must not contain NUL".to_string(),
        ));
    }
    Ok(EnvMarker { name, suffix })
}
