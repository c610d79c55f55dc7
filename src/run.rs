//! Top-level flow of one invocation: acquire, run the guarded command,
//! release.

use crate::config::RunConfig;
use crate::engine;
use crate::error::Result;
use crate::feedback::Reporter;
use crate::runner::{self, ChildOutcome};
use tracing::{debug, warn};

/// Run the guarded command under the configured lock.
///
/// # Returns
///
/// * `Ok(code)` - The exit code to terminate with (the command's own)
/// * `Err(..)` - The lock was not acquired, or the command could not be run
pub fn run(config: &RunConfig, reporter: &mut Reporter) -> Result<i32> {
    let held = engine::acquire(&config.lock_path, &config.request, reporter)?;
    debug!(
        path = %held.path().display(),
        mode = held.mode().as_str(),
        identity = %held.identity(),
        signature = ?held.signature(),
        "running guarded command"
    );

    let program = runner::program_name(&config.command);
    let outcome = run_guarded(config, &program, reporter);

    // The command has finished (or never started); the lock goes now.
    match engine::release(held, &config.request) {
        Ok(cleanup) => debug!(?cleanup, "lock file cleanup finished"),
        Err(err) => warn!(error = %err, "lock file cleanup failed"),
    }

    let outcome = outcome?;
    if !outcome.is_success()
        && let Some(cause) = &outcome.cause
    {
        reporter.child_status(cause);
    }
    Ok(outcome.exit_code)
}

fn run_guarded(config: &RunConfig, program: &str, reporter: &mut Reporter) -> Result<ChildOutcome> {
    let mut child = runner::spawn(&config.command, config.env_marker.as_ref())?;
    reporter.running(&config.command, child.id());
    runner::wait_exact(&mut child, program)
}
