//! lockrun: run a command while holding an advisory lock on a lock file.
//!
//! This is the main entry point for the `lockrun` CLI. It parses arguments,
//! sets up logging, runs the guarded command under the lock, and maps the
//! outcome to a process exit code.

mod cli;
pub mod config;
pub mod engine;
pub mod error;
pub mod exit_codes;
pub mod feedback;
pub mod lockfile;
pub mod run;
pub mod runner;

use cli::Cli;
use config::RunConfig;
use feedback::Reporter;
use std::process::ExitCode;
use tracing::Level;
use tracing_subscriber::EnvFilter;

fn main() -> ExitCode {
    let cli = Cli::parse_args();
    init_tracing(i16::from(cli.verbose) - i16::from(cli.quiet));

    let label = runner::program_name(&cli.command);
    let config = match RunConfig::from_cli(cli) {
        Ok(config) => config,
        Err(err) => {
            eprintln!("lockrun: error: {}", err);
            return exit_code(err.exit_code());
        }
    };

    let mut reporter = match Reporter::open(&config.diagnostics, &label) {
        Ok(reporter) => reporter,
        Err(err) => {
            eprintln!("lockrun: error: {}", err);
            return exit_code(err.exit_code());
        }
    };

    match run::run(&config, &mut reporter) {
        Ok(code) => exit_code(code),
        Err(err) => {
            tracing::debug!(contention = err.is_contention(), "lock run failed");
            reporter.error(&err);
            exit_code(err.exit_code())
        }
    }
}

/// Logging goes to stderr; `RUST_LOG` overrides the default level, which is
/// `warn`, or `debug` from `-vv` on.
fn init_tracing(verbosity: i16) {
    let default_level = if verbosity >= 2 {
        Level::DEBUG
    } else {
        Level::WARN
    };

    let filter = EnvFilter::builder()
        .with_default_directive(default_level.into())
        .from_env_lossy();

    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .try_init();
}

fn exit_code(code: i32) -> ExitCode {
    ExitCode::from(u8::try_from(code).unwrap_or(exit_codes::LOCK_FAILURE as u8))
}
