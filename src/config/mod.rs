//! Run configuration for lockrun.
//!
//! The parsed command line is resolved once into an immutable `RunConfig`:
//! the `LockRequest` the engine works from, the command vector, diagnostics
//! settings, and the optional pid marker for the child. Invalid values are
//! rejected here as usage errors, before any lock file is touched.

mod model;
mod operations;
mod timeout;


pub use model::{DiagnosticsConfig, RunConfig};
pub use timeout::parse_timeout;
