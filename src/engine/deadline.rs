//! Deadline for the blocking part of lock acquisition.

use super::request::WaitPolicy;
use std::time::{Duration, Instant};

/// Largest accepted timeout: the range of a `u32` second count.
pub const MAX_TIMEOUT: Duration = Duration::from_secs(u32::MAX as u64);

/// Point in time after which waiting for the lock is abandoned.
///
/// The deadline is fixed once, before the first acquisition attempt, and
/// covers every retry after it.
#[derive(Debug, Clone, Copy)]
pub struct Deadline {
    limit: Option<Duration>,
    expires_at: Option<Instant>,
}

impl Deadline {
    /// A deadline that never expires.
    pub fn unlimited() -> Self {
        Self {
            limit: None,
            expires_at: None,
        }
    }

    /// Start the clock for `limit` from now. A zero limit means unlimited.
    pub fn after(limit: Duration) -> Self {
        if limit.is_zero() {
            return Self::unlimited();
        }
        let limit = limit.min(MAX_TIMEOUT);
        match Instant::now().checked_add(limit) {
            Some(expires_at) => Self {
                limit: Some(limit),
                expires_at: Some(expires_at),
            },
            // Unrepresentable on this clock, which is effectively forever.
            None => Self::unlimited(),
        }
    }

    /// Derive the deadline from a wait policy.
    pub fn for_policy(policy: WaitPolicy) -> Self {
        match policy {
            WaitPolicy::BlockWithDeadline(limit) => Self::after(limit),
            WaitPolicy::NonBlocking | WaitPolicy::BlockIndefinitely => Self::unlimited(),
        }
    }

    /// The configured limit, if any.
    pub fn limit(&self) -> Option<Duration> {
        self.limit
    }

    /// Time left, or `None` when unlimited.
    pub fn remaining(&self) -> Option<Duration> {
        self.expires_at
            .map(|at| at.saturating_duration_since(Instant::now()))
    }

    pub fn is_expired(&self) -> bool {
        self.remaining().is_some_and(|left| left.is_zero())
    }
}
