//! Parsing of `--timeout` time specs.
//!
//! Accepted forms: a plain number of seconds (`30`, `1.5`), or one or more
//! unit-suffixed numbers (`500ms`, `10s`, `5m`, `2h`, `1d`, `1h30m`).

use crate::engine::MAX_TIMEOUT;
use crate::error::{LockrunError, Result};
use regex::Regex;
use std::sync::LazyLock;
use std::time::Duration;
use tracing::warn;

static TIME_SPEC_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(\d+(?:\.\d*)?|\.\d+)(ms|[smhd])?").expect("Invalid time spec regex")
});

/// Parse a time spec. Values above [`MAX_TIMEOUT`] are clamped with a warning.
pub fn parse_timeout(spec: &str) -> Result<Duration> {
    let invalid = |reason: &str| {
        LockrunError::UsageError(format!("invalid timeout '{}': {}", spec, reason))
    };

    let text = spec.trim();
    if text.is_empty() {
        return Err(invalid("empty value"));
    }

    let mut seconds = 0f64;
    let mut parsed_to = 0;
    let mut terms = 0;
    let mut has_bare_number = false;

    for caps in TIME_SPEC_RE.captures_iter(text) {
        let (Some(whole), Some(number)) = (caps.get(0), caps.get(1)) else {
            continue;
        };
        if whole.start() != parsed_to {
            break;
        }
        parsed_to = whole.end();
        terms += 1;

        let value: f64 = number
            .as_str()
            .parse()
            .map_err(|_| invalid("not a number"))?;
        let unit_seconds = match caps.get(2).map(|unit| unit.as_str()) {
            None => {
                has_bare_number = true;
                1.0
            }
            Some("ms") => 0.001,
            Some("s") => 1.0,
            Some("m") => 60.0,
            Some("h") => 3600.0,
            Some(_) => 86400.0,
        };
        seconds += value * unit_seconds;
    }

    if parsed_to != text.len() {
        return Err(invalid("expected a number with optional unit ms, s, m, h or d"));
    }
    if has_bare_number && terms > 1 {
        return Err(invalid("every part of a combined value needs a unit"));
    }

    if !seconds.is_finite() || seconds > MAX_TIMEOUT.as_secs_f64() {
        warn!(
            timeout = spec,
            max_seconds = MAX_TIMEOUT.as_secs(),
            "timeout too large, clamped to maximum"
        );
        return Ok(MAX_TIMEOUT);
    }

    Duration::try_from_secs_f64(seconds).map_err(|_| invalid("out of range"))
}
