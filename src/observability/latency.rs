//! Request latency measurement.
//!
//! Latency is reported in two forms: a `{ seconds, nanos }` pair (the shape
//! managed log backends expect for `httpRequest.latency`) and a short human
//! string used inside log messages.

use std::fmt;
use std::time::{Duration, Instant};

use serde::{Deserialize, Serialize};

/// Elapsed time split into whole seconds and the remaining nanoseconds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Latency {
    pub seconds: u64,
    pub nanos: u32,
}

impl Latency {
    /// Millisecond resolution: `nanos` is always a whole number of milliseconds.
    pub fn from_millis(ms: u64) -> Self {
        Self {
            seconds: ms / 1000,
            nanos: ((ms % 1000) * 1_000_000) as u32,
        }
    }

    pub fn from_duration(duration: Duration) -> Self {
        Self::from_millis(duration.as_millis().min(u64::MAX as u128) as u64)
    }

    /// Latency between two instants; zero if `end` precedes `start`.
    pub fn between(start: Instant, end: Instant) -> Self {
        Self::from_duration(end.saturating_duration_since(start))
    }

    pub fn as_millis(&self) -> u64 {
        self.seconds * 1000 + u64::from(self.nanos) / 1_000_000
    }
}

impl fmt::Display for Latency {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&render_millis(self.as_millis()))
    }
}

/// Latency from `start` until now.
pub fn elapsed(start: Instant) -> Latency {
    Latency::between(start, Instant::now())
}

/// Human-readable latency from `start` until now.
pub fn render(start: Instant) -> String {
    elapsed(start).to_string()
}

pub fn render_duration(duration: Duration) -> String {
    Latency::from_duration(duration).to_string()
}

fn render_millis(ms: u64) -> String {
    if ms < 1000 {
        return format!("{}ms", ms);
    }
    let secs = format!("{:.2}", ms as f64 / 1000.0);
    let secs = secs.trim_end_matches('0').trim_end_matches('.');
    format!("{}s", secs)
}
