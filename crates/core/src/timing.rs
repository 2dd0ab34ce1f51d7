//! Elapsed-time formatting used by every instrumented component.
//!
//! All readings come from [`Instant`], which is monotonic, so durations never
//! go negative or jump when the wall clock is adjusted.

use std::time::{Duration, Instant};

/// Format a duration as milliseconds with exactly three decimals.
///
/// ```
/// use std::time::Duration;
/// use toolz_core::timing::format_millis;
///
/// assert_eq!(format_millis(Duration::from_micros(12_340)), "12.340");
/// assert_eq!(format_millis(Duration::ZERO), "0.000");
/// ```
pub fn format_millis(elapsed: Duration) -> String {
    format!("{:.3}", elapsed.as_secs_f64() * 1000.0)
}

/// Milliseconds elapsed since `started`, formatted to three decimals.
pub fn duration_since(started: Instant) -> String {
    format_millis(started.elapsed())
}

/// A started monotonic timer.
#[derive(Debug, Clone, Copy)]
pub struct Stopwatch {
    started: Instant,
}

impl Stopwatch {
    pub fn start() -> Self {
        Self {
            started: Instant::now(),
        }
    }

    pub fn elapsed(&self) -> Duration {
        self.started.elapsed()
    }

    /// Elapsed time as a `"123.456"` millisecond string.
    pub fn elapsed_ms(&self) -> String {
        duration_since(self.started)
    }
}
