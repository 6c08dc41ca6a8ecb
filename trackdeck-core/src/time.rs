//! Time and duration conversion utilities.
//!
//! Media collaborators report positions as floating-point seconds. This module
//! turns those into [`Duration`]s and player-bar clock text without panicking
//! on the NaN or negative values a half-loaded media element can report.

use std::time::Duration;

/// Player-bar formatting for durations.
pub trait DurationExt {
    /// Format as `m:ss` clock text for the player bar.
    fn clock_text(&self) -> String;
}

impl DurationExt for Duration {
    fn clock_text(&self) -> String {
        let total = self.as_secs();
        format!("{}:{:02}", total / 60, total % 60)
    }
}

/// Convert media seconds into a [`Duration`].
///
/// Non-finite and negative inputs map to [`Duration::ZERO`]; values beyond the
/// representable range saturate at [`Duration::MAX`].
#[must_use]
pub fn secs_to_duration(seconds: f64) -> Duration {
    if !seconds.is_finite() || seconds <= 0.0 {
        return Duration::ZERO;
    }
    Duration::try_from_secs_f64(seconds).unwrap_or(Duration::MAX)
}

/// Fraction of `position` within `duration`, clamped to `[0, 1]`.
///
/// A zero duration yields `0.0` rather than dividing by zero.
#[must_use]
pub fn progress_fraction(position: Duration, duration: Duration) -> f64 {
    if duration.is_zero() {
        return 0.0;
    }
    (position.as_secs_f64() / duration.as_secs_f64()).clamp(0.0, 1.0)
}
