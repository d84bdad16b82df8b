//! Run diagnostics: timing and outcome of a single filter run.
//!
//! Time is measured through the [`Clock`] trait so callers (and tests) can
//! supply their own time source. Durations are serialized as fractional
//! seconds (`f64`), since `std::time::Duration` has no serde impls of its
//! own.

use std::time::{Duration, Instant};

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::filter::Filter;
use crate::progress::{ProgressReporter, Tracking};
use crate::types::{Dimensions, PixelBuffer};

/// Serde support for `std::time::Duration` as fractional seconds.
mod duration_serde {
    use std::time::Duration;

    use serde::{Deserialize, Deserializer, Serialize, Serializer};

    pub fn serialize<S: Serializer>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
        duration.as_secs_f64().serialize(serializer)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
        let secs = f64::deserialize(deserializer)?;
        Duration::try_from_secs_f64(secs).map_err(|_| {
            serde::de::Error::custom("duration seconds must be finite and non-negative")
        })
    }
}

/// A source of monotonic time.
pub trait Clock {
    /// Opaque point in time.
    type Instant;

    /// The current instant.
    fn now(&self) -> Self::Instant;

    /// Time passed since `since`.
    fn elapsed(&self, since: &Self::Instant) -> Duration;
}

/// [`Clock`] backed by [`std::time::Instant`].
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    type Instant = Instant;

    fn now(&self) -> Instant {
        Instant::now()
    }

    fn elapsed(&self, since: &Instant) -> Duration {
        since.elapsed()
    }
}

/// What happened during one filter run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunDiagnostics {
    /// [`Filter::name`] of the filter that ran.
    pub filter: String,
    /// Source dimensions.
    pub input: Dimensions,
    /// Result dimensions, `None` if the run was cancelled.
    pub output: Option<Dimensions>,
    /// Whether the run ended without a result.
    pub cancelled: bool,
    /// Last progress percentage the filter reported.
    pub last_percent: Option<u8>,
    /// Wall-clock duration (seconds).
    #[serde(with = "duration_serde")]
    pub duration: Duration,
}

impl RunDiagnostics {
    /// Human-readable multi-line summary.
    #[must_use]
    pub fn report(&self) -> String {
        let mut lines = Vec::new();
        lines.push(format!("Run Diagnostics\n{}", "=".repeat(40)));
        lines.push(format!("Filter: {}", self.filter));
        lines.push(format!(
            "Input: {} ({} pixels)",
            self.input,
            self.input.pixel_count()
        ));
        match self.output {
            Some(output) => lines.push(format!("Output: {output}")),
            None => lines.push("Output: none".to_string()),
        }
        lines.push(format!(
            "Outcome: {}",
            if self.cancelled { "cancelled" } else { "completed" }
        ));
        if let Some(percent) = self.last_percent {
            lines.push(format!("Last progress: {percent}%"));
        }
        lines.push(format!(
            "Duration: {:.3}ms",
            self.duration.as_secs_f64() * 1000.0
        ));
        lines.join("\n")
    }
}

/// Run `filter` on `source`, timing it with `clock`.
///
/// Progress and cancellation pass through to `progress` unchanged.
pub fn run_with_diagnostics<C: Clock>(
    filter: &mut dyn Filter,
    source: &PixelBuffer,
    progress: &mut dyn ProgressReporter,
    clock: &C,
) -> (Option<PixelBuffer>, RunDiagnostics) {
    let input = source.dimensions();
    debug!(filter = filter.name(), %input, "filter run started");
    let start = clock.now();
    let mut tracking = Tracking::new(progress);
    let result = filter.run(source, &mut tracking);
    let duration = clock.elapsed(&start);
    let diagnostics = RunDiagnostics {
        filter: filter.name().to_string(),
        input,
        output: result.as_ref().map(PixelBuffer::dimensions),
        cancelled: result.is_none(),
        last_percent: tracking.last,
        duration,
    };
    debug!(
        filter = filter.name(),
        cancelled = diagnostics.cancelled,
        elapsed_ms = duration.as_secs_f64() * 1000.0,
        "filter run finished"
    );
    (result, diagnostics)
}
