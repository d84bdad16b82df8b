//! Progress reporting and cooperative cancellation.
//!
//! A filter run talks to its caller through a [`ProgressReporter`]: it
//! pushes whole-percent updates in `[0, 100]` and polls a cancellation
//! flag at the same granularity. Cancellation is never preemptive; a
//! filter notices it at its next check point and returns `None`.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

/// Sink for progress updates plus a view of the cancellation flag.
///
/// Owned by the caller and borrowed by a filter for the duration of one
/// run.
pub trait ProgressReporter {
    /// Record that the run has reached `percent` (0–100).
    fn report(&mut self, percent: u8);

    /// Whether the caller has asked the run to stop.
    fn is_cancelled(&self) -> bool;
}

impl<R: ProgressReporter + ?Sized> ProgressReporter for &mut R {
    fn report(&mut self, percent: u8) {
        (**self).report(percent);
    }

    fn is_cancelled(&self) -> bool {
        (**self).is_cancelled()
    }
}

/// Reporter that discards updates and is never cancelled.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoProgress;

impl ProgressReporter for NoProgress {
    fn report(&mut self, _percent: u8) {}

    fn is_cancelled(&self) -> bool {
        false
    }
}

/// Token for cooperative cancellation of a filter run.
///
/// Clone this token to share it between threads. Call `cancel()` from one
/// thread, and check `is_cancelled()` from the worker thread.
#[derive(Debug, Clone, Default)]
pub struct CancellationToken {
    cancelled: Arc<AtomicBool>,
}

impl CancellationToken {
    /// Create a new, un-cancelled token.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Signal cancellation.
    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::SeqCst);
    }

    /// Check if cancellation has been signaled.
    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::SeqCst)
    }

    /// Reset the cancellation state (for reuse).
    pub fn reset(&self) {
        self.cancelled.store(false, Ordering::SeqCst);
    }
}

/// General-purpose reporter built from an optional cancellation token and
/// an optional callback.
///
/// Updates are forwarded only when they do not move backwards, so the
/// callback always observes a non-decreasing sequence clamped to 100.
pub struct Reporter<F = fn(u8)> {
    cancel: Option<CancellationToken>,
    callback: Option<F>,
    last: Option<u8>,
}

impl Reporter {
    /// A reporter with neither a token nor a callback.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            cancel: None,
            callback: None,
            last: None,
        }
    }
}

impl Default for Reporter {
    fn default() -> Self {
        Self::new()
    }
}

impl<F: FnMut(u8)> Reporter<F> {
    /// Attach a cancellation token.
    #[must_use]
    pub fn with_cancel(mut self, token: CancellationToken) -> Self {
        self.cancel = Some(token);
        self
    }

    /// Attach a progress callback, replacing any previous one.
    #[must_use]
    pub fn with_callback<G: FnMut(u8)>(self, callback: G) -> Reporter<G> {
        Reporter {
            cancel: self.cancel,
            callback: Some(callback),
            last: self.last,
        }
    }

    /// The most recent percentage forwarded, if any.
    #[must_use]
    pub const fn last(&self) -> Option<u8> {
        self.last
    }
}

impl<F: FnMut(u8)> ProgressReporter for Reporter<F> {
    fn report(&mut self, percent: u8) {
        let percent = percent.min(100);
        if self.last.is_some_and(|last| percent < last) {
            return;
        }
        self.last = Some(percent);
        if let Some(callback) = self.callback.as_mut() {
            callback(percent);
        }
    }

    fn is_cancelled(&self) -> bool {
        self.cancel.as_ref().is_some_and(CancellationToken::is_cancelled)
    }
}

/// Maps loop position onto a slice of the 0–100 progress range.
///
/// A single-phase run uses [`Phase::FULL`]. A two-phase run spends
/// `[0, 50)` on its first pass (`max_percent = 50, add = 0`) and
/// `[50, 100)` on its second (`max_percent = 50, add = 50`).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Phase {
    /// Width of the slice in percent.
    pub max_percent: u8,
    /// Offset of the slice in percent.
    pub add: u8,
}

impl Phase {
    /// The whole range.
    pub const FULL: Self = Self::new(100, 0);
    /// First half of a two-phase run.
    pub const FIRST_HALF: Self = Self::new(50, 0);
    /// Second half of a two-phase run.
    pub const SECOND_HALF: Self = Self::new(50, 50);

    /// Create a phase covering `[add, add + max_percent)`.
    #[must_use]
    pub const fn new(max_percent: u8, add: u8) -> Self {
        Self { max_percent, add }
    }

    /// Percentage for step `i` of `total`: `floor(i / total * max_percent) + add`.
    #[must_use]
    pub fn percent(self, i: u32, total: u32) -> u8 {
        if total == 0 {
            return self.add;
        }
        let scaled = f64::from(i) / f64::from(total) * f64::from(self.max_percent);
        #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
        let step = scaled.floor().clamp(0.0, 100.0) as u8;
        step.saturating_add(self.add).min(100)
    }
}

impl Default for Phase {
    fn default() -> Self {
        Self::FULL
    }
}

/// Reporter wrapper that remembers the last percentage seen.
///
/// Used by diagnostics to record how far a run got before it finished or
/// was cancelled.
pub(crate) struct Tracking<'a, R: ProgressReporter + ?Sized> {
    inner: &'a mut R,
    pub(crate) last: Option<u8>,
}

impl<'a, R: ProgressReporter + ?Sized> Tracking<'a, R> {
    pub(crate) const fn new(inner: &'a mut R) -> Self {
        Self { inner, last: None }
    }
}

impl<R: ProgressReporter + ?Sized> ProgressReporter for Tracking<'_, R> {
    fn report(&mut self, percent: u8) {
        self.last = Some(percent);
        self.inner.report(percent);
    }

    fn is_cancelled(&self) -> bool {
        self.inner.is_cancelled()
    }
}
