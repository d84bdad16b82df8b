//! Caller-side editing state: the current image, one previous image, and
//! the last filter applied.
//!
//! A completed run moves the current image into the previous slot and
//! adopts the result. A cancelled run changes nothing. Undo restores the
//! previous slot into current and keeps the slot, so undoing twice is the
//! same as undoing once.

use std::sync::Arc;

use tracing::debug;

use crate::config::FilterConfig;
use crate::diagnostics::{RunDiagnostics, SystemClock, run_with_diagnostics};
use crate::histogram::Histogram;
use crate::progress::ProgressReporter;
use crate::types::{EngineError, PixelBuffer};

/// How a session run ended.
#[derive(Debug, Clone, PartialEq)]
pub enum Outcome {
    /// The result replaced the current image.
    Applied(RunDiagnostics),
    /// The run was cancelled; the session is unchanged.
    Cancelled(RunDiagnostics),
}

impl Outcome {
    /// Whether the result was adopted.
    #[must_use]
    pub const fn is_applied(&self) -> bool {
        matches!(self, Self::Applied(_))
    }

    /// Diagnostics of the run either way.
    #[must_use]
    pub const fn diagnostics(&self) -> &RunDiagnostics {
        match self {
            Self::Applied(d) | Self::Cancelled(d) => d,
        }
    }
}

/// Image editing session.
#[derive(Debug, Clone, Default)]
pub struct Session {
    current: Option<Arc<PixelBuffer>>,
    previous: Option<Arc<PixelBuffer>>,
    last_filter: Option<FilterConfig>,
}

impl Session {
    /// An empty session.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace the current image. The image it replaces, if any, becomes
    /// the previous image.
    pub fn load(&mut self, image: PixelBuffer) {
        debug!(dimensions = %image.dimensions(), "image loaded");
        if let Some(current) = self.current.take() {
            self.previous = Some(current);
        }
        self.current = Some(Arc::new(image));
    }

    /// The current image.
    #[must_use]
    pub fn current(&self) -> Option<&PixelBuffer> {
        self.current.as_deref()
    }

    /// The previous image.
    #[must_use]
    pub fn previous(&self) -> Option<&PixelBuffer> {
        self.previous.as_deref()
    }

    /// The last filter whose result was adopted.
    #[must_use]
    pub const fn last_filter(&self) -> Option<&FilterConfig> {
        self.last_filter.as_ref()
    }

    /// A shared handle to the current image, for handing to a
    /// [`FilterWorker`](crate::FilterWorker).
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::NoImage`] if nothing is loaded.
    pub fn snapshot(&self) -> Result<Arc<PixelBuffer>, EngineError> {
        self.current.clone().ok_or(EngineError::NoImage)
    }

    /// Adopt `result` as produced by `config`, shifting the current image
    /// into the previous slot.
    pub fn commit(&mut self, config: FilterConfig, result: PixelBuffer) {
        debug!(filter = config.name(), dimensions = %result.dimensions(), "result adopted");
        self.previous = self.current.take();
        self.current = Some(Arc::new(result));
        self.last_filter = Some(config);
    }

    /// Build and run `config` on the current image synchronously.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::NoImage`] if nothing is loaded, or
    /// [`EngineError::InvalidConfig`] if the config does not validate.
    pub fn apply(
        &mut self,
        config: &FilterConfig,
        progress: &mut dyn ProgressReporter,
    ) -> Result<Outcome, EngineError> {
        let source = self.snapshot()?;
        let mut filter = config.build()?;
        let (result, diagnostics) =
            run_with_diagnostics(filter.as_mut(), &source, progress, &SystemClock);
        Ok(match result {
            Some(image) => {
                self.commit(config.clone(), image);
                Outcome::Applied(diagnostics)
            }
            None => Outcome::Cancelled(diagnostics),
        })
    }

    /// Run the last adopted filter again on the current image.
    ///
    /// Stochastic filters with a fixed seed repeat the same pattern.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::NoImage`] if nothing is loaded, or
    /// [`EngineError::NoPreviousFilter`] if no run has been adopted yet.
    pub fn repeat(&mut self, progress: &mut dyn ProgressReporter) -> Result<Outcome, EngineError> {
        if self.current.is_none() {
            return Err(EngineError::NoImage);
        }
        let config = self
            .last_filter
            .clone()
            .ok_or(EngineError::NoPreviousFilter)?;
        self.apply(&config, progress)
    }

    /// Restore the previous image.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::NothingToUndo`] if the previous slot is empty.
    pub fn undo(&mut self) -> Result<(), EngineError> {
        let previous = self.previous.clone().ok_or(EngineError::NothingToUndo)?;
        debug!("undo");
        self.current = Some(previous);
        Ok(())
    }

    /// Luma histogram of the current image.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::NoImage`] if nothing is loaded.
    pub fn histogram(&self) -> Result<Histogram, EngineError> {
        self.current
            .as_deref()
            .map(Histogram::compute)
            .ok_or(EngineError::NoImage)
    }
}
