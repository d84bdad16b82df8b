//! The filter contract and the shared per-pixel driver.
//!
//! # Strategy pattern
//!
//! Every filter kind implements [`Filter`]. Filters whose output pixel
//! depends only on the source around the same coordinate additionally
//! implement [`PixelMap`] and delegate their [`Filter::run`] to
//! [`map_pixels`], which owns iteration order, progress reporting, and
//! cancellation polling for all of them.

use tracing::debug;

use crate::progress::{Phase, ProgressReporter};
use crate::types::{Dimensions, Pixel, PixelBuffer};

/// A boxed filter that can be moved onto a worker thread.
pub type BoxedFilter = Box<dyn Filter>;

/// A pixel-buffer transformation with progress and cooperative
/// cancellation.
///
/// `run` takes `&mut self` because stochastic filters own their random
/// source and advance it on every run.
pub trait Filter: Send {
    /// Short human-readable name, used in logs and diagnostics.
    fn name(&self) -> &'static str;

    /// Dimensions of the buffer `run` would produce for a source of
    /// `source` dimensions, or `None` if they do not fit in a `u32`.
    fn output_dimensions(&self, source: Dimensions) -> Option<Dimensions> {
        Some(source)
    }

    /// Produce a new buffer from `source`.
    ///
    /// Returns `None` if `progress` reports cancellation at any check
    /// point. The source is never modified and no partial result escapes.
    fn run(
        &mut self,
        source: &PixelBuffer,
        progress: &mut dyn ProgressReporter,
    ) -> Option<PixelBuffer>;
}

/// A filter defined by a single-pixel function.
pub trait PixelMap {
    /// Compute the destination pixel at `(x, y)` from `source`.
    ///
    /// Implementations must not depend on the order in which coordinates
    /// are visited.
    fn color_at(&mut self, source: &PixelBuffer, x: u32, y: u32) -> Pixel;
}

/// Run `map` over every coordinate of `source`.
///
/// Iterates column by column (outer loop over `x`) so progress is
/// reported once per column as `phase.percent(x, width)`. The
/// cancellation flag is polled right after each report.
pub fn map_pixels<M: PixelMap + ?Sized>(
    map: &mut M,
    source: &PixelBuffer,
    progress: &mut dyn ProgressReporter,
    phase: Phase,
) -> Option<PixelBuffer> {
    let Dimensions { width, height } = source.dimensions();
    let mut result = PixelBuffer::new(width, height, Pixel::BLACK).ok()?;
    for x in 0..width {
        progress.report(phase.percent(x, width));
        if progress.is_cancelled() {
            debug!(column = x, "per-pixel run cancelled");
            return None;
        }
        for y in 0..height {
            result.set(x, y, map.color_at(source, x, y));
        }
    }
    Some(result)
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::progress::testing::Recorder;

    /// Copies the source and counts calls.
    struct Identity {
        calls: usize,
    }

    impl PixelMap for Identity {
        fn color_at(&mut self, source: &PixelBuffer, x: u32, y: u32) -> Pixel {
            self.calls += 1;
            source.get_clamped(i64::from(x), i64::from(y))
        }
    }

    fn gradient(width: u32, height: u32) -> PixelBuffer {
        #[allow(clippy::cast_possible_truncation)]
        PixelBuffer::from_fn(width, height, |x, y| Pixel::new(x as u8, y as u8, 9)).unwrap()
    }

    #[test]
    fn visits_every_pixel_once() {
        let src = gradient(7, 5);
        let mut map = Identity { calls: 0 };
        let out = map_pixels(&mut map, &src, &mut Recorder::new(), Phase::FULL);
        assert_eq!(out.as_ref(), Some(&src));
        assert_eq!(map.calls, 35);
    }

    #[test]
    fn reports_once_per_column() {
        let src = gradient(4, 3);
        let mut recorder = Recorder::new();
        let _ = map_pixels(&mut Identity { calls: 0 }, &src, &mut recorder, Phase::FULL);
        assert_eq!(recorder.updates, vec![0, 25, 50, 75]);
    }

    #[test]
    fn phase_offsets_progress() {
        let src = gradient(2, 2);
        let mut recorder = Recorder::new();
        let _ = map_pixels(
            &mut Identity { calls: 0 },
            &src,
            &mut recorder,
            Phase::SECOND_HALF,
        );
        assert_eq!(recorder.updates, vec![50, 75]);
    }

    #[test]
    fn cancelled_before_start_yields_none_without_work() {
        let src = gradient(4, 4);
        let mut map = Identity { calls: 0 };
        let out = map_pixels(&mut map, &src, &mut Recorder::cancelled(), Phase::FULL);
        assert!(out.is_none());
        assert_eq!(map.calls, 0);
    }

    #[test]
    fn cancelled_mid_run_yields_none() {
        let src = gradient(10, 2);
        let mut recorder = Recorder::cancel_at(50);
        let out = map_pixels(&mut Identity { calls: 0 }, &src, &mut recorder, Phase::FULL);
        assert!(out.is_none());
        assert_eq!(recorder.updates.last(), Some(&50));
    }
}
