//! Geometric distortion by per-pixel coordinate remapping.

use std::f64::consts::PI;

use crate::filter::{Filter, PixelMap, map_pixels};
use crate::progress::{Phase, ProgressReporter};
use crate::types::{Pixel, PixelBuffer};

/// Horizontal sinusoidal warp.
///
/// Destination `(x, y)` samples the source at
/// `(x + round(AMPLITUDE * sin(2π·y / PERIOD)), y)`, clamped to the image.
#[derive(Debug, Clone, Copy, Default)]
pub struct Wave;

impl Wave {
    /// Peak horizontal displacement in pixels.
    pub const AMPLITUDE: f64 = 20.0;
    /// Rows per full sine cycle.
    pub const PERIOD: f64 = 30.0;

    /// Horizontal displacement applied to row `y`.
    #[must_use]
    pub fn offset(y: u32) -> i64 {
        let shift = Self::AMPLITUDE * (2.0 * PI * f64::from(y) / Self::PERIOD).sin();
        #[allow(clippy::cast_possible_truncation)]
        let shift = shift.round() as i64;
        shift
    }
}

impl PixelMap for Wave {
    fn color_at(&mut self, source: &PixelBuffer, x: u32, y: u32) -> Pixel {
        source.get_clamped(i64::from(x) + Self::offset(y), i64::from(y))
    }
}

impl Filter for Wave {
    fn name(&self) -> &'static str {
        "wave"
    }

    fn run(
        &mut self,
        source: &PixelBuffer,
        progress: &mut dyn ProgressReporter,
    ) -> Option<PixelBuffer> {
        map_pixels(self, source, progress, Phase::FULL)
    }
}
