//! Resampling filters that change image dimensions.
//!
//! Each filter picks its output size from the source size, then fills the
//! destination column by column, reporting progress per destination
//! column.

use tracing::{debug, warn};

use crate::filter::Filter;
use crate::progress::{Phase, ProgressReporter};
use crate::types::{Dimensions, EngineError, Pixel, PixelBuffer, clamp_channel, clamp_coord};

/// `floor(len * scale)`, never below 1. `None` past `u32::MAX`.
fn scaled_len(len: u32, scale: f64) -> Option<u32> {
    let scaled = (f64::from(len) * scale).floor();
    if scaled > f64::from(u32::MAX) {
        return None;
    }
    #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
    let scaled = scaled as u32;
    Some(scaled.max(1))
}

fn scaled_dimensions(source: Dimensions, scale: f64) -> Option<Dimensions> {
    Some(Dimensions {
        width: scaled_len(source.width, scale)?,
        height: scaled_len(source.height, scale)?,
    })
}

fn check_scale(scale: f64) -> Result<(), EngineError> {
    if scale.is_finite() && scale > 0.0 {
        Ok(())
    } else {
        Err(EngineError::InvalidConfig(format!(
            "scale must be finite and positive, got {scale}"
        )))
    }
}

/// Allocate `target` and fill it with `sample(x, y)`.
///
/// A `target` of `None` (unrepresentable size) yields no result.
fn resample(
    source: &PixelBuffer,
    target: Option<Dimensions>,
    progress: &mut dyn ProgressReporter,
    mut sample: impl FnMut(u32, u32) -> Pixel,
) -> Option<PixelBuffer> {
    let Some(target) = target else {
        warn!(source = %source.dimensions(), "resampled size does not fit in u32");
        return None;
    };
    let mut result = match PixelBuffer::new(target.width, target.height, Pixel::BLACK) {
        Ok(buffer) => buffer,
        Err(err) => {
            warn!(%err, source = %source.dimensions(), "cannot allocate resampled image");
            return None;
        }
    };
    for x in 0..target.width {
        progress.report(Phase::FULL.percent(x, target.width));
        if progress.is_cancelled() {
            debug!(column = x, "resample cancelled");
            return None;
        }
        for y in 0..target.height {
            result.set(x, y, sample(x, y));
        }
    }
    Some(result)
}

/// Replicates each source pixel into a `factor × factor` block.
#[derive(Debug, Clone, Copy)]
pub struct IntegerScale {
    factor: u32,
}

impl IntegerScale {
    /// Default enlargement factor.
    pub const DEFAULT_FACTOR: u32 = 2;

    /// Create an integer scaling filter.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::InvalidConfig`] if `factor` is zero.
    pub fn new(factor: u32) -> Result<Self, EngineError> {
        if factor == 0 {
            return Err(EngineError::InvalidConfig(
                "scale factor must be a positive integer".to_string(),
            ));
        }
        Ok(Self { factor })
    }

    /// The enlargement factor.
    #[must_use]
    pub const fn factor(&self) -> u32 {
        self.factor
    }
}

impl Filter for IntegerScale {
    fn name(&self) -> &'static str {
        "integer-scale"
    }

    fn output_dimensions(&self, source: Dimensions) -> Option<Dimensions> {
        Some(Dimensions {
            width: source.width.checked_mul(self.factor)?,
            height: source.height.checked_mul(self.factor)?,
        })
    }

    fn run(
        &mut self,
        source: &PixelBuffer,
        progress: &mut dyn ProgressReporter,
    ) -> Option<PixelBuffer> {
        let factor = self.factor;
        resample(
            source,
            self.output_dimensions(source.dimensions()),
            progress,
            |x, y| source.get_clamped(i64::from(x / factor), i64::from(y / factor)),
        )
    }
}

/// Nearest-neighbor resampling by a fractional scale.
///
/// Destination `(x, y)` reads source `(floor(x / scale), floor(y / scale))`,
/// clamped to the image.
#[derive(Debug, Clone, Copy)]
pub struct NearestNeighbor {
    scale: f64,
}

impl NearestNeighbor {
    /// Create a nearest-neighbor filter.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::InvalidConfig`] unless `scale` is finite and
    /// positive.
    pub fn new(scale: f64) -> Result<Self, EngineError> {
        check_scale(scale)?;
        Ok(Self { scale })
    }
}

impl Filter for NearestNeighbor {
    fn name(&self) -> &'static str {
        "nearest-neighbor"
    }

    fn output_dimensions(&self, source: Dimensions) -> Option<Dimensions> {
        scaled_dimensions(source, self.scale)
    }

    fn run(
        &mut self,
        source: &PixelBuffer,
        progress: &mut dyn ProgressReporter,
    ) -> Option<PixelBuffer> {
        let scale = self.scale;
        #[allow(clippy::cast_possible_truncation)]
        let nearest = |d: u32| (f64::from(d) / scale).floor() as i64;
        resample(
            source,
            self.output_dimensions(source.dimensions()),
            progress,
            |x, y| source.get_clamped(nearest(x), nearest(y)),
        )
    }
}

/// Bilinear resampling by a fractional scale.
///
/// Interpolates along x first, then y. Every intermediate channel value is
/// truncated toward zero and clamped.
#[derive(Debug, Clone, Copy)]
pub struct Bilinear {
    scale: f64,
}

impl Bilinear {
    /// Create a bilinear filter.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::InvalidConfig`] unless `scale` is finite and
    /// positive.
    pub fn new(scale: f64) -> Result<Self, EngineError> {
        check_scale(scale)?;
        Ok(Self { scale })
    }

    fn lerp(a: Pixel, b: Pixel, t: f64) -> Pixel {
        let mix = |a: u8, b: u8| {
            let (a, b) = (f64::from(a), f64::from(b));
            clamp_channel(t.mul_add(b - a, a))
        };
        Pixel::new(mix(a.r, b.r), mix(a.g, b.g), mix(a.b, b.b))
    }

    /// Sample `source` at fractional coordinate `(sx, sy)`.
    #[must_use]
    pub fn sample(source: &PixelBuffer, sx: f64, sy: f64) -> Pixel {
        #[allow(clippy::cast_possible_truncation)]
        let (fx, fy) = (sx.floor() as i64, sy.floor() as i64);
        let x1 = clamp_coord(fx, source.width());
        let y1 = clamp_coord(fy, source.height());
        let x2 = clamp_coord(i64::from(x1) + 1, source.width());
        let y2 = clamp_coord(i64::from(y1) + 1, source.height());
        let dx = sx - f64::from(x1);
        let dy = sy - f64::from(y1);

        let at = |x: u32, y: u32| source.get_clamped(i64::from(x), i64::from(y));
        let top = Self::lerp(at(x1, y1), at(x2, y1), dx);
        let bottom = Self::lerp(at(x1, y2), at(x2, y2), dx);
        Self::lerp(top, bottom, dy)
    }
}

impl Filter for Bilinear {
    fn name(&self) -> &'static str {
        "bilinear"
    }

    fn output_dimensions(&self, source: Dimensions) -> Option<Dimensions> {
        scaled_dimensions(source, self.scale)
    }

    fn run(
        &mut self,
        source: &PixelBuffer,
        progress: &mut dyn ProgressReporter,
    ) -> Option<PixelBuffer> {
        let scale = self.scale;
        resample(
            source,
            self.output_dimensions(source.dimensions()),
            progress,
            |x, y| Self::sample(source, f64::from(x) / scale, f64::from(y) / scale),
        )
    }
}
