//! Contrast stretch around the image's mean brightness.
//!
//! Two passes: the first computes the mean over the whole image while
//! reporting 0–50%, the second remaps every channel while reporting
//! 50–100%.

use tracing::debug;

use crate::filter::{Filter, PixelMap, map_pixels};
use crate::progress::{Phase, ProgressReporter};
use crate::types::{EngineError, Pixel, PixelBuffer, clamp_channel};

/// Mean brightness of `source`.
///
/// Each pixel contributes `(r + g + b) / 3` in integer arithmetic; the sum
/// is then divided by the pixel count, again in integer arithmetic.
/// Returns `None` if cancelled.
pub fn mean_brightness(
    source: &PixelBuffer,
    progress: &mut dyn ProgressReporter,
    phase: Phase,
) -> Option<u8> {
    let (width, height) = (source.width(), source.height());
    let mut total: u64 = 0;
    for x in 0..width {
        progress.report(phase.percent(x, width));
        if progress.is_cancelled() {
            debug!(column = x, "brightness pass cancelled");
            return None;
        }
        for y in 0..height {
            let p = source.get_clamped(i64::from(x), i64::from(y));
            total += (u64::from(p.r) + u64::from(p.g) + u64::from(p.b)) / 3;
        }
    }
    let mean = total / source.dimensions().pixel_count();
    // Each term is at most 255, so the mean is too.
    u8::try_from(mean).ok()
}

/// `channel' = brightness + (channel - brightness) * amount`.
///
/// `amount > 1` raises contrast, `0 < amount < 1` lowers it. Zero and
/// negative amounts are accepted and flatten or invert around the mean.
#[derive(Debug, Clone, Copy)]
pub struct Contrast {
    amount: f64,
    brightness: u8,
}

impl Contrast {
    /// Default contrast factor.
    pub const DEFAULT_AMOUNT: f64 = 1.5;

    /// Create a contrast filter.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::InvalidConfig`] if `amount` is not finite.
    pub fn new(amount: f64) -> Result<Self, EngineError> {
        if !amount.is_finite() {
            return Err(EngineError::InvalidConfig(format!(
                "contrast amount must be finite, got {amount}"
            )));
        }
        Ok(Self {
            amount,
            brightness: 0,
        })
    }

    /// Lower contrast by `amount`: the same filter with factor
    /// `1 / amount`.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::InvalidConfig`] if `amount` is zero or not
    /// finite.
    pub fn decrease(amount: f64) -> Result<Self, EngineError> {
        if amount == 0.0 {
            return Err(EngineError::InvalidConfig(
                "contrast decrease amount must be non-zero".to_string(),
            ));
        }
        Self::new(amount.recip())
    }

    /// The multiplication factor.
    #[must_use]
    pub const fn amount(&self) -> f64 {
        self.amount
    }
}

impl PixelMap for Contrast {
    fn color_at(&mut self, source: &PixelBuffer, x: u32, y: u32) -> Pixel {
        let mean = f64::from(self.brightness);
        let amount = self.amount;
        source
            .get_clamped(i64::from(x), i64::from(y))
            .map_channels(|c| clamp_channel((f64::from(c) - mean).mul_add(amount, mean)))
    }
}

impl Filter for Contrast {
    fn name(&self) -> &'static str {
        "contrast"
    }

    fn run(
        &mut self,
        source: &PixelBuffer,
        progress: &mut dyn ProgressReporter,
    ) -> Option<PixelBuffer> {
        self.brightness = mean_brightness(source, progress, Phase::FIRST_HALF)?;
        debug!(brightness = self.brightness, amount = self.amount, "contrast mean");
        map_pixels(self, source, progress, Phase::SECOND_HALF)
    }
}
