//! Per-pixel color mapping: invert, grayscale, binarize, brightness.
//!
//! Each filter here reads exactly one source pixel and writes one
//! destination pixel through the shared [`map_pixels`] driver.

use crate::filter::{Filter, PixelMap, map_pixels};
use crate::progress::{Phase, ProgressReporter};
use crate::types::{EngineError, Pixel, PixelBuffer, clamp_channel, clamp_channel_int};

/// Red weight of the luma estimate.
pub const LUMA_R: f64 = 0.299;
/// Green weight of the luma estimate.
///
/// The three weights sum to 1.0006, not 1.0. Outputs depend on this exact
/// constant, so it is kept as-is.
pub const LUMA_G: f64 = 0.5876;
/// Blue weight of the luma estimate.
pub const LUMA_B: f64 = 0.114;

/// Weighted brightness of a pixel, truncated toward zero and clamped to
/// `[0, 255]`.
#[must_use]
#[allow(clippy::suboptimal_flops)]
pub fn luma(pixel: Pixel) -> u8 {
    clamp_channel(
        LUMA_R * f64::from(pixel.r) + LUMA_G * f64::from(pixel.g) + LUMA_B * f64::from(pixel.b),
    )
}

/// `channel' = 255 - channel` for each channel.
#[derive(Debug, Clone, Copy, Default)]
pub struct Invert;

impl PixelMap for Invert {
    fn color_at(&mut self, source: &PixelBuffer, x: u32, y: u32) -> Pixel {
        source
            .get_clamped(i64::from(x), i64::from(y))
            .map_channels(|c| 255 - c)
    }
}

impl Filter for Invert {
    fn name(&self) -> &'static str {
        "invert"
    }

    fn run(
        &mut self,
        source: &PixelBuffer,
        progress: &mut dyn ProgressReporter,
    ) -> Option<PixelBuffer> {
        map_pixels(self, source, progress, Phase::FULL)
    }
}

/// Replaces each pixel with its [`luma`] in all three channels.
#[derive(Debug, Clone, Copy, Default)]
pub struct Grayscale;

impl PixelMap for Grayscale {
    fn color_at(&mut self, source: &PixelBuffer, x: u32, y: u32) -> Pixel {
        Pixel::gray(luma(source.get_clamped(i64::from(x), i64::from(y))))
    }
}

impl Filter for Grayscale {
    fn name(&self) -> &'static str {
        "grayscale"
    }

    fn run(
        &mut self,
        source: &PixelBuffer,
        progress: &mut dyn ProgressReporter,
    ) -> Option<PixelBuffer> {
        map_pixels(self, source, progress, Phase::FULL)
    }
}

/// Two-level threshold on [`luma`]: white when `luma >= threshold`, else
/// black.
#[derive(Debug, Clone, Copy)]
pub struct Binarize {
    threshold: u8,
}

impl Binarize {
    /// Create a binarize filter. `threshold` is clamped to `[0, 255]`.
    #[must_use]
    pub fn new(threshold: i32) -> Self {
        Self {
            threshold: clamp_channel_int(i64::from(threshold)),
        }
    }

    /// The effective (clamped) threshold.
    #[must_use]
    pub const fn threshold(&self) -> u8 {
        self.threshold
    }
}

impl PixelMap for Binarize {
    fn color_at(&mut self, source: &PixelBuffer, x: u32, y: u32) -> Pixel {
        if luma(source.get_clamped(i64::from(x), i64::from(y))) >= self.threshold {
            Pixel::WHITE
        } else {
            Pixel::BLACK
        }
    }
}

impl Filter for Binarize {
    fn name(&self) -> &'static str {
        "binarize"
    }

    fn run(
        &mut self,
        source: &PixelBuffer,
        progress: &mut dyn ProgressReporter,
    ) -> Option<PixelBuffer> {
        map_pixels(self, source, progress, Phase::FULL)
    }
}

/// Adds a signed amount to every channel, clamped to `[0, 255]`.
#[derive(Debug, Clone, Copy)]
pub struct Brightness {
    amount: i32,
}

impl Brightness {
    /// Brighten by `amount` (negative values darken).
    #[must_use]
    pub const fn new(amount: i32) -> Self {
        Self { amount }
    }

    /// Darken by `amount`; the same filter with the amount negated.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::InvalidConfig`] if `amount` has no negation
    /// (`i32::MIN`).
    pub fn darken(amount: i32) -> Result<Self, EngineError> {
        amount.checked_neg().map(Self::new).ok_or_else(|| {
            EngineError::InvalidConfig(format!("brightness amount {amount} cannot be negated"))
        })
    }

    /// The signed amount added to each channel.
    #[must_use]
    pub const fn amount(&self) -> i32 {
        self.amount
    }
}

impl PixelMap for Brightness {
    fn color_at(&mut self, source: &PixelBuffer, x: u32, y: u32) -> Pixel {
        let amount = i64::from(self.amount);
        source
            .get_clamped(i64::from(x), i64::from(y))
            .map_channels(|c| clamp_channel_int(i64::from(c) + amount))
    }
}

impl Filter for Brightness {
    fn name(&self) -> &'static str {
        "brightness"
    }

    fn run(
        &mut self,
        source: &PixelBuffer,
        progress: &mut dyn ProgressReporter,
    ) -> Option<PixelBuffer> {
        map_pixels(self, source, progress, Phase::FULL)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::cast_possible_truncation)]
mod tests {
    use super::*;
    use crate::progress::NoProgress;
    use crate::progress::testing::Recorder;

    fn sample_image() -> PixelBuffer {
        PixelBuffer::from_fn(9, 7, |x, y| {
            Pixel::new((x * 29) as u8, (y * 37) as u8, ((x + y) * 13) as u8)
        })
        .unwrap()
    }

    fn run(filter: &mut dyn Filter, src: &PixelBuffer) -> PixelBuffer {
        filter.run(src, &mut NoProgress).unwrap()
    }

    #[test]
    fn luma_uses_unnormalized_weights() {
        assert_eq!(luma(Pixel::BLACK), 0);
        // 255 * 1.0006 = 255.15, truncated to 255.
        assert_eq!(luma(Pixel::WHITE), 255);
        // 0.5876 * 100 = 58.76 -> 58
        assert_eq!(luma(Pixel::new(0, 100, 0)), 58);
        assert_eq!(luma(Pixel::new(200, 200, 200)), 200);
    }

    #[test]
    fn invert_two_by_two() {
        let src = PixelBuffer::from_fn(2, 2, |x, y| {
            if (x + y) % 2 == 0 {
                Pixel::BLACK
            } else {
                Pixel::WHITE
            }
        })
        .unwrap();
        let out = run(&mut Invert, &src);
        let expected: Vec<Pixel> = src.pixels().iter().map(|p| p.map_channels(|c| 255 - c)).collect();
        assert_eq!(out.pixels(), expected.as_slice());
        assert_eq!(out.get(0, 0), Some(Pixel::WHITE));
        assert_eq!(out.get(1, 0), Some(Pixel::BLACK));
    }

    #[test]
    fn invert_is_its_own_inverse() {
        let src = sample_image();
        let once = run(&mut Invert, &src);
        let twice = run(&mut Invert, &once);
        assert_eq!(twice, src);
    }

    #[test]
    fn grayscale_has_equal_channels() {
        let out = run(&mut Grayscale, &sample_image());
        for p in out.pixels() {
            assert!(p.r == p.g && p.g == p.b, "not gray: {p:?}");
        }
    }

    #[test]
    fn binarize_threshold_scenarios() {
        let bright = PixelBuffer::new(1, 1, Pixel::gray(200)).unwrap();
        let dark = PixelBuffer::new(1, 1, Pixel::gray(50)).unwrap();
        let mut filter = Binarize::new(128);
        assert_eq!(run(&mut filter, &bright).get(0, 0), Some(Pixel::WHITE));
        assert_eq!(run(&mut filter, &dark).get(0, 0), Some(Pixel::BLACK));
    }

    #[test]
    fn binarize_is_two_valued() {
        let out = run(&mut Binarize::new(100), &sample_image());
        for p in out.pixels() {
            assert!(*p == Pixel::WHITE || *p == Pixel::BLACK, "{p:?}");
        }
    }

    #[test]
    fn binarize_threshold_is_clamped() {
        assert_eq!(Binarize::new(-40).threshold(), 0);
        assert_eq!(Binarize::new(4000).threshold(), 255);
    }

    #[test]
    fn binarize_at_exact_threshold_is_white() {
        let src = PixelBuffer::new(1, 1, Pixel::gray(128)).unwrap();
        assert_eq!(run(&mut Binarize::new(128), &src).get(0, 0), Some(Pixel::WHITE));
    }

    #[test]
    fn brightness_clamps_high() {
        let src = PixelBuffer::new(1, 1, Pixel::new(10, 10, 10)).unwrap();
        let out = run(&mut Brightness::new(300), &src);
        assert_eq!(out.get(0, 0), Some(Pixel::WHITE));
    }

    #[test]
    fn darken_negates_amount() {
        let src = PixelBuffer::new(1, 1, Pixel::new(10, 100, 250)).unwrap();
        let mut filter = Brightness::darken(20).unwrap();
        assert_eq!(filter.amount(), -20);
        assert_eq!(run(&mut filter, &src).get(0, 0), Some(Pixel::new(0, 80, 230)));
    }

    #[test]
    fn darken_rejects_unnegatable_amount() {
        assert!(matches!(
            Brightness::darken(i32::MIN),
            Err(EngineError::InvalidConfig(_))
        ));
    }

    #[test]
    fn result_does_not_depend_on_iteration_order() {
        let src = sample_image();
        let forward = run(&mut Grayscale, &src);
        let mut reversed = PixelBuffer::new(src.width(), src.height(), Pixel::BLACK).unwrap();
        let mut map = Grayscale;
        for y in (0..src.height()).rev() {
            for x in (0..src.width()).rev() {
                reversed.set(x, y, map.color_at(&src, x, y));
            }
        }
        assert_eq!(forward, reversed);
    }

    #[test]
    fn cancelled_run_returns_none_and_leaves_source() {
        let src = sample_image();
        let before = src.clone();
        assert!(Invert.run(&src, &mut Recorder::cancelled()).is_none());
        assert_eq!(src, before);
    }
}
