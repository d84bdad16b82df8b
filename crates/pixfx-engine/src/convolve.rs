//! Kernel-driven filters: box blur, Gaussian blur, sharpen.
//!
//! All of them share one evaluator, [`Kernel::apply_at`], and differ only
//! in how the kernel is built and whether work is limited to a
//! [`Region`].

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::filter::{Filter, PixelMap, map_pixels};
use crate::kernel::{Kernel, SigmaConvention};
use crate::progress::{Phase, ProgressReporter};
use crate::types::{EngineError, Pixel, PixelBuffer};

/// An axis-aligned rectangle in pixel coordinates.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Region {
    /// Left edge.
    pub x: u32,
    /// Top edge.
    pub y: u32,
    /// Width in pixels.
    pub width: u32,
    /// Height in pixels.
    pub height: u32,
}

impl Region {
    /// Create a region.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::InvalidConfig`] if the region is empty.
    pub fn new(x: u32, y: u32, width: u32, height: u32) -> Result<Self, EngineError> {
        let region = Self {
            x,
            y,
            width,
            height,
        };
        region.validate()?;
        Ok(region)
    }

    /// Check that the region has a non-zero area.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::InvalidConfig`] if either side is zero.
    pub fn validate(&self) -> Result<(), EngineError> {
        if self.width == 0 || self.height == 0 {
            return Err(EngineError::InvalidConfig(format!(
                "region must be non-empty, got {}x{}",
                self.width, self.height
            )));
        }
        Ok(())
    }

    /// Clip to a `width × height` image. `None` if nothing overlaps.
    #[must_use]
    pub fn intersect(&self, width: u32, height: u32) -> Option<Self> {
        let x_end = self.x.saturating_add(self.width).min(width);
        let y_end = self.y.saturating_add(self.height).min(height);
        (self.x < x_end && self.y < y_end).then(|| Self {
            x: self.x,
            y: self.y,
            width: x_end - self.x,
            height: y_end - self.y,
        })
    }
}

/// Applies a [`Kernel`] to every pixel, or only to those inside a
/// [`Region`].
#[derive(Debug, Clone)]
pub struct ConvolutionFilter {
    name: &'static str,
    kernel: Kernel,
    region: Option<Region>,
}

impl ConvolutionFilter {
    /// Aperture of the region-limited box blur.
    pub const REGION_BOX_APERTURE: usize = 9;
    /// Kernel radius of the region-limited Gaussian blur.
    pub const REGION_GAUSSIAN_RADIUS: usize = 3;
    /// Smallest whole-image Gaussian radius (`⌊radius / 3⌋` must be positive).
    pub const MIN_GAUSSIAN_RADIUS: usize = 3;
    /// Default sharpen strength.
    pub const DEFAULT_SHARPEN_STRENGTH: f64 = 1.0;

    /// Wrap an arbitrary kernel.
    #[must_use]
    pub const fn new(kernel: Kernel) -> Self {
        Self {
            name: "convolution",
            kernel,
            region: None,
        }
    }

    /// Whole-image box blur with an `aperture × aperture` kernel.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::InvalidConfig`] if `aperture` is even or zero.
    pub fn box_blur(aperture: usize) -> Result<Self, EngineError> {
        Ok(Self {
            name: "box-blur",
            kernel: Kernel::box_blur(aperture)?,
            region: None,
        })
    }

    /// 9×9 box blur limited to `region`.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::InvalidConfig`] if `region` is empty.
    pub fn box_blur_region(region: Region) -> Result<Self, EngineError> {
        region.validate()?;
        Ok(Self {
            name: "region-box-blur",
            kernel: Kernel::box_blur(Self::REGION_BOX_APERTURE)?,
            region: Some(region),
        })
    }

    /// Whole-image Gaussian blur: `(2·radius + 1)²` kernel with
    /// `σ = ⌊radius / 3⌋` and the `2σ²` convention.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::InvalidConfig`] if `radius` is below
    /// [`Self::MIN_GAUSSIAN_RADIUS`] (σ would be zero) or the kernel would
    /// be too large.
    pub fn gaussian(radius: usize) -> Result<Self, EngineError> {
        if radius < Self::MIN_GAUSSIAN_RADIUS {
            return Err(EngineError::InvalidConfig(format!(
                "gaussian radius must be at least {}, got {radius}",
                Self::MIN_GAUSSIAN_RADIUS
            )));
        }
        #[allow(clippy::cast_precision_loss)]
        let sigma = (radius / 3) as f64;
        Ok(Self {
            name: "gaussian-blur",
            kernel: Kernel::gaussian(radius, sigma, SigmaConvention::TwoSigmaSquared)?,
            region: None,
        })
    }

    /// Gaussian blur limited to `region`: fixed 7×7 kernel with the `σ²`
    /// convention.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::InvalidConfig`] if `sigma` is not finite and
    /// positive, or `region` is empty.
    pub fn gaussian_region(sigma: f64, region: Region) -> Result<Self, EngineError> {
        region.validate()?;
        Ok(Self {
            name: "region-gaussian-blur",
            kernel: Kernel::gaussian(
                Self::REGION_GAUSSIAN_RADIUS,
                sigma,
                SigmaConvention::SigmaSquared,
            )?,
            region: Some(region),
        })
    }

    /// 3×3 sharpen of strength `k`.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::InvalidConfig`] if `strength` is not finite.
    pub fn sharpen(strength: f64) -> Result<Self, EngineError> {
        Ok(Self {
            name: "sharpen",
            kernel: Kernel::sharpen(strength)?,
            region: None,
        })
    }

    /// The kernel this filter applies.
    #[must_use]
    pub const fn kernel(&self) -> &Kernel {
        &self.kernel
    }

    /// The region work is limited to, if any.
    #[must_use]
    pub const fn region(&self) -> Option<Region> {
        self.region
    }

    fn run_region(
        &self,
        source: &PixelBuffer,
        region: Region,
        progress: &mut dyn ProgressReporter,
    ) -> Option<PixelBuffer> {
        let mut result = source.clone();
        let Some(area) = region.intersect(source.width(), source.height()) else {
            debug!(?region, "region misses the image, copying source");
            progress.report(100);
            return (!progress.is_cancelled()).then_some(result);
        };
        for i in 0..area.width {
            progress.report(Phase::FULL.percent(i, area.width));
            if progress.is_cancelled() {
                debug!(column = i, "region convolution cancelled");
                return None;
            }
            let x = area.x + i;
            for y in area.y..area.y + area.height {
                result.set(x, y, self.kernel.apply_at(source, x, y));
            }
        }
        Some(result)
    }
}

impl PixelMap for ConvolutionFilter {
    fn color_at(&mut self, source: &PixelBuffer, x: u32, y: u32) -> Pixel {
        self.kernel.apply_at(source, x, y)
    }
}

impl Filter for ConvolutionFilter {
    fn name(&self) -> &'static str {
        self.name
    }

    fn run(
        &mut self,
        source: &PixelBuffer,
        progress: &mut dyn ProgressReporter,
    ) -> Option<PixelBuffer> {
        match self.region {
            Some(region) => self.run_region(source, region, progress),
            None => map_pixels(self, source, progress, Phase::FULL),
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::cast_possible_truncation)]
mod tests {
    use super::*;
    use crate::progress::NoProgress;
    use crate::progress::testing::Recorder;

    fn checker(width: u32, height: u32) -> PixelBuffer {
        PixelBuffer::from_fn(width, height, |x, y| {
            if (x + y) % 2 == 0 {
                Pixel::WHITE
            } else {
                Pixel::BLACK
            }
        })
        .unwrap()
    }

    #[test]
    fn blur_of_flat_image_is_flat() {
        let src = PixelBuffer::new(12, 9, Pixel::new(90, 140, 200)).unwrap();
        for mut filter in [
            ConvolutionFilter::box_blur(5).unwrap(),
            ConvolutionFilter::gaussian(3).unwrap(),
        ] {
            let out = filter.run(&src, &mut NoProgress).unwrap();
            // Normalized weights may sum to 1 - ε, so truncation can lose one.
            for p in out.pixels() {
                assert!(p.r >= 89 && p.g >= 139 && p.b >= 199, "{p:?}");
            }
        }
    }

    #[test]
    fn box_blur_averages_neighborhood() {
        // Center white pixel in a black 3×3 image: 255 / 9 = 28.3.
        let src = PixelBuffer::from_fn(3, 3, |x, y| {
            if x == 1 && y == 1 {
                Pixel::WHITE
            } else {
                Pixel::BLACK
            }
        })
        .unwrap();
        let out = ConvolutionFilter::box_blur(3)
            .unwrap()
            .run(&src, &mut NoProgress)
            .unwrap();
        assert_eq!(out.get(1, 1), Some(Pixel::gray(28)));
    }

    #[test]
    fn box_blur_smooths_checkerboard() {
        let src = checker(10, 10);
        let out = ConvolutionFilter::box_blur(3)
            .unwrap()
            .run(&src, &mut NoProgress)
            .unwrap();
        let p = out.get(5, 5).unwrap();
        assert!(p.r > 100 && p.r < 160, "{p:?}");
    }

    #[test]
    fn aperture_one_is_identity() {
        let src = checker(6, 4);
        let out = ConvolutionFilter::box_blur(1)
            .unwrap()
            .run(&src, &mut NoProgress)
            .unwrap();
        assert_eq!(out, src);
    }

    #[test]
    fn sharpen_zero_is_identity() {
        let src = checker(6, 6);
        let out = ConvolutionFilter::sharpen(0.0)
            .unwrap()
            .run(&src, &mut NoProgress)
            .unwrap();
        assert_eq!(out, src);
    }

    #[test]
    fn sharpen_saturates_edges() {
        let src = PixelBuffer::from_fn(5, 1, |x, _| {
            if x < 2 {
                Pixel::gray(100)
            } else {
                Pixel::gray(150)
            }
        })
        .unwrap();
        let out = ConvolutionFilter::sharpen(4.0)
            .unwrap()
            .run(&src, &mut NoProgress)
            .unwrap();
        // Left of the edge darkens, right of it brightens.
        assert!(out.get(1, 0).unwrap().r < 100);
        assert!(out.get(2, 0).unwrap().r > 150);
    }

    #[test]
    fn outputs_stay_in_range_for_extreme_sharpen() {
        let src = checker(8, 8);
        let out = ConvolutionFilter::sharpen(50.0)
            .unwrap()
            .run(&src, &mut NoProgress)
            .unwrap();
        assert!(out.pixels().iter().all(|&p| p == Pixel::WHITE || p == Pixel::BLACK));
    }

    #[test]
    fn region_passes_outside_pixels_through() {
        let src = checker(20, 20);
        let region = Region::new(5, 5, 4, 4).unwrap();
        let out = ConvolutionFilter::box_blur_region(region)
            .unwrap()
            .run(&src, &mut NoProgress)
            .unwrap();
        for y in 0..20 {
            for x in 0..20 {
                let inside = (5..9).contains(&x) && (5..9).contains(&y);
                if !inside {
                    assert_eq!(out.get(x, y), src.get(x, y), "({x}, {y})");
                }
            }
        }
        assert_ne!(out.get(6, 6), src.get(6, 6));
    }

    #[test]
    fn region_progress_is_scoped_to_region_width() {
        let src = checker(40, 10);
        let region = Region::new(0, 0, 4, 10).unwrap();
        let mut recorder = Recorder::new();
        ConvolutionFilter::gaussian_region(1.0, region)
            .unwrap()
            .run(&src, &mut recorder)
            .unwrap();
        assert_eq!(recorder.updates, vec![0, 25, 50, 75]);
    }

    #[test]
    fn region_is_clipped_to_image() {
        let region = Region::new(8, 8, 100, 100).unwrap();
        assert_eq!(
            region.intersect(10, 12),
            Some(Region {
                x: 8,
                y: 8,
                width: 2,
                height: 4
            })
        );
        assert_eq!(region.intersect(8, 8), None);
    }

    #[test]
    fn region_outside_image_copies_source() {
        let src = checker(4, 4);
        let region = Region::new(50, 50, 3, 3).unwrap();
        let out = ConvolutionFilter::box_blur_region(region)
            .unwrap()
            .run(&src, &mut NoProgress)
            .unwrap();
        assert_eq!(out, src);
    }

    #[test]
    fn empty_region_is_rejected() {
        assert!(Region::new(0, 0, 0, 4).is_err());
        let empty = Region {
            x: 0,
            y: 0,
            width: 3,
            height: 0,
        };
        assert!(ConvolutionFilter::box_blur_region(empty).is_err());
    }

    #[test]
    fn variants_use_distinct_sigma_conventions() {
        let region = Region::new(0, 0, 1, 1).unwrap();
        let regional = ConvolutionFilter::gaussian_region(1.0, region).unwrap();
        assert_eq!(regional.kernel().width(), 7);
        let whole = ConvolutionFilter::gaussian(3).unwrap();
        assert_eq!(whole.kernel().width(), 7);
        // Same radius and σ = 1, but σ² vs 2σ² denominators.
        assert_ne!(regional.kernel(), whole.kernel());
    }

    #[test]
    fn whole_image_sigma_is_a_whole_number() {
        // Radii 3, 4 and 5 all use σ = 1, so their shared cells agree
        // up to normalization.
        let k3 = ConvolutionFilter::gaussian(3).unwrap();
        let k4 = ConvolutionFilter::gaussian(4).unwrap();
        assert_eq!(k4.kernel().width(), 9);
        let expected = Kernel::gaussian(4, 1.0, SigmaConvention::TwoSigmaSquared).unwrap();
        assert_eq!(k4.kernel(), &expected);
        let ratio = |k: &Kernel, c: usize| k.weight(c + 1, c).unwrap() / k.weight(c, c).unwrap();
        assert!((ratio(k3.kernel(), 3) - ratio(k4.kernel(), 4)).abs() < 1e-12);
        assert!((ratio(k4.kernel(), 4) - (-0.5_f64).exp()).abs() < 1e-12);
        // Radius 6 moves to σ = 2.
        let k6 = ConvolutionFilter::gaussian(6).unwrap();
        assert!((ratio(k6.kernel(), 6) - (-0.125_f64).exp()).abs() < 1e-12);
    }

    #[test]
    fn gaussian_radius_below_three_is_rejected() {
        for radius in 0..ConvolutionFilter::MIN_GAUSSIAN_RADIUS {
            assert!(matches!(
                ConvolutionFilter::gaussian(radius),
                Err(EngineError::InvalidConfig(_))
            ));
        }
    }

    #[test]
    fn cancelled_region_run_yields_none() {
        let src = checker(10, 10);
        let region = Region::new(0, 0, 10, 10).unwrap();
        let out = ConvolutionFilter::box_blur_region(region)
            .unwrap()
            .run(&src, &mut Recorder::cancelled());
        assert!(out.is_none());
    }

    #[test]
    fn names_identify_variant() {
        let region = Region::new(0, 0, 2, 2).unwrap();
        assert_eq!(ConvolutionFilter::box_blur(3).unwrap().name(), "box-blur");
        assert_eq!(
            ConvolutionFilter::box_blur_region(region).unwrap().name(),
            "region-box-blur"
        );
        assert_eq!(ConvolutionFilter::gaussian(3).unwrap().name(), "gaussian-blur");
        assert_eq!(ConvolutionFilter::sharpen(1.0).unwrap().name(), "sharpen");
    }
}
