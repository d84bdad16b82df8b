//! Convolution kernels.
//!
//! A [`Kernel`] is an immutable grid of `f64` weights with odd width and
//! height, so it has a well-defined center. Normalizing constructors
//! divide by the weight sum before the kernel is stored.

use serde::{Deserialize, Serialize};
use tracing::trace;

use crate::types::{EngineError, Pixel, PixelBuffer, clamp_channel};

/// How a Gaussian kernel turns `sigma` into the exponent denominator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SigmaConvention {
    /// `exp(-(i² + j²) / (2σ²))`, the textbook form.
    TwoSigmaSquared,
    /// `exp(-(i² + j²) / σ²)`, used by the region-limited blur.
    SigmaSquared,
}

/// A 2-D grid of convolution weights.
#[derive(Debug, Clone, PartialEq)]
pub struct Kernel {
    width: usize,
    height: usize,
    /// Row-major: `weights[ky * width + kx]`.
    weights: Vec<f64>,
}

impl Kernel {
    /// Largest accepted side length for the box and Gaussian constructors.
    pub const MAX_SIZE: usize = 1001;

    /// Create a kernel from row-major weights.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::InvalidConfig`] if a dimension is even or
    /// zero, if `weights.len() != width * height`, or if any weight is not
    /// finite.
    pub fn new(width: usize, height: usize, weights: Vec<f64>) -> Result<Self, EngineError> {
        if width % 2 == 0 || height % 2 == 0 {
            return Err(EngineError::InvalidConfig(format!(
                "kernel dimensions must be odd, got {width}x{height}"
            )));
        }
        if width.checked_mul(height) != Some(weights.len()) {
            return Err(EngineError::InvalidConfig(format!(
                "kernel has {} weights, expected {width}x{height}",
                weights.len()
            )));
        }
        if weights.iter().any(|w| !w.is_finite()) {
            return Err(EngineError::InvalidConfig(
                "kernel weights must be finite".to_string(),
            ));
        }
        Ok(Self {
            width,
            height,
            weights,
        })
    }

    /// Uniform `aperture × aperture` averaging kernel (every cell is
    /// `1 / aperture²`).
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::InvalidConfig`] if `aperture` is even, zero,
    /// or larger than [`Self::MAX_SIZE`].
    pub fn box_blur(aperture: usize) -> Result<Self, EngineError> {
        if aperture % 2 == 0 {
            return Err(EngineError::InvalidConfig(format!(
                "box aperture must be odd and positive, got {aperture}"
            )));
        }
        check_size(aperture)?;
        let area = aperture * aperture;
        #[allow(clippy::cast_precision_loss)]
        let weight = 1.0 / area as f64;
        trace!(aperture, "box kernel");
        Self::new(aperture, aperture, vec![weight; area])
    }

    /// Normalized `(2·radius + 1)²` Gaussian kernel.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::InvalidConfig`] if `radius` is zero, the
    /// kernel side would exceed [`Self::MAX_SIZE`], or `sigma` is not
    /// finite and positive.
    pub fn gaussian(
        radius: usize,
        sigma: f64,
        convention: SigmaConvention,
    ) -> Result<Self, EngineError> {
        if radius == 0 {
            return Err(EngineError::InvalidConfig(
                "gaussian radius must be positive".to_string(),
            ));
        }
        if !sigma.is_finite() || sigma <= 0.0 {
            return Err(EngineError::InvalidConfig(format!(
                "gaussian sigma must be finite and positive, got {sigma}"
            )));
        }
        let denominator = match convention {
            SigmaConvention::TwoSigmaSquared => 2.0 * sigma * sigma,
            SigmaConvention::SigmaSquared => sigma * sigma,
        };
        let size = radius
            .checked_mul(2)
            .and_then(|d| d.checked_add(1))
            .ok_or_else(|| {
                EngineError::InvalidConfig(format!("gaussian radius {radius} is too large"))
            })?;
        check_size(size)?;
        #[allow(clippy::cast_possible_wrap)]
        let r = radius as i64;
        let mut weights = Vec::with_capacity(size * size);
        for j in -r..=r {
            for i in -r..=r {
                #[allow(clippy::cast_precision_loss)]
                let d2 = (i * i + j * j) as f64;
                weights.push((-d2 / denominator).exp());
            }
        }
        let norm: f64 = weights.iter().sum();
        for w in &mut weights {
            *w /= norm;
        }
        trace!(radius, sigma, ?convention, "gaussian kernel");
        Self::new(size, size, weights)
    }

    /// 3×3 sharpening kernel: center `1 + k`, each neighbor `-k / 8`.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::InvalidConfig`] if `strength` is not finite.
    pub fn sharpen(strength: f64) -> Result<Self, EngineError> {
        if !strength.is_finite() {
            return Err(EngineError::InvalidConfig(format!(
                "sharpen strength must be finite, got {strength}"
            )));
        }
        let edge = -strength / 8.0;
        let mut weights = vec![edge; 9];
        weights[4] = 1.0 + strength;
        Self::new(3, 3, weights)
    }

    /// Kernel width (horizontal extent).
    #[must_use]
    pub const fn width(&self) -> usize {
        self.width
    }

    /// Kernel height (vertical extent).
    #[must_use]
    pub const fn height(&self) -> usize {
        self.height
    }

    /// Horizontal radius, `(width - 1) / 2`.
    #[must_use]
    pub const fn radius_x(&self) -> usize {
        (self.width - 1) / 2
    }

    /// Vertical radius, `(height - 1) / 2`.
    #[must_use]
    pub const fn radius_y(&self) -> usize {
        (self.height - 1) / 2
    }

    /// Weight at kernel cell `(kx, ky)`, or `None` outside the grid.
    #[must_use]
    pub fn weight(&self, kx: usize, ky: usize) -> Option<f64> {
        (kx < self.width && ky < self.height).then(|| self.weights[ky * self.width + kx])
    }

    /// Sum of all weights.
    #[must_use]
    pub fn sum(&self) -> f64 {
        self.weights.iter().sum()
    }

    /// Convolve the neighborhood of `(x, y)` in `source`.
    ///
    /// Neighbor coordinates are clamped to the image, so edge pixels are
    /// replicated. Each accumulated channel is truncated toward zero and
    /// clamped to `[0, 255]`.
    #[must_use]
    pub fn apply_at(&self, source: &PixelBuffer, x: u32, y: u32) -> Pixel {
        #[allow(clippy::cast_possible_wrap)]
        let (rx, ry) = (self.radius_x() as i64, self.radius_y() as i64);
        let (cx, cy) = (i64::from(x), i64::from(y));
        let mut acc = [0.0_f64; 3];
        let mut cells = self.weights.iter();
        for dy in -ry..=ry {
            for dx in -rx..=rx {
                let Some(&w) = cells.next() else {
                    break;
                };
                let p = source.get_clamped(cx + dx, cy + dy);
                acc[0] += f64::from(p.r) * w;
                acc[1] += f64::from(p.g) * w;
                acc[2] += f64::from(p.b) * w;
            }
        }
        Pixel::new(
            clamp_channel(acc[0]),
            clamp_channel(acc[1]),
            clamp_channel(acc[2]),
        )
    }
}

fn check_size(size: usize) -> Result<(), EngineError> {
    if size > Kernel::MAX_SIZE {
        return Err(EngineError::InvalidConfig(format!(
            "kernel side {size} exceeds {}",
            Kernel::MAX_SIZE
        )));
    }
    Ok(())
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn even_dimensions_are_rejected() {
        assert!(Kernel::new(2, 3, vec![0.0; 6]).is_err());
        assert!(Kernel::new(3, 4, vec![0.0; 12]).is_err());
        assert!(Kernel::box_blur(0).is_err());
        assert!(Kernel::box_blur(4).is_err());
    }

    #[test]
    fn weight_count_must_match() {
        assert!(Kernel::new(3, 3, vec![0.0; 8]).is_err());
    }

    #[test]
    fn radius_per_axis() {
        let k = Kernel::new(5, 3, vec![0.0; 15]).unwrap();
        assert_eq!(k.radius_x(), 2);
        assert_eq!(k.radius_y(), 1);
    }

    #[test]
    fn box_weights_sum_to_one() {
        for aperture in [1, 3, 5, 9] {
            let k = Kernel::box_blur(aperture).unwrap();
            assert!((k.sum() - 1.0).abs() < 1e-9, "aperture {aperture}");
        }
    }

    #[test]
    fn gaussian_weights_sum_to_one() {
        for convention in [SigmaConvention::TwoSigmaSquared, SigmaConvention::SigmaSquared] {
            let k = Kernel::gaussian(3, 1.0, convention).unwrap();
            assert!((k.sum() - 1.0).abs() < 1e-9);
            assert_eq!(k.width(), 7);
        }
    }

    #[test]
    fn gaussian_center_is_heaviest() {
        let k = Kernel::gaussian(2, 1.0, SigmaConvention::TwoSigmaSquared).unwrap();
        let center = k.weight(2, 2).unwrap();
        for ky in 0..5 {
            for kx in 0..5 {
                assert!(k.weight(kx, ky).unwrap() <= center);
            }
        }
    }

    #[test]
    fn sigma_conventions_differ() {
        let wide = Kernel::gaussian(3, 1.0, SigmaConvention::TwoSigmaSquared).unwrap();
        let narrow = Kernel::gaussian(3, 1.0, SigmaConvention::SigmaSquared).unwrap();
        // Dividing by σ² instead of 2σ² concentrates weight at the center.
        assert!(narrow.weight(3, 3).unwrap() > wide.weight(3, 3).unwrap());
    }

    #[test]
    fn gaussian_rejects_bad_parameters() {
        assert!(Kernel::gaussian(0, 1.0, SigmaConvention::TwoSigmaSquared).is_err());
        assert!(Kernel::gaussian(2, 0.0, SigmaConvention::TwoSigmaSquared).is_err());
        assert!(Kernel::gaussian(2, f64::NAN, SigmaConvention::SigmaSquared).is_err());
    }

    #[test]
    fn oversized_kernels_are_rejected() {
        let max = Kernel::MAX_SIZE;
        assert_eq!(Kernel::box_blur(max).unwrap().width(), max);
        assert!(Kernel::box_blur(max + 2).is_err());
        assert!(Kernel::box_blur(usize::MAX).is_err());
        let max_radius = (max - 1) / 2;
        assert!(Kernel::gaussian(max_radius + 1, 1.0, SigmaConvention::TwoSigmaSquared).is_err());
        for radius in [usize::MAX / 2, usize::MAX] {
            assert!(matches!(
                Kernel::gaussian(radius, 1.0, SigmaConvention::TwoSigmaSquared),
                Err(EngineError::InvalidConfig(_))
            ));
        }
        assert!(Kernel::new(usize::MAX, 3, vec![0.0; 3]).is_err());
    }

    #[test]
    fn sharpen_layout() {
        let k = Kernel::sharpen(8.0).unwrap();
        assert!((k.weight(1, 1).unwrap() - 9.0).abs() < f64::EPSILON);
        assert!((k.weight(0, 0).unwrap() + 1.0).abs() < f64::EPSILON);
        assert!((k.sum() - 1.0).abs() < 1e-12);
    }

    #[test]
    fn apply_at_identity_kernel() {
        let mut weights = vec![0.0; 9];
        weights[4] = 1.0;
        let k = Kernel::new(3, 3, weights).unwrap();
        let src = PixelBuffer::from_fn(3, 3, |x, y| Pixel::new(x as u8 * 10, y as u8 * 10, 7))
            .unwrap();
        assert_eq!(k.apply_at(&src, 1, 2), Pixel::new(10, 20, 7));
    }

    #[test]
    fn apply_at_clamps_to_edges() {
        // A kernel that reads only the left neighbor: at x = 0 it must
        // replicate column 0.
        let k = Kernel::new(3, 1, vec![1.0, 0.0, 0.0]).unwrap();
        let src = PixelBuffer::from_fn(3, 1, |x, _| Pixel::gray(x as u8 * 100)).unwrap();
        assert_eq!(k.apply_at(&src, 0, 0), Pixel::gray(0));
        assert_eq!(k.apply_at(&src, 2, 0), Pixel::gray(100));
    }

    #[test]
    fn apply_at_clamps_channels() {
        let k = Kernel::new(1, 1, vec![3.0]).unwrap();
        let src = PixelBuffer::new(1, 1, Pixel::new(100, 0, 50)).unwrap();
        assert_eq!(k.apply_at(&src, 0, 0), Pixel::new(255, 0, 150));
        let negative = Kernel::new(1, 1, vec![-1.0]).unwrap();
        assert_eq!(negative.apply_at(&src, 0, 0), Pixel::BLACK);
    }
}
