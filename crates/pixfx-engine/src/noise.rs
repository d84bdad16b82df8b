//! Stochastic per-pixel noise: salt-and-pepper dots and Gaussian channel
//! noise.
//!
//! Every stochastic filter owns its random source. Construct with a seed
//! for reproducible output, or without one to draw from OS entropy.

use std::f64::consts::PI;

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use crate::filter::{Filter, PixelMap, map_pixels};
use crate::progress::{Phase, ProgressReporter};
use crate::types::{EngineError, Pixel, PixelBuffer, clamp_channel};

/// Build the random source for a filter.
///
/// `Some(seed)` gives a reproducible sequence; `None` seeds from the OS.
pub(crate) fn rng_from_seed(seed: Option<u64>) -> StdRng {
    seed.map_or_else(StdRng::from_os_rng, StdRng::seed_from_u64)
}

/// Validate that `value` is a probability in `[0, 1]`.
pub(crate) fn check_probability(name: &str, value: f64) -> Result<(), EngineError> {
    if (0.0..=1.0).contains(&value) {
        Ok(())
    } else {
        Err(EngineError::InvalidConfig(format!(
            "{name} must be within [0, 1], got {value}"
        )))
    }
}

/// Salt-and-pepper noise.
///
/// One uniform draw `p` in `[0, 1)` per pixel: white if `p < p_white`,
/// otherwise black if `p + p_black > 1`, otherwise the source pixel. Both
/// tests share the same draw.
#[derive(Debug, Clone)]
pub struct DotNoise {
    p_white: f64,
    p_black: f64,
    rng: StdRng,
}

impl DotNoise {
    /// Default probability of a white dot.
    pub const DEFAULT_P_WHITE: f64 = 0.005;
    /// Default probability of a black dot.
    pub const DEFAULT_P_BLACK: f64 = 0.005;

    /// Create a dot-noise filter.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::InvalidConfig`] if either probability lies
    /// outside `[0, 1]`.
    pub fn new(p_white: f64, p_black: f64, seed: Option<u64>) -> Result<Self, EngineError> {
        check_probability("p_white", p_white)?;
        check_probability("p_black", p_black)?;
        Ok(Self {
            p_white,
            p_black,
            rng: rng_from_seed(seed),
        })
    }
}

impl PixelMap for DotNoise {
    fn color_at(&mut self, source: &PixelBuffer, x: u32, y: u32) -> Pixel {
        let p: f64 = self.rng.random();
        if p < self.p_white {
            Pixel::WHITE
        } else if p + self.p_black > 1.0 {
            Pixel::BLACK
        } else {
            source.get_clamped(i64::from(x), i64::from(y))
        }
    }
}

impl Filter for DotNoise {
    fn name(&self) -> &'static str {
        "dot-noise"
    }

    fn run(
        &mut self,
        source: &PixelBuffer,
        progress: &mut dyn ProgressReporter,
    ) -> Option<PixelBuffer> {
        map_pixels(self, source, progress, Phase::FULL)
    }
}

/// Additive Gaussian noise, identical across the three channels of a
/// pixel.
#[derive(Debug, Clone)]
pub struct GaussianNoise {
    mean: f64,
    std_dev: f64,
    rng: StdRng,
}

impl GaussianNoise {
    /// Default noise mean.
    pub const DEFAULT_MEAN: f64 = 0.0;
    /// Default noise standard deviation.
    pub const DEFAULT_STD_DEV: f64 = 10.0;

    /// Create a Gaussian noise filter.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::InvalidConfig`] if `mean` is not finite or
    /// `std_dev` is negative or not finite.
    pub fn new(mean: f64, std_dev: f64, seed: Option<u64>) -> Result<Self, EngineError> {
        if !mean.is_finite() {
            return Err(EngineError::InvalidConfig(format!(
                "noise mean must be finite, got {mean}"
            )));
        }
        if !std_dev.is_finite() || std_dev < 0.0 {
            return Err(EngineError::InvalidConfig(format!(
                "noise standard deviation must be finite and non-negative, got {std_dev}"
            )));
        }
        Ok(Self {
            mean,
            std_dev,
            rng: rng_from_seed(seed),
        })
    }

    /// One normally distributed sample via the Box–Muller transform.
    fn sample(&mut self) -> f64 {
        // Shift to (0, 1] so the logarithm stays finite.
        let u1 = 1.0 - self.rng.random::<f64>();
        let u2: f64 = self.rng.random();
        self.std_dev
            .mul_add((-2.0 * u1.ln()).sqrt() * (2.0 * PI * u2).cos(), self.mean)
    }
}

impl PixelMap for GaussianNoise {
    fn color_at(&mut self, source: &PixelBuffer, x: u32, y: u32) -> Pixel {
        let noise = self.sample();
        source
            .get_clamped(i64::from(x), i64::from(y))
            .map_channels(|c| clamp_channel(f64::from(c) + noise))
    }
}

impl Filter for GaussianNoise {
    fn name(&self) -> &'static str {
        "gaussian-noise"
    }

    fn run(
        &mut self,
        source: &PixelBuffer,
        progress: &mut dyn ProgressReporter,
    ) -> Option<PixelBuffer> {
        map_pixels(self, source, progress, Phase::FULL)
    }
}
