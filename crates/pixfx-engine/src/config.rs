//! Typed, serializable filter selection.
//!
//! A [`FilterConfig`] names one filter kind and carries its parameters.
//! It is plain data: [`FilterConfig::build`] validates it and produces the
//! runnable filter. Configs round-trip through JSON as
//! `{"kind": "gaussian-blur", "radius": 3}`; omitted fields take the
//! `DEFAULT_*` values below.

use serde::{Deserialize, Serialize};

use crate::color::{Binarize, Brightness, Grayscale, Invert};
use crate::contrast::Contrast;
use crate::convolve::{ConvolutionFilter, Region};
use crate::distort::Wave;
use crate::filter::BoxedFilter;
use crate::noise::{DotNoise, GaussianNoise};
use crate::overlay::{RandomCircles, RandomLines};
use crate::resample::{Bilinear, IntegerScale, NearestNeighbor};
use crate::types::EngineError;

/// One filter kind and its parameters.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "kebab-case")]
pub enum FilterConfig {
    /// `255 - channel` per channel.
    Invert,
    /// Luma replicated into all channels.
    Grayscale,
    /// White at or above `threshold` luma, black below.
    Binarize {
        /// Luma threshold, clamped to `[0, 255]`.
        #[serde(default = "defaults::threshold")]
        threshold: i32,
    },
    /// Add `amount` to every channel.
    Brightness {
        /// Signed channel offset.
        #[serde(default = "defaults::brightness")]
        amount: i32,
    },
    /// Subtract `amount` from every channel.
    Darken {
        /// Channel offset to subtract.
        #[serde(default = "defaults::brightness")]
        amount: i32,
    },
    /// Stretch channels around the mean brightness by `amount`.
    Contrast {
        /// Multiplication factor.
        #[serde(default = "defaults::contrast")]
        amount: f64,
    },
    /// Stretch by `1 / amount`.
    DecreaseContrast {
        /// Divisor; must be non-zero.
        #[serde(default = "defaults::contrast")]
        amount: f64,
    },
    /// Horizontal sine warp.
    Wave,
    /// Salt-and-pepper noise.
    DotNoise {
        /// Probability of a white dot.
        #[serde(default = "defaults::dot_p_white")]
        p_white: f64,
        /// Probability of a black dot.
        #[serde(default = "defaults::dot_p_black")]
        p_black: f64,
        /// Fixed seed for reproducible output.
        #[serde(default)]
        seed: Option<u64>,
    },
    /// Additive Gaussian noise.
    GaussianNoise {
        /// Noise mean.
        #[serde(default = "defaults::noise_mean")]
        mean: f64,
        /// Noise standard deviation.
        #[serde(default = "defaults::noise_std_dev")]
        std_dev: f64,
        /// Fixed seed for reproducible output.
        #[serde(default)]
        seed: Option<u64>,
    },
    /// Whole-image box blur.
    BoxBlur {
        /// Odd kernel side length.
        #[serde(default = "defaults::aperture")]
        aperture: usize,
    },
    /// 9×9 box blur inside `region` only.
    RegionBoxBlur {
        /// Area to blur.
        region: Region,
    },
    /// Whole-image Gaussian blur with `σ = ⌊radius / 3⌋`; radius at least 3.
    GaussianBlur {
        /// Kernel radius.
        #[serde(default = "defaults::radius")]
        radius: usize,
    },
    /// 7×7 Gaussian blur with the `σ²` convention inside `region` only.
    RegionGaussianBlur {
        /// Gaussian sigma.
        #[serde(default = "defaults::sigma")]
        sigma: f64,
        /// Area to blur.
        region: Region,
    },
    /// 3×3 sharpen.
    Sharpen {
        /// Sharpen strength `k`.
        #[serde(default = "defaults::sharpen")]
        strength: f64,
    },
    /// Random black/white line segments.
    RandomLines {
        /// Number of segments.
        #[serde(default = "defaults::line_count")]
        count: u32,
        /// Exclusive upper bound on segment length.
        #[serde(default = "defaults::max_length")]
        max_length: u32,
        /// Fixed seed for reproducible output.
        #[serde(default)]
        seed: Option<u64>,
    },
    /// Random circle outlines.
    RandomCircles {
        /// Number of circles.
        #[serde(default = "defaults::circle_count")]
        count: u32,
        /// Exclusive upper bound on radius.
        #[serde(default = "defaults::max_radius")]
        max_radius: u32,
        /// Probability of a white circle.
        #[serde(default = "defaults::circle_p_white")]
        p_white: f64,
        /// Probability of a black circle when not white.
        #[serde(default = "defaults::circle_p_black")]
        p_black: f64,
        /// Fixed seed for reproducible output.
        #[serde(default)]
        seed: Option<u64>,
    },
    /// Block replication by a whole-number factor.
    IntegerScale {
        /// Enlargement factor.
        #[serde(default = "defaults::factor")]
        factor: u32,
    },
    /// Nearest-neighbor resampling.
    NearestNeighbor {
        /// Scale factor.
        #[serde(default = "defaults::scale")]
        scale: f64,
    },
    /// Bilinear resampling.
    Bilinear {
        /// Scale factor.
        #[serde(default = "defaults::scale")]
        scale: f64,
    },
}

impl FilterConfig {
    /// Default binarize threshold.
    pub const DEFAULT_THRESHOLD: i32 = 128;
    /// Default brightness offset.
    pub const DEFAULT_BRIGHTNESS: i32 = 20;
    /// Default contrast factor.
    pub const DEFAULT_CONTRAST: f64 = Contrast::DEFAULT_AMOUNT;
    /// Default box blur aperture.
    pub const DEFAULT_APERTURE: usize = 3;
    /// Default Gaussian blur radius.
    pub const DEFAULT_RADIUS: usize = 3;
    /// Default sigma of the region-limited Gaussian blur.
    pub const DEFAULT_SIGMA: f64 = 1.0;
    /// Default sharpen strength.
    pub const DEFAULT_SHARPEN: f64 = ConvolutionFilter::DEFAULT_SHARPEN_STRENGTH;
    /// Default integer scale factor.
    pub const DEFAULT_FACTOR: u32 = IntegerScale::DEFAULT_FACTOR;
    /// Default fractional scale.
    pub const DEFAULT_SCALE: f64 = 2.0;

    /// Stable kebab-case identifier, matching the serialized `kind` tag.
    #[must_use]
    pub const fn name(&self) -> &'static str {
        match self {
            Self::Invert => "invert",
            Self::Grayscale => "grayscale",
            Self::Binarize { .. } => "binarize",
            Self::Brightness { .. } => "brightness",
            Self::Darken { .. } => "darken",
            Self::Contrast { .. } => "contrast",
            Self::DecreaseContrast { .. } => "decrease-contrast",
            Self::Wave => "wave",
            Self::DotNoise { .. } => "dot-noise",
            Self::GaussianNoise { .. } => "gaussian-noise",
            Self::BoxBlur { .. } => "box-blur",
            Self::RegionBoxBlur { .. } => "region-box-blur",
            Self::GaussianBlur { .. } => "gaussian-blur",
            Self::RegionGaussianBlur { .. } => "region-gaussian-blur",
            Self::Sharpen { .. } => "sharpen",
            Self::RandomLines { .. } => "random-lines",
            Self::RandomCircles { .. } => "random-circles",
            Self::IntegerScale { .. } => "integer-scale",
            Self::NearestNeighbor { .. } => "nearest-neighbor",
            Self::Bilinear { .. } => "bilinear",
        }
    }

    /// Validate the parameters and construct the filter.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::InvalidConfig`] for any out-of-range
    /// parameter. No image work happens before this succeeds.
    pub fn build(&self) -> Result<BoxedFilter, EngineError> {
        Ok(match *self {
            Self::Invert => Box::new(Invert),
            Self::Grayscale => Box::new(Grayscale),
            Self::Binarize { threshold } => Box::new(Binarize::new(threshold)),
            Self::Brightness { amount } => Box::new(Brightness::new(amount)),
            Self::Darken { amount } => Box::new(Brightness::darken(amount)?),
            Self::Contrast { amount } => Box::new(Contrast::new(amount)?),
            Self::DecreaseContrast { amount } => Box::new(Contrast::decrease(amount)?),
            Self::Wave => Box::new(Wave),
            Self::DotNoise {
                p_white,
                p_black,
                seed,
            } => Box::new(DotNoise::new(p_white, p_black, seed)?),
            Self::GaussianNoise {
                mean,
                std_dev,
                seed,
            } => Box::new(GaussianNoise::new(mean, std_dev, seed)?),
            Self::BoxBlur { aperture } => Box::new(ConvolutionFilter::box_blur(aperture)?),
            Self::RegionBoxBlur { region } => {
                Box::new(ConvolutionFilter::box_blur_region(region)?)
            }
            Self::GaussianBlur { radius } => Box::new(ConvolutionFilter::gaussian(radius)?),
            Self::RegionGaussianBlur { sigma, region } => {
                Box::new(ConvolutionFilter::gaussian_region(sigma, region)?)
            }
            Self::Sharpen { strength } => Box::new(ConvolutionFilter::sharpen(strength)?),
            Self::RandomLines {
                count,
                max_length,
                seed,
            } => Box::new(RandomLines::new(count, max_length, seed)?),
            Self::RandomCircles {
                count,
                max_radius,
                p_white,
                p_black,
                seed,
            } => Box::new(RandomCircles::new(count, max_radius, p_white, p_black, seed)?),
            Self::IntegerScale { factor } => Box::new(IntegerScale::new(factor)?),
            Self::NearestNeighbor { scale } => Box::new(NearestNeighbor::new(scale)?),
            Self::Bilinear { scale } => Box::new(Bilinear::new(scale)?),
        })
    }
}

mod defaults {
    use super::{DotNoise, FilterConfig, GaussianNoise, RandomCircles, RandomLines};

    pub const fn threshold() -> i32 {
        FilterConfig::DEFAULT_THRESHOLD
    }
    pub const fn brightness() -> i32 {
        FilterConfig::DEFAULT_BRIGHTNESS
    }
    pub const fn contrast() -> f64 {
        FilterConfig::DEFAULT_CONTRAST
    }
    pub const fn dot_p_white() -> f64 {
        DotNoise::DEFAULT_P_WHITE
    }
    pub const fn dot_p_black() -> f64 {
        DotNoise::DEFAULT_P_BLACK
    }
    pub const fn noise_mean() -> f64 {
        GaussianNoise::DEFAULT_MEAN
    }
    pub const fn noise_std_dev() -> f64 {
        GaussianNoise::DEFAULT_STD_DEV
    }
    pub const fn aperture() -> usize {
        FilterConfig::DEFAULT_APERTURE
    }
    pub const fn radius() -> usize {
        FilterConfig::DEFAULT_RADIUS
    }
    pub const fn sigma() -> f64 {
        FilterConfig::DEFAULT_SIGMA
    }
    pub const fn sharpen() -> f64 {
        FilterConfig::DEFAULT_SHARPEN
    }
    pub const fn line_count() -> u32 {
        RandomLines::DEFAULT_COUNT
    }
    pub const fn max_length() -> u32 {
        RandomLines::DEFAULT_MAX_LENGTH
    }
    pub const fn circle_count() -> u32 {
        RandomCircles::DEFAULT_COUNT
    }
    pub const fn max_radius() -> u32 {
        RandomCircles::DEFAULT_MAX_RADIUS
    }
    pub const fn circle_p_white() -> f64 {
        RandomCircles::DEFAULT_P_WHITE
    }
    pub const fn circle_p_black() -> f64 {
        RandomCircles::DEFAULT_P_BLACK
    }
    pub const fn factor() -> u32 {
        FilterConfig::DEFAULT_FACTOR
    }
    pub const fn scale() -> f64 {
        FilterConfig::DEFAULT_SCALE
    }
}
