//! 256-bucket luma histogram plus the numbers a chart needs to draw it.

use serde::{Deserialize, Serialize};

use crate::color::luma;
use crate::types::PixelBuffer;

/// Number of buckets, one per 8-bit luma value.
pub const BUCKETS: usize = 256;

/// Pixel counts per luma value.
///
/// The bucket sum always equals the pixel count of the image it was
/// computed from.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Histogram {
    buckets: Vec<u64>,
}

impl Histogram {
    /// Default number of y-axis ticks for a chart.
    pub const DEFAULT_TICKS: u32 = 10;

    /// Count every pixel of `image` into the bucket of its [`luma`].
    #[must_use]
    pub fn compute(image: &PixelBuffer) -> Self {
        let mut buckets = vec![0_u64; BUCKETS];
        for &pixel in image.pixels() {
            buckets[usize::from(luma(pixel))] += 1;
        }
        Self { buckets }
    }

    /// The raw counts, indexed by luma.
    #[must_use]
    pub fn buckets(&self) -> &[u64] {
        &self.buckets
    }

    /// Sum of all buckets.
    #[must_use]
    pub fn total(&self) -> u64 {
        self.buckets.iter().sum()
    }

    /// Each bucket as a percentage of [`total`](Self::total).
    #[must_use]
    pub fn percentages(&self) -> Vec<f64> {
        let total = self.total();
        if total == 0 {
            return vec![0.0; self.buckets.len()];
        }
        #[allow(clippy::cast_precision_loss)]
        let total = total as f64;
        #[allow(clippy::cast_precision_loss)]
        self.buckets
            .iter()
            .map(|&count| count as f64 / total * 100.0)
            .collect()
    }

    /// Largest bucket percentage.
    #[must_use]
    pub fn max_percentage(&self) -> f64 {
        self.percentages().into_iter().fold(0.0, f64::max)
    }

    /// `ticks + 1` evenly spaced y-axis labels from 0 to
    /// [`max_percentage`](Self::max_percentage).
    #[must_use]
    pub fn y_ticks(&self, ticks: u32) -> Vec<f64> {
        if ticks == 0 {
            return vec![0.0];
        }
        let step = self.max_percentage() / f64::from(ticks);
        (0..=ticks).map(|i| f64::from(i) * step).collect()
    }

    /// Bar heights for a chart `max_height` units tall, scaled so the
    /// largest bucket fills it. Truncated toward zero.
    #[must_use]
    pub fn bar_heights(&self, max_height: u32) -> Vec<u32> {
        let max = self.max_percentage();
        if max <= 0.0 {
            return vec![0; self.buckets.len()];
        }
        self.percentages()
            .into_iter()
            .map(|p| {
                #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
                let h = (p / max * f64::from(max_height)) as u32;
                h
            })
            .collect()
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::cast_possible_truncation)]
mod tests {
    use super::*;
    use crate::types::Pixel;

    #[test]
    fn bucket_sum_equals_pixel_count() {
        let image = PixelBuffer::from_fn(37, 19, |x, y| {
            Pixel::new((x * 7) as u8, (y * 13) as u8, ((x + y) * 3) as u8)
        })
        .unwrap();
        let hist = Histogram::compute(&image);
        assert_eq!(hist.buckets().len(), BUCKETS);
        assert_eq!(hist.total(), 37 * 19);
    }

    #[test]
    fn counts_land_in_luma_bucket() {
        let image = PixelBuffer::from_fn(4, 1, |x, _| {
            if x == 0 {
                Pixel::WHITE
            } else {
                Pixel::gray(100)
            }
        })
        .unwrap();
        let hist = Histogram::compute(&image);
        assert_eq!(hist.buckets()[255], 1);
        assert_eq!(hist.buckets()[100], 3);
    }

    #[test]
    fn percentages_and_max() {
        let image = PixelBuffer::from_fn(4, 1, |x, _| {
            if x == 0 {
                Pixel::BLACK
            } else {
                Pixel::gray(200)
            }
        })
        .unwrap();
        let hist = Histogram::compute(&image);
        let pct = hist.percentages();
        assert!((pct[0] - 25.0).abs() < 1e-9);
        assert!((pct[200] - 75.0).abs() < 1e-9);
        assert!((pct.iter().sum::<f64>() - 100.0).abs() < 1e-9);
        assert!((hist.max_percentage() - 75.0).abs() < 1e-9);
    }

    #[test]
    fn ticks_span_zero_to_max() {
        let image = PixelBuffer::new(2, 2, Pixel::gray(50)).unwrap();
        let ticks = Histogram::compute(&image).y_ticks(Histogram::DEFAULT_TICKS);
        assert_eq!(ticks.len(), 11);
        assert!(ticks[0].abs() < f64::EPSILON);
        assert!((ticks[10] - 100.0).abs() < 1e-9);
        assert!((ticks[5] - 50.0).abs() < 1e-9);
    }

    #[test]
    fn bar_heights_scale_to_tallest() {
        let image = PixelBuffer::from_fn(4, 1, |x, _| {
            if x == 0 {
                Pixel::BLACK
            } else {
                Pixel::gray(200)
            }
        })
        .unwrap();
        let bars = Histogram::compute(&image).bar_heights(480);
        assert_eq!(bars[200], 480);
        assert_eq!(bars[0], 160);
        assert_eq!(bars[1], 0);
    }

    #[test]
    fn serializes_as_bucket_list() {
        let image = PixelBuffer::new(1, 1, Pixel::BLACK).unwrap();
        let json = serde_json::to_value(Histogram::compute(&image)).unwrap();
        assert_eq!(json["buckets"][0], 1);
        assert_eq!(json["buckets"].as_array().unwrap().len(), 256);
    }
}
