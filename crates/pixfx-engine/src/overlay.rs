//! Procedural overlays: random line segments and circle outlines drawn
//! onto a copy of the source.
//!
//! These filters do not go through [`map_pixels`](crate::filter::map_pixels).
//! Cancellation is checked once before drawing starts and progress jumps
//! from 0 to 100.

use std::f64::consts::PI;

use rand::Rng;
use rand::rngs::StdRng;
use tracing::debug;

use crate::filter::Filter;
use crate::noise::{check_probability, rng_from_seed};
use crate::progress::ProgressReporter;
use crate::types::{EngineError, Pixel, PixelBuffer};

/// Shortest segment length drawn by [`RandomLines`].
pub const MIN_LINE_LENGTH: u32 = 10;
/// Smallest radius drawn by [`RandomCircles`].
pub const MIN_CIRCLE_RADIUS: u32 = 5;

/// Write `color` at `(x, y)` if it lies inside `image`.
fn plot(image: &mut PixelBuffer, x: i64, y: i64, color: Pixel) -> bool {
    match (u32::try_from(x), u32::try_from(y)) {
        (Ok(x), Ok(y)) => image.set(x, y, color),
        _ => false,
    }
}

/// Copy `source`, then hand the copy to `draw` unless cancelled first.
fn overlay(
    source: &PixelBuffer,
    progress: &mut dyn ProgressReporter,
    draw: impl FnOnce(&mut PixelBuffer),
) -> Option<PixelBuffer> {
    progress.report(0);
    if progress.is_cancelled() {
        debug!("overlay cancelled before drawing");
        return None;
    }
    let mut result = source.clone();
    draw(&mut result);
    progress.report(100);
    Some(result)
}

/// Random black or white line segments.
///
/// Each segment starts at a uniform random pixel, heads in a uniform
/// random direction, and has an integer length in
/// `[MIN_LINE_LENGTH, max_length)`. Rasterization steps one unit at a
/// time and stops at the first sample outside the image.
#[derive(Debug, Clone)]
pub struct RandomLines {
    count: u32,
    max_length: u32,
    rng: StdRng,
}

impl RandomLines {
    /// Default number of segments.
    pub const DEFAULT_COUNT: u32 = 1000;
    /// Default exclusive upper bound on segment length.
    pub const DEFAULT_MAX_LENGTH: u32 = 40;

    /// Create a random-lines filter.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::InvalidConfig`] if `max_length` does not
    /// exceed [`MIN_LINE_LENGTH`].
    pub fn new(count: u32, max_length: u32, seed: Option<u64>) -> Result<Self, EngineError> {
        if max_length <= MIN_LINE_LENGTH {
            return Err(EngineError::InvalidConfig(format!(
                "max line length must exceed {MIN_LINE_LENGTH}, got {max_length}"
            )));
        }
        Ok(Self {
            count,
            max_length,
            rng: rng_from_seed(seed),
        })
    }

    fn draw(&mut self, image: &mut PixelBuffer) {
        let (width, height) = (image.width(), image.height());
        for _ in 0..self.count {
            let x0 = i64::from(self.rng.random_range(0..width));
            let y0 = i64::from(self.rng.random_range(0..height));
            let angle = self.rng.random::<f64>() * 2.0 * PI;
            let length = self.rng.random_range(MIN_LINE_LENGTH..self.max_length);
            let color = if self.rng.random_bool(0.5) {
                Pixel::BLACK
            } else {
                Pixel::WHITE
            };
            let (sin, cos) = angle.sin_cos();
            for i in 0..length {
                let step = f64::from(i);
                #[allow(clippy::cast_possible_truncation)]
                let (dx, dy) = ((step * cos) as i64, (step * sin) as i64);
                if !plot(image, x0 + dx, y0 + dy, color) {
                    break;
                }
            }
        }
    }
}

impl Filter for RandomLines {
    fn name(&self) -> &'static str {
        "random-lines"
    }

    fn run(
        &mut self,
        source: &PixelBuffer,
        progress: &mut dyn ProgressReporter,
    ) -> Option<PixelBuffer> {
        overlay(source, progress, |image| self.draw(image))
    }
}

/// Random circle outlines.
///
/// Per circle the color is picked with two independent draws: white with
/// probability `p_white`, otherwise black with probability `p_black`,
/// otherwise the circle is skipped. The outline is 360 one-degree samples,
/// each plotted only if it lands inside the image.
#[derive(Debug, Clone)]
pub struct RandomCircles {
    count: u32,
    max_radius: u32,
    p_white: f64,
    p_black: f64,
    rng: StdRng,
}

impl RandomCircles {
    /// Default number of circles.
    pub const DEFAULT_COUNT: u32 = 600;
    /// Default exclusive upper bound on radius.
    pub const DEFAULT_MAX_RADIUS: u32 = 30;
    /// Default probability of a white circle.
    pub const DEFAULT_P_WHITE: f64 = 0.5;
    /// Default probability of a black circle, given it is not white.
    pub const DEFAULT_P_BLACK: f64 = 0.5;

    /// Create a random-circles filter.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::InvalidConfig`] if `max_radius` does not
    /// exceed [`MIN_CIRCLE_RADIUS`] or a probability lies outside `[0, 1]`.
    pub fn new(
        count: u32,
        max_radius: u32,
        p_white: f64,
        p_black: f64,
        seed: Option<u64>,
    ) -> Result<Self, EngineError> {
        if max_radius <= MIN_CIRCLE_RADIUS {
            return Err(EngineError::InvalidConfig(format!(
                "max circle radius must exceed {MIN_CIRCLE_RADIUS}, got {max_radius}"
            )));
        }
        check_probability("p_white", p_white)?;
        check_probability("p_black", p_black)?;
        Ok(Self {
            count,
            max_radius,
            p_white,
            p_black,
            rng: rng_from_seed(seed),
        })
    }

    fn pick_color(&mut self) -> Option<Pixel> {
        if self.rng.random::<f64>() < self.p_white {
            Some(Pixel::WHITE)
        } else if self.rng.random::<f64>() < self.p_black {
            Some(Pixel::BLACK)
        } else {
            None
        }
    }

    fn draw(&mut self, image: &mut PixelBuffer) {
        let (width, height) = (image.width(), image.height());
        for _ in 0..self.count {
            let cx = i64::from(self.rng.random_range(0..width));
            let cy = i64::from(self.rng.random_range(0..height));
            let radius = f64::from(self.rng.random_range(MIN_CIRCLE_RADIUS..self.max_radius));
            let Some(color) = self.pick_color() else {
                continue;
            };
            for degree in 0..360_u32 {
                let (sin, cos) = f64::from(degree).to_radians().sin_cos();
                #[allow(clippy::cast_possible_truncation)]
                let (dx, dy) = ((radius * cos) as i64, (radius * sin) as i64);
                plot(image, cx + dx, cy + dy, color);
            }
        }
    }
}

impl Filter for RandomCircles {
    fn name(&self) -> &'static str {
        "random-circles"
    }

    fn run(
        &mut self,
        source: &PixelBuffer,
        progress: &mut dyn ProgressReporter,
    ) -> Option<PixelBuffer> {
        overlay(source, progress, |image| self.draw(image))
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::progress::NoProgress;
    use crate::progress::testing::Recorder;

    fn gray(width: u32, height: u32) -> PixelBuffer {
        PixelBuffer::new(width, height, Pixel::gray(128)).unwrap()
    }

    fn changed(a: &PixelBuffer, b: &PixelBuffer) -> usize {
        a.pixels().iter().zip(b.pixels()).filter(|(x, y)| x != y).count()
    }

    #[test]
    fn lines_validate_length() {
        assert!(RandomLines::new(10, 10, Some(1)).is_err());
        assert!(RandomLines::new(10, 11, Some(1)).is_ok());
    }

    #[test]
    fn lines_only_paint_black_or_white() {
        let src = gray(64, 64);
        let out = RandomLines::new(200, 40, Some(7))
            .unwrap()
            .run(&src, &mut NoProgress)
            .unwrap();
        assert!(changed(&src, &out) > 0);
        for &p in out.pixels() {
            assert!(p == Pixel::gray(128) || p == Pixel::WHITE || p == Pixel::BLACK);
        }
    }

    #[test]
    fn zero_lines_copy_source() {
        let src = gray(16, 16);
        let out = RandomLines::new(0, 40, Some(7))
            .unwrap()
            .run(&src, &mut NoProgress)
            .unwrap();
        assert_eq!(out, src);
    }

    #[test]
    fn single_line_is_contiguous_from_start() {
        // One line on a 1-pixel-tall strip: every painted pixel lies on row 0
        // and at most `max_length - 1` pixels are painted.
        let src = gray(100, 1);
        let out = RandomLines::new(1, 11, Some(3))
            .unwrap()
            .run(&src, &mut NoProgress)
            .unwrap();
        let painted = changed(&src, &out);
        assert!((1..=10).contains(&painted), "painted {painted}");
    }

    #[test]
    fn lines_are_reproducible_with_seed() {
        let src = gray(40, 30);
        let a = RandomLines::new(50, 40, Some(99))
            .unwrap()
            .run(&src, &mut NoProgress)
            .unwrap();
        let b = RandomLines::new(50, 40, Some(99))
            .unwrap()
            .run(&src, &mut NoProgress)
            .unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn circles_validate_parameters() {
        assert!(RandomCircles::new(1, 5, 0.5, 0.5, None).is_err());
        assert!(RandomCircles::new(1, 30, 1.5, 0.5, None).is_err());
        assert!(RandomCircles::new(1, 30, 0.5, -0.1, None).is_err());
    }

    #[test]
    fn circles_with_zero_probabilities_draw_nothing() {
        let src = gray(50, 50);
        let out = RandomCircles::new(100, 30, 0.0, 0.0, Some(5))
            .unwrap()
            .run(&src, &mut NoProgress)
            .unwrap();
        assert_eq!(out, src);
    }

    #[test]
    fn certain_white_circles_are_white() {
        let src = gray(50, 50);
        let out = RandomCircles::new(20, 30, 1.0, 0.0, Some(5))
            .unwrap()
            .run(&src, &mut NoProgress)
            .unwrap();
        assert!(changed(&src, &out) > 0);
        assert!(out.pixels().iter().all(|&p| p != Pixel::BLACK));
    }

    #[test]
    fn single_circle_paints_bounded_outline() {
        let src = gray(200, 200);
        let mut filter = RandomCircles::new(1, 6, 1.0, 0.0, Some(21)).unwrap();
        let out = filter.run(&src, &mut NoProgress).unwrap();
        let painted = changed(&src, &out);
        // Radius 5 outline: at most 360 samples, many coincide.
        assert!(painted > 0 && painted <= 360, "painted {painted}");
    }

    #[test]
    fn overlay_progress_jumps_to_hundred() {
        let src = gray(8, 8);
        let mut recorder = Recorder::new();
        RandomCircles::new(3, 10, 0.5, 0.5, Some(1))
            .unwrap()
            .run(&src, &mut recorder)
            .unwrap();
        assert_eq!(recorder.updates, vec![0, 100]);
    }

    #[test]
    fn cancelled_overlay_yields_none() {
        let src = gray(8, 8);
        assert!(
            RandomLines::new(10, 20, Some(1))
                .unwrap()
                .run(&src, &mut Recorder::cancelled())
                .is_none()
        );
    }
}
