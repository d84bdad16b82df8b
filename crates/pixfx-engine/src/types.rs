//! Shared types for the pixfx filter engine.

use serde::{Deserialize, Serialize};

/// Re-export `RgbImage` so shells can hand decoded images to the engine
/// without depending on `image` directly.
pub use image::RgbImage;

/// A single 8-bit RGB pixel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct Pixel {
    /// Red channel.
    pub r: u8,
    /// Green channel.
    pub g: u8,
    /// Blue channel.
    pub b: u8,
}

impl Pixel {
    /// Pure black.
    pub const BLACK: Self = Self::new(0, 0, 0);
    /// Pure white.
    pub const WHITE: Self = Self::new(255, 255, 255);

    /// Create a pixel from its three channels.
    #[must_use]
    pub const fn new(r: u8, g: u8, b: u8) -> Self {
        Self { r, g, b }
    }

    /// Create a gray pixel with all three channels set to `value`.
    #[must_use]
    pub const fn gray(value: u8) -> Self {
        Self::new(value, value, value)
    }

    /// The channels as an `[r, g, b]` array.
    #[must_use]
    pub const fn channels(self) -> [u8; 3] {
        [self.r, self.g, self.b]
    }

    /// Apply `f` to every channel independently.
    #[must_use]
    pub fn map_channels(self, mut f: impl FnMut(u8) -> u8) -> Self {
        Self::new(f(self.r), f(self.g), f(self.b))
    }
}

impl From<image::Rgb<u8>> for Pixel {
    fn from(value: image::Rgb<u8>) -> Self {
        let [r, g, b] = value.0;
        Self::new(r, g, b)
    }
}

impl From<Pixel> for image::Rgb<u8> {
    fn from(value: Pixel) -> Self {
        Self(value.channels())
    }
}

/// Image dimensions in pixels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Dimensions {
    /// Width in pixels.
    pub width: u32,
    /// Height in pixels.
    pub height: u32,
}

impl Dimensions {
    /// Total pixel count (`width * height`).
    #[must_use]
    pub const fn pixel_count(self) -> u64 {
        self.width as u64 * self.height as u64
    }
}

impl std::fmt::Display for Dimensions {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}x{}", self.width, self.height)
    }
}

/// A fixed-size, row-major grid of [`Pixel`]s.
///
/// Both dimensions are at least 1 for every live buffer. Filters never
/// mutate their source: each run allocates a fresh buffer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PixelBuffer {
    width: u32,
    height: u32,
    pixels: Vec<Pixel>,
}

impl PixelBuffer {
    /// Create a buffer filled with a single color.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::InvalidDimensions`] if either dimension is
    /// zero or the buffer cannot be allocated.
    pub fn new(width: u32, height: u32, fill: Pixel) -> Result<Self, EngineError> {
        let len = checked_len(width, height)?;
        let mut pixels = reserve_pixels(len, width, height)?;
        pixels.resize(len, fill);
        Ok(Self {
            width,
            height,
            pixels,
        })
    }

    /// Create a buffer by evaluating `f(x, y)` for every coordinate.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::InvalidDimensions`] if either dimension is
    /// zero or the buffer cannot be allocated.
    pub fn from_fn(
        width: u32,
        height: u32,
        mut f: impl FnMut(u32, u32) -> Pixel,
    ) -> Result<Self, EngineError> {
        let len = checked_len(width, height)?;
        let mut pixels = reserve_pixels(len, width, height)?;
        for y in 0..height {
            for x in 0..width {
                pixels.push(f(x, y));
            }
        }
        Ok(Self {
            width,
            height,
            pixels,
        })
    }

    /// Create a buffer from interleaved `RGBRGB...` bytes in row-major order.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::InvalidDimensions`] if either dimension is
    /// zero or `raw.len()` is not `width * height * 3`.
    pub fn from_raw(width: u32, height: u32, raw: &[u8]) -> Result<Self, EngineError> {
        let len = checked_len(width, height)?;
        if raw.len() != len.saturating_mul(3) {
            return Err(EngineError::InvalidDimensions { width, height });
        }
        let pixels = raw
            .chunks_exact(3)
            .map(|c| Pixel::new(c[0], c[1], c[2]))
            .collect();
        Ok(Self {
            width,
            height,
            pixels,
        })
    }

    /// Width in pixels.
    #[must_use]
    pub const fn width(&self) -> u32 {
        self.width
    }

    /// Height in pixels.
    #[must_use]
    pub const fn height(&self) -> u32 {
        self.height
    }

    /// Both dimensions.
    #[must_use]
    pub const fn dimensions(&self) -> Dimensions {
        Dimensions {
            width: self.width,
            height: self.height,
        }
    }

    /// The pixel at `(x, y)`, or `None` when out of bounds.
    #[must_use]
    pub fn get(&self, x: u32, y: u32) -> Option<Pixel> {
        self.index(x, y).map(|i| self.pixels[i])
    }

    /// The pixel at `(x, y)` after clamping each coordinate to the
    /// buffer's edge.
    ///
    /// This is the lookup every neighborhood and resampling algorithm
    /// uses, so edge pixels are replicated outward.
    #[must_use]
    pub fn get_clamped(&self, x: i64, y: i64) -> Pixel {
        let cx = clamp_coord(x, self.width);
        let cy = clamp_coord(y, self.height);
        self.pixels[cy as usize * self.width as usize + cx as usize]
    }

    /// Overwrite the pixel at `(x, y)`.
    ///
    /// Returns `false` (and writes nothing) when the coordinate is out of
    /// bounds.
    pub fn set(&mut self, x: u32, y: u32, pixel: Pixel) -> bool {
        match self.index(x, y) {
            Some(i) => {
                self.pixels[i] = pixel;
                true
            }
            None => false,
        }
    }

    /// All pixels in row-major order.
    #[must_use]
    pub fn pixels(&self) -> &[Pixel] {
        &self.pixels
    }

    /// Interleaved `RGBRGB...` bytes in row-major order.
    #[must_use]
    pub fn to_raw(&self) -> Vec<u8> {
        self.pixels.iter().flat_map(|p| p.channels()).collect()
    }

    fn index(&self, x: u32, y: u32) -> Option<usize> {
        (x < self.width && y < self.height)
            .then(|| y as usize * self.width as usize + x as usize)
    }
}

impl TryFrom<&RgbImage> for PixelBuffer {
    type Error = EngineError;

    fn try_from(image: &RgbImage) -> Result<Self, Self::Error> {
        Self::from_fn(image.width(), image.height(), |x, y| {
            Pixel::from(*image.get_pixel(x, y))
        })
    }
}

impl From<&PixelBuffer> for RgbImage {
    fn from(buffer: &PixelBuffer) -> Self {
        Self::from_fn(buffer.width, buffer.height, |x, y| {
            buffer.get_clamped(i64::from(x), i64::from(y)).into()
        })
    }
}

/// Clamp a signed coordinate into `[0, len - 1]`.
///
/// `len` is a live buffer dimension and therefore at least 1.
#[must_use]
pub fn clamp_coord(value: i64, len: u32) -> u32 {
    let max = i64::from(len.max(1) - 1);
    #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
    let clamped = value.clamp(0, max) as u32;
    clamped
}

/// Truncate a floating-point channel value toward zero and clamp it into
/// `[0, 255]`.
///
/// Non-finite inputs saturate (`NaN` maps to 0).
#[must_use]
pub fn clamp_channel(value: f64) -> u8 {
    #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
    let clamped = (value as i64).clamp(0, 255) as u8;
    clamped
}

/// Clamp an integer channel value into `[0, 255]`.
#[must_use]
pub fn clamp_channel_int(value: i64) -> u8 {
    #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
    let clamped = value.clamp(0, 255) as u8;
    clamped
}

/// Pixel count of a `width × height` buffer.
///
/// Rejects zero dimensions and sizes whose backing storage would exceed
/// `isize::MAX` bytes.
fn checked_len(width: u32, height: u32) -> Result<usize, EngineError> {
    let invalid = EngineError::InvalidDimensions { width, height };
    if width == 0 || height == 0 {
        return Err(invalid);
    }
    let len = (width as usize)
        .checked_mul(height as usize)
        .ok_or_else(|| invalid.clone())?;
    let bytes = len
        .checked_mul(size_of::<Pixel>())
        .ok_or_else(|| invalid.clone())?;
    if isize::try_from(bytes).is_err() {
        return Err(invalid);
    }
    Ok(len)
}

/// An empty vector with room for exactly `len` pixels, or an error if the
/// allocator refuses.
fn reserve_pixels(len: usize, width: u32, height: u32) -> Result<Vec<Pixel>, EngineError> {
    let mut pixels = Vec::new();
    pixels
        .try_reserve_exact(len)
        .map_err(|_| EngineError::InvalidDimensions { width, height })?;
    Ok(pixels)
}

/// Errors surfaced by the engine.
///
/// A cancelled run is not an error: it is reported as `None` by
/// [`Filter::run`](crate::Filter::run).
///
/// Uses custom `Serialize`/`Deserialize` through a proxy so the error can
/// cross a worker boundary as JSON.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum EngineError {
    /// A filter parameter is out of range.
    #[error("invalid filter configuration: {0}")]
    InvalidConfig(String),

    /// A pixel buffer would have a zero dimension, is too large to
    /// allocate, or its raw data does not match the requested size.
    #[error("invalid image dimensions {width}x{height}")]
    InvalidDimensions {
        /// Requested width.
        width: u32,
        /// Requested height.
        height: u32,
    },

    /// An operation needs a loaded image and there is none.
    #[error("no image is loaded")]
    NoImage,

    /// Undo was requested with an empty previous-image slot.
    #[error("nothing to undo")]
    NothingToUndo,

    /// Repeat was requested before any filter completed.
    #[error("no filter has been applied yet")]
    NoPreviousFilter,

    /// A run was requested while a previous one is still outstanding.
    #[error("a filter run is already in progress")]
    WorkerBusy,

    /// The worker thread stopped without delivering a result.
    #[error("filter worker exited without a result")]
    WorkerDisconnected,

    /// Waited on a worker that has no run in flight.
    #[error("no filter run is in progress")]
    WorkerIdle,
}

/// Serde-compatible proxy for [`EngineError`].
#[derive(Serialize, Deserialize)]
enum EngineErrorProxy {
    InvalidConfig(String),
    InvalidDimensions { width: u32, height: u32 },
    NoImage,
    NothingToUndo,
    NoPreviousFilter,
    WorkerBusy,
    WorkerDisconnected,
    WorkerIdle,
}

impl Serialize for EngineError {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let proxy = match self {
            Self::InvalidConfig(s) => EngineErrorProxy::InvalidConfig(s.clone()),
            Self::InvalidDimensions { width, height } => EngineErrorProxy::InvalidDimensions {
                width: *width,
                height: *height,
            },
            Self::NoImage => EngineErrorProxy::NoImage,
            Self::NothingToUndo => EngineErrorProxy::NothingToUndo,
            Self::NoPreviousFilter => EngineErrorProxy::NoPreviousFilter,
            Self::WorkerBusy => EngineErrorProxy::WorkerBusy,
            Self::WorkerDisconnected => EngineErrorProxy::WorkerDisconnected,
            Self::WorkerIdle => EngineErrorProxy::WorkerIdle,
        };
        proxy.serialize(serializer)
    }
}

impl<'de> Deserialize<'de> for EngineError {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let proxy = EngineErrorProxy::deserialize(deserializer)?;
        Ok(match proxy {
            EngineErrorProxy::InvalidConfig(s) => Self::InvalidConfig(s),
            EngineErrorProxy::InvalidDimensions { width, height } => {
                Self::InvalidDimensions { width, height }
            }
            EngineErrorProxy::NoImage => Self::NoImage,
            EngineErrorProxy::NothingToUndo => Self::NothingToUndo,
            EngineErrorProxy::NoPreviousFilter => Self::NoPreviousFilter,
            EngineErrorProxy::WorkerBusy => Self::WorkerBusy,
            EngineErrorProxy::WorkerDisconnected => Self::WorkerDisconnected,
            EngineErrorProxy::WorkerIdle => Self::WorkerIdle,
        })
    }
}
