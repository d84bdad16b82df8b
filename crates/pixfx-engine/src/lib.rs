//! pixfx-engine: raster image filters with progress reporting and
//! cooperative cancellation (sans-IO).
//!
//! Every filter reads an immutable source [`PixelBuffer`] and returns a
//! new one, or `None` if it was cancelled part-way. Filters report
//! monotonically increasing percentages through a [`ProgressReporter`]
//! and poll it for cancellation once per output column.
//!
//! Filter families:
//!
//! - per-pixel color maps ([`color`]): invert, grayscale, binarize, brightness
//! - a sine-wave distortion ([`distort`])
//! - stochastic noise ([`noise`]) and random overlays ([`overlay`])
//! - kernel convolution ([`kernel`], [`convolve`]): box, Gaussian, sharpen,
//!   optionally restricted to a rectangular region
//! - two-phase contrast ([`contrast`])
//! - resampling ([`resample`]): integer pixel replication, nearest
//!   neighbor, bilinear
//!
//! [`FilterConfig`] is the serializable description of any of these.
//! [`Session`] keeps the current/previous image pair and the last filter,
//! and [`FilterWorker`] runs one filter at a time on a background thread.
//!
//! Decoding and encoding image files is left to the caller. A
//! [`PixelBuffer`] converts to and from [`image::RgbImage`].

pub mod color;
pub mod config;
pub mod contrast;
pub mod convolve;
pub mod diagnostics;
pub mod distort;
pub mod filter;
pub mod histogram;
pub mod kernel;
pub mod noise;
pub mod overlay;
pub mod progress;
pub mod resample;
pub mod session;
pub mod types;
pub mod worker;

pub use config::FilterConfig;
pub use diagnostics::{Clock, RunDiagnostics, SystemClock, run_with_diagnostics};
pub use filter::{BoxedFilter, Filter};
pub use histogram::Histogram;
pub use progress::{CancellationToken, NoProgress, Phase, ProgressReporter, Reporter};
pub use session::{Outcome, Session};
pub use types::{Dimensions, EngineError, Pixel, PixelBuffer};
pub use worker::{FilterWorker, WorkerEvent};
