//! pixfx: apply one raster filter to an image file from the command line.
//!
//! The filter runs on a background worker while a progress line is
//! printed to stderr. The run can be cut short with `--cancel-at` to
//! exercise the cancellation path, and the filter can be applied several
//! times in a row (later passes repeat the first one).
//!
//! # Usage
//!
//! ```text
//! pixfx photo.png -o out.png gaussian-blur --radius 5
//! pixfx photo.png -o out.png --times 3 dot-noise --seed 42
//! pixfx photo.png -o out.png --config-json '{"kind":"bilinear","scale":0.5}'
//! pixfx photo.png --histogram
//! ```

#![allow(clippy::print_stdout, clippy::print_stderr)]

use std::path::PathBuf;
use std::process::ExitCode;

use clap::{ArgAction, Parser, Subcommand};
use image::RgbImage;
use pixfx_engine::convolve::Region;
use pixfx_engine::noise::{DotNoise, GaussianNoise};
use pixfx_engine::overlay::{RandomCircles, RandomLines};
use pixfx_engine::{
    EngineError, FilterConfig, FilterWorker, Histogram, PixelBuffer, RunDiagnostics, Session,
    WorkerEvent,
};
use tracing::debug;
use tracing_subscriber::EnvFilter;

/// Apply a raster filter to an image.
#[derive(Parser)]
#[command(name = "pixfx", version)]
struct Cli {
    /// Path to the input image (PNG, JPEG, BMP, WebP).
    input: PathBuf,

    /// Write the filtered image here. The format follows the extension.
    #[arg(short, long, value_name = "FILE")]
    output: Option<PathBuf>,

    /// Apply the filter this many times.
    #[arg(long, default_value_t = 1, value_parser = clap::builder::RangedU64ValueParser::<u32>::new().range(1..))]
    times: u32,

    /// Undo the last pass before writing.
    #[arg(long)]
    undo: bool,

    /// Cancel each run once it reports at least this percentage.
    #[arg(long, value_name = "PERCENT", value_parser = clap::value_parser!(u8).range(0..=100))]
    cancel_at: Option<u8>,

    /// Print the luma histogram of the final image.
    #[arg(long)]
    histogram: bool,

    /// Print diagnostics and histogram as JSON instead of text.
    #[arg(long)]
    json: bool,

    /// Do not print the progress line.
    #[arg(short, long)]
    quiet: bool,

    /// Log engine events to stderr (-v debug, -vv trace). `RUST_LOG`
    /// takes precedence.
    #[arg(short, long, action = ArgAction::Count)]
    verbose: u8,

    /// Filter as a JSON string.
    ///
    /// When provided, the filter subcommand is ignored. The JSON must be a
    /// valid `FilterConfig` serialization, e.g.
    /// `{"kind":"gaussian-blur","radius":5}`.
    #[arg(long)]
    config_json: Option<String>,

    #[command(subcommand)]
    filter: Option<FilterCommand>,
}

/// Filter selection. Each subcommand maps to one `FilterConfig` kind.
#[derive(Subcommand)]
enum FilterCommand {
    /// 255 minus each channel.
    Invert,
    /// Luma into all three channels.
    Grayscale,
    /// White at or above the threshold luma, black below.
    Binarize {
        #[arg(long, allow_negative_numbers = true, default_value_t = FilterConfig::DEFAULT_THRESHOLD)]
        threshold: i32,
    },
    /// Add a constant to every channel.
    Brightness {
        #[arg(long, allow_negative_numbers = true, default_value_t = FilterConfig::DEFAULT_BRIGHTNESS)]
        amount: i32,
    },
    /// Subtract a constant from every channel.
    Darken {
        #[arg(long, allow_negative_numbers = true, default_value_t = FilterConfig::DEFAULT_BRIGHTNESS)]
        amount: i32,
    },
    /// Stretch channels away from the mean brightness.
    Contrast {
        #[arg(long, allow_negative_numbers = true, default_value_t = FilterConfig::DEFAULT_CONTRAST)]
        amount: f64,
    },
    /// Pull channels toward the mean brightness by 1/amount.
    DecreaseContrast {
        #[arg(long, allow_negative_numbers = true, default_value_t = FilterConfig::DEFAULT_CONTRAST)]
        amount: f64,
    },
    /// Horizontal sine warp.
    Wave,
    /// Salt-and-pepper noise.
    DotNoise {
        #[arg(long, default_value_t = DotNoise::DEFAULT_P_WHITE)]
        p_white: f64,
        #[arg(long, default_value_t = DotNoise::DEFAULT_P_BLACK)]
        p_black: f64,
        /// Fixed seed for reproducible output.
        #[arg(long)]
        seed: Option<u64>,
    },
    /// Additive Gaussian noise.
    GaussianNoise {
        #[arg(long, allow_negative_numbers = true, default_value_t = GaussianNoise::DEFAULT_MEAN)]
        mean: f64,
        #[arg(long, default_value_t = GaussianNoise::DEFAULT_STD_DEV)]
        std_dev: f64,
        /// Fixed seed for reproducible output.
        #[arg(long)]
        seed: Option<u64>,
    },
    /// Box blur over the whole image.
    BoxBlur {
        /// Odd kernel side length.
        #[arg(long, default_value_t = FilterConfig::DEFAULT_APERTURE)]
        aperture: usize,
    },
    /// 9x9 box blur inside a rectangle.
    RegionBoxBlur {
        #[arg(long, value_name = "X,Y,W,H", value_parser = parse_region)]
        region: Region,
    },
    /// Gaussian blur over the whole image.
    GaussianBlur {
        /// Kernel radius, at least 3. Sigma is radius / 3, rounded down.
        #[arg(long, default_value_t = FilterConfig::DEFAULT_RADIUS)]
        radius: usize,
    },
    /// 7x7 Gaussian blur inside a rectangle.
    RegionGaussianBlur {
        #[arg(long, default_value_t = FilterConfig::DEFAULT_SIGMA)]
        sigma: f64,
        #[arg(long, value_name = "X,Y,W,H", value_parser = parse_region)]
        region: Region,
    },
    /// 3x3 sharpen.
    Sharpen {
        #[arg(long, default_value_t = FilterConfig::DEFAULT_SHARPEN)]
        strength: f64,
    },
    /// Random black and white line segments.
    RandomLines {
        #[arg(long, default_value_t = RandomLines::DEFAULT_COUNT)]
        count: u32,
        #[arg(long, default_value_t = RandomLines::DEFAULT_MAX_LENGTH)]
        max_length: u32,
        /// Fixed seed for reproducible output.
        #[arg(long)]
        seed: Option<u64>,
    },
    /// Random circle outlines.
    RandomCircles {
        #[arg(long, default_value_t = RandomCircles::DEFAULT_COUNT)]
        count: u32,
        #[arg(long, default_value_t = RandomCircles::DEFAULT_MAX_RADIUS)]
        max_radius: u32,
        #[arg(long, default_value_t = RandomCircles::DEFAULT_P_WHITE)]
        p_white: f64,
        #[arg(long, default_value_t = RandomCircles::DEFAULT_P_BLACK)]
        p_black: f64,
        /// Fixed seed for reproducible output.
        #[arg(long)]
        seed: Option<u64>,
    },
    /// Enlarge by pixel replication.
    IntegerScale {
        #[arg(long, default_value_t = FilterConfig::DEFAULT_FACTOR)]
        factor: u32,
    },
    /// Resample with nearest-neighbor lookup.
    NearestNeighbor {
        #[arg(long, default_value_t = FilterConfig::DEFAULT_SCALE)]
        scale: f64,
    },
    /// Resample with bilinear interpolation.
    Bilinear {
        #[arg(long, default_value_t = FilterConfig::DEFAULT_SCALE)]
        scale: f64,
    },
}

impl FilterCommand {
    fn into_config(self) -> FilterConfig {
        match self {
            Self::Invert => FilterConfig::Invert,
            Self::Grayscale => FilterConfig::Grayscale,
            Self::Binarize { threshold } => FilterConfig::Binarize { threshold },
            Self::Brightness { amount } => FilterConfig::Brightness { amount },
            Self::Darken { amount } => FilterConfig::Darken { amount },
            Self::Contrast { amount } => FilterConfig::Contrast { amount },
            Self::DecreaseContrast { amount } => FilterConfig::DecreaseContrast { amount },
            Self::Wave => FilterConfig::Wave,
            Self::DotNoise {
                p_white,
                p_black,
                seed,
            } => FilterConfig::DotNoise {
                p_white,
                p_black,
                seed,
            },
            Self::GaussianNoise {
                mean,
                std_dev,
                seed,
            } => FilterConfig::GaussianNoise {
                mean,
                std_dev,
                seed,
            },
            Self::BoxBlur { aperture } => FilterConfig::BoxBlur { aperture },
            Self::RegionBoxBlur { region } => FilterConfig::RegionBoxBlur { region },
            Self::GaussianBlur { radius } => FilterConfig::GaussianBlur { radius },
            Self::RegionGaussianBlur { sigma, region } => {
                FilterConfig::RegionGaussianBlur { sigma, region }
            }
            Self::Sharpen { strength } => FilterConfig::Sharpen { strength },
            Self::RandomLines {
                count,
                max_length,
                seed,
            } => FilterConfig::RandomLines {
                count,
                max_length,
                seed,
            },
            Self::RandomCircles {
                count,
                max_radius,
                p_white,
                p_black,
                seed,
            } => FilterConfig::RandomCircles {
                count,
                max_radius,
                p_white,
                p_black,
                seed,
            },
            Self::IntegerScale { factor } => FilterConfig::IntegerScale { factor },
            Self::NearestNeighbor { scale } => FilterConfig::NearestNeighbor { scale },
            Self::Bilinear { scale } => FilterConfig::Bilinear { scale },
        }
    }
}

/// Parse `x,y,width,height` into a [`Region`].
fn parse_region(s: &str) -> Result<Region, String> {
    let parts: Vec<&str> = s.split(',').map(str::trim).collect();
    let [x, y, width, height] = parts.as_slice() else {
        return Err(format!("region must be x,y,width,height, got: {s}"));
    };
    let field = |name: &str, value: &str| {
        value
            .parse::<u32>()
            .map_err(|_| format!("invalid region {name}: {value}"))
    };
    Region::new(
        field("x", x)?,
        field("y", y)?,
        field("width", width)?,
        field("height", height)?,
    )
    .map_err(|e| e.to_string())
}

/// Pick the filter to run, if any.
///
/// `--config-json` wins over a subcommand.
fn config_from_cli(cli: &mut Cli) -> Result<Option<FilterConfig>, String> {
    if let Some(ref json) = cli.config_json {
        return serde_json::from_str(json)
            .map(Some)
            .map_err(|e| format!("Error parsing --config-json: {e}"));
    }
    Ok(cli.filter.take().map(FilterCommand::into_config))
}

fn init_logging(verbose: u8) {
    let default = match verbose {
        0 => "warn",
        1 => "debug",
        _ => "trace",
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn main() -> ExitCode {
    let mut cli = Cli::parse();
    init_logging(cli.verbose);

    let config = match config_from_cli(&mut cli) {
        Ok(c) => c,
        Err(msg) => {
            eprintln!("{msg}");
            return ExitCode::FAILURE;
        }
    };

    let image = match image::open(&cli.input) {
        Ok(image) => image.to_rgb8(),
        Err(e) => {
            eprintln!("Error reading {}: {e}", cli.input.display());
            return ExitCode::FAILURE;
        }
    };
    let buffer = match PixelBuffer::try_from(&image) {
        Ok(buffer) => buffer,
        Err(e) => {
            eprintln!("Error loading {}: {e}", cli.input.display());
            return ExitCode::FAILURE;
        }
    };
    eprintln!("Image: {} ({})", cli.input.display(), buffer.dimensions());

    let mut session = Session::new();
    session.load(buffer);
    let mut worker = FilterWorker::new();

    if let Some(config) = config {
        eprintln!("Filter: {config:?}");
        for pass in 0..cli.times {
            // Later passes repeat whatever the session last applied.
            let config = if pass == 0 {
                config.clone()
            } else if let Some(last) = session.last_filter() {
                last.clone()
            } else {
                break;
            };
            let diagnostics = match run_pass(&mut worker, &mut session, &config, &cli) {
                Ok(d) => d,
                Err(e) => {
                    eprintln!("Filter error: {e}");
                    return ExitCode::FAILURE;
                }
            };
            if let Err(e) = print_diagnostics(&diagnostics, cli.json) {
                eprintln!("Error serializing diagnostics: {e}");
                return ExitCode::FAILURE;
            }
            if diagnostics.cancelled {
                eprintln!("{} cancelled; image unchanged", diagnostics.filter);
                break;
            }
        }
    }

    if cli.undo
        && let Err(e) = session.undo()
    {
        eprintln!("Undo failed: {e}");
        return ExitCode::FAILURE;
    }

    if cli.histogram {
        match session.histogram() {
            Ok(hist) => {
                if let Err(e) = print_histogram(&hist, cli.json) {
                    eprintln!("Error serializing histogram: {e}");
                    return ExitCode::FAILURE;
                }
            }
            Err(e) => {
                eprintln!("Histogram error: {e}");
                return ExitCode::FAILURE;
            }
        }
    }

    if let Some(ref path) = cli.output
        && let Some(current) = session.current()
    {
        match RgbImage::from(current).save(path) {
            Ok(()) => eprintln!("Written to {} ({})", path.display(), current.dimensions()),
            Err(e) => {
                eprintln!("Error writing {}: {e}", path.display());
                return ExitCode::FAILURE;
            }
        }
    }

    ExitCode::SUCCESS
}

/// Run `config` once on the worker, committing the result to `session`.
fn run_pass(
    worker: &mut FilterWorker,
    session: &mut Session,
    config: &FilterConfig,
    cli: &Cli,
) -> Result<RunDiagnostics, EngineError> {
    let filter = config.build()?;
    let generation = worker.start(filter, session.snapshot()?)?;
    debug!(generation, filter = config.name(), "pass started");
    loop {
        match worker.recv()? {
            WorkerEvent::Progress { percent, .. } => {
                if !cli.quiet {
                    eprint!("\r{}: {percent:>3}%", config.name());
                }
                if let Some(limit) = cli.cancel_at
                    && percent >= limit
                {
                    worker.cancel();
                }
            }
            WorkerEvent::Finished {
                result,
                diagnostics,
                ..
            } => {
                if !cli.quiet {
                    eprintln!();
                }
                if let Some(image) = result {
                    session.commit(config.clone(), image);
                }
                return Ok(diagnostics);
            }
        }
    }
}

fn print_diagnostics(diagnostics: &RunDiagnostics, json: bool) -> Result<(), serde_json::Error> {
    if json {
        println!("{}", serde_json::to_string_pretty(diagnostics)?);
    } else {
        println!("{}", diagnostics.report());
    }
    Ok(())
}

/// Number of luma buckets folded into one row of the text chart.
const CHART_GROUP: usize = 16;
/// Width of the longest bar in the text chart.
const CHART_WIDTH: u32 = 50;

fn print_histogram(hist: &Histogram, json: bool) -> Result<(), serde_json::Error> {
    if json {
        println!("{}", serde_json::to_string_pretty(hist)?);
        return Ok(());
    }

    println!("Histogram ({} pixels)\n{}", hist.total(), "=".repeat(40));
    let ticks: Vec<String> = hist
        .y_ticks(Histogram::DEFAULT_TICKS)
        .iter()
        .map(|t| format!("{t:.2}"))
        .collect();
    println!("Y ticks (%): {}", ticks.join(" "));

    let rows: Vec<f64> = hist
        .percentages()
        .chunks(CHART_GROUP)
        .map(|chunk| chunk.iter().sum())
        .collect();
    let max = rows.iter().copied().fold(0.0, f64::max);
    for (i, pct) in rows.iter().enumerate() {
        let start = i * CHART_GROUP;
        #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
        let len = if max > 0.0 {
            (pct / max * f64::from(CHART_WIDTH)) as usize
        } else {
            0
        };
        println!(
            "{start:>3}-{:>3} {pct:>6.2}% {}",
            start + CHART_GROUP - 1,
            "#".repeat(len)
        );
    }
    Ok(())
}
