//! Adaptive image compression
//!
//! Fits an arbitrary source image under a platform's byte budget. Each attempt
//! re-encodes the image; misses lower the encoder quality, and every fifth miss
//! shrinks the image by 20% instead and starts the quality over. The loop is
//! bounded by the budget's attempt ceiling and by a minimum edge length.
//!
//! # Examples
//!
//! ```no_run
//! use libcrosspost::compress::compress_file;
//! use libcrosspost::types::Platform;
//!
//! # fn example() {
//! let budget = Platform::Bluesky.limits().image_budget.unwrap();
//! match compress_file(std::path::Path::new("photo.png"), &budget) {
//!     Ok(image) => println!("{} bytes as {}", image.bytes.len(), image.format.mime_type()),
//!     Err(failure) => eprintln!("{}", failure),
//! }
//! # }
//! ```

use std::io::Cursor;
use std::path::{Path, PathBuf};

use image::codecs::jpeg::JpegEncoder;
use image::codecs::png::{CompressionType, FilterType as PngFilter, PngEncoder};
use image::imageops::FilterType;
use image::{DynamicImage, GenericImageView, ImageFormat};
use tracing::debug;

use crate::error::CompressionFailure;
use crate::types::ImageBudget;

/// Encoder quality every size class starts from
pub const INITIAL_QUALITY: u8 = 85;

/// Quality is never lowered past this
pub const MIN_QUALITY: u8 = 30;

/// Quality lost per miss between shrinks
pub const QUALITY_STEP: u8 = 10;

/// Every this many attempts the image is shrunk instead
pub const SHRINK_INTERVAL: u32 = 5;

pub type CompressionOutcome = std::result::Result<CompressedImage, CompressionFailure>;

/// Encodings the compressor can produce
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputFormat {
    Jpeg,
    Png,
}

impl OutputFormat {
    /// JPEG and PNG sources keep their format, everything else becomes JPEG
    pub fn for_source(source: Option<ImageFormat>) -> Self {
        match source {
            Some(ImageFormat::Png) => OutputFormat::Png,
            _ => OutputFormat::Jpeg,
        }
    }

    pub fn mime_type(&self) -> &'static str {
        match self {
            OutputFormat::Jpeg => "image/jpeg",
            OutputFormat::Png => "image/png",
        }
    }
}

/// A successfully compressed image
#[derive(Debug, Clone)]
pub struct CompressedImage {
    pub bytes: Vec<u8>,
    pub format: OutputFormat,
    pub width: u32,
    pub height: u32,
    /// Number of encodes it took
    pub attempts: u32,
}

/// What to change after an attempt came out too large
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Adjustment {
    /// Try again at the given quality
    LowerQuality(u8),
    /// Shrink the image, quality goes back to [`INITIAL_QUALITY`]
    Shrink,
}

/// Quality/shrink schedule for one compression run
///
/// Pure bookkeeping, no pixels involved.
#[derive(Debug, Clone)]
pub struct CompressionSchedule {
    quality: u8,
    attempt: u32,
    max_attempts: u32,
}

impl CompressionSchedule {
    pub fn new(max_attempts: u32) -> Self {
        Self {
            quality: INITIAL_QUALITY,
            attempt: 0,
            max_attempts,
        }
    }

    /// Start the next attempt, `None` once the ceiling is reached
    pub fn next_attempt(&mut self) -> Option<u32> {
        if self.attempt >= self.max_attempts {
            return None;
        }
        self.attempt += 1;
        Some(self.attempt)
    }

    pub fn quality(&self) -> u8 {
        self.quality
    }

    pub fn attempt(&self) -> u32 {
        self.attempt
    }

    /// Record that the current attempt missed the budget
    pub fn miss(&mut self) -> Adjustment {
        if self.attempt % SHRINK_INTERVAL == 0 {
            self.quality = INITIAL_QUALITY;
            Adjustment::Shrink
        } else {
            self.quality = lower_quality(self.quality);
            Adjustment::LowerQuality(self.quality)
        }
    }
}

/// One quality step down, clamped at [`MIN_QUALITY`]
pub fn lower_quality(quality: u8) -> u8 {
    quality.saturating_sub(QUALITY_STEP).max(MIN_QUALITY)
}

/// Both edges scaled by 0.8, rounded down, never below 1 px
pub fn shrink_dimensions(width: u32, height: u32) -> (u32, u32) {
    let scale = |edge: u32| ((u64::from(edge) * 4 / 5) as u32).max(1);
    (scale(width), scale(height))
}

/// Compress encoded image bytes to fit `budget`
///
/// `source_name` only appears in the failure message.
pub fn compress(image_bytes: &[u8], source_name: &str, budget: &ImageBudget) -> CompressionOutcome {
    let source_format = image::guess_format(image_bytes).ok();
    let image = image::load_from_memory(image_bytes)
        .map_err(|e| CompressionFailure::new(format!("failed to decode {}: {}", source_name, e)))?;

    let format = OutputFormat::for_source(source_format);
    compress_image_with(image, format, source_name, budget, encode)
}

/// Read `path` and compress it to fit `budget`
pub fn compress_file(path: &Path, budget: &ImageBudget) -> CompressionOutcome {
    let source_name = file_name(path);
    let bytes = std::fs::read(path)
        .map_err(|e| CompressionFailure::new(format!("failed to read {}: {}", source_name, e)))?;
    compress(&bytes, &source_name, budget)
}

/// [`compress_file`] on the blocking thread pool
pub async fn compress_file_blocking(path: PathBuf, budget: ImageBudget) -> CompressionOutcome {
    tokio::task::spawn_blocking(move || compress_file(&path, &budget))
        .await
        .map_err(|e| CompressionFailure::new(format!("compression task failed: {}", e)))?
}

/// The attempt loop, with the encoder injected
pub(crate) fn compress_image_with<E>(
    mut image: DynamicImage,
    format: OutputFormat,
    source_name: &str,
    budget: &ImageBudget,
    mut encoder: E,
) -> CompressionOutcome
where
    E: FnMut(&DynamicImage, OutputFormat, u8) -> std::result::Result<Vec<u8>, String>,
{
    let mut schedule = CompressionSchedule::new(budget.max_attempts);

    while let Some(attempt) = schedule.next_attempt() {
        let quality = schedule.quality();
        let bytes = encoder(&image, format, quality).map_err(CompressionFailure::new)?;
        let (width, height) = image.dimensions();

        debug!(
            "Compression attempt {} for {}: {}x{} at quality {} -> {} bytes (budget {})",
            attempt,
            source_name,
            width,
            height,
            quality,
            bytes.len(),
            budget.max_byte_size
        );

        if bytes.len() <= budget.max_byte_size {
            return Ok(CompressedImage {
                bytes,
                format,
                width,
                height,
                attempts: attempt,
            });
        }

        if schedule.miss() == Adjustment::Shrink {
            if width < budget.min_pixel_dimension || height < budget.min_pixel_dimension {
                debug!("{} is already below the minimum edge, giving up", source_name);
                break;
            }
            let (new_width, new_height) = shrink_dimensions(width, height);
            image = image.resize_exact(new_width, new_height, FilterType::CatmullRom);
        }
    }

    Err(CompressionFailure::new(format!(
        "image could not be reduced below {}KB: {}",
        budget.max_byte_size / 1024,
        source_name
    )))
}

fn encode(
    image: &DynamicImage,
    format: OutputFormat,
    quality: u8,
) -> std::result::Result<Vec<u8>, String> {
    let mut buffer = Cursor::new(Vec::new());

    match format {
        OutputFormat::Jpeg => {
            // JPEG has no alpha channel
            let rgb = DynamicImage::ImageRgb8(image.to_rgb8());
            let encoder = JpegEncoder::new_with_quality(&mut buffer, quality);
            rgb.write_with_encoder(encoder)
        }
        OutputFormat::Png => {
            let encoder =
                PngEncoder::new_with_quality(&mut buffer, CompressionType::Best, PngFilter::Adaptive);
            image.write_with_encoder(encoder)
        }
    }
    .map_err(|e| format!("failed to encode image: {}", e))?;

    Ok(buffer.into_inner())
}

fn file_name(path: &Path) -> String {
    path.file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string())
}
