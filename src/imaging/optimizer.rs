//! Budgeted JPEG re-encoding
//!
//! Produces a web copy of a source photo that fits a byte budget:
//! - Orientation from EXIF is applied so the pixels match how the photo displays
//! - Transparency is flattened onto white (JPEG has no alpha)
//! - Images already under budget at quality 85 are returned as-is
//! - Larger ones are shrunk so the long edge fits `max_dimension`, then
//!   re-encoded from quality 85 downwards in steps of 5 until they fit or
//!   quality 20 has been tried

use image::codecs::jpeg::JpegEncoder;
use image::imageops::{self, FilterType};
use image::metadata::Orientation;
use image::{DynamicImage, ImageDecoder, ImageReader, Rgb, RgbImage};
use std::path::Path;
use tracing::{debug, info};

use crate::error::OptimizeError;

/// Quality used for the baseline measurement and the first resized attempt
pub const BASELINE_QUALITY: u8 = 85;
/// Lowest quality that is still attempted
pub const MIN_QUALITY: u8 = 20;
pub const QUALITY_STEP: u8 = 5;
pub const DEFAULT_MAX_DIMENSION: u32 = 1200;

/// A finished encoding plus how it was reached
#[derive(Debug, Clone)]
pub struct EncodedImage {
    pub bytes: Vec<u8>,
    pub width: u32,
    pub height: u32,
    pub quality: u8,
    /// Encodes done after resizing (0 when the baseline already fit)
    pub attempts: usize,
}

impl EncodedImage {
    pub fn size_kb(&self) -> f64 {
        self.bytes.len() as f64 / 1024.0
    }
}

/// Re-encodes photos under a byte budget
#[derive(Debug, Clone, Copy)]
pub struct ImageOptimizer {
    max_dimension: u32,
}

impl Default for ImageOptimizer {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_DIMENSION)
    }
}

impl ImageOptimizer {
    pub fn new(max_dimension: u32) -> Self {
        Self {
            max_dimension: max_dimension.max(1),
        }
    }

    pub fn max_dimension(&self) -> u32 {
        self.max_dimension
    }

    /// Load `source` and encode it at or under `max_size_kb` (best effort).
    pub fn optimize(&self, source: &Path, max_size_kb: u64) -> Result<EncodedImage, OptimizeError> {
        info!("Processing {}", source.display());
        let image = load_oriented(source)?;
        self.optimize_image(image, max_size_kb)
    }

    /// Same as [`optimize`](Self::optimize) for an already decoded image
    pub fn optimize_image(&self, image: DynamicImage, max_size_kb: u64) -> Result<EncodedImage, OptimizeError> {
        let budget = max_size_kb.saturating_mul(1024);
        let rgb = flatten_alpha(image);
        let (width, height) = rgb.dimensions();

        let baseline = encode_jpeg(&rgb, BASELINE_QUALITY)?;
        debug!("  Original size: {:.2}KB", baseline.len() as f64 / 1024.0);

        if baseline.len() as u64 <= budget {
            debug!("  Image is already under {}KB, skipping optimization", max_size_kb);
            return Ok(EncodedImage {
                bytes: baseline,
                width,
                height,
                quality: BASELINE_QUALITY,
                attempts: 0,
            });
        }

        let (new_width, new_height) = target_dimensions(width, height, self.max_dimension);
        debug!(
            "  Dimensions: {}x{} -> {}x{} (aspect {:.3})",
            width,
            height,
            new_width,
            new_height,
            width as f64 / height as f64
        );

        let resized = if (new_width, new_height) == (width, height) {
            rgb
        } else {
            imageops::resize(&rgb, new_width, new_height, FilterType::Lanczos3)
        };

        let mut quality = BASELINE_QUALITY;
        let mut attempts = 0;
        loop {
            let bytes = encode_jpeg(&resized, quality)?;
            attempts += 1;
            debug!("  Quality {}: {:.2}KB", quality, bytes.len() as f64 / 1024.0);

            if bytes.len() as u64 <= budget || quality <= MIN_QUALITY {
                debug!("  Final size: {:.2}KB", bytes.len() as f64 / 1024.0);
                return Ok(EncodedImage {
                    bytes,
                    width: new_width,
                    height: new_height,
                    quality,
                    attempts,
                });
            }

            quality -= QUALITY_STEP;
        }
    }
}

/// Dimensions with the longer side capped at `max_dimension`.
///
/// The shorter side keeps the original aspect ratio, truncated to an integer.
/// Images are never upscaled.
pub fn target_dimensions(width: u32, height: u32, max_dimension: u32) -> (u32, u32) {
    let (width64, height64) = (width as u64, height as u64);

    if width > height {
        let new_width = width.min(max_dimension);
        let new_height = (new_width as u64 * height64 / width64).max(1) as u32;
        (new_width, new_height)
    } else {
        let new_height = height.min(max_dimension);
        let new_width = (new_height as u64 * width64 / height64.max(1)).max(1) as u32;
        (new_width, new_height)
    }
}

/// Decode a file and apply its EXIF orientation
fn load_oriented(path: &Path) -> Result<DynamicImage, OptimizeError> {
    let open_error = |source| OptimizeError::Open {
        path: path.to_path_buf(),
        source,
    };
    let decode_error = |source| OptimizeError::Decode {
        path: path.to_path_buf(),
        source,
    };

    let reader = ImageReader::open(path)
        .map_err(open_error)?
        .with_guessed_format()
        .map_err(open_error)?;

    let mut decoder = reader.into_decoder().map_err(decode_error)?;
    // Missing or unreadable orientation metadata just means "as stored"
    let orientation = decoder.orientation().unwrap_or(Orientation::NoTransforms);

    let mut image = DynamicImage::from_decoder(decoder).map_err(decode_error)?;
    image.apply_orientation(orientation);
    Ok(image)
}

/// Drop alpha by compositing onto opaque white
fn flatten_alpha(image: DynamicImage) -> RgbImage {
    if !image.color().has_alpha() {
        return image.into_rgb8();
    }

    debug!("  Flattening {:?} onto white", image.color());
    let rgba = image.into_rgba8();
    RgbImage::from_fn(rgba.width(), rgba.height(), |x, y| {
        let pixel = rgba.get_pixel(x, y);
        let alpha = pixel[3] as u32;
        let blend = |channel: u8| ((channel as u32 * alpha + 255 * (255 - alpha) + 127) / 255) as u8;
        Rgb([blend(pixel[0]), blend(pixel[1]), blend(pixel[2])])
    })
}

fn encode_jpeg(image: &RgbImage, quality: u8) -> Result<Vec<u8>, OptimizeError> {
    let mut bytes = Vec::new();
    JpegEncoder::new_with_quality(&mut bytes, quality)
        .encode_image(image)
        .map_err(|source| OptimizeError::Encode { quality, source })?;
    Ok(bytes)
}
