//! Pure Rust image processing backend.
//!
//! ## Crate mapping
//!
//! | Operation | Crate / function |
//! |---|---|
//! | Identify | `image::ImageReader::into_dimensions` (header only) |
//! | Decode (JPEG, PNG, WebP) | `image` crate (pure Rust decoders) |
//! | Persist | `DynamicImage::save_with_format` → PNG |
//! | Resize | `DynamicImage::resize_exact` with `Lanczos3` filter |
//! | Mosaic | `image::imageops::overlay` onto an RGBA canvas |
//! | Encode → JPEG | `image::codecs::jpeg::JpegEncoder` |

use super::backend::{BackendError, ImageBackend};
use super::calculations::calculate_mosaic_extent;
use super::params::{MosaicParams, Quality, ResizeParams};
use crate::types::ImageDimensions;
use image::codecs::jpeg::JpegEncoder;
use image::imageops::FilterType;
use image::{DynamicImage, ImageFormat, ImageReader, Rgba, RgbaImage};
use std::io::Cursor;
use std::path::Path;

/// Fill for canvas area a mosaic grows into beyond the base image.
const CANVAS_BACKGROUND: Rgba<u8> = Rgba([255, 255, 255, 255]);

/// Pure Rust backend using the `image` crate ecosystem.
///
/// See the [module docs](self) for the crate-to-operation mapping.
pub struct RustBackend;

impl RustBackend {
    pub fn new() -> Self {
        Self
    }
}

impl Default for RustBackend {
    fn default() -> Self {
        Self::new()
    }
}

/// Load and decode an image from disk.
fn load_image(path: &Path) -> Result<DynamicImage, BackendError> {
    ImageReader::open(path)
        .map_err(BackendError::Io)?
        .with_guessed_format()
        .map_err(BackendError::Io)?
        .decode()
        .map_err(|e| {
            BackendError::ProcessingFailed(format!("Failed to decode {}: {}", path.display(), e))
        })
}

fn save_png(img: &DynamicImage, path: &Path) -> Result<(), BackendError> {
    img.save_with_format(path, ImageFormat::Png).map_err(|e| {
        BackendError::ProcessingFailed(format!("Failed to write {}: {}", path.display(), e))
    })
}

fn encode_jpeg(canvas: RgbaImage, quality: Quality) -> Result<Vec<u8>, BackendError> {
    // JPEG has no alpha channel.
    let rgb = DynamicImage::ImageRgba8(canvas).to_rgb8();
    let mut out = Vec::new();
    let quality = quality.value().clamp(1, 100) as u8;
    let encoder = JpegEncoder::new_with_quality(&mut out, quality);
    DynamicImage::ImageRgb8(rgb)
        .write_with_encoder(encoder)
        .map_err(|e| BackendError::ProcessingFailed(format!("JPEG encode failed: {}", e)))?;
    Ok(out)
}

impl ImageBackend for RustBackend {
    fn identify(&self, data: &[u8]) -> Result<ImageDimensions, BackendError> {
        let (width, height) = ImageReader::new(Cursor::new(data))
            .with_guessed_format()
            .map_err(BackendError::Io)?
            .into_dimensions()
            .map_err(|e| {
                BackendError::ProcessingFailed(format!("Failed to read dimensions: {}", e))
            })?;
        Ok(ImageDimensions { width, height })
    }

    fn persist(&self, data: &[u8], output: &Path) -> Result<(), BackendError> {
        let img = image::load_from_memory(data).map_err(|e| {
            BackendError::ProcessingFailed(format!("Failed to decode base image: {}", e))
        })?;
        save_png(&img, output)
    }

    fn resize(&self, params: &ResizeParams) -> Result<(), BackendError> {
        if params.width == 0 || params.height == 0 {
            return Err(BackendError::ProcessingFailed(format!(
                "Invalid target size {}x{}",
                params.width, params.height
            )));
        }
        let img = load_image(&params.source)?;
        let resized = img.resize_exact(params.width, params.height, FilterType::Lanczos3);
        save_png(&resized, &params.output)
    }

    fn mosaic(&self, params: &MosaicParams) -> Result<Vec<u8>, BackendError> {
        if params.layers.is_empty() {
            return Err(BackendError::ProcessingFailed(
                "Mosaic needs at least a base layer".into(),
            ));
        }

        let mut decoded = Vec::with_capacity(params.layers.len());
        for layer in &params.layers {
            decoded.push((layer.x, layer.y, load_image(&layer.path)?.to_rgba8()));
        }

        let extents: Vec<(i64, i64, u32, u32)> = decoded
            .iter()
            .map(|(x, y, img)| (*x, *y, img.width(), img.height()))
            .collect();
        let (width, height) = calculate_mosaic_extent(&extents);

        let mut canvas = RgbaImage::from_pixel(width, height, CANVAS_BACKGROUND);
        for (x, y, img) in &decoded {
            image::imageops::overlay(&mut canvas, img, *x, *y);
        }

        encode_jpeg(canvas, params.quality)
    }
}
