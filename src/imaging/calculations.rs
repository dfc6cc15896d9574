//! Pure calculation functions for overlay geometry.
//!
//! All functions here are pure and testable without any I/O or images.

use crate::types::{Emotion, FaceGeometry, ImageDimensions};
use serde::Serialize;
use thiserror::Error;

/// Accepted range for every face box fraction. Detectors report boxes that
/// hang slightly off the frame; anything beyond this is not a real face.
pub const FACE_BOX_RANGE: std::ops::RangeInclusive<f64> = -1.0..=2.0;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum GeometryError {
    #[error("face box {field} is not a finite number")]
    NonFinite { field: &'static str },
    #[error("face box {field} = {value} is outside [-1, 2]")]
    OutOfRange { field: &'static str, value: f64 },
}

/// Pixel geometry of one emoji overlay, derived from a face bounding box.
///
/// Width and height are rounded and padded; the position is the raw
/// fractional product and is *not* shifted to center the padding, so the
/// emoji overhangs the face box by `padding` pixels to the right and bottom.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct OverlayPlacement {
    pub emotion: Emotion,
    /// Signed so that a degenerate box surfaces as a resize error rather
    /// than wrapping around.
    pub pixel_width: i64,
    pub pixel_height: i64,
    pub pixel_x: f64,
    pub pixel_y: f64,
}

impl OverlayPlacement {
    /// Canvas offset of the overlay's top-left corner (truncated toward zero).
    pub fn offset(&self) -> (i64, i64) {
        (self.pixel_x as i64, self.pixel_y as i64)
    }
}

/// Map a fractional face box onto an image of the given dimensions.
///
/// # Examples
/// ```
/// # use face_emoji::imaging::calculate_overlay_placement;
/// # use face_emoji::types::{Emotion, FaceGeometry, ImageDimensions};
/// let face = FaceGeometry { left: 0.1, top: 0.2, width: 0.3, height: 0.25 };
/// let dims = ImageDimensions { width: 1000, height: 800 };
/// let p = calculate_overlay_placement(&face, Emotion::Happy, dims, 10);
/// assert_eq!((p.pixel_width, p.pixel_height), (310, 210));
/// assert_eq!(p.offset(), (100, 160));
/// ```
pub fn calculate_overlay_placement(
    face: &FaceGeometry,
    emotion: Emotion,
    dims: ImageDimensions,
    padding: u32,
) -> OverlayPlacement {
    let image_w = dims.width as f64;
    let image_h = dims.height as f64;

    OverlayPlacement {
        emotion,
        pixel_width: ((face.width * image_w).round() as i64).saturating_add(padding as i64),
        pixel_height: ((face.height * image_h).round() as i64).saturating_add(padding as i64),
        pixel_x: face.left * image_w,
        pixel_y: face.top * image_h,
    }
}

/// Reject boxes whose fractions are not finite or lie outside
/// [`FACE_BOX_RANGE`].
pub fn validate_face_geometry(face: &FaceGeometry) -> Result<(), GeometryError> {
    let fields = [
        ("Width", face.width),
        ("Height", face.height),
        ("Left", face.left),
        ("Top", face.top),
    ];
    for (field, value) in fields {
        if !value.is_finite() {
            return Err(GeometryError::NonFinite { field });
        }
        if !FACE_BOX_RANGE.contains(&value) {
            return Err(GeometryError::OutOfRange { field, value });
        }
    }
    Ok(())
}

/// Canvas size of a mosaic: the base extent grown right/down to contain
/// every layer. Parts of a layer at negative offsets are clipped, never
/// grow the canvas.
///
/// Each entry is `(x, y, width, height)`; the first is the base at `(0, 0)`.
pub fn calculate_mosaic_extent(layers: &[(i64, i64, u32, u32)]) -> (u32, u32) {
    let mut width: i64 = 0;
    let mut height: i64 = 0;
    for &(x, y, w, h) in layers {
        width = width.max(x.saturating_add(w as i64));
        height = height.max(y.saturating_add(h as i64));
    }
    (
        width.clamp(0, u32::MAX as i64) as u32,
        height.clamp(0, u32::MAX as i64) as u32,
    )
}
