//! High-level image operations.
//!
//! These functions combine calculations with backend execution: they decide
//! which rasters to produce, allocate scratch files for them through the
//! caller's [`ResourceTracker`], and hand the pixel work to the backend.

use super::assets::{AssetError, EmojiAssets};
use super::backend::{BackendError, ImageBackend};
use super::calculations::{
    GeometryError, OverlayPlacement, calculate_overlay_placement, validate_face_geometry,
};
use super::params::{Layer, MosaicParams, Quality, ResizeParams};
use crate::scratch::ResourceTracker;
use crate::types::{Emotion, FaceGeometry, ImageDimensions, ImageKey};
use std::fmt;
use std::path::PathBuf;
use thiserror::Error;

/// Which step of a composition failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompositionStage {
    /// Measuring or persisting the base image.
    Base,
    /// Preparing the overlay for the face at this index (detection order).
    Face(usize),
    /// Flattening the layer stack.
    Mosaic,
}

impl fmt::Display for CompositionStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CompositionStage::Base => f.write_str("base"),
            CompositionStage::Face(index) => write!(f, "face {index}"),
            CompositionStage::Mosaic => f.write_str("mosaic"),
        }
    }
}

#[derive(Error, Debug)]
pub enum CompositionFailure {
    #[error(transparent)]
    Backend(#[from] BackendError),
    #[error(transparent)]
    Asset(#[from] AssetError),
    #[error(transparent)]
    Geometry(#[from] GeometryError),
    #[error("scratch file: {0}")]
    Scratch(#[from] std::io::Error),
}

#[derive(Error, Debug)]
#[error("Composition of {key} failed at {stage}: {source}")]
pub struct CompositionError {
    pub key: ImageKey,
    pub stage: CompositionStage,
    #[source]
    pub source: CompositionFailure,
}

impl CompositionError {
    fn new(key: &str, stage: CompositionStage, source: impl Into<CompositionFailure>) -> Self {
        Self {
            key: key.to_string(),
            stage,
            source: source.into(),
        }
    }
}

/// Configuration for overlay composition.
#[derive(Debug, Clone)]
pub struct ComposeConfig {
    /// Pixels added to each overlay's width and height.
    pub padding: u32,
    pub quality: Quality,
}

impl Default for ComposeConfig {
    fn default() -> Self {
        Self {
            padding: 10,
            quality: Quality::default(),
        }
    }
}

/// Encoded output of one composition.
#[derive(Debug, Clone)]
pub struct ComposedImage {
    /// JPEG bytes.
    pub bytes: Vec<u8>,
    pub dimensions: ImageDimensions,
    pub placements: Vec<OverlayPlacement>,
}

/// Get image dimensions from encoded bytes using the backend.
pub fn get_dimensions(backend: &impl ImageBackend, data: &[u8]) -> Result<ImageDimensions, BackendError> {
    backend.identify(data)
}

/// Plan every overlay without executing anything. Order follows `faces`.
pub fn plan_overlays(
    faces: &[(FaceGeometry, Emotion)],
    dims: ImageDimensions,
    padding: u32,
) -> Vec<OverlayPlacement> {
    faces
        .iter()
        .map(|(geometry, emotion)| calculate_overlay_placement(geometry, *emotion, dims, padding))
        .collect()
}

/// Resize the emoji for `emotion` to exactly `width × height` into a new
/// scratch file owned by `tracker`.
pub fn resize_emoji(
    backend: &impl ImageBackend,
    assets: &EmojiAssets,
    tracker: &mut ResourceTracker,
    emotion: Emotion,
    width: i64,
    height: i64,
) -> Result<PathBuf, CompositionFailure> {
    let resize_error = |reason: String| AssetError::Resize {
        emotion,
        width,
        height,
        reason,
    };

    let (Ok(w), Ok(h)) = (u32::try_from(width), u32::try_from(height)) else {
        return Err(resize_error("dimensions out of range".into()).into());
    };
    if w == 0 || h == 0 {
        return Err(resize_error("dimensions must be positive".into()).into());
    }

    let source = assets.path_for(emotion)?;
    let output = tracker.allocate(".png")?;

    backend
        .resize(&ResizeParams {
            source,
            output: output.clone(),
            width: w,
            height: h,
        })
        .map_err(|e| resize_error(e.to_string()))?;

    Ok(output)
}

/// Composite one emoji over each face of `base` and encode the result.
///
/// Steps run strictly in order: measure, check every face box, persist the
/// base, resize each face's emoji in detection order, then flatten all
/// layers in a single mosaic pass. Later faces paint over earlier ones where they overlap.
/// Every scratch file lands in `tracker`; releasing it is the caller's job.
pub fn compose(
    backend: &impl ImageBackend,
    assets: &EmojiAssets,
    tracker: &mut ResourceTracker,
    key: &str,
    base: &[u8],
    faces: &[(FaceGeometry, Emotion)],
    config: &ComposeConfig,
) -> Result<ComposedImage, CompositionError> {
    use CompositionStage::{Base, Face, Mosaic};

    let dimensions = get_dimensions(backend, base).map_err(|e| CompositionError::new(key, Base, e))?;

    for (index, (geometry, _)) in faces.iter().enumerate() {
        validate_face_geometry(geometry).map_err(|e| CompositionError::new(key, Face(index), e))?;
    }

    let base_path = tracker
        .allocate(".png")
        .map_err(|e| CompositionError::new(key, Base, e))?;
    backend
        .persist(base, &base_path)
        .map_err(|e| CompositionError::new(key, Base, e))?;

    let placements = plan_overlays(faces, dimensions, config.padding);

    let mut layers = Vec::with_capacity(placements.len() + 1);
    layers.push(Layer {
        path: base_path,
        x: 0,
        y: 0,
    });

    for (index, placement) in placements.iter().enumerate() {
        let path = resize_emoji(
            backend,
            assets,
            tracker,
            placement.emotion,
            placement.pixel_width,
            placement.pixel_height,
        )
        .map_err(|e| CompositionError::new(key, Face(index), e))?;

        let (x, y) = placement.offset();
        layers.push(Layer { path, x, y });
    }

    let bytes = backend
        .mosaic(&MosaicParams {
            layers,
            quality: config.quality,
        })
        .map_err(|e| CompositionError::new(key, Mosaic, e))?;

    Ok(ComposedImage {
        bytes,
        dimensions,
        placements,
    })
}
