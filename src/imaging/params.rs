//! Parameter types for image operations.
//!
//! These structs describe *what* to do, not *how* to do it. They are the
//! interface between the high-level [`operations`](super::operations) module
//! (which decides which rasters to produce) and the [`backend`](super::backend)
//! (which does the actual pixel work). This separation allows swapping backends
//! (e.g. for testing with a mock) without changing the geometry logic.
//!
//! ## Types
//!
//! - [`Quality`]: JPEG encoding quality (1–100, default 90). Clamped on construction.
//! - [`ResizeParams`]: Source raster, output path, and exact target dimensions.
//! - [`Layer`]: One positioned raster in a mosaic stack.
//! - [`MosaicParams`]: Ordered layer stack plus output quality.

use std::path::PathBuf;

/// Quality setting for lossy image encoding (1-100).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Quality(u32);

impl Quality {
    pub fn new(value: u32) -> Self {
        Self(value.clamp(1, 100))
    }

    pub fn value(self) -> u32 {
        self.0
    }
}

impl Default for Quality {
    fn default() -> Self {
        Self(90)
    }
}

/// Parameters for an exact (non aspect-preserving) resize.
#[derive(Debug, Clone, PartialEq)]
pub struct ResizeParams {
    pub source: PathBuf,
    pub output: PathBuf,
    pub width: u32,
    pub height: u32,
}

/// A raster placed on the mosaic canvas with its top-left corner at `(x, y)`.
#[derive(Debug, Clone, PartialEq)]
pub struct Layer {
    pub path: PathBuf,
    pub x: i64,
    pub y: i64,
}

/// Parameters for flattening a layer stack into one encoded raster.
///
/// `layers[0]` is the base image at `(0, 0)`; later layers paint over
/// earlier ones.
#[derive(Debug, Clone, PartialEq)]
pub struct MosaicParams {
    pub layers: Vec<Layer>,
    pub quality: Quality,
}
