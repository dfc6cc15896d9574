//! Image processing backend trait and shared types.
//!
//! The [`ImageBackend`] trait defines the four operations the overlay
//! pipeline needs: identify, persist, resize, and mosaic. Geometry lives in
//! [`calculations`](super::calculations) and sequencing in
//! [`operations`](super::operations), so a backend only ever moves pixels.
//!
//! The production implementation is
//! [`RustBackend`](super::rust_backend::RustBackend), built on the `image`
//! crate.

use super::params::{MosaicParams, ResizeParams};
use crate::types::ImageDimensions;
use std::path::Path;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum BackendError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Processing failed: {0}")]
    ProcessingFailed(String),
}

/// Trait for image processing backends.
///
/// The layering operations work on paths rather than in-memory buffers:
/// every intermediate raster is a file the caller allocated (and will
/// delete). Implementations must never create files of their own.
pub trait ImageBackend: Sync {
    /// Read dimensions from encoded bytes, from the header where the format allows.
    fn identify(&self, data: &[u8]) -> Result<ImageDimensions, BackendError>;

    /// Decode `data` and write it losslessly to `output`.
    fn persist(&self, data: &[u8], output: &Path) -> Result<(), BackendError>;

    /// Scale `source` to exactly `width × height` and write it to `output`.
    fn resize(&self, params: &ResizeParams) -> Result<(), BackendError>;

    /// Flatten all layers in one pass and return the encoded JPEG.
    fn mosaic(&self, params: &MosaicParams) -> Result<Vec<u8>, BackendError>;
}
