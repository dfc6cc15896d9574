//! Face-overlay compositing.
//!
//! | Operation | Crate / function |
//! |---|---|
//! | **Identify** | `image::ImageReader::into_dimensions` |
//! | **Resize emoji** | `resize_exact` (Lanczos3), aspect ratio not kept |
//! | **Mosaic** | `imageops::overlay` in layer order, one pass |
//! | **Encode** | JPEG via `JpegEncoder` |
//!
//! The module is split into:
//! - **Calculations**: Pure functions for overlay geometry (unit testable)
//! - **Parameters**: Data structures describing image operations
//! - **Assets**: Emoji raster lookup per emotion label
//! - **Backend**: [`ImageBackend`] trait + [`RustBackend`]
//! - **Operations**: High-level functions combining calculations + backend

mod assets;
pub mod backend;
mod calculations;
pub mod operations;
mod params;
pub mod rust_backend;

pub use assets::{AssetError, EmojiAssets};
pub use backend::{BackendError, ImageBackend};
pub use calculations::{
    FACE_BOX_RANGE, GeometryError, OverlayPlacement, calculate_mosaic_extent,
    calculate_overlay_placement, validate_face_geometry,
};
pub use operations::{
    ComposeConfig, ComposedImage, CompositionError, CompositionFailure, CompositionStage, compose,
    get_dimensions, plan_overlays, resize_emoji,
};
pub use params::{Layer, MosaicParams, Quality, ResizeParams};
pub use rust_backend::RustBackend;
