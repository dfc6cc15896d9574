//! Shared test utilities for the face-emoji test suite.
//!
//! Provides synthetic raster builders and in-memory stand-ins for the
//! storage and detection collaborators.
//!
//! # Usage
//!
//! ```rust
//! use crate::test_helpers::*;
//!
//! let store = MemoryStore::new().with_object("uploads/a.jpg", jpeg_bytes(64, 48, [10, 20, 30]));
//! let detector = StaticDetector::new().with_faces("uploads/a.jpg", 2);
//!
//! let tmp = TempDir::new().unwrap();
//! let assets = write_emoji_assets(tmp.path());
//! ```

use std::collections::HashMap;
use std::path::Path;
use std::sync::Mutex;

use image::codecs::jpeg::JpegEncoder;
use image::{ExtendedColorType, ImageEncoder, Rgba, RgbaImage};

use crate::detection::{DetectFacesOutput, DetectionError, FaceDetail, FaceDetector};
use crate::imaging::EmojiAssets;
use crate::storage::{ObjectStore, StorageError};
use crate::types::{Emotion, EmotionScore, FaceGeometry};

// =========================================================================
// Synthetic rasters
// =========================================================================

/// Encode a solid-color JPEG in memory.
pub fn jpeg_bytes(width: u32, height: u32, rgb: [u8; 3]) -> Vec<u8> {
    let pixels: Vec<u8> = rgb
        .iter()
        .copied()
        .cycle()
        .take((width * height * 3) as usize)
        .collect();
    let mut out = Vec::new();
    JpegEncoder::new_with_quality(&mut out, 95)
        .write_image(&pixels, width, height, ExtendedColorType::Rgb8)
        .unwrap();
    out
}

/// Write a solid-color RGBA PNG to `path`.
pub fn write_solid_png(path: &Path, width: u32, height: u32, rgba: [u8; 4]) {
    RgbaImage::from_pixel(width, height, Rgba(rgba))
        .save(path)
        .unwrap();
}

/// Write one small opaque PNG per emotion label into `dir`.
pub fn write_emoji_assets(dir: &Path) -> EmojiAssets {
    for (i, emotion) in Emotion::ALL.iter().enumerate() {
        let shade = (i as u8) * 30;
        write_solid_png(
            &dir.join(format!("{emotion}.png")),
            16,
            16,
            [255, shade, 0, 255],
        );
    }
    EmojiAssets::new(dir)
}

// =========================================================================
// Collaborator doubles
// =========================================================================

/// In-memory object store. Keys listed in `fail_downloads` / `fail_uploads`
/// return an IO error.
#[derive(Default)]
pub struct MemoryStore {
    objects: Mutex<HashMap<String, Vec<u8>>>,
    uploads: Mutex<Vec<String>>,
    pub fail_downloads: Vec<String>,
    pub fail_uploads: Vec<String>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_object(self, key: &str, data: Vec<u8>) -> Self {
        self.objects.lock().unwrap().insert(key.to_string(), data);
        self
    }

    pub fn failing_download(mut self, key: &str) -> Self {
        self.fail_downloads.push(key.to_string());
        self
    }

    pub fn failing_upload(mut self, key: &str) -> Self {
        self.fail_uploads.push(key.to_string());
        self
    }

    pub fn get(&self, key: &str) -> Option<Vec<u8>> {
        self.objects.lock().unwrap().get(key).cloned()
    }

    /// Uploaded keys, sorted.
    pub fn uploaded_keys(&self) -> Vec<String> {
        let mut keys = self.uploads.lock().unwrap().clone();
        keys.sort();
        keys
    }

    fn injected(key: &str) -> StorageError {
        StorageError::Io {
            key: key.to_string(),
            source: std::io::Error::other("injected failure"),
        }
    }
}

impl ObjectStore for MemoryStore {
    fn download(&self, key: &str) -> Result<Vec<u8>, StorageError> {
        if self.fail_downloads.iter().any(|k| k == key) {
            return Err(Self::injected(key));
        }
        self.get(key).ok_or_else(|| StorageError::NotFound {
            key: key.to_string(),
        })
    }

    fn upload(&self, key: &str, data: &[u8]) -> Result<(), StorageError> {
        if self.fail_uploads.iter().any(|k| k == key) {
            return Err(Self::injected(key));
        }
        self.objects
            .lock()
            .unwrap()
            .insert(key.to_string(), data.to_vec());
        self.uploads.lock().unwrap().push(key.to_string());
        Ok(())
    }
}

/// Detector with canned responses. Keys without a response are unavailable.
#[derive(Default)]
pub struct StaticDetector {
    responses: HashMap<String, DetectFacesOutput>,
}

impl StaticDetector {
    pub fn new() -> Self {
        Self::default()
    }

    /// `count` faces laid out left to right, alternating happy and sad.
    pub fn with_faces(self, key: &str, count: usize) -> Self {
        let faces = (0..count)
            .map(|i| {
                let kind = if i % 2 == 0 { "HAPPY" } else { "SAD" };
                face_detail(0.1 + 0.2 * i as f64, 0.1, 0.2, 0.25, kind)
            })
            .collect();
        self.with_response(key, faces)
    }

    pub fn with_response(mut self, key: &str, faces: Vec<FaceDetail>) -> Self {
        self.responses.insert(
            key.to_string(),
            DetectFacesOutput {
                face_details: faces,
            },
        );
        self
    }
}

impl FaceDetector for StaticDetector {
    fn detect_faces(&self, key: &str) -> Result<DetectFacesOutput, DetectionError> {
        self.responses
            .get(key)
            .cloned()
            .ok_or_else(|| DetectionError::Unavailable {
                key: key.to_string(),
                source: std::io::Error::new(std::io::ErrorKind::NotFound, "no canned response"),
            })
    }
}

/// A face with a single emotion at 90% confidence.
pub fn face_detail(left: f64, top: f64, width: f64, height: f64, kind: &str) -> FaceDetail {
    FaceDetail {
        bounding_box: FaceGeometry {
            width,
            height,
            left,
            top,
        },
        emotions: Some(vec![EmotionScore {
            kind: kind.to_string(),
            confidence: 90.0,
        }]),
        confidence: Some(99.0),
    }
}
