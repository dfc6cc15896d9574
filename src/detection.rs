//! Face/emotion detection collaborator.
//!
//! Response types mirror the Rekognition `DetectFaces` JSON shape with all
//! attributes requested; only the fields the overlay needs are modeled and
//! everything else is ignored on deserialization.
//!
//! Images in which no face was found are dropped from the batch here, not
//! reported as errors: a photo without faces simply has nothing to cover.

use crate::types::{Emotion, EmotionScore, FaceGeometry, ImageKey};
use serde::{Deserialize, Serialize};
use std::io;
use std::path::PathBuf;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum DetectionError {
    #[error("Detection unavailable for {key}: {source}")]
    Unavailable {
        key: String,
        #[source]
        source: io::Error,
    },
    #[error("Malformed detection response for {key}: {source}")]
    Malformed {
        key: String,
        #[source]
        source: serde_json::Error,
    },
}

/// One detected face.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct FaceDetail {
    pub bounding_box: FaceGeometry,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub emotions: Option<Vec<EmotionScore>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub confidence: Option<f64>,
}

impl FaceDetail {
    pub fn emotion(&self) -> Emotion {
        Emotion::dominant(self.emotions.as_deref())
    }
}

/// Detection result for one image.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct DetectFacesOutput {
    #[serde(default)]
    pub face_details: Vec<FaceDetail>,
}

/// An image with at least one detected face, ready for compositing.
#[derive(Debug, Clone, PartialEq)]
pub struct DetectedImage {
    pub key: ImageKey,
    pub faces: Vec<FaceDetail>,
}

impl DetectedImage {
    /// `(geometry, emotion)` pairs in detection order.
    pub fn overlays(&self) -> Vec<(FaceGeometry, Emotion)> {
        self.faces
            .iter()
            .map(|f| (f.bounding_box, f.emotion()))
            .collect()
    }
}

pub trait FaceDetector: Sync {
    fn detect_faces(&self, key: &str) -> Result<DetectFacesOutput, DetectionError>;
}

/// Run detection for each key in order, keeping only images with faces.
///
/// The first detection failure aborts the whole batch.
pub fn detect_faces_on_images(
    detector: &impl FaceDetector,
    keys: &[ImageKey],
) -> Result<Vec<DetectedImage>, DetectionError> {
    let mut detected = Vec::new();
    for key in keys {
        let output = detector.detect_faces(key)?;
        if !output.face_details.is_empty() {
            detected.push(DetectedImage {
                key: key.clone(),
                faces: output.face_details,
            });
        }
    }
    Ok(detected)
}

/// Reads previously saved detection responses from `<root>/<key>.faces.json`.
#[derive(Debug, Clone)]
pub struct SidecarDetector {
    root: PathBuf,
}

impl SidecarDetector {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn sidecar_path(&self, key: &str) -> PathBuf {
        self.root.join(format!("{key}.faces.json"))
    }
}

impl FaceDetector for SidecarDetector {
    fn detect_faces(&self, key: &str) -> Result<DetectFacesOutput, DetectionError> {
        let content = std::fs::read_to_string(self.sidecar_path(key)).map_err(|source| {
            DetectionError::Unavailable {
                key: key.to_string(),
                source,
            }
        })?;
        serde_json::from_str(&content).map_err(|source| DetectionError::Malformed {
            key: key.to_string(),
            source,
        })
    }
}
