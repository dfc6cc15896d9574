//! Shared types passed between event decoding, detection, and compositing.
//!
//! Detection responses arrive as Rekognition-style PascalCase JSON, so the
//! wire-facing structs here carry serde renames. Everything downstream of
//! detection works with [`FaceGeometry`] and [`Emotion`] only.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Opaque name of one object in the store (e.g. `uploads/team/photo.jpg`).
pub type ImageKey = String;

/// Width and height of a raster in pixels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImageDimensions {
    pub width: u32,
    pub height: u32,
}

/// Face bounding box as fractions of the image's width/height.
///
/// Values are nominally in `[0, 1]` but the detector may report boxes that
/// hang slightly off the edge of the frame. Compositing accepts fractions
/// within `[-1, 2]` and rejects the face otherwise. All four fields are
/// required.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct FaceGeometry {
    pub width: f64,
    pub height: f64,
    pub left: f64,
    pub top: f64,
}

/// One entry of a face's emotion-confidence list.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct EmotionScore {
    #[serde(rename = "Type")]
    pub kind: String,
    pub confidence: f64,
}

/// Emotion label; each one maps to exactly one bundled emoji raster.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Emotion {
    Happy,
    Sad,
    Angry,
    Confused,
    Disgusted,
    Surprised,
    Calm,
    Unknown,
}

impl Emotion {
    pub const ALL: [Emotion; 8] = [
        Emotion::Happy,
        Emotion::Sad,
        Emotion::Angry,
        Emotion::Confused,
        Emotion::Disgusted,
        Emotion::Surprised,
        Emotion::Calm,
        Emotion::Unknown,
    ];

    /// Lowercase label, also the asset file stem.
    pub fn as_str(self) -> &'static str {
        match self {
            Emotion::Happy => "happy",
            Emotion::Sad => "sad",
            Emotion::Angry => "angry",
            Emotion::Confused => "confused",
            Emotion::Disgusted => "disgusted",
            Emotion::Surprised => "surprised",
            Emotion::Calm => "calm",
            Emotion::Unknown => "unknown",
        }
    }

    /// Map a detector type string (`"HAPPY"`, `"SAD"`, ...) to a label.
    ///
    /// Anything unrecognized, including the detector's own `"UNKNOWN"` and
    /// types added after this list was written, maps to [`Emotion::Unknown`].
    pub fn from_detector_type(kind: &str) -> Self {
        match kind {
            "HAPPY" => Emotion::Happy,
            "SAD" => Emotion::Sad,
            "ANGRY" => Emotion::Angry,
            "CONFUSED" => Emotion::Confused,
            "DISGUSTED" => Emotion::Disgusted,
            "SURPRISED" => Emotion::Surprised,
            "CALM" => Emotion::Calm,
            _ => Emotion::Unknown,
        }
    }

    /// Pick the highest-confidence entry. Ties keep the earliest entry.
    pub fn dominant(scores: Option<&[EmotionScore]>) -> Self {
        let Some(scores) = scores else {
            return Emotion::Unknown;
        };
        let mut best: Option<&EmotionScore> = None;
        for score in scores {
            match best {
                Some(b) if b.confidence >= score.confidence => {}
                _ => best = Some(score),
            }
        }
        best.map(|s| Self::from_detector_type(&s.kind))
            .unwrap_or(Emotion::Unknown)
    }
}

impl fmt::Display for Emotion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Final file name component of a key (`a/b/c.jpg` → `c.jpg`).
pub fn basename(key: &str) -> &str {
    key.rsplit('/').next().unwrap_or(key)
}

/// Lowercased extension of the key's basename, without the dot.
pub fn extension(key: &str) -> Option<String> {
    let name = basename(key);
    match name.rfind('.') {
        // A leading dot is a hidden file name, not an extension.
        Some(0) | None => None,
        Some(i) => Some(name[i + 1..].to_ascii_lowercase()),
    }
}
