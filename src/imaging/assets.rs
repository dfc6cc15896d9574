//! Emoji source rasters, one PNG per [`Emotion`] label.
//!
//! ```text
//! assets/emoji/
//! ├── angry.png
//! ├── calm.png
//! ├── confused.png
//! ├── disgusted.png
//! ├── happy.png
//! ├── sad.png
//! ├── surprised.png
//! └── unknown.png
//! ```

use crate::types::Emotion;
use std::path::{Path, PathBuf};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum AssetError {
    #[error("Emoji asset for '{emotion}' not found at {}", path.display())]
    AssetLoad { emotion: Emotion, path: PathBuf },
    #[error("Cannot resize '{emotion}' emoji to {width}x{height}: {reason}")]
    Resize {
        emotion: Emotion,
        width: i64,
        height: i64,
        reason: String,
    },
}

/// Directory of emoji rasters named `<label>.png`.
#[derive(Debug, Clone)]
pub struct EmojiAssets {
    dir: PathBuf,
}

impl EmojiAssets {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Source raster for `emotion`, which must exist as a regular file.
    pub fn path_for(&self, emotion: Emotion) -> Result<PathBuf, AssetError> {
        let path = self.dir.join(format!("{}.png", emotion.as_str()));
        if path.is_file() {
            Ok(path)
        } else {
            Err(AssetError::AssetLoad { emotion, path })
        }
    }

    /// Labels with no raster in the directory.
    pub fn missing(&self) -> Vec<Emotion> {
        Emotion::ALL
            .into_iter()
            .filter(|e| self.path_for(*e).is_err())
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn path_for_existing_asset() {
        let tmp = TempDir::new().unwrap();
        std::fs::write(tmp.path().join("happy.png"), b"png").unwrap();

        let assets = EmojiAssets::new(tmp.path());
        let path = assets.path_for(Emotion::Happy).unwrap();
        assert_eq!(path, tmp.path().join("happy.png"));
    }

    #[test]
    fn path_for_missing_asset_is_load_error() {
        let tmp = TempDir::new().unwrap();
        let assets = EmojiAssets::new(tmp.path());

        let err = assets.path_for(Emotion::Sad).unwrap_err();
        assert!(matches!(
            err,
            AssetError::AssetLoad {
                emotion: Emotion::Sad,
                ..
            }
        ));
    }

    #[test]
    fn missing_lists_absent_labels() {
        let tmp = TempDir::new().unwrap();
        for emotion in Emotion::ALL {
            if emotion != Emotion::Calm {
                std::fs::write(tmp.path().join(format!("{emotion}.png")), b"png").unwrap();
            }
        }

        let assets = EmojiAssets::new(tmp.path());
        assert_eq!(assets.missing(), vec![Emotion::Calm]);
    }

    #[test]
    fn bundled_assets_cover_every_label() {
        let assets = EmojiAssets::new(Path::new(env!("CARGO_MANIFEST_DIR")).join("assets/emoji"));
        assert!(assets.missing().is_empty(), "missing: {:?}", assets.missing());
    }
}
