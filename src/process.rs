//! Per-image pipeline and batch fan-out.
//!
//! Every detected image goes through the same strictly sequential steps:
//!
//! ```text
//! download → compose (measure, resize emoji per face, mosaic) → upload → release scratch
//! ```
//!
//! ## Failure Isolation
//!
//! A failure aborts only the image it happened in. [`ImagePipeline::process_all`]
//! lets every image run to completion, then reports the batch as failed if
//! any image failed, listing each failure with its key.
//!
//! ## Scratch Files
//!
//! Each image gets its own [`ResourceTracker`]. It is released after the
//! image's last step whatever the outcome; deletion failures are reported
//! as [`ProcessEvent::CleanupFailed`] and never fail the image.
//!
//! ## Parallel Processing
//!
//! Images are processed in parallel using [rayon](https://docs.rs/rayon) on
//! the global pool. The binary sizes that pool once from
//! [`effective_workers`](crate::config::effective_workers); the bound on
//! in-flight images is therefore the worker count.
//!
//! ## Deadline
//!
//! The whole invocation shares one [`Deadline`]. It is checked before each
//! I/O step of each image; an image that reaches a step after expiry fails
//! with [`PipelineError::DeadlineExceeded`]. Steps already running are not
//! interrupted, so an upload is never cut off halfway.

use crate::config::AppConfig;
use crate::detection::DetectedImage;
use crate::imaging::{
    ComposeConfig, CompositionError, EmojiAssets, ImageBackend, OverlayPlacement, Quality, compose,
};
use crate::scratch::ResourceTracker;
use crate::storage::{ObjectStore, StorageError, processed_key};
use crate::types::{Emotion, FaceGeometry, ImageKey};
use rayon::prelude::*;
use std::fmt;
use std::path::PathBuf;
use std::sync::mpsc::Sender;
use std::time::{Duration, Instant};
use thiserror::Error;

/// Step of the per-image pipeline a deadline check guards.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PipelineStage {
    Download,
    Compose,
    Upload,
}

impl fmt::Display for PipelineStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            PipelineStage::Download => "download",
            PipelineStage::Compose => "compose",
            PipelineStage::Upload => "upload",
        })
    }
}

#[derive(Error, Debug)]
pub enum PipelineError {
    #[error(transparent)]
    Storage(#[from] StorageError),
    #[error(transparent)]
    Composition(#[from] CompositionError),
    #[error("Deadline exceeded for {key} before {stage}")]
    DeadlineExceeded { key: ImageKey, stage: PipelineStage },
}

impl PipelineError {
    /// The image this failure belongs to.
    ///
    /// For storage errors raised by the upload this is the output key.
    pub fn key(&self) -> &str {
        match self {
            PipelineError::Storage(e) => e.key(),
            PipelineError::Composition(e) => &e.key,
            PipelineError::DeadlineExceeded { key, .. } => key,
        }
    }
}

/// One failed image in a batch.
#[derive(Debug)]
pub struct ImageFailure {
    pub key: ImageKey,
    pub error: PipelineError,
}

/// At least one image in the batch failed. Successful siblings were still
/// uploaded and are listed in `processed`.
#[derive(Error, Debug)]
#[error("{}", summarize(.failures, .processed))]
pub struct BatchError {
    pub failures: Vec<ImageFailure>,
    pub processed: Vec<ProcessedImage>,
}

fn summarize(failures: &[ImageFailure], processed: &[ProcessedImage]) -> String {
    let total = failures.len() + processed.len();
    match failures.first() {
        Some(first) => format!(
            "{} of {} images failed (first: {}: {})",
            failures.len(),
            total,
            first.key,
            first.error
        ),
        None => format!("0 of {total} images failed"),
    }
}

impl BatchError {
    pub fn failed_keys(&self) -> Vec<&str> {
        self.failures.iter().map(|f| f.key.as_str()).collect()
    }
}

/// Configuration for the per-image pipeline.
#[derive(Debug, Clone)]
pub struct ProcessConfig {
    pub processed_prefix: String,
    pub compose: ComposeConfig,
    pub scratch_dir: PathBuf,
}

impl ProcessConfig {
    /// Build a ProcessConfig from AppConfig values.
    pub fn from_app_config(config: &AppConfig) -> Self {
        Self {
            processed_prefix: config.processed_prefix.clone(),
            compose: ComposeConfig {
                padding: config.overlay.padding,
                quality: Quality::new(config.output.quality),
            },
            scratch_dir: config.processing.scratch_dir(),
        }
    }
}

impl Default for ProcessConfig {
    fn default() -> Self {
        Self::from_app_config(&AppConfig::default())
    }
}

/// Point in time after which no new pipeline step may start.
#[derive(Debug, Clone, Copy)]
pub struct Deadline {
    expires_at: Option<Instant>,
}

impl Deadline {
    pub fn after(budget: Duration) -> Self {
        Self {
            expires_at: Instant::now().checked_add(budget),
        }
    }

    /// A deadline that never expires.
    pub fn none() -> Self {
        Self { expires_at: None }
    }

    pub fn is_expired(&self) -> bool {
        self.expires_at.is_some_and(|at| Instant::now() >= at)
    }

    fn check(&self, key: &str, stage: PipelineStage) -> Result<(), PipelineError> {
        if self.is_expired() {
            return Err(PipelineError::DeadlineExceeded {
                key: key.to_string(),
                stage,
            });
        }
        Ok(())
    }
}

/// Progress events emitted while processing a batch.
#[derive(Debug, Clone)]
pub enum ProcessEvent {
    BatchStarted {
        count: usize,
    },
    ImageComposited {
        key: ImageKey,
        output_key: String,
        faces: Vec<OverlayPlacement>,
    },
    ImageFailed {
        key: ImageKey,
        error: String,
    },
    CleanupFailed {
        key: ImageKey,
        path: PathBuf,
        error: String,
    },
}

/// A successfully composited and uploaded image.
#[derive(Debug, Clone)]
pub struct ProcessedImage {
    pub key: ImageKey,
    pub output_key: String,
    pub placements: Vec<OverlayPlacement>,
}

/// Result of a batch in which every image succeeded.
#[derive(Debug, Clone, Default)]
pub struct BatchReport {
    pub processed: Vec<ProcessedImage>,
}

/// Runs detected images through download, compositing, and upload.
///
/// Holds only shared references, so one pipeline serves every worker.
pub struct ImagePipeline<'a, B: ImageBackend, S: ObjectStore> {
    backend: &'a B,
    store: &'a S,
    assets: &'a EmojiAssets,
    config: &'a ProcessConfig,
    deadline: Deadline,
    events: Option<Sender<ProcessEvent>>,
}

impl<'a, B: ImageBackend, S: ObjectStore> ImagePipeline<'a, B, S> {
    pub fn new(
        backend: &'a B,
        store: &'a S,
        assets: &'a EmojiAssets,
        config: &'a ProcessConfig,
    ) -> Self {
        Self {
            backend,
            store,
            assets,
            config,
            deadline: Deadline::none(),
            events: None,
        }
    }

    pub fn with_deadline(mut self, deadline: Deadline) -> Self {
        self.deadline = deadline;
        self
    }

    pub fn with_events(mut self, events: Option<Sender<ProcessEvent>>) -> Self {
        self.events = events;
        self
    }

    fn emit(&self, event: ProcessEvent) {
        if let Some(tx) = &self.events {
            // A gone receiver only means nobody is listening.
            tx.send(event).ok();
        }
    }

    /// Process one image end to end. Scratch files are released before
    /// returning, on success and on every failure.
    pub fn process(
        &self,
        key: &str,
        faces: &[(FaceGeometry, Emotion)],
    ) -> Result<ProcessedImage, PipelineError> {
        let mut tracker = ResourceTracker::new(&self.config.scratch_dir);
        let result = self.run(key, faces, &mut tracker);

        for failure in tracker.release_all() {
            self.emit(ProcessEvent::CleanupFailed {
                key: key.to_string(),
                error: failure.source.to_string(),
                path: failure.path,
            });
        }

        match &result {
            Ok(processed) => self.emit(ProcessEvent::ImageComposited {
                key: processed.key.clone(),
                output_key: processed.output_key.clone(),
                faces: processed.placements.clone(),
            }),
            Err(e) => self.emit(ProcessEvent::ImageFailed {
                key: key.to_string(),
                error: e.to_string(),
            }),
        }
        result
    }

    fn run(
        &self,
        key: &str,
        faces: &[(FaceGeometry, Emotion)],
        tracker: &mut ResourceTracker,
    ) -> Result<ProcessedImage, PipelineError> {
        self.deadline.check(key, PipelineStage::Download)?;
        let data = self.store.download(key)?;

        self.deadline.check(key, PipelineStage::Compose)?;
        let composed = compose(
            self.backend,
            self.assets,
            tracker,
            key,
            &data,
            faces,
            &self.config.compose,
        )?;

        self.deadline.check(key, PipelineStage::Upload)?;
        let output_key = processed_key(&self.config.processed_prefix, key);
        self.store.upload(&output_key, &composed.bytes)?;

        Ok(ProcessedImage {
            key: key.to_string(),
            output_key,
            placements: composed.placements,
        })
    }

    /// Process every image in parallel. All images run to completion; the
    /// batch fails if any of them failed.
    ///
    /// Results keep the input order.
    pub fn process_all(&self, images: &[DetectedImage]) -> Result<BatchReport, BatchError> {
        self.emit(ProcessEvent::BatchStarted {
            count: images.len(),
        });

        let results: Vec<_> = images
            .par_iter()
            .map(|image| (image.key.clone(), self.process(&image.key, &image.overlays())))
            .collect();

        let mut processed = Vec::new();
        let mut failures = Vec::new();
        for (key, result) in results {
            match result {
                Ok(image) => processed.push(image),
                Err(error) => failures.push(ImageFailure { key, error }),
            }
        }

        if failures.is_empty() {
            Ok(BatchReport { processed })
        } else {
            Err(BatchError {
                failures,
                processed,
            })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::detection::FaceDetail;
    use crate::imaging::RustBackend;
    use crate::imaging::backend::tests::{MockBackend, RecordedOp};
    use crate::scratch::leftover_artifacts;
    use crate::test_helpers::{MemoryStore, face_detail, jpeg_bytes, write_emoji_assets};
    use crate::types::ImageDimensions;
    use tempfile::TempDir;

    struct Fixture {
        _assets_dir: TempDir,
        scratch: TempDir,
        assets: EmojiAssets,
        config: ProcessConfig,
    }

    fn fixture() -> Fixture {
        let assets_dir = TempDir::new().unwrap();
        let scratch = TempDir::new().unwrap();
        let assets = write_emoji_assets(assets_dir.path());
        let config = ProcessConfig {
            scratch_dir: scratch.path().to_path_buf(),
            ..ProcessConfig::default()
        };
        Fixture {
            _assets_dir: assets_dir,
            scratch,
            assets,
            config,
        }
    }

    fn detected(key: &str, faces: Vec<FaceDetail>) -> DetectedImage {
        DetectedImage {
            key: key.to_string(),
            faces,
        }
    }

    fn one_face() -> Vec<FaceDetail> {
        vec![face_detail(0.25, 0.25, 0.25, 0.25, "HAPPY")]
    }

    #[test]
    fn process_uploads_under_processed_prefix() {
        let fx = fixture();
        let store = MemoryStore::new().with_object("uploads/a.jpg", jpeg_bytes(64, 48, [0, 0, 255]));
        let backend = RustBackend::new();
        let pipeline = ImagePipeline::new(&backend, &store, &fx.assets, &fx.config);

        let image = detected("uploads/a.jpg", one_face());
        let processed = pipeline.process(&image.key, &image.overlays()).unwrap();

        assert_eq!(processed.output_key, "processed/a.jpg");
        assert_eq!(processed.placements.len(), 1);
        assert_eq!(processed.placements[0].pixel_width, 26);
        let uploaded = store.get("processed/a.jpg").unwrap();
        assert_eq!(&uploaded[..2], &[0xFF, 0xD8]);
        assert!(leftover_artifacts(fx.scratch.path()).unwrap().is_empty());
    }

    #[test]
    fn steps_run_in_order_with_mock_backend() {
        let fx = fixture();
        let store = MemoryStore::new().with_object("a.jpg", b"0123456789".to_vec());
        let backend = MockBackend::with_dimensions(vec![ImageDimensions {
            width: 100,
            height: 100,
        }]);
        let pipeline = ImagePipeline::new(&backend, &store, &fx.assets, &fx.config);

        let image = detected("a.jpg", one_face());
        pipeline.process(&image.key, &image.overlays()).unwrap();

        let ops = backend.get_operations();
        assert_eq!(ops.len(), 4);
        assert_eq!(ops[0], RecordedOp::Identify(10));
        assert!(matches!(ops[1], RecordedOp::Persist(_)));
        assert!(matches!(
            ops[2],
            RecordedOp::Resize {
                width: 35,
                height: 35,
                ..
            }
        ));
        assert!(matches!(ops[3], RecordedOp::Mosaic { .. }));
        assert_eq!(store.get("processed/a.jpg").unwrap(), b"mock-jpeg");
    }

    #[test]
    fn failed_composition_leaves_no_scratch_files() {
        let fx = fixture();
        let store = MemoryStore::new().with_object("bad.jpg", jpeg_bytes(64, 48, [0, 0, 0]));
        let backend = RustBackend::new();
        let pipeline = ImagePipeline::new(&backend, &store, &fx.assets, &fx.config);

        // Negative width yields a non-positive emoji size after padding.
        let image = detected("bad.jpg", vec![face_detail(0.1, 0.1, -0.5, 0.2, "SAD")]);
        let err = pipeline.process(&image.key, &image.overlays()).unwrap_err();

        assert!(matches!(&err, PipelineError::Composition(_)));
        assert_eq!(err.key(), "bad.jpg");
        assert!(leftover_artifacts(fx.scratch.path()).unwrap().is_empty());
        assert!(store.uploaded_keys().is_empty());
    }

    #[test]
    fn failed_upload_still_releases_scratch() {
        let fx = fixture();
        let store = MemoryStore::new()
            .with_object("a.jpg", jpeg_bytes(64, 48, [0, 0, 0]))
            .failing_upload("processed/a.jpg");
        let backend = RustBackend::new();
        let pipeline = ImagePipeline::new(&backend, &store, &fx.assets, &fx.config);

        let image = detected("a.jpg", one_face());
        let err = pipeline.process(&image.key, &image.overlays()).unwrap_err();

        assert!(matches!(err, PipelineError::Storage(_)));
        assert!(leftover_artifacts(fx.scratch.path()).unwrap().is_empty());
    }

    #[test]
    fn batch_isolates_failed_download() {
        let fx = fixture();
        let store = MemoryStore::new()
            .with_object("one.jpg", jpeg_bytes(64, 48, [255, 0, 0]))
            .with_object("two.jpg", jpeg_bytes(64, 48, [0, 255, 0]))
            .with_object("three.jpg", jpeg_bytes(64, 48, [0, 0, 255]))
            .failing_download("two.jpg");
        let backend = RustBackend::new();
        let pipeline = ImagePipeline::new(&backend, &store, &fx.assets, &fx.config);

        let images = vec![
            detected("one.jpg", one_face()),
            detected("two.jpg", one_face()),
            detected("three.jpg", one_face()),
        ];
        let err = pipeline.process_all(&images).unwrap_err();

        assert_eq!(err.failed_keys(), vec!["two.jpg"]);
        assert_eq!(err.processed.len(), 2);
        assert!(err.to_string().contains("two.jpg"));
        assert_eq!(
            store.uploaded_keys(),
            vec!["processed/one.jpg", "processed/three.jpg"]
        );
        assert!(leftover_artifacts(fx.scratch.path()).unwrap().is_empty());
    }

    #[test]
    fn batch_isolates_out_of_range_face_box() {
        let fx = fixture();
        let store = MemoryStore::new()
            .with_object("ok.jpg", jpeg_bytes(64, 48, [255, 0, 0]))
            .with_object("bad.jpg", jpeg_bytes(64, 48, [0, 255, 0]));
        let backend = RustBackend::new();
        let pipeline = ImagePipeline::new(&backend, &store, &fx.assets, &fx.config);

        let images = vec![
            detected("ok.jpg", one_face()),
            detected("bad.jpg", vec![face_detail(0.1, 0.1, 1e19, 0.1, "SAD")]),
        ];
        let err = pipeline.process_all(&images).unwrap_err();

        assert_eq!(err.failed_keys(), vec!["bad.jpg"]);
        let PipelineError::Composition(composition) = &err.failures[0].error else {
            panic!("expected a composition failure");
        };
        assert_eq!(composition.stage, crate::imaging::CompositionStage::Face(0));
        assert_eq!(store.uploaded_keys(), vec!["processed/ok.jpg"]);
        assert!(leftover_artifacts(fx.scratch.path()).unwrap().is_empty());
    }

    #[test]
    fn batch_success_keeps_input_order() {
        let fx = fixture();
        let store = MemoryStore::new()
            .with_object("b.jpg", jpeg_bytes(32, 32, [9, 9, 9]))
            .with_object("a.jpg", jpeg_bytes(32, 32, [9, 9, 9]));
        let backend = RustBackend::new();
        let pipeline = ImagePipeline::new(&backend, &store, &fx.assets, &fx.config);

        let report = pipeline
            .process_all(&[detected("b.jpg", one_face()), detected("a.jpg", one_face())])
            .unwrap();

        let keys: Vec<&str> = report.processed.iter().map(|p| p.key.as_str()).collect();
        assert_eq!(keys, vec!["b.jpg", "a.jpg"]);
    }

    #[test]
    fn expired_deadline_fails_before_download() {
        let fx = fixture();
        let store = MemoryStore::new().with_object("a.jpg", jpeg_bytes(32, 32, [0, 0, 0]));
        let backend = MockBackend::new();
        let pipeline = ImagePipeline::new(&backend, &store, &fx.assets, &fx.config)
            .with_deadline(Deadline::after(Duration::ZERO));

        let err = pipeline.process_all(&[detected("a.jpg", one_face())]).unwrap_err();

        assert!(matches!(
            &err.failures[0].error,
            PipelineError::DeadlineExceeded {
                stage: PipelineStage::Download,
                ..
            }
        ));
        assert!(backend.get_operations().is_empty());
        assert!(store.uploaded_keys().is_empty());
    }

    #[test]
    fn unexpired_deadline_does_not_interfere() {
        assert!(!Deadline::after(Duration::from_secs(3600)).is_expired());
        assert!(!Deadline::after(Duration::MAX).is_expired());
        assert!(!Deadline::none().is_expired());
    }

    #[test]
    fn reprocessing_is_byte_identical() {
        let fx = fixture();
        let store = MemoryStore::new().with_object("a.jpg", jpeg_bytes(64, 64, [40, 80, 120]));
        let backend = RustBackend::new();
        let pipeline = ImagePipeline::new(&backend, &store, &fx.assets, &fx.config);
        let faces = vec![
            face_detail(0.1, 0.1, 0.5, 0.5, "HAPPY"),
            face_detail(0.3, 0.3, 0.5, 0.5, "ANGRY"),
        ];
        let image = detected("a.jpg", faces);

        pipeline.process(&image.key, &image.overlays()).unwrap();
        let first = store.get("processed/a.jpg").unwrap();
        pipeline.process(&image.key, &image.overlays()).unwrap();
        let second = store.get("processed/a.jpg").unwrap();

        assert_eq!(first, second);
    }

    #[test]
    fn events_report_success_and_failure() {
        let fx = fixture();
        let store = MemoryStore::new()
            .with_object("ok.jpg", jpeg_bytes(32, 32, [0, 0, 0]))
            .failing_download("bad.jpg");
        let backend = RustBackend::new();
        let (tx, rx) = std::sync::mpsc::channel();
        let pipeline =
            ImagePipeline::new(&backend, &store, &fx.assets, &fx.config).with_events(Some(tx));

        let _ = pipeline.process_all(&[detected("ok.jpg", one_face()), detected("bad.jpg", one_face())]);
        drop(pipeline);
        let events: Vec<ProcessEvent> = rx.iter().collect();

        assert!(matches!(events[0], ProcessEvent::BatchStarted { count: 2 }));
        assert!(events.iter().any(|e| matches!(
            e,
            ProcessEvent::ImageComposited { key, output_key, faces }
                if key == "ok.jpg" && output_key == "processed/ok.jpg" && faces.len() == 1
        )));
        assert!(events.iter().any(|e| matches!(
            e,
            ProcessEvent::ImageFailed { key, .. } if key == "bad.jpg"
        )));
    }

    #[test]
    fn process_config_from_app_config() {
        let mut app = AppConfig::default();
        app.overlay.padding = 4;
        app.output.quality = 70;
        app.processed_prefix = "out".into();

        let config = ProcessConfig::from_app_config(&app);
        assert_eq!(config.compose.padding, 4);
        assert_eq!(config.compose.quality.value(), 70);
        assert_eq!(config.processed_prefix, "out");
        assert_eq!(config.scratch_dir, std::env::temp_dir());
    }
}
