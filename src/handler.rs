//! Event handler entry point.
//!
//! ```text
//! event → eligible keys → detect faces → process_all → summary
//! ```
//!
//! Collaborators are constructed once by the caller and passed in through
//! [`Services`]; nothing here holds global state. A detection failure fails
//! the whole invocation before any image is touched. Once compositing starts,
//! failures are per image and surface together as a [`BatchError`].

use crate::config::AppConfig;
use crate::detection::{DetectionError, FaceDetector, detect_faces_on_images};
use crate::event::{S3Event, images_from_event};
use crate::imaging::{EmojiAssets, ImageBackend};
use crate::process::{
    BatchError, Deadline, ImagePipeline, ProcessConfig, ProcessEvent, ProcessedImage,
};
use crate::storage::ObjectStore;
use crate::types::ImageKey;
use std::sync::mpsc::Sender;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum HandlerError {
    #[error("Face detection failed: {0}")]
    Detection(#[from] DetectionError),
    #[error(transparent)]
    Batch(#[from] BatchError),
}

/// Externally provided collaborators for one handler invocation.
pub struct Services<'a, B, S, D> {
    pub backend: &'a B,
    pub store: &'a S,
    pub detector: &'a D,
    pub assets: &'a EmojiAssets,
}

/// Outcome of a fully successful invocation.
#[derive(Debug, Clone, Default)]
pub struct BatchSummary {
    /// Eligible keys found in the event.
    pub eligible: usize,
    /// Eligible images without any detected face.
    pub skipped: usize,
    pub processed: Vec<ProcessedImage>,
}

/// Decode-filter `event` and process every eligible image.
pub fn handle<B, S, D>(
    event: &S3Event,
    services: &Services<'_, B, S, D>,
    config: &AppConfig,
    events: Option<Sender<ProcessEvent>>,
) -> Result<BatchSummary, HandlerError>
where
    B: ImageBackend,
    S: ObjectStore,
    D: FaceDetector,
{
    let keys = images_from_event(event, config);
    handle_keys(&keys, services, config, events)
}

/// Process already-eligible keys: detect, then composite and upload.
pub fn handle_keys<B, S, D>(
    keys: &[ImageKey],
    services: &Services<'_, B, S, D>,
    config: &AppConfig,
    events: Option<Sender<ProcessEvent>>,
) -> Result<BatchSummary, HandlerError>
where
    B: ImageBackend,
    S: ObjectStore,
    D: FaceDetector,
{
    let deadline = Deadline::after(config.processing.deadline());

    let detected = detect_faces_on_images(services.detector, keys)?;
    if detected.is_empty() {
        return Ok(BatchSummary {
            eligible: keys.len(),
            skipped: keys.len(),
            processed: Vec::new(),
        });
    }

    let process_config = ProcessConfig::from_app_config(config);
    let pipeline = ImagePipeline::new(
        services.backend,
        services.store,
        services.assets,
        &process_config,
    )
    .with_deadline(deadline)
    .with_events(events);

    let report = pipeline.process_all(&detected)?;

    Ok(BatchSummary {
        eligible: keys.len(),
        skipped: keys.len() - detected.len(),
        processed: report.processed,
    })
}
