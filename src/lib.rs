//! # Face Emoji
//!
//! Covers every face in an uploaded photo with an emoji matching that face's
//! dominant emotion, and stores the result next to the original under a
//! `processed/` prefix.
//!
//! # Architecture: Event-Triggered Pipeline
//!
//! ```text
//! 1. Decode   upload event  →  eligible keys       (bucket + extension filter)
//! 2. Detect   keys          →  faces per image     (zero-face images dropped)
//! 3. Process  faces         →  processed/<name>    (download, composite, upload)
//! ```
//!
//! Step 3 runs once per image, in parallel across images. Within one image
//! it is strictly sequential and owns every scratch file it creates.
//!
//! # Module Map
//!
//! | Module | Role |
//! |--------|------|
//! | [`event`] | Decodes upload notifications into the ordered list of eligible keys |
//! | [`detection`] | Detector trait, response types, sidecar-file detector |
//! | [`storage`] | Object store trait, output key mapping, directory-backed store |
//! | [`imaging`] | Overlay geometry, emoji assets, resize and mosaic via the `image` crate |
//! | [`scratch`] | Per-image scratch file tracking with guaranteed release |
//! | [`process`] | Per-image pipeline and parallel batch fan-out |
//! | [`handler`] | Wires decode → detect → process for one invocation |
//! | [`config`] | `config.toml` loading, merging, and validation |
//! | [`types`] | Shared types: keys, dimensions, face geometry, emotions |
//! | [`output`] | CLI output formatting for progress events and results |
//!
//! # Design Decisions
//!
//! ## Single-Pass Mosaic
//!
//! All overlays for an image are collected into one layer stack and
//! flattened once, base first, then faces in detection order. Later faces
//! win where boxes overlap, and the same input always produces the same
//! bytes.
//!
//! ## Uncentered Padding
//!
//! Each emoji is the face box plus 10 pixels in both directions, but it is
//! placed at the box's top-left corner. The extra pixels therefore hang off
//! the right and bottom edges of the face rather than being split evenly.
//!
//! ## Pluggable Collaborators
//!
//! Pixel work sits behind [`imaging::ImageBackend`], storage behind
//! [`storage::ObjectStore`], and detection behind [`detection::FaceDetector`].
//! The binary wires a pure-Rust backend, a directory store, and a detector
//! that reads saved responses; tests swap in recording or in-memory doubles.

pub mod config;
pub mod detection;
pub mod event;
pub mod handler;
pub mod imaging;
pub mod output;
pub mod process;
pub mod scratch;
pub mod storage;
pub mod types;

#[cfg(test)]
pub(crate) mod test_helpers;
