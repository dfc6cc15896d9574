//! CLI output formatting.
//!
//! # Output Format
//!
//! ## Progress
//!
//! ```text
//! Processing 3 images
//! uploads/party.jpg → processed/party.jpg
//!     001 happy 310x210 at (100, 160)
//!     002 sad 90x90 at (640, 120)
//! uploads/broken.jpg FAILED
//!     Object not found: uploads/broken.jpg
//! ```
//!
//! ## Summary
//!
//! ```text
//! Processed 2 images, 1 without faces
//! ```
//!
//! # Architecture
//!
//! Each output has a `format_*` function (returns `Vec<String>`) for
//! testability and a `print_*` wrapper that writes to stdout. Format
//! functions are pure: no I/O, no side effects.

use crate::handler::BatchSummary;
use crate::imaging::OverlayPlacement;
use crate::process::{BatchError, ProcessEvent};

fn plural(count: usize, noun: &str) -> String {
    if count == 1 {
        format!("{count} {noun}")
    } else {
        format!("{count} {noun}s")
    }
}

/// One indented line per overlay, numbered in detection order.
fn placement_line(index: usize, placement: &OverlayPlacement) -> String {
    let (x, y) = placement.offset();
    format!(
        "    {:03} {} {}x{} at ({}, {})",
        index + 1,
        placement.emotion,
        placement.pixel_width,
        placement.pixel_height,
        x,
        y
    )
}

/// Format a single process progress event as display lines.
pub fn format_process_event(event: &ProcessEvent) -> Vec<String> {
    match event {
        ProcessEvent::BatchStarted { count } => {
            vec![format!("Processing {}", plural(*count, "image"))]
        }
        ProcessEvent::ImageComposited {
            key,
            output_key,
            faces,
        } => {
            let mut lines = vec![format!("{} \u{2192} {}", key, output_key)];
            lines.extend(faces.iter().enumerate().map(|(i, p)| placement_line(i, p)));
            lines
        }
        ProcessEvent::ImageFailed { key, error } => {
            vec![format!("{} FAILED", key), format!("    {}", error)]
        }
        ProcessEvent::CleanupFailed { key, path, error } => {
            vec![format!(
                "{}: could not remove {}: {}",
                key,
                path.display(),
                error
            )]
        }
    }
}

/// Format the closing line of a successful invocation.
pub fn format_batch_summary(summary: &BatchSummary) -> Vec<String> {
    if summary.eligible == 0 {
        return vec!["No eligible images".to_string()];
    }
    let mut line = format!("Processed {}", plural(summary.processed.len(), "image"));
    if summary.skipped > 0 {
        line.push_str(&format!(", {} without faces", summary.skipped));
    }
    vec![line]
}

/// Format a failed batch: one line per failed image.
pub fn format_batch_error(error: &BatchError) -> Vec<String> {
    let mut lines = vec![format!(
        "{} failed, {} processed",
        plural(error.failures.len(), "image"),
        error.processed.len()
    )];
    for failure in &error.failures {
        lines.push(format!("    {}: {}", failure.key, failure.error));
    }
    lines
}

/// Print a process event to stdout.
pub fn print_process_event(event: &ProcessEvent) {
    for line in format_process_event(event) {
        println!("{}", line);
    }
}

/// Print the batch summary to stdout.
pub fn print_batch_summary(summary: &BatchSummary) {
    for line in format_batch_summary(summary) {
        println!("{}", line);
    }
}

/// Print a failed batch to stderr.
pub fn print_batch_error(error: &BatchError) {
    for line in format_batch_error(error) {
        eprintln!("{}", line);
    }
}
