//! Handler configuration.
//!
//! Loaded from an optional `config.toml`. Stock defaults are serialized to a
//! TOML table, the user file is merged on top key-by-key, and the result is
//! deserialized and validated. Unknown keys are rejected to catch typos early.
//!
//! ## Configuration Options
//!
//! ```toml
//! # All options are optional - defaults shown below
//!
//! source_bucket = "uploads"           # Only events for this bucket are processed
//! processed_prefix = "processed"      # Output key prefix
//! allowed_extensions = ["jpg", "jpeg", "png"]
//!
//! [overlay]
//! padding = 10                        # Pixels added to each emoji's width/height
//! assets_dir = "assets/emoji"         # <emotion>.png rasters
//!
//! [output]
//! quality = 90                        # JPEG quality (1-100)
//!
//! [processing]
//! max_workers = 4                     # Omit for auto = CPU cores
//! deadline_secs = 300                 # Per-invocation time limit
//! scratch_dir = "/tmp"                # Omit for the system temp dir
//! ```
//!
//! ## Partial Configuration
//!
//! Config files are sparse; override just the values you want:
//!
//! ```toml
//! [output]
//! quality = 80
//! ```

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("TOML parse error: {0}")]
    Toml(#[from] toml::de::Error),
    #[error("Config validation error: {0}")]
    Validation(String),
}

/// Handler configuration loaded from `config.toml`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct AppConfig {
    /// Bucket whose upload events are processed; others are ignored.
    pub source_bucket: String,
    /// Key prefix composited images are written under.
    pub processed_prefix: String,
    /// Eligible key extensions, compared case-insensitively.
    pub allowed_extensions: Vec<String>,
    /// Emoji overlay settings.
    pub overlay: OverlayConfig,
    /// Encoded output settings.
    pub output: OutputConfig,
    /// Concurrency, deadline, and scratch space.
    pub processing: ProcessingConfig,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            source_bucket: "uploads".to_string(),
            processed_prefix: "processed".to_string(),
            allowed_extensions: vec!["jpg".to_string(), "jpeg".to_string(), "png".to_string()],
            overlay: OverlayConfig::default(),
            output: OutputConfig::default(),
            processing: ProcessingConfig::default(),
        }
    }
}

impl AppConfig {
    /// Validate config values are within acceptable ranges.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.output.quality == 0 || self.output.quality > 100 {
            return Err(ConfigError::Validation(
                "output.quality must be 1-100".into(),
            ));
        }
        if self.allowed_extensions.is_empty() {
            return Err(ConfigError::Validation(
                "allowed_extensions must not be empty".into(),
            ));
        }
        if self.processed_prefix.trim_matches('/').is_empty() {
            return Err(ConfigError::Validation(
                "processed_prefix must not be empty".into(),
            ));
        }
        if self.processing.deadline_secs == 0 {
            return Err(ConfigError::Validation(
                "processing.deadline_secs must be positive".into(),
            ));
        }
        if self.processing.max_workers == Some(0) {
            return Err(ConfigError::Validation(
                "processing.max_workers must be positive".into(),
            ));
        }
        Ok(())
    }

    /// Whether `extension` (without dot, any case) is eligible.
    pub fn allows_extension(&self, extension: &str) -> bool {
        self.allowed_extensions
            .iter()
            .any(|allowed| allowed.trim_start_matches('.').eq_ignore_ascii_case(extension))
    }
}

/// Emoji overlay settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct OverlayConfig {
    /// Pixels added to each overlay's width and height so the emoji fully
    /// covers the face box.
    pub padding: u32,
    /// Directory holding one `<emotion>.png` per label.
    pub assets_dir: PathBuf,
}

impl Default for OverlayConfig {
    fn default() -> Self {
        Self {
            padding: 10,
            assets_dir: PathBuf::from("assets/emoji"),
        }
    }
}

/// Encoded output settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct OutputConfig {
    /// JPEG encoding quality (1 = worst, 100 = best).
    pub quality: u32,
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self { quality: 90 }
    }
}

/// Concurrency, deadline, and scratch-space settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ProcessingConfig {
    /// Maximum number of images processed in parallel.
    /// When absent, defaults to the number of CPU cores.
    /// Values larger than the core count are clamped down.
    pub max_workers: Option<usize>,
    /// Time budget for one handler invocation, in seconds.
    pub deadline_secs: u64,
    /// Directory for intermediate rasters. Defaults to the system temp dir.
    pub scratch_dir: Option<PathBuf>,
}

impl Default for ProcessingConfig {
    fn default() -> Self {
        Self {
            max_workers: None,
            deadline_secs: 300,
            scratch_dir: None,
        }
    }
}

impl ProcessingConfig {
    pub fn deadline(&self) -> Duration {
        Duration::from_secs(self.deadline_secs)
    }

    pub fn scratch_dir(&self) -> PathBuf {
        self.scratch_dir.clone().unwrap_or_else(std::env::temp_dir)
    }
}

/// Resolve the effective worker count from config.
///
/// - `None` → use all available cores
/// - `Some(n)` → use `min(n, cores)` (user can constrain down, not up)
pub fn effective_workers(config: &ProcessingConfig) -> usize {
    let cores = std::thread::available_parallelism()
        .map(|n| n.get())
        .unwrap_or(1);
    config.max_workers.map(|n| n.min(cores)).unwrap_or(cores)
}

// =============================================================================
// Config loading, merging, and validation
// =============================================================================

/// Returns the stock default config as a `toml::Value::Table`.
pub fn stock_defaults_value() -> toml::Value {
    toml::Value::try_from(AppConfig::default()).expect("default config must serialize")
}

/// Recursively merge `overlay` on top of `base`.
///
/// - Tables are merged key-by-key (overlay keys override base keys).
/// - Non-table values in overlay replace base values entirely.
/// - Keys in base that are not in overlay are preserved.
pub fn merge_toml(base: toml::Value, overlay: toml::Value) -> toml::Value {
    match (base, overlay) {
        (toml::Value::Table(mut base_table), toml::Value::Table(overlay_table)) => {
            for (key, overlay_val) in overlay_table {
                let merged = match base_table.remove(&key) {
                    Some(base_val) => merge_toml(base_val, overlay_val),
                    None => overlay_val,
                };
                base_table.insert(key, merged);
            }
            toml::Value::Table(base_table)
        }
        (_, overlay) => overlay,
    }
}

/// Merge an optional overlay onto the stock defaults, then deserialize and validate.
pub fn resolve_config(overlay: Option<toml::Value>) -> Result<AppConfig, ConfigError> {
    let base = stock_defaults_value();
    let merged = match overlay {
        Some(ov) => merge_toml(base, ov),
        None => base,
    };
    let config: AppConfig = merged.try_into()?;
    config.validate()?;
    Ok(config)
}

/// Load config from a TOML file, or stock defaults when `path` is `None`.
///
/// Relative paths inside the file (`assets_dir`, `scratch_dir`) are
/// resolved against the file's directory.
pub fn load_config(path: Option<&Path>) -> Result<AppConfig, ConfigError> {
    let Some(path) = path else {
        return resolve_config(None);
    };
    let content = fs::read_to_string(path)?;
    let value: toml::Value = toml::from_str(&content)?;
    let mut config = resolve_config(Some(value))?;

    if let Some(dir) = path.parent() {
        if config.overlay.assets_dir.is_relative() {
            config.overlay.assets_dir = dir.join(&config.overlay.assets_dir);
        }
        if let Some(scratch) = config
            .processing
            .scratch_dir
            .as_mut()
            .filter(|s| s.is_relative())
        {
            *scratch = dir.join(&*scratch);
        }
    }
    Ok(config)
}

/// Returns a fully-commented stock `config.toml` with all keys and explanations.
///
/// Used by the `gen-config` CLI command.
pub fn stock_config_toml() -> &'static str {
    r##"# face-emoji configuration
# ========================
# All settings are optional. Remove or comment out any you don't need.
# Values shown below are the defaults. Unknown keys cause an error.

# Only upload events for this bucket are processed.
source_bucket = "uploads"

# Composited images are written to <processed_prefix>/<original basename>.
# Keys already under this prefix are never reprocessed.
processed_prefix = "processed"

# Eligible key extensions (case-insensitive, with or without leading dot).
allowed_extensions = ["jpg", "jpeg", "png"]

# ---------------------------------------------------------------------------
# Emoji overlay
# ---------------------------------------------------------------------------
[overlay]
# Pixels added to each emoji's width and height so it covers the whole face.
padding = 10

# Directory with one <emotion>.png per label: happy, sad, angry, confused,
# disgusted, surprised, calm, unknown. Relative to this file.
assets_dir = "assets/emoji"

# ---------------------------------------------------------------------------
# Output
# ---------------------------------------------------------------------------
[output]
# JPEG encoding quality (1 = worst, 100 = best).
quality = 90

# ---------------------------------------------------------------------------
# Processing
# ---------------------------------------------------------------------------
[processing]
# Maximum images processed in parallel.
# Omit or comment out to auto-detect (= number of CPU cores).
# max_workers = 4

# Time budget for one invocation. Images still in flight when it runs out
# are reported as failed.
deadline_secs = 300

# Directory for intermediate rasters. Omit for the system temp dir.
# scratch_dir = "/tmp"
"##
}
