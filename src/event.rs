//! Upload-notification decoding.
//!
//! An event carries one record per uploaded object. Only records for the
//! configured source bucket whose key has an allowed extension are
//! eligible; everything else is ignored without error.
//!
//! ```json
//! {"Records": [{"s3": {"bucket": {"name": "uploads"},
//!                      "object": {"key": "team/photo.jpg"}}}]}
//! ```

use crate::config::AppConfig;
use crate::types::{ImageKey, extension};
use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum EventError {
    #[error("Malformed event: {0}")]
    Json(#[from] serde_json::Error),
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct S3Event {
    #[serde(rename = "Records", default)]
    pub records: Vec<EventRecord>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EventRecord {
    pub s3: S3Entity,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct S3Entity {
    pub bucket: BucketEntity,
    pub object: ObjectEntity,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BucketEntity {
    pub name: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ObjectEntity {
    pub key: String,
}

impl S3Event {
    /// Build an event with one record per key, all in `bucket`.
    pub fn for_keys<I, K>(bucket: &str, keys: I) -> Self
    where
        I: IntoIterator<Item = K>,
        K: Into<String>,
    {
        Self {
            records: keys
                .into_iter()
                .map(|key| EventRecord {
                    s3: S3Entity {
                        bucket: BucketEntity {
                            name: bucket.to_string(),
                        },
                        object: ObjectEntity { key: key.into() },
                    },
                })
                .collect(),
        }
    }
}

pub fn parse_event(json: &str) -> Result<S3Event, EventError> {
    Ok(serde_json::from_str(json)?)
}

/// Eligible image keys, in event order.
pub fn images_from_event(event: &S3Event, config: &AppConfig) -> Vec<ImageKey> {
    let processed = format!("{}/", config.processed_prefix.trim_end_matches('/'));
    event
        .records
        .iter()
        .filter(|r| r.s3.bucket.name == config.source_bucket)
        .map(|r| &r.s3.object.key)
        .filter(|key| !key.starts_with(&processed))
        .filter(|key| extension(key).is_some_and(|ext| config.allows_extension(&ext)))
        .cloned()
        .collect()
}
