use std::collections::BTreeMap;
use std::path::PathBuf;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::chunk::ChunkType;

/// A closed capture scope, ready to hand to a transport.
///
/// `bytes` is the complete wire stream: begin marker, content chunks, end
/// marker.
#[derive(Debug, Clone, PartialEq)]
pub struct FinishedCapture {
    pub frame: u32,
    pub api_name: String,
    /// Content chunks, excluding the two markers.
    pub chunk_count: u32,
    pub bytes: Vec<u8>,
    pub chunk_histogram: BTreeMap<ChunkType, u32>,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
}

/// Result returned once a capture has been handed off.
#[derive(Debug, Clone, PartialEq)]
pub struct CaptureResult {
    pub frame: u32,
    pub chunk_count: u32,
    pub byte_len: u64,
    pub checksum: String,
    /// Where the transport put it, when it went to a file.
    pub location: Option<PathBuf>,
    pub metadata: CaptureMetadata,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChunkTally {
    pub id: u32,
    pub name: String,
    pub count: u32,
}

/// Metadata stored alongside a capture.
///
/// Serializable for the JSON sidecar.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CaptureMetadata {
    pub id: String,
    pub api: String,
    pub frame: u32,
    pub chunk_count: u32,
    pub byte_len: u64,
    pub checksum: String,
    pub started_at: String,
    pub created_at: String,
    pub chunks: Vec<ChunkTally>,
}

impl CaptureMetadata {
    pub fn new(capture: &FinishedCapture, checksum: &str) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            api: capture.api_name.clone(),
            frame: capture.frame,
            chunk_count: capture.chunk_count,
            byte_len: capture.bytes.len() as u64,
            checksum: checksum.to_string(),
            started_at: capture.started_at.to_rfc3339(),
            created_at: capture.finished_at.to_rfc3339(),
            chunks: capture
                .chunk_histogram
                .iter()
                .map(|(ty, count)| ChunkTally {
                    id: ty.id(),
                    name: ty.name().to_string(),
                    count: *count,
                })
                .collect(),
        }
    }
}

impl CaptureResult {
    pub fn new(capture: &FinishedCapture, checksum: String, location: Option<PathBuf>) -> Self {
        Self {
            frame: capture.frame,
            chunk_count: capture.chunk_count,
            byte_len: capture.bytes.len() as u64,
            metadata: CaptureMetadata::new(capture, &checksum),
            checksum,
            location,
        }
    }
}
