// src/replay/batch.rs
//! Replay frames and batches
//!
//! A frame is one recorder emission; a batch is the flush-time envelope
//! around an ordered run of frames plus session and page metadata. Batches
//! leave the agent zstd-compressed.

use crate::utils::errors::{AgentError, Result};
use serde::{Deserialize, Serialize};

/// Recorder frame kinds on the wire
pub mod frame_kind {
    pub const DOM_CONTENT_LOADED: i32 = 0;
    pub const LOAD: i32 = 1;
    pub const FULL_SNAPSHOT: i32 = 2;
    pub const INCREMENTAL_SNAPSHOT: i32 = 3;
    pub const META: i32 = 4;
    pub const CUSTOM: i32 = 5;
}

/// One recorder emission
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReplayFrame {
    /// Numeric frame kind (see [`frame_kind`])
    pub kind: i32,

    /// Opaque recorder payload
    pub data: serde_json::Value,

    /// Emission timestamp, milliseconds since epoch
    pub timestamp_ms: i64,
}

impl ReplayFrame {
    pub fn new(kind: i32, data: serde_json::Value) -> Self {
        Self {
            kind,
            data,
            timestamp_ms: chrono::Utc::now().timestamp_millis(),
        }
    }
}

/// Compression levels for batch bodies
#[derive(Debug, Clone, Copy, Default)]
pub enum CompressionLevel {
    /// Fast compression (level 1)
    Fast,

    /// Balanced (level 3)
    #[default]
    Balanced,

    /// Best compression (level 19)
    Best,
}

impl CompressionLevel {
    pub fn as_i32(&self) -> i32 {
        match self {
            CompressionLevel::Fast => 1,
            CompressionLevel::Balanced => 3,
            CompressionLevel::Best => 19,
        }
    }
}

/// Ordered frames plus session and page metadata, built only at flush time
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReplayBatch {
    pub batch_id: String,
    pub session_id: String,
    pub site_id: String,
    pub hostname: String,
    pub pathname: String,
    pub title: String,
    pub created_at: i64,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub user_id: Option<String>,

    pub frames: Vec<ReplayFrame>,
}

impl ReplayBatch {
    /// Serialize and compress the batch body
    pub fn encode(&self, level: CompressionLevel) -> Result<Vec<u8>> {
        let json = serde_json::to_vec(self)
            .map_err(|e| AgentError::ReplayFailed(format!("Serialization error: {}", e)))?;

        zstd::encode_all(json.as_slice(), level.as_i32())
            .map_err(|e| AgentError::ReplayFailed(format!("Compression error: {}", e)))
    }

    /// Decompress and deserialize a batch body
    pub fn decode(data: &[u8]) -> Result<ReplayBatch> {
        let json = zstd::decode_all(data)
            .map_err(|e| AgentError::ReplayFailed(format!("Decompression error: {}", e)))?;

        serde_json::from_slice(&json)
            .map_err(|e| AgentError::ReplayFailed(format!("Deserialization error: {}", e)))
    }
}
