// src/replay/mod.rs
//! Session replay capture
//!
//! This module wraps an external DOM recorder and owns everything after
//! emission:
//!
//! - **Batch**: frame/batch model and zstd batch encoding
//! - **Recorder**: the external recorder seam and its privacy policy
//! - **Engine**: buffering, flush scheduling, delivery, and retry
//!
//! # Architecture
//!
//! ```text
//! DomRecorder → FrameSink → Ordered Buffer
//!                                │ interval tick / size threshold
//!                                ↓
//!                          Atomic drain → ReplayBatch
//!                                ↓
//!                          zstd encode → Transport
//!                                │
//!                  failure: frames prepended back, retried next flush
//! ```

pub mod batch;
pub mod engine;
pub mod recorder;

// Re-export commonly used types
pub use batch::{frame_kind, CompressionLevel, ReplayBatch, ReplayFrame};
pub use engine::{ReplayEngine, ReplayStats, REPLAY_PATH};
pub use recorder::{DomRecorder, FrameSink, RecorderHandle, RecorderPolicy};
