// src/replay/recorder.rs
//! External DOM recorder seam
//!
//! The agent never records the DOM itself; an external recorder does. The
//! engine hands it a privacy policy and a frame sink and gets back a stop
//! handle. Recorder load or start failures mean replay simply does not
//! start — they never affect the rest of the pipeline.

use crate::config::ReplayConfig;
use crate::replay::batch::ReplayFrame;
use crate::utils::errors::Result;
use async_trait::async_trait;
use std::time::Duration;

/// Where emitted frames go
pub type FrameSink = Box<dyn Fn(ReplayFrame) + Send + Sync>;

/// Recording policy handed to the external recorder
///
/// Privacy floors are fixed: sensitive inputs are always masked and canvas
/// capture is always off, regardless of caller options.
#[derive(Debug, Clone)]
pub struct RecorderPolicy {
    /// Mask the value of every input field
    pub mask_all_inputs: bool,

    /// Always true: password and email fields are masked unconditionally
    pub mask_sensitive_inputs: bool,

    /// Mask all visible text content
    pub mask_all_text: bool,

    /// Always false: canvas contents are never captured
    pub capture_canvas: bool,

    /// Emit a full-snapshot checkpoint at least this often
    pub checkpoint_interval: Duration,

    /// Emit a full-snapshot checkpoint after this many frames
    pub checkpoint_every_frames: u32,

    /// Coarse sampling window for mouse movement
    pub mousemove_sample: Duration,

    /// Coarse sampling window for scrolling
    pub scroll_sample: Duration,
}

impl RecorderPolicy {
    /// Derive the policy from the frozen replay configuration
    pub fn from_config(config: &ReplayConfig) -> Self {
        Self {
            mask_all_inputs: config.mask_all_inputs,
            mask_sensitive_inputs: true,
            mask_all_text: config.mask_all_text,
            capture_canvas: false,
            checkpoint_interval: Duration::from_secs(60),
            checkpoint_every_frames: 1_000,
            mousemove_sample: Duration::from_millis(50),
            scroll_sample: Duration::from_millis(100),
        }
    }
}

/// Running-recorder handle; stopping is infallible and final
pub struct RecorderHandle {
    stopper: Option<Box<dyn FnOnce() + Send>>,
}

impl RecorderHandle {
    pub fn new<F: FnOnce() + Send + 'static>(stopper: F) -> Self {
        Self {
            stopper: Some(Box::new(stopper)),
        }
    }

    /// Stop the recorder; no frames are emitted afterwards
    pub fn stop(mut self) {
        if let Some(stopper) = self.stopper.take() {
            stopper();
        }
    }
}

/// External DOM-recording collaborator
#[async_trait]
pub trait DomRecorder: Send + Sync {
    /// Begin emitting frames into `sink` under `policy`
    async fn start(&self, policy: RecorderPolicy, sink: FrameSink) -> Result<RecorderHandle>;
}
