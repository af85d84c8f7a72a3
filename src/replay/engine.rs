// src/replay/engine.rs
//! Replay batching and retry engine
//!
//! idle → recording → idle. While recording, every frame the external
//! recorder emits lands in an ordered in-memory buffer. The flush loop
//! drains the buffer on an interval tick or a size-threshold signal, builds
//! a batch with current page/session/user metadata, and sends it
//! compressed. On delivery failure the exact frames that failed are
//! prepended back onto the live buffer — the one retry guarantee in the
//! pipeline. Sustained outage therefore grows the buffer instead of
//! dropping replay data while recording is active.

use crate::context::AgentContext;
use crate::replay::batch::{CompressionLevel, ReplayBatch, ReplayFrame};
use crate::replay::recorder::{DomRecorder, FrameSink, RecorderHandle, RecorderPolicy};
use crate::transport::DeliveryRequest;
use crate::utils::errors::{AgentError, Result};
use parking_lot::Mutex;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Notify;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};
use ulid::Ulid;

/// Path component of the replay delivery endpoint
pub const REPLAY_PATH: &str = "replay";

/// Replay pipeline statistics
#[derive(Debug, Clone, Default)]
pub struct ReplayStats {
    pub frames_buffered: u64,
    pub frames_sent: u64,
    pub batches_sent: u64,
    pub batches_requeued: u64,
}

/// Buffers recorder output and delivers it in batches
pub struct ReplayEngine {
    ctx: Arc<AgentContext>,
    recorder: Option<Arc<dyn DomRecorder>>,
    buffer: Arc<Mutex<VecDeque<ReplayFrame>>>,
    session_id: Arc<Mutex<Option<String>>>,
    stats: Arc<Mutex<ReplayStats>>,
    flush_notify: Arc<Notify>,
    stop_notify: Arc<Notify>,
    recorder_handle: Mutex<Option<RecorderHandle>>,
    flush_task: Mutex<Option<JoinHandle<()>>>,
    recording: AtomicBool,
}

impl ReplayEngine {
    pub fn new(ctx: Arc<AgentContext>, recorder: Option<Arc<dyn DomRecorder>>) -> Self {
        Self {
            ctx,
            recorder,
            buffer: Arc::new(Mutex::new(VecDeque::new())),
            session_id: Arc::new(Mutex::new(None)),
            stats: Arc::new(Mutex::new(ReplayStats::default())),
            flush_notify: Arc::new(Notify::new()),
            stop_notify: Arc::new(Notify::new()),
            recorder_handle: Mutex::new(None),
            flush_task: Mutex::new(None),
            recording: AtomicBool::new(false),
        }
    }

    /// Begin recording; refuses when replay is disabled or already running
    pub async fn start(&self) -> Result<()> {
        let read = self.ctx.config.read();
        if !read.is_configured() {
            warn!("Replay start requested before initialization");
        }
        let config = Arc::clone(read.config());

        if !config.replay.enabled {
            return Err(AgentError::ReplayFailed(
                "replay disabled by configuration".to_string(),
            ));
        }

        let recorder = self
            .recorder
            .clone()
            .ok_or_else(|| AgentError::ReplayFailed("no recorder installed".to_string()))?;

        if self.recording.swap(true, Ordering::SeqCst) {
            return Err(AgentError::ReplayFailed("already recording".to_string()));
        }

        // One sampling draw per start decides whether this session records.
        if config.replay.sample_rate < 1.0 {
            let draw: f64 = rand::random();
            if draw >= config.replay.sample_rate {
                info!("Session not sampled for replay");
                self.recording.store(false, Ordering::SeqCst);
                return Ok(());
            }
        }

        let session_id = Ulid::new().to_string();
        *self.session_id.lock() = Some(session_id.clone());

        let sink = self.make_sink(config.replay.flush_threshold);
        let policy = RecorderPolicy::from_config(&config.replay);
        let handle = match recorder.start(policy, sink).await {
            Ok(handle) => handle,
            Err(e) => {
                warn!("Recorder failed to start: {}", e);
                *self.session_id.lock() = None;
                self.recording.store(false, Ordering::SeqCst);
                return Err(e);
            }
        };
        *self.recorder_handle.lock() = Some(handle);

        let task = tokio::spawn(Self::run_flush_loop(
            Arc::clone(&self.ctx),
            Arc::clone(&self.buffer),
            Arc::clone(&self.session_id),
            Arc::clone(&self.stats),
            Arc::clone(&self.flush_notify),
            Arc::clone(&self.stop_notify),
            config.replay.flush_interval,
        ));
        *self.flush_task.lock() = Some(task);

        info!(session_id = %session_id, "Replay recording started");
        Ok(())
    }

    /// Stop recording, run one final flush, settle to idle; idempotent
    pub async fn stop(&self) {
        if !self.recording.swap(false, Ordering::SeqCst) {
            debug!("Replay already idle; ignoring stop");
            return;
        }

        if let Some(handle) = self.recorder_handle.lock().take() {
            handle.stop();
        }

        // Let an in-progress flush finish rather than cancelling it
        // mid-send; the loop breaks at its next suspension point.
        let task = self.flush_task.lock().take();
        if let Some(task) = task {
            self.stop_notify.notify_one();
            let _ = task.await;
        }

        if let Err(e) = self.flush().await {
            warn!("Final replay flush failed: {}", e);
        }

        *self.session_id.lock() = None;
        info!("Replay recording stopped");
    }

    /// Drain and deliver whatever is buffered right now
    pub async fn flush(&self) -> Result<()> {
        Self::flush_once(&self.ctx, &self.buffer, &self.session_id, &self.stats).await
    }

    pub fn is_recording(&self) -> bool {
        self.recording.load(Ordering::SeqCst)
    }

    pub fn stats(&self) -> ReplayStats {
        self.stats.lock().clone()
    }

    /// Frame sink handed to the recorder
    fn make_sink(&self, flush_threshold: usize) -> FrameSink {
        let buffer = Arc::clone(&self.buffer);
        let stats = Arc::clone(&self.stats);
        let flush_notify = Arc::clone(&self.flush_notify);

        Box::new(move |frame| {
            let should_flush = {
                let mut buf = buffer.lock();
                buf.push_back(frame);
                buf.len() >= flush_threshold
            };
            stats.lock().frames_buffered += 1;
            if should_flush {
                flush_notify.notify_one();
            }
        })
    }

    async fn run_flush_loop(
        ctx: Arc<AgentContext>,
        buffer: Arc<Mutex<VecDeque<ReplayFrame>>>,
        session_id: Arc<Mutex<Option<String>>>,
        stats: Arc<Mutex<ReplayStats>>,
        flush_notify: Arc<Notify>,
        stop_notify: Arc<Notify>,
        flush_interval: Duration,
    ) {
        let mut ticker = tokio::time::interval(flush_interval);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
        // The first tick completes immediately; consume it so the loop
        // waits a full interval before its first timed flush.
        ticker.tick().await;

        loop {
            tokio::select! {
                _ = ticker.tick() => {}
                _ = flush_notify.notified() => {}
                _ = stop_notify.notified() => break,
            }

            if let Err(e) = Self::flush_once(&ctx, &buffer, &session_id, &stats).await {
                warn!("Replay flush failed: {}", e);
            }
        }
    }

    /// One flush: atomic drain, batch build, compressed send, re-queue on
    /// failure
    async fn flush_once(
        ctx: &Arc<AgentContext>,
        buffer: &Arc<Mutex<VecDeque<ReplayFrame>>>,
        session_id: &Arc<Mutex<Option<String>>>,
        stats: &Arc<Mutex<ReplayStats>>,
    ) -> Result<()> {
        let frames: Vec<ReplayFrame> = {
            let mut buf = buffer.lock();
            if buf.is_empty() {
                return Ok(());
            }
            buf.drain(..).collect()
        };
        let frame_count = frames.len();

        let read = ctx.config.read();
        let config = Arc::clone(read.config());
        let snapshot = ctx.host.snapshot();

        let batch = ReplayBatch {
            batch_id: Ulid::new().to_string(),
            session_id: session_id.lock().clone().unwrap_or_default(),
            site_id: config.site_id.clone(),
            hostname: snapshot.hostname,
            pathname: snapshot.pathname,
            title: snapshot.title,
            created_at: chrono::Utc::now().timestamp_millis(),
            user_id: ctx.user_id(),
            frames,
        };

        let result = match batch.encode(CompressionLevel::Balanced) {
            Ok(body) => {
                let request = DeliveryRequest {
                    url: format!("{}/{}", config.endpoint, REPLAY_PATH),
                    body,
                    content_type: "application/json",
                    content_encoding: Some("zstd"),
                };
                ctx.transport.send(request).await
            }
            Err(e) => Err(e),
        };

        match result {
            Ok(()) => {
                let mut s = stats.lock();
                s.batches_sent += 1;
                s.frames_sent += frame_count as u64;
                drop(s);
                debug!("Flushed replay batch of {} frames", frame_count);
                Ok(())
            }
            Err(e) => {
                // The exact frames that failed go back to the front, ahead
                // of anything buffered meanwhile, so the next flush retries
                // them in their original order.
                {
                    let mut buf = buffer.lock();
                    for frame in batch.frames.into_iter().rev() {
                        buf.push_front(frame);
                    }
                }
                stats.lock().batches_requeued += 1;
                Err(e)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{AgentOptions, ConfigStore};
    use crate::host::{MemoryStore, PageSnapshot, StaticPage};
    use crate::replay::batch::frame_kind;
    use crate::transport::testing::{wait_for, RecordingTransport};
    use async_trait::async_trait;
    use serde_json::json;

    /// Recorder double: the test drives frame emission by hand
    #[derive(Default)]
    struct ScriptedRecorder {
        sink: Mutex<Option<FrameSink>>,
        stopped: Arc<AtomicBool>,
    }

    impl ScriptedRecorder {
        fn emit(&self, frame: ReplayFrame) {
            if let Some(sink) = self.sink.lock().as_ref() {
                sink(frame);
            }
        }

        fn started(&self) -> bool {
            self.sink.lock().is_some()
        }
    }

    #[async_trait]
    impl DomRecorder for ScriptedRecorder {
        async fn start(&self, _policy: RecorderPolicy, sink: FrameSink) -> Result<RecorderHandle> {
            *self.sink.lock() = Some(sink);
            let stopped = Arc::clone(&self.stopped);
            Ok(RecorderHandle::new(move || {
                stopped.store(true, Ordering::SeqCst);
            }))
        }
    }

    struct Fixture {
        recorder: Arc<ScriptedRecorder>,
        transport: Arc<RecordingTransport>,
        engine: ReplayEngine,
    }

    async fn fixture(mutate: impl FnOnce(&mut AgentOptions)) -> Fixture {
        let config = ConfigStore::new();
        let mut options = AgentOptions::new("https://collect.example.com", "site_1");
        options.enable_replay = Some(true);
        mutate(&mut options);
        config.initialize(options).await.unwrap();

        let transport = Arc::new(RecordingTransport::new());
        let ctx = Arc::new(AgentContext::new(
            config,
            Arc::new(StaticPage::new(PageSnapshot {
                hostname: "example.com".to_string(),
                pathname: "/home".to_string(),
                title: "Home".to_string(),
                ..Default::default()
            })),
            Arc::new(MemoryStore::new()),
            Arc::clone(&transport) as _,
        ));

        let recorder = Arc::new(ScriptedRecorder::default());
        let engine = ReplayEngine::new(ctx, Some(Arc::clone(&recorder) as _));

        Fixture {
            recorder,
            transport,
            engine,
        }
    }

    fn frame(n: i64) -> ReplayFrame {
        ReplayFrame {
            kind: frame_kind::INCREMENTAL_SNAPSHOT,
            data: json!({"seq": n}),
            timestamp_ms: n,
        }
    }

    fn sent_batches(transport: &RecordingTransport) -> Vec<ReplayBatch> {
        transport
            .sent
            .lock()
            .iter()
            .map(|req| ReplayBatch::decode(&req.body).unwrap())
            .collect()
    }

    #[tokio::test]
    async fn test_start_refuses_when_disabled() {
        let f = fixture(|o| o.enable_replay = Some(false)).await;
        assert!(f.engine.start().await.is_err());
        assert!(!f.engine.is_recording());
        assert!(!f.recorder.started());
    }

    #[tokio::test]
    async fn test_start_refuses_when_already_recording() {
        let f = fixture(|_| {}).await;
        f.engine.start().await.unwrap();
        assert!(f.engine.is_recording());
        assert!(f.engine.start().await.is_err());

        f.engine.stop().await;
        assert!(!f.engine.is_recording());
    }

    #[tokio::test]
    async fn test_stop_is_idempotent() {
        let f = fixture(|_| {}).await;
        f.engine.stop().await;

        f.engine.start().await.unwrap();
        f.engine.stop().await;
        f.engine.stop().await;
        assert!(!f.engine.is_recording());
        assert!(f.recorder.stopped.load(Ordering::SeqCst));
    }

    #[tokio::test]
    async fn test_unsampled_session_settles_idle() {
        let f = fixture(|o| o.replay.sample_rate = 0.0).await;
        f.engine.start().await.unwrap();
        assert!(!f.engine.is_recording());
        assert!(!f.recorder.started());
    }

    #[tokio::test]
    async fn test_threshold_triggers_immediate_flush() {
        let f = fixture(|_| {}).await;
        f.engine.start().await.unwrap();

        // The threshold clamps to its documented minimum of 16.
        for n in 0..16 {
            f.recorder.emit(frame(n));
        }

        wait_for(|| f.transport.sent_count() == 1).await;
        let batches = sent_batches(&f.transport);
        assert_eq!(batches[0].frames.len(), 16);
        assert_eq!(batches[0].site_id, "site_1");
        assert_eq!(batches[0].pathname, "/home");

        f.engine.stop().await;
    }

    #[tokio::test(start_paused = true)]
    async fn test_timer_flush_without_threshold() {
        let f = fixture(|_| {}).await;
        f.engine.start().await.unwrap();

        f.recorder.emit(frame(1));
        f.recorder.emit(frame(2));

        // Default interval is 5s; ride past one tick.
        tokio::time::sleep(Duration::from_secs(6)).await;
        assert_eq!(f.transport.sent_count(), 1);

        let batches = sent_batches(&f.transport);
        assert_eq!(batches[0].frames, vec![frame(1), frame(2)]);

        f.engine.stop().await;
    }

    #[tokio::test]
    async fn test_failed_flush_requeues_exact_frames_in_order() {
        let f = fixture(|_| {}).await;
        f.engine.start().await.unwrap();

        f.recorder.emit(frame(1));
        f.recorder.emit(frame(2));

        f.transport.fail_next(1);
        assert!(f.engine.flush().await.is_err());
        assert_eq!(f.transport.sent_count(), 0);
        assert_eq!(f.engine.stats().batches_requeued, 1);

        // New frames queue behind the re-queued ones.
        f.recorder.emit(frame(3));

        f.engine.flush().await.unwrap();
        let batches = sent_batches(&f.transport);
        assert_eq!(batches.len(), 1);
        assert_eq!(
            batches[0].frames,
            vec![frame(1), frame(2), frame(3)],
            "retried frames keep their order, nothing lost or duplicated"
        );

        f.engine.stop().await;
    }

    #[tokio::test]
    async fn test_stop_runs_final_flush() {
        let f = fixture(|_| {}).await;
        f.engine.start().await.unwrap();

        f.recorder.emit(frame(7));
        f.engine.stop().await;

        assert_eq!(f.transport.sent_count(), 1);
        let batches = sent_batches(&f.transport);
        assert_eq!(batches[0].frames, vec![frame(7)]);
        assert!(f.recorder.stopped.load(Ordering::SeqCst));

        let stats = f.engine.stats();
        assert_eq!(stats.frames_buffered, 1);
        assert_eq!(stats.frames_sent, 1);
        assert_eq!(stats.batches_sent, 1);
    }

    #[tokio::test]
    async fn test_session_and_user_metadata_on_batches() {
        let f = fixture(|_| {}).await;
        f.engine.ctx.identify("u_9").unwrap();
        f.engine.start().await.unwrap();

        f.recorder.emit(frame(1));
        f.engine.flush().await.unwrap();

        let batches = sent_batches(&f.transport);
        assert!(!batches[0].session_id.is_empty());
        assert_eq!(batches[0].user_id.as_deref(), Some("u_9"));
        assert!(!batches[0].batch_id.is_empty());

        f.engine.stop().await;
    }

    #[tokio::test]
    async fn test_replay_content_encoding_is_zstd() {
        let f = fixture(|_| {}).await;
        f.engine.start().await.unwrap();

        f.recorder.emit(frame(1));
        f.engine.flush().await.unwrap();

        let sent = f.transport.sent.lock();
        assert_eq!(sent[0].content_encoding, Some("zstd"));
        assert_eq!(sent[0].url, "https://collect.example.com/replay");
    }
}
