// SPDX-License-Identifier: GPL-3.0-only

//! Per-frame analysis
//!
//! Frames are accepted only while the pipeline is active. Each accepted frame
//! is queued onto the session's analysis worker, decoded once the rate limiter
//! allows it, mapped onto [`ScanResult`]s and released after the cool-down.
//! Rejected frames are released right away on the submitting thread.

use super::decoder::{DecodeOutcome, Decoder};
use super::executor::ExecutorHandle;
use super::rate_limit::RateLimiter;
use super::result::{ResultSink, ScanResult};
use super::state::{PipelineState, SharedState};
use crate::backends::camera::{Frame, FrameImage};
use crate::errors::{DecodeError, ScanError};
use futures::FutureExt;
use std::any::Any;
use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::{Duration, Instant};
use tracing::{debug, error, trace, warn};

/// Frame counters, for logging and diagnostics
#[derive(Debug, Default)]
struct Counters {
    submitted: AtomicU64,
    ignored: AtomicU64,
    analysed: AtomicU64,
    successes: AtomicU64,
    errors: AtomicU64,
}

/// Snapshot of pipeline counters
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct PipelineStats {
    /// Frames handed to `submit`
    pub submitted: u64,
    /// Frames released without analysis
    pub ignored: u64,
    /// Frames that went through the empty check or the decoder
    pub analysed: u64,
    /// Success results emitted
    pub successes: u64,
    /// Error results emitted
    pub errors: u64,
}

pub struct FrameAnalysisPipeline {
    decoder: Arc<dyn Decoder>,
    sink: Arc<dyn ResultSink>,
    executor: ExecutorHandle,
    state: SharedState,
    cooldown: Duration,
    limiter: Mutex<RateLimiter>,
    counters: Counters,
}

impl FrameAnalysisPipeline {
    /// Create a pipeline scheduling its work on `executor`
    ///
    /// The pipeline only reads `state`; whoever owns the executor drives it.
    pub fn new(
        decoder: Arc<dyn Decoder>,
        sink: Arc<dyn ResultSink>,
        executor: ExecutorHandle,
        state: SharedState,
        cooldown: Duration,
    ) -> Self {
        Self {
            decoder,
            sink,
            executor,
            state,
            cooldown,
            limiter: Mutex::new(RateLimiter::new(cooldown)),
            counters: Counters::default(),
        }
    }

    pub fn state(&self) -> PipelineState {
        self.state.get()
    }

    pub fn cooldown(&self) -> Duration {
        self.cooldown
    }

    pub fn stats(&self) -> PipelineStats {
        PipelineStats {
            submitted: self.counters.submitted.load(Ordering::Relaxed),
            ignored: self.counters.ignored.load(Ordering::Relaxed),
            analysed: self.counters.analysed.load(Ordering::Relaxed),
            successes: self.counters.successes.load(Ordering::Relaxed),
            errors: self.counters.errors.load(Ordering::Relaxed),
        }
    }

    /// Hand one frame to the pipeline
    ///
    /// Never blocks on analysis and never fails: a frame that cannot be
    /// analysed is released and dropped silently.
    pub fn submit(self: &Arc<Self>, frame: Frame) {
        self.counters.submitted.fetch_add(1, Ordering::Relaxed);

        let state = self.state();
        if !state.accepts_frames() {
            self.ignore(frame, state);
            return;
        }

        let frame_id = frame.id();
        let pipeline = Arc::clone(self);
        if !self.executor.run(pipeline.analyze(frame)) {
            // The job owned the frame and was dropped with it
            self.counters.ignored.fetch_add(1, Ordering::Relaxed);
            debug!(frame_id, "Analysis worker gone, frame released");
        }
    }

    fn ignore(&self, mut frame: Frame, state: PipelineState) {
        self.counters.ignored.fetch_add(1, Ordering::Relaxed);
        trace!(
            frame_id = frame.id(),
            state = %state,
            reason = %ScanError::SubmissionIgnored,
            "Dropping frame"
        );
        frame.release();
    }

    async fn analyze(self: Arc<Self>, frame: Frame) {
        let state = self.state();
        if !state.accepts_frames() {
            self.ignore(frame, state);
            return;
        }

        let deadline = self.limiter().next_allowed();
        if let Some(deadline) = deadline {
            if !self.executor.sleep_until(deadline).await {
                // Worker shutting down; this frame never reached the decoder
                self.ignore(frame, self.state());
                return;
            }
        }

        // Owner may have gone inactive while we waited
        let state = self.state();
        if !state.accepts_frames() {
            self.ignore(frame, state);
            return;
        }

        let started = Instant::now();
        let result_count = match frame.image() {
            None => {
                debug!(frame_id = frame.id(), "Frame has no image data");
                self.emit(ScanResult::Error(ScanError::EmptyFrame.to_string()));
                1
            }
            Some(image) => match self.run_decoder(image).await {
                Ok(payloads) => {
                    let mut emitted = 0;
                    for payload in payloads.into_iter().filter(|p| !p.is_empty()) {
                        self.emit(ScanResult::Success(payload));
                        emitted += 1;
                    }
                    emitted
                }
                Err(e) => {
                    debug!(frame_id = frame.id(), error = %e, "Decode failed");
                    self.emit(ScanResult::Error(ScanError::from(e).to_string()));
                    1
                }
            },
        };

        let completed = Instant::now();
        self.limiter().record_completion(completed);
        self.counters.analysed.fetch_add(1, Ordering::Relaxed);

        debug!(
            frame_id = frame.id(),
            results = result_count,
            decode_ms = completed.duration_since(started).as_millis(),
            "Frame analysed"
        );

        self.executor.defer(self.cooldown, move || {
            let mut frame = frame;
            frame.release();
        });
    }

    /// Invoke the decoder, turning panics into decode failures
    async fn run_decoder(&self, image: &FrameImage) -> DecodeOutcome {
        let decoder = &self.decoder;
        let future = match panic::catch_unwind(AssertUnwindSafe(|| decoder.decode(image))) {
            Ok(future) => future,
            Err(payload) => {
                warn!("Decoder panicked before returning a future");
                return Err(DecodeError::new(panic_message(payload.as_ref())));
            }
        };

        match AssertUnwindSafe(future).catch_unwind().await {
            Ok(outcome) => outcome,
            Err(payload) => {
                warn!("Decoder panicked while decoding");
                Err(DecodeError::new(panic_message(payload.as_ref())))
            }
        }
    }

    fn emit(&self, result: ScanResult) {
        if result.is_success() {
            self.counters.successes.fetch_add(1, Ordering::Relaxed);
        } else {
            self.counters.errors.fetch_add(1, Ordering::Relaxed);
        }

        let sink = &self.sink;
        if panic::catch_unwind(AssertUnwindSafe(|| sink.on_result(result))).is_err() {
            error!("Result sink panicked");
        }
    }

    fn limiter(&self) -> MutexGuard<'_, RateLimiter> {
        self.limiter.lock().unwrap_or_else(|e| e.into_inner())
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(msg) = payload.downcast_ref::<&str>() {
        msg.to_string()
    } else if let Some(msg) = payload.downcast_ref::<String>() {
        msg.clone()
    } else {
        DecodeError::FALLBACK_MESSAGE.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backends::camera::{FrameReleaser, PixelFormat};
    use crate::errors::ReleaseError;
    use crate::pipelines::scan::executor::AnalysisExecutor;
    use futures::future::BoxFuture;
    use std::sync::mpsc;

    struct FnDecoder<F>(F);

    impl<F> Decoder for FnDecoder<F>
    where
        F: Fn(&FrameImage) -> DecodeOutcome + Send + Sync,
    {
        fn decode<'a>(&'a self, image: &'a FrameImage) -> BoxFuture<'a, DecodeOutcome> {
            let outcome = (self.0)(image);
            Box::pin(async move { outcome })
        }
    }

    struct Harness {
        pipeline: Arc<FrameAnalysisPipeline>,
        state: SharedState,
        results: mpsc::Receiver<ScanResult>,
        releases: mpsc::Receiver<u64>,
        releaser: Arc<dyn FrameReleaser>,
        executor: AnalysisExecutor,
    }

    impl Harness {
        fn new<F>(cooldown: Duration, decode: F) -> Self
        where
            F: Fn(&FrameImage) -> DecodeOutcome + Send + Sync + 'static,
        {
            let executor = AnalysisExecutor::start("pipeline-test").unwrap();
            let state = SharedState::new();
            let (result_tx, results) = mpsc::channel();
            let (release_tx, releases) = mpsc::channel();
            let release_tx = Mutex::new(release_tx);
            let releaser: Arc<dyn FrameReleaser> =
                Arc::new(move |id: u64| -> Result<(), ReleaseError> {
                    let _ = release_tx.lock().unwrap().send(id);
                    Ok(())
                });
            let pipeline = Arc::new(FrameAnalysisPipeline::new(
                Arc::new(FnDecoder(decode)),
                Arc::new(result_tx),
                executor.handle(),
                state.clone(),
                cooldown,
            ));
            Self {
                pipeline,
                state,
                results,
                releases,
                releaser,
                executor,
            }
        }

        fn frame(&self, id: u64, payload_byte: u8) -> Frame {
            let image = FrameImage::packed(1, 1, PixelFormat::Gray8, vec![payload_byte]);
            Frame::new(id, Some(image), Arc::clone(&self.releaser))
        }

        fn wait_release(&self) -> u64 {
            self.releases
                .recv_timeout(Duration::from_secs(3))
                .expect("frame was not released")
        }
    }

    #[test]
    fn test_frame_ignored_while_idle() {
        let h = Harness::new(Duration::from_millis(10), |_| panic!("decoder must not run"));

        h.pipeline.submit(h.frame(1, 0));

        assert_eq!(h.wait_release(), 1);
        assert!(h.results.recv_timeout(Duration::from_millis(100)).is_err());
        assert_eq!(h.pipeline.stats().ignored, 1);
    }

    #[test]
    fn test_success_per_non_empty_payload() {
        let h = Harness::new(Duration::from_millis(10), |_| {
            Ok(vec!["one".to_string(), String::new(), "two".to_string()])
        });
        h.state.set(PipelineState::Active);

        h.pipeline.submit(h.frame(1, 0));

        assert_eq!(h.wait_release(), 1);
        let results: Vec<ScanResult> = h.results.try_iter().collect();
        assert_eq!(
            results,
            vec![
                ScanResult::Success("one".to_string()),
                ScanResult::Success("two".to_string())
            ]
        );
    }

    #[test]
    fn test_no_payload_emits_nothing() {
        let h = Harness::new(Duration::from_millis(10), |_| Ok(Vec::new()));
        h.state.set(PipelineState::Active);

        h.pipeline.submit(h.frame(1, 0));

        assert_eq!(h.wait_release(), 1);
        assert!(h.results.try_recv().is_err());
        assert_eq!(h.pipeline.stats().analysed, 1);
    }

    #[test]
    fn test_empty_image_skips_decoder() {
        let h = Harness::new(Duration::from_millis(10), |_| panic!("decoder must not run"));
        h.state.set(PipelineState::Active);

        h.pipeline.submit(Frame::new(5, None, Arc::clone(&h.releaser)));

        assert_eq!(h.wait_release(), 5);
        assert_eq!(
            h.results.try_recv().unwrap(),
            ScanResult::Error("Image is empty".to_string())
        );
        assert!(h.results.try_recv().is_err());
    }

    #[test]
    fn test_decoder_failure_without_message() {
        let h = Harness::new(Duration::from_millis(10), |_| Err(DecodeError::new("")));
        h.state.set(PipelineState::Active);

        h.pipeline.submit(h.frame(1, 0));

        assert_eq!(h.wait_release(), 1);
        assert_eq!(
            h.results.try_recv().unwrap(),
            ScanResult::Error("decode failed".to_string())
        );
    }

    #[test]
    fn test_decoder_panic_is_contained() {
        let h = Harness::new(Duration::from_millis(10), |image| {
            if image.data[0] == 1 {
                panic!("sensor exploded");
            }
            Ok(vec!["fine".to_string()])
        });
        h.state.set(PipelineState::Active);

        h.pipeline.submit(h.frame(1, 1));
        h.pipeline.submit(h.frame(2, 0));

        assert_eq!(h.wait_release(), 1);
        assert_eq!(h.wait_release(), 2);
        let results: Vec<ScanResult> = h.results.try_iter().collect();
        assert_eq!(
            results,
            vec![
                ScanResult::Error("sensor exploded".to_string()),
                ScanResult::Success("fine".to_string())
            ]
        );
    }

    #[test]
    fn test_release_waits_for_cooldown() {
        let h = Harness::new(Duration::from_millis(150), |_| Ok(vec!["x".to_string()]));
        h.state.set(PipelineState::Active);

        let start = Instant::now();
        h.pipeline.submit(h.frame(1, 0));

        let result = h.results.recv_timeout(Duration::from_secs(2)).unwrap();
        assert_eq!(result, ScanResult::Success("x".to_string()));

        h.wait_release();
        assert!(start.elapsed() >= Duration::from_millis(150));
    }

    #[test]
    fn test_stopped_worker_still_releases() {
        let mut h = Harness::new(Duration::from_millis(10), |_| Ok(Vec::new()));
        h.state.set(PipelineState::Active);
        h.executor.shutdown();

        h.pipeline.submit(h.frame(9, 0));

        assert_eq!(h.wait_release(), 9);
        assert_eq!(h.pipeline.stats().ignored, 1);
    }

    #[test]
    fn test_panic_message_fallback() {
        let payload: Box<dyn Any + Send> = Box::new(42u32);
        assert_eq!(panic_message(payload.as_ref()), "decode failed");
    }
}
