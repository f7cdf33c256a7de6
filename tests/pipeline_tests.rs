// SPDX-License-Identifier: GPL-3.0-only

//! Integration tests for the frame analysis pipeline

use futures::future::BoxFuture;
use qr_scan::backends::camera::{Frame, FrameImage, FrameReleaser, PixelFormat};
use qr_scan::errors::{DecodeError, ReleaseError};
use qr_scan::pipelines::scan::{
    AnalysisExecutor, DecodeOutcome, Decoder, FrameAnalysisPipeline, PipelineState, ResultSink,
    ScanResult, SharedState,
};
use std::sync::mpsc::{self, Receiver};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

const TIMEOUT: Duration = Duration::from_secs(5);

/// Decoder mapping the first pixel byte to a scripted outcome
struct ScriptedDecoder {
    delay: Duration,
    starts: Arc<Mutex<Vec<Instant>>>,
    script: fn(u8) -> DecodeOutcome,
}

impl Decoder for ScriptedDecoder {
    fn decode<'a>(&'a self, image: &'a FrameImage) -> BoxFuture<'a, DecodeOutcome> {
        self.starts.lock().unwrap().push(Instant::now());
        let outcome = (self.script)(image.data[0]);
        let delay = self.delay;
        Box::pin(async move {
            if !delay.is_zero() {
                tokio::time::sleep(delay).await;
            }
            outcome
        })
    }
}

fn letters(byte: u8) -> DecodeOutcome {
    Ok(vec![char::from(byte).to_string()])
}

fn nothing(_: u8) -> DecodeOutcome {
    Ok(Vec::new())
}

fn low_light(_: u8) -> DecodeOutcome {
    Err(DecodeError::new("low light"))
}

struct Rig {
    pipeline: Arc<FrameAnalysisPipeline>,
    state: SharedState,
    executor: AnalysisExecutor,
    results: Receiver<(Instant, ScanResult)>,
    releases: Receiver<(u64, Instant)>,
    releaser: Arc<dyn FrameReleaser>,
    decode_starts: Arc<Mutex<Vec<Instant>>>,
}

impl Rig {
    fn new(cooldown: Duration, delay: Duration, script: fn(u8) -> DecodeOutcome) -> Self {
        let executor = AnalysisExecutor::start("pipeline-it").unwrap();
        let state = SharedState::new();
        let decode_starts = Arc::new(Mutex::new(Vec::new()));

        // Timestamp on the worker, when the result is emitted
        let (result_tx, results) = mpsc::channel();
        let result_tx = Mutex::new(result_tx);
        let sink = move |result: ScanResult| {
            let _ = result_tx.lock().unwrap().send((Instant::now(), result));
        };

        let (release_tx, releases) = mpsc::channel();
        let release_tx = Mutex::new(release_tx);
        let releaser: Arc<dyn FrameReleaser> =
            Arc::new(move |id: u64| -> Result<(), ReleaseError> {
                let _ = release_tx.lock().unwrap().send((id, Instant::now()));
                Ok(())
            });

        let sink: Arc<dyn ResultSink> = Arc::new(sink);
        let pipeline = Arc::new(FrameAnalysisPipeline::new(
            Arc::new(ScriptedDecoder {
                delay,
                starts: Arc::clone(&decode_starts),
                script,
            }),
            sink,
            executor.handle(),
            state.clone(),
            cooldown,
        ));

        Self {
            pipeline,
            state,
            executor,
            results,
            releases,
            releaser,
            decode_starts,
        }
    }

    fn frame(&self, id: u64, byte: u8) -> Frame {
        let image = FrameImage::packed(1, 1, PixelFormat::Gray8, vec![byte]);
        Frame::new(id, Some(image), Arc::clone(&self.releaser))
    }

    fn empty_frame(&self, id: u64) -> Frame {
        Frame::new(id, None, Arc::clone(&self.releaser))
    }

    fn next_release(&self) -> (u64, Instant) {
        self.releases.recv_timeout(TIMEOUT).expect("missing release")
    }

    fn collect_releases(&self, count: usize) -> Vec<u64> {
        let mut ids: Vec<u64> = (0..count).map(|_| self.next_release().0).collect();
        ids.sort_unstable();
        ids
    }

    fn next_result(&self) -> (Instant, ScanResult) {
        self.results.recv_timeout(TIMEOUT).expect("missing result")
    }
}

#[test]
fn test_results_in_order_with_cooldown_spacing() {
    let rig = Rig::new(Duration::from_millis(300), Duration::ZERO, letters);
    rig.state.set(PipelineState::Active);

    for (id, byte) in [(1, b'A'), (2, b'B'), (3, b'C')] {
        rig.pipeline.submit(rig.frame(id, byte));
    }

    let (t_a, a) = rig.next_result();
    let (t_b, b) = rig.next_result();
    let (t_c, c) = rig.next_result();
    assert_eq!(a, ScanResult::Success("A".to_string()));
    assert_eq!(b, ScanResult::Success("B".to_string()));
    assert_eq!(c, ScanResult::Success("C".to_string()));

    assert!(t_b.duration_since(t_a) >= Duration::from_millis(300));
    assert!(t_c.duration_since(t_b) >= Duration::from_millis(300));

    assert_eq!(rig.collect_releases(3), vec![1, 2, 3]);
}

#[test]
fn test_release_follows_own_decode_by_cooldown() {
    let cooldown = Duration::from_millis(300);
    let rig = Rig::new(cooldown, Duration::ZERO, letters);
    rig.state.set(PipelineState::Active);

    // Frame 2 is queued while frame 1 decodes
    rig.pipeline.submit(rig.frame(1, b'A'));
    rig.pipeline.submit(rig.frame(2, b'B'));

    let (t_a, a) = rig.next_result();
    assert_eq!(a, ScanResult::Success("A".to_string()));

    let (id, released_at) = rig.next_release();
    assert_eq!(id, 1);
    let delay = released_at.duration_since(t_a);
    assert!(delay >= cooldown, "released after {:?}", delay);
    assert!(
        delay < cooldown + Duration::from_millis(150),
        "released after {:?}",
        delay
    );

    assert_eq!(rig.next_release().0, 2);
}

#[test]
fn test_shutdown_interrupts_rate_limit_wait() {
    let mut rig = Rig::new(Duration::from_secs(10), Duration::ZERO, letters);
    rig.state.set(PipelineState::Active);

    rig.pipeline.submit(rig.frame(1, b'A'));
    rig.pipeline.submit(rig.frame(2, b'B'));
    let (_, first) = rig.next_result();
    assert_eq!(first, ScanResult::Success("A".to_string()));

    let start = Instant::now();
    rig.executor.shutdown();
    assert!(start.elapsed() < Duration::from_secs(1));

    assert_eq!(rig.collect_releases(2), vec![1, 2]);
    assert!(rig.results.try_recv().is_err());
    assert_eq!(rig.pipeline.stats().analysed, 1);
}

#[test]
fn test_decode_failure_reports_message_once() {
    let rig = Rig::new(Duration::from_millis(20), Duration::ZERO, low_light);
    rig.state.set(PipelineState::Active);

    rig.pipeline.submit(rig.frame(7, 0));

    let (_, result) = rig.next_result();
    assert_eq!(result, ScanResult::Error("low light".to_string()));
    assert_eq!(rig.collect_releases(1), vec![7]);
    assert!(rig.results.recv_timeout(Duration::from_millis(100)).is_err());
}

#[test]
fn test_empty_frame_skips_decoder() {
    let rig = Rig::new(Duration::from_millis(20), Duration::ZERO, letters);
    rig.state.set(PipelineState::Active);

    rig.pipeline.submit(rig.empty_frame(1));

    let (_, result) = rig.next_result();
    assert_eq!(result, ScanResult::Error("Image is empty".to_string()));
    assert_eq!(rig.collect_releases(1), vec![1]);
    assert!(rig.decode_starts.lock().unwrap().is_empty());
}

#[test]
fn test_nothing_found_emits_nothing() {
    let rig = Rig::new(Duration::from_millis(20), Duration::ZERO, nothing);
    rig.state.set(PipelineState::Active);

    rig.pipeline.submit(rig.frame(1, 0));
    rig.pipeline.submit(rig.frame(2, 0));

    assert_eq!(rig.collect_releases(2), vec![1, 2]);
    assert!(rig.results.try_recv().is_err());
    assert_eq!(rig.pipeline.stats().analysed, 2);
}

#[test]
fn test_decode_starts_are_spaced_by_duration_and_cooldown() {
    let cooldown = Duration::from_millis(100);
    let decode_time = Duration::from_millis(50);
    let rig = Rig::new(cooldown, decode_time, nothing);
    rig.state.set(PipelineState::Active);

    for id in 1..=4 {
        rig.pipeline.submit(rig.frame(id, 0));
    }
    assert_eq!(rig.collect_releases(4), vec![1, 2, 3, 4]);

    let starts = rig.decode_starts.lock().unwrap().clone();
    assert_eq!(starts.len(), 4);
    for pair in starts.windows(2) {
        assert!(pair[1].duration_since(pair[0]) >= decode_time + cooldown);
    }
}

#[test]
fn test_every_submission_is_released_once() {
    let mut rig = Rig::new(Duration::from_secs(10), Duration::ZERO, letters);

    // Idle
    rig.pipeline.submit(rig.frame(1, b'x'));
    rig.pipeline.submit(rig.empty_frame(2));

    // Active; its release waits out the cool-down
    rig.state.set(PipelineState::Active);
    rig.pipeline.submit(rig.frame(3, b'y'));
    let (_, first) = rig.next_result();
    assert_eq!(first, ScanResult::Success("y".to_string()));

    rig.state.set(PipelineState::Suspended);
    rig.pipeline.submit(rig.empty_frame(4));
    rig.pipeline.submit(rig.frame(5, b'z'));

    // Stopped with a long cool-down still pending
    rig.state.set(PipelineState::Stopped);
    rig.pipeline.submit(rig.frame(6, b'w'));

    rig.executor.shutdown();

    assert_eq!(rig.collect_releases(6), vec![1, 2, 3, 4, 5, 6]);
    assert!(rig.releases.recv_timeout(Duration::from_millis(100)).is_err());

    let stats = rig.pipeline.stats();
    assert_eq!(stats.submitted, 6);
    assert_eq!(stats.successes, 1);
}

#[test]
fn test_inactive_pipeline_never_decodes() {
    let rig = Rig::new(Duration::from_millis(10), Duration::ZERO, letters);

    for (id, state) in [(1, PipelineState::Suspended), (2, PipelineState::Stopped)] {
        rig.state.set(state);
        rig.pipeline.submit(rig.frame(id, b'q'));
    }

    assert_eq!(rig.collect_releases(2), vec![1, 2]);
    assert!(rig.results.recv_timeout(Duration::from_millis(100)).is_err());
    assert!(rig.decode_starts.lock().unwrap().is_empty());
    assert_eq!(rig.pipeline.stats().ignored, 2);
}
