// SPDX-License-Identifier: GPL-3.0-only

//! Detection engine
//!
//! Turns the session's frame stream into a filtered, deduplicated stream of
//! detection events. Every frame fans out to two independent strategies —
//! software scanline analysis and the firmware decoder — and their candidates
//! merge back through one serialized pipeline: ROI filter, value-keyed
//! throttle, checksum validation.
//!
//! The throttle state lives inside the engine task and is never shared;
//! exclusivity comes from ownership, not locks, so the per-frame path stays
//! contention free.

pub mod hardware;
pub mod types;
pub mod visual;

pub use types::{Candidate, DetectionEvent, DetectionMethod, FrameRegion};
pub use visual::VisualDetector;

use crate::config::{ScannerConfig, ValidationMode};
use crate::session::types::{CaptureFrame, FrameReceiver};
use crate::validator;
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::{Semaphore, mpsc};
use tokio_util::sync::CancellationToken;
use tracing::{debug, trace};

/// Merged-candidate queue between the strategies and the filter pipeline
const CANDIDATE_CHANNEL_CAPACITY: usize = 32;

/// Last emission, keyed by value — a visual and a hardware detection of the
/// same value within the window are duplicates of each other, since both
/// strategies observe the same physical object.
#[derive(Default)]
struct ThrottleState {
    last_value: Option<String>,
    last_emitted_at: Option<Instant>,
}

/// Frame-to-event engine, spawned once per detection stream
pub struct DetectionEngine {
    config: ScannerConfig,
}

impl DetectionEngine {
    pub fn new(config: ScannerConfig) -> Self {
        Self { config }
    }

    /// Run the engine until cancellation, frame-source exhaustion, or the
    /// event receiver going away. Dropping the event sender is what ends
    /// the consumer's stream.
    pub fn spawn(
        self,
        frames: FrameReceiver,
        events: mpsc::Sender<DetectionEvent>,
        cancel: CancellationToken,
    ) -> tokio::task::JoinHandle<()> {
        tokio::spawn(run(self.config, frames, events, cancel))
    }
}

async fn run(
    config: ScannerConfig,
    mut frames: FrameReceiver,
    events: mpsc::Sender<DetectionEvent>,
    cancel: CancellationToken,
) {
    let detector = Arc::new(VisualDetector::new());
    // Visual analysis may take multiple frame intervals; one analysis in
    // flight at a time, later frames are simply skipped
    let visual_gate = Arc::new(Semaphore::new(1));
    let (candidate_tx, mut candidate_rx) = mpsc::channel::<Candidate>(CANDIDATE_CHANNEL_CAPACITY);
    let mut throttle = ThrottleState::default();

    loop {
        tokio::select! {
            _ = cancel.cancelled() => {
                debug!("Detection engine cancelled");
                break;
            }
            maybe_frame = frames.recv() => {
                let Some(frame) = maybe_frame else {
                    debug!("Frame source closed, detection engine ending");
                    break;
                };
                let mut alive = true;
                if config.hardware_decoder_enabled {
                    for candidate in hardware::candidates(&frame) {
                        alive &=
                            process_candidate(&config, &mut throttle, &events, &cancel, candidate)
                                .await;
                    }
                }
                if alive && config.visual_enabled {
                    dispatch_visual(&detector, &visual_gate, &candidate_tx, frame);
                }
                if !alive {
                    break;
                }
            }
            Some(candidate) = candidate_rx.recv() => {
                if !process_candidate(&config, &mut throttle, &events, &cancel, candidate).await {
                    break;
                }
            }
        }
    }
}

/// Hand a frame to the visual strategy without waiting for the result.
///
/// Candidates surface later through the merged channel; a frame arriving
/// while analysis is still running is skipped, not queued.
fn dispatch_visual(
    detector: &Arc<VisualDetector>,
    gate: &Arc<Semaphore>,
    candidates: &mpsc::Sender<Candidate>,
    frame: CaptureFrame,
) {
    let Ok(permit) = gate.clone().try_acquire_owned() else {
        trace!(sequence = frame.sequence, "Visual analysis busy, frame skipped");
        return;
    };
    let detector = detector.clone();
    let candidates = candidates.clone();
    tokio::spawn(async move {
        let found = detector.detect(Arc::new(frame)).await;
        for candidate in found {
            if candidates.send(candidate).await.is_err() {
                break;
            }
        }
        drop(permit);
    });
}

/// Run one candidate through ROI filter, throttle and validation.
///
/// Returns `false` once the event receiver is gone or the engine was
/// cancelled mid-delivery.
async fn process_candidate(
    config: &ScannerConfig,
    throttle: &mut ThrottleState,
    events: &mpsc::Sender<DetectionEvent>,
    cancel: &CancellationToken,
    candidate: Candidate,
) -> bool {
    // Outside the region of interest: a design filter, not an error
    if let Some(roi) = &config.roi
        && !candidate.bounds.intersects(roi)
    {
        trace!(value = %candidate.raw_value, "Candidate outside ROI, discarded");
        return true;
    }

    let now = Instant::now();
    if throttle.last_value.as_deref() == Some(candidate.raw_value.as_str())
        && let Some(last) = throttle.last_emitted_at
        && now.duration_since(last) < config.throttle
    {
        trace!(value = %candidate.raw_value, "Duplicate within throttle window");
        return true;
    }
    throttle.last_value = Some(candidate.raw_value.clone());
    throttle.last_emitted_at = Some(now);

    let validated = match validator::validate(&candidate.raw_value) {
        Ok(isbn) => Some(isbn),
        Err(reason) => {
            if config.validation == ValidationMode::Mandatory {
                debug!(value = %candidate.raw_value, %reason, "Unvalidated candidate dropped");
                return true;
            }
            debug!(value = %candidate.raw_value, %reason, "Passing unvalidated candidate through");
            None
        }
    };

    let event = DetectionEvent {
        raw_value: candidate.raw_value,
        confidence: candidate.confidence,
        timestamp: candidate.captured_at,
        method: candidate.method,
        bounds: candidate.bounds,
        validated,
    };
    // The event queue is bounded and the consumer may have stopped polling;
    // delivery must never outlive a cancellation
    tokio::select! {
        result = events.send(event) => result.is_ok(),
        _ = cancel.cancelled() => {
            debug!("Cancelled while delivering event");
            false
        }
    }
}
