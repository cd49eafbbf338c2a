// SPDX-License-Identifier: GPL-3.0-only

//! Detection event stream
//!
//! The consumer-facing surface of the scanner. Opening a stream starts the
//! capture session, claims the frame receiver and spawns the detection
//! engine; the stream then yields [`DetectionEvent`]s until it is closed,
//! cancelled or the session ends. Only one stream can be attached to a
//! session generation at a time — a second open fails with
//! [`ScanError::StreamActive`] rather than silently splitting frames.

use crate::config::ScannerConfig;
use crate::detect::{DetectionEngine, DetectionEvent};
use crate::errors::{ScanError, ScanResult};
use crate::session::{SessionManager, StopPermit};
use crate::validator::ValidatedIsbn;
use futures::Stream;
use std::fmt;
use std::pin::Pin;
use std::task::{Context, Poll};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::debug;

const EVENT_CHANNEL_CAPACITY: usize = 32;

/// A live stream of detection events, owning the running session.
///
/// Ends when [`close`](Self::close) is called, when the session stops, or
/// when the stream is dropped. Dropping without closing still tears down the
/// engine and queues a session stop, so the device is never leaked.
pub struct DetectionStream {
    manager: SessionManager,
    events: mpsc::Receiver<DetectionEvent>,
    cancel: CancellationToken,
    engine: Option<JoinHandle<()>>,
    /// Command slot reserved up front so the drop guard's stop cannot be
    /// lost to a full channel
    stop_permit: Option<StopPermit>,
    closed: bool,
}

impl DetectionStream {
    /// Start the session and attach a detection engine to its frames.
    pub async fn open(manager: SessionManager, config: ScannerConfig) -> ScanResult<Self> {
        config.validate()?;
        manager.start_session().await?;

        // The frame receiver is claimable once per session generation; a
        // holder elsewhere means another stream is already attached
        let frames = manager
            .take_frames()
            .await?
            .ok_or(ScanError::StreamActive)?;
        let stop_permit = manager.reserve_stop().await?;

        let (event_tx, events) = mpsc::channel(EVENT_CHANNEL_CAPACITY);
        let cancel = CancellationToken::new();
        let engine = DetectionEngine::new(config).spawn(frames, event_tx, cancel.clone());

        Ok(Self {
            manager,
            events,
            cancel,
            engine: Some(engine),
            stop_permit: Some(stop_permit),
            closed: false,
        })
    }

    /// Tear down the engine and stop the session.
    ///
    /// Returns the manager so a caller can open a fresh stream on the next
    /// session generation.
    pub async fn close(mut self) -> ScanResult<SessionManager> {
        self.closed = true;
        self.cancel.cancel();
        if let Some(engine) = self.engine.take() {
            let _ = engine.await;
        }
        // Release the reserved slot; the stop below is awaited directly
        self.stop_permit.take();
        let manager = self.manager.clone();
        manager.stop_session().await?;
        debug!("Detection stream closed");
        Ok(manager)
    }

    /// Session manager backing this stream
    pub fn manager(&self) -> &SessionManager {
        &self.manager
    }

    /// Restrict the stream to events that passed checksum validation.
    pub fn validated(self) -> ValidatedStream {
        ValidatedStream { inner: self }
    }
}

impl Stream for DetectionStream {
    type Item = DetectionEvent;

    fn poll_next(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        self.get_mut().events.poll_recv(cx)
    }
}

impl Drop for DetectionStream {
    fn drop(&mut self) {
        if !self.closed {
            self.cancel.cancel();
            if let Some(permit) = self.stop_permit.take() {
                permit.stop();
            }
        }
    }
}

impl fmt::Debug for DetectionStream {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DetectionStream")
            .field("closed", &self.closed)
            .finish_non_exhaustive()
    }
}

/// [`DetectionStream`] filtered down to validated identifiers
pub struct ValidatedStream {
    inner: DetectionStream,
}

impl ValidatedStream {
    pub async fn close(self) -> ScanResult<SessionManager> {
        self.inner.close().await
    }
}

impl Stream for ValidatedStream {
    type Item = ValidatedIsbn;

    fn poll_next(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        let inner = &mut self.get_mut().inner;
        loop {
            match inner.events.poll_recv(cx) {
                Poll::Ready(Some(event)) => {
                    if let Some(isbn) = event.validated {
                        return Poll::Ready(Some(isbn));
                    }
                }
                Poll::Ready(None) => return Poll::Ready(None),
                Poll::Pending => return Poll::Pending,
            }
        }
    }
}
