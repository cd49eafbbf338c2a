// SPDX-License-Identifier: GPL-3.0-only

//! Virtual capture device
//!
//! A scripted in-process device used by the test suite and by demos on
//! machines without a camera. Plays back a queued frame script at a
//! configurable cadence and records every control call so tests can assert
//! on session-manager behavior.

use super::CaptureDevice;
use crate::detect::FrameRegion;
use crate::errors::{ScanError, ScanResult};
use crate::session::types::{
    CaptureFrame, DecodedSymbol, DeviceCaps, FrameSender, PermissionStatus, PixelFormat, TorchMode,
};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};
use tokio::sync::mpsc::error::TrySendError;
use tracing::{debug, trace};

/// Recorded control activity, shared with tests
#[derive(Debug, Default)]
pub struct ProbeInner {
    pub opens: u32,
    pub closes: u32,
    pub torch_events: Vec<TorchMode>,
    pub focus_points: Vec<(f32, f32)>,
}

/// Cloneable handle onto the device's recorded activity
#[derive(Debug, Clone, Default)]
pub struct DeviceProbe(Arc<Mutex<ProbeInner>>);

impl DeviceProbe {
    pub fn snapshot(&self) -> ProbeInner {
        let inner = self.0.lock().unwrap();
        ProbeInner {
            opens: inner.opens,
            closes: inner.closes,
            torch_events: inner.torch_events.clone(),
            focus_points: inner.focus_points.clone(),
        }
    }

    fn record(&self, f: impl FnOnce(&mut ProbeInner)) {
        f(&mut self.0.lock().unwrap());
    }
}

/// Scripted capture device
pub struct VirtualDevice {
    name: String,
    permission: PermissionStatus,
    fail_open: Option<ScanError>,
    has_torch: bool,
    has_focus: bool,
    frame_interval: Duration,
    script: Vec<CaptureFrame>,
    looping: bool,
    probe: DeviceProbe,
    playback: Option<tokio::task::JoinHandle<()>>,
    open: bool,
}

impl VirtualDevice {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            permission: PermissionStatus::Authorized,
            fail_open: None,
            has_torch: true,
            has_focus: true,
            frame_interval: Duration::from_millis(10),
            script: Vec::new(),
            looping: false,
            probe: DeviceProbe::default(),
            playback: None,
            open: false,
        }
    }

    pub fn with_frames(mut self, frames: Vec<CaptureFrame>) -> Self {
        self.script = frames;
        self
    }

    pub fn with_frame_interval(mut self, interval: Duration) -> Self {
        self.frame_interval = interval;
        self
    }

    pub fn with_permission(mut self, status: PermissionStatus) -> Self {
        self.permission = status;
        self
    }

    pub fn with_torch(mut self, available: bool) -> Self {
        self.has_torch = available;
        self
    }

    pub fn with_focus(mut self, available: bool) -> Self {
        self.has_focus = available;
        self
    }

    /// Make every `open` fail with the given error
    pub fn failing_with(mut self, error: ScanError) -> Self {
        self.fail_open = Some(error);
        self
    }

    /// Replay the script indefinitely instead of playing it once
    pub fn looping(mut self) -> Self {
        self.looping = true;
        self
    }

    /// Handle for asserting on recorded control calls
    pub fn probe(&self) -> DeviceProbe {
        self.probe.clone()
    }

    /// Build a minimal frame whose hardware decoder metadata carries `value`.
    pub fn symbol_frame(value: &str, bounds: FrameRegion) -> CaptureFrame {
        let width = 16u32;
        let height = 16u32;
        CaptureFrame {
            width,
            height,
            stride: width,
            format: PixelFormat::Gray8,
            data: Arc::from(vec![128u8; (width * height) as usize].as_slice()),
            captured_at: Instant::now(),
            sequence: 0,
            decoded_symbols: vec![DecodedSymbol {
                value: value.to_string(),
                bounds,
            }],
        }
    }

    /// Build a frame with no symbols at all
    pub fn blank_frame() -> CaptureFrame {
        let width = 16u32;
        let height = 16u32;
        CaptureFrame {
            width,
            height,
            stride: width,
            format: PixelFormat::Gray8,
            data: Arc::from(vec![128u8; (width * height) as usize].as_slice()),
            captured_at: Instant::now(),
            sequence: 0,
            decoded_symbols: Vec::new(),
        }
    }
}

impl CaptureDevice for VirtualDevice {
    fn name(&self) -> &str {
        &self.name
    }

    fn permission_status(&self) -> PermissionStatus {
        self.permission
    }

    fn request_permission(&mut self) -> PermissionStatus {
        // The scripted platform "prompts" by resolving NotDetermined
        if self.permission == PermissionStatus::NotDetermined {
            self.permission = PermissionStatus::Authorized;
        }
        self.permission
    }

    fn open(&mut self, frames: FrameSender) -> ScanResult<DeviceCaps> {
        if let Some(error) = &self.fail_open {
            return Err(error.clone());
        }

        self.probe.record(|p| p.opens += 1);

        let script = self.script.clone();
        let interval = self.frame_interval;
        let looping = self.looping;
        let name = self.name.clone();
        self.playback = Some(tokio::spawn(async move {
            let mut sequence = 0u32;
            loop {
                for frame in &script {
                    tokio::time::sleep(interval).await;
                    let mut frame = frame.clone();
                    frame.sequence = sequence;
                    frame.captured_at = Instant::now();
                    sequence = sequence.wrapping_add(1);
                    // Same backpressure contract as the hardware backends:
                    // drop the newest frame instead of stalling the cadence
                    match frames.try_send(frame) {
                        Ok(()) => {}
                        Err(TrySendError::Full(frame)) => {
                            trace!(
                                device = %name,
                                sequence = frame.sequence,
                                "Frame dropped (channel full)"
                            );
                        }
                        Err(TrySendError::Closed(_)) => {
                            trace!(device = %name, "Playback ended, channel closed");
                            return;
                        }
                    }
                }
                if !looping {
                    break;
                }
            }
            debug!(device = %name, sequence, "Frame script exhausted");
            // Keep the sender alive so the session looks running until closed
            frames.closed().await;
        }));

        self.open = true;
        Ok(DeviceCaps {
            name: self.name.clone(),
            has_torch: self.has_torch,
            has_focus: self.has_focus,
            width: 16,
            height: 16,
        })
    }

    fn close(&mut self) {
        if let Some(task) = self.playback.take() {
            task.abort();
        }
        if self.open {
            self.probe.record(|p| p.closes += 1);
        }
        self.open = false;
    }

    fn is_open(&self) -> bool {
        self.open
    }

    fn set_torch(&mut self, mode: TorchMode) -> ScanResult<()> {
        if !self.has_torch {
            return Err(ScanError::TorchUnavailable);
        }
        self.probe.record(|p| p.torch_events.push(mode));
        Ok(())
    }

    fn focus_at(&mut self, x: f32, y: f32) -> ScanResult<()> {
        if !self.has_focus {
            return Err(ScanError::FocusUnavailable);
        }
        self.probe.record(|p| p.focus_points.push((x, y)));
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::sync::mpsc;

    #[tokio::test]
    async fn playback_drops_frames_when_consumer_lags() {
        let (tx, mut rx) = mpsc::channel(4);
        let mut device = VirtualDevice::new("virt0")
            .with_frame_interval(Duration::from_millis(1))
            .with_frames(vec![VirtualDevice::blank_frame(); 12]);
        device.open(tx).unwrap();
        tokio::time::sleep(Duration::from_millis(100)).await;

        // Only the channel capacity is ever buffered; the overflow was
        // dropped, not queued behind a blocked send
        let mut buffered = 0;
        while rx.try_recv().is_ok() {
            buffered += 1;
        }
        assert_eq!(buffered, 4);
        device.close();
    }
}
