// SPDX-License-Identifier: GPL-3.0-only

//! V4L2 capture backend
//!
//! Opens a `/dev/video*` node with the `v4l` crate, negotiates a
//! luma-friendly format (GREY preferred, YUYV fallback) and streams frames
//! from a dedicated capture thread into the session's bounded channel.
//! Torch control goes through sysfs LEDs, focus through V4L2 controls.

use super::torch::TorchLed;
use super::v4l2_controls;
use super::{CaptureDevice, DiscoveredDevice};
use crate::errors::{ScanError, ScanResult};
use crate::session::types::{
    CaptureFrame, DeviceCaps, FrameSender, PermissionStatus, PixelFormat, TorchMode,
};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Instant;
use tracing::{debug, info, trace, warn};
use v4l::buffer::Type;
use v4l::io::traits::CaptureStream;
use v4l::prelude::*;
use v4l::video::Capture;

const GREY: &[u8; 4] = b"GREY";
const YUYV: &[u8; 4] = b"YUYV";

/// A real camera behind a V4L2 device node
pub struct V4l2Device {
    path: String,
    running: Arc<AtomicBool>,
    thread_handle: Option<std::thread::JoinHandle<()>>,
    torch_leds: Vec<TorchLed>,
    has_focus: bool,
    open: bool,
}

impl V4l2Device {
    pub fn new(path: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            running: Arc::new(AtomicBool::new(false)),
            thread_handle: None,
            torch_leds: Vec::new(),
            has_focus: false,
            open: false,
        }
    }

    /// Probe the node and negotiate a capture format without streaming.
    fn negotiate_format(&self) -> ScanResult<(u32, u32, PixelFormat)> {
        let dev = Device::with_path(&self.path)?;

        let mut format = dev
            .format()
            .map_err(|e| ScanError::ConfigurationFailed(format!("query format: {}", e)))?;

        for fourcc in [GREY, YUYV] {
            format.fourcc = v4l::FourCC::new(fourcc);
            match dev.set_format(&format) {
                Ok(applied) if applied.fourcc == v4l::FourCC::new(fourcc) => {
                    let pixel_format = if fourcc == GREY {
                        PixelFormat::Gray8
                    } else {
                        PixelFormat::Yuyv
                    };
                    info!(
                        device = %self.path,
                        width = applied.width,
                        height = applied.height,
                        fourcc = ?applied.fourcc,
                        "Negotiated capture format"
                    );
                    return Ok((applied.width, applied.height, pixel_format));
                }
                Ok(other) => {
                    debug!(requested = ?fourcc, got = ?other.fourcc, "Format not accepted");
                }
                Err(e) => {
                    debug!(requested = ?fourcc, error = %e, "Could not set format");
                }
            }
        }

        Err(ScanError::ConfigurationFailed(format!(
            "{}: no luma-capable pixel format (GREY/YUYV)",
            self.path
        )))
    }
}

impl CaptureDevice for V4l2Device {
    fn name(&self) -> &str {
        &self.path
    }

    fn permission_status(&self) -> PermissionStatus {
        match std::fs::OpenOptions::new().read(true).open(&self.path) {
            Ok(_) => PermissionStatus::Authorized,
            Err(e) if e.kind() == std::io::ErrorKind::PermissionDenied => PermissionStatus::Denied,
            Err(_) => PermissionStatus::NotDetermined,
        }
    }

    fn request_permission(&mut self) -> PermissionStatus {
        // Linux has no permission prompt; re-probing is all we can do.
        // Group membership (`video`) is the actual remediation.
        self.permission_status()
    }

    fn open(&mut self, frames: FrameSender) -> ScanResult<DeviceCaps> {
        if self.open {
            self.close();
        }

        let (width, height, pixel_format) = self.negotiate_format()?;

        self.torch_leds = TorchLed::discover();
        self.has_focus = v4l2_controls::has_control(&self.path, v4l2_controls::V4L2_CID_FOCUS_AUTO)
            || v4l2_controls::has_control(&self.path, v4l2_controls::V4L2_CID_FOCUS_ABSOLUTE);

        self.running.store(true, Ordering::SeqCst);
        let running = self.running.clone();
        let path = self.path.clone();
        self.thread_handle = Some(std::thread::spawn(move || {
            if let Err(e) = capture_loop(&path, width, height, pixel_format, frames, running) {
                warn!(device = %path, error = %e, "Capture loop failed");
            }
        }));

        self.open = true;
        Ok(DeviceCaps {
            name: self.path.clone(),
            has_torch: !self.torch_leds.is_empty(),
            has_focus: self.has_focus,
            width,
            height,
        })
    }

    fn close(&mut self) {
        self.running.store(false, Ordering::SeqCst);
        if let Some(handle) = self.thread_handle.take() {
            if handle.join().is_err() {
                warn!(device = %self.path, "Capture thread panicked");
            }
        }
        self.open = false;
    }

    fn is_open(&self) -> bool {
        self.open
    }

    fn set_torch(&mut self, mode: TorchMode) -> ScanResult<()> {
        if self.torch_leds.is_empty() {
            return Err(ScanError::TorchUnavailable);
        }
        for led in &self.torch_leds {
            let result = match mode {
                TorchMode::On => led.on(),
                TorchMode::Off => led.off(),
            };
            if let Err(e) = result {
                return Err(ScanError::ConfigurationFailed(format!(
                    "torch {}: {}",
                    led.name(),
                    e
                )));
            }
        }
        Ok(())
    }

    fn focus_at(&mut self, x: f32, y: f32) -> ScanResult<()> {
        if !self.has_focus {
            return Err(ScanError::FocusUnavailable);
        }
        // V4L2 has no region-of-interest focus; the point is accepted for
        // interface parity and a one-shot autofocus cycle is retriggered.
        debug!(device = %self.path, x, y, "Retriggering autofocus");
        v4l2_controls::set_control(&self.path, v4l2_controls::V4L2_CID_FOCUS_AUTO, 0)
            .and_then(|_| {
                v4l2_controls::set_control(&self.path, v4l2_controls::V4L2_CID_FOCUS_AUTO, 1)
            })
            .map_err(ScanError::ConfigurationFailed)
    }
}

impl Drop for V4l2Device {
    fn drop(&mut self) {
        self.close();
    }
}

/// Main capture loop running in a dedicated thread
fn capture_loop(
    path: &str,
    width: u32,
    height: u32,
    pixel_format: PixelFormat,
    frames: FrameSender,
    running: Arc<AtomicBool>,
) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    let mut dev = Device::with_path(path)?;
    let mut stream = MmapStream::with_buffers(&mut dev, Type::VideoCapture, 4)?;

    let stride = match pixel_format {
        PixelFormat::Gray8 => width,
        PixelFormat::Yuyv => width * 2,
        PixelFormat::Rgba => width * 4,
    };

    info!(device = %path, width, height, "V4L2 capture stream started");

    while running.load(Ordering::SeqCst) {
        match stream.next() {
            Ok((buf, meta)) => {
                let frame = CaptureFrame {
                    width,
                    height,
                    stride,
                    format: pixel_format,
                    data: Arc::from(buf),
                    captured_at: Instant::now(),
                    sequence: meta.sequence,
                    // Plain V4L2 webcams have no on-sensor symbol decoder
                    decoded_symbols: Vec::new(),
                };
                if frames.try_send(frame).is_err() {
                    trace!(sequence = meta.sequence, "Frame dropped (channel full)");
                }
            }
            Err(e) => {
                warn!(device = %path, error = %e, "Failed to capture frame");
                std::thread::sleep(std::time::Duration::from_millis(10));
            }
        }
    }

    info!(device = %path, "V4L2 capture loop ended");
    Ok(())
}

/// Enumerate `/dev/video*` capture nodes
pub fn enumerate() -> Vec<DiscoveredDevice> {
    let Ok(entries) = std::fs::read_dir("/dev") else {
        return Vec::new();
    };

    let mut devices: Vec<DiscoveredDevice> = entries
        .flatten()
        .filter_map(|entry| {
            let file_name = entry.file_name();
            let name = file_name.to_str()?;
            if !name.starts_with("video") {
                return None;
            }
            let path = format!("/dev/{}", name);
            let card = Device::with_path(&path)
                .and_then(|dev| dev.query_caps())
                .map(|caps| caps.card)
                .unwrap_or_else(|_| path.clone());
            Some(DiscoveredDevice { path, name: card })
        })
        .collect();

    devices.sort_by(|a, b| a.path.cmp(&b.path));
    devices
}
