// SPDX-License-Identifier: GPL-3.0-only

//! Shared types for capture sessions and devices

use crate::detect::FrameRegion;
use crate::errors::ScanError;
use std::sync::Arc;
use std::time::Instant;

/// Pixel format of a captured frame
///
/// Detection only needs luminance; formats here are the ones the capture
/// backends actually deliver. Everything else is converted at the device.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PixelFormat {
    /// 8-bit grayscale, one byte per pixel
    Gray8,
    /// Packed 4:2:2 (Y0 U Y1 V), luma at even byte offsets
    Yuyv,
    /// 32-bit RGBA, four bytes per pixel
    Rgba,
}

/// A single frame from the capture device
///
/// `data` is shared, never copied, on its way through the pipeline.
#[derive(Debug, Clone)]
pub struct CaptureFrame {
    pub width: u32,
    pub height: u32,
    /// Row stride in bytes (may include padding)
    pub stride: u32,
    pub format: PixelFormat,
    pub data: Arc<[u8]>,
    /// Timestamp when the frame was captured
    pub captured_at: Instant,
    /// Monotonic frame sequence number from the device
    pub sequence: u32,
    /// Symbols the device firmware decoded for this frame, if the hardware
    /// supports on-sensor decoding. Empty on plain webcams.
    pub decoded_symbols: Vec<DecodedSymbol>,
}

/// A symbol decoded by device firmware and attached as frame metadata
#[derive(Debug, Clone, PartialEq)]
pub struct DecodedSymbol {
    pub value: String,
    pub bounds: FrameRegion,
}

/// Frame sender handed to capture devices
pub type FrameSender = tokio::sync::mpsc::Sender<CaptureFrame>;

/// Frame receiver consumed by the detection engine
pub type FrameReceiver = tokio::sync::mpsc::Receiver<CaptureFrame>;

/// Platform camera permission state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PermissionStatus {
    Authorized,
    Denied,
    NotDetermined,
}

/// Torch (continuous flash LED) mode
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TorchMode {
    #[default]
    Off,
    On,
}

/// Capabilities reported by a device when it opens
#[derive(Debug, Clone, Default)]
pub struct DeviceCaps {
    /// Human-readable device name
    pub name: String,
    pub has_torch: bool,
    pub has_focus: bool,
    /// Negotiated capture width in pixels
    pub width: u32,
    /// Negotiated capture height in pixels
    pub height: u32,
}

/// Handle describing the exclusive hardware capture resource.
///
/// At most one running session exists per physical device; the session
/// manager's control task enforces this by owning the device outright.
#[derive(Debug, Clone)]
pub struct CaptureSession {
    /// Monotonic id, bumped on every successful (re)start
    pub id: u64,
    pub caps: DeviceCaps,
}

/// Session lifecycle state, observable through the manager's watch channel
#[derive(Debug, Clone, PartialEq, Default)]
pub enum SessionState {
    #[default]
    Idle,
    Configuring,
    Running,
    Stopped,
    Error(ScanError),
}

impl std::fmt::Display for SessionState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SessionState::Idle => write!(f, "idle"),
            SessionState::Configuring => write!(f, "configuring"),
            SessionState::Running => write!(f, "running"),
            SessionState::Stopped => write!(f, "stopped"),
            SessionState::Error(e) => write!(f, "error: {}", e),
        }
    }
}

/// Application foreground/background transitions.
///
/// Only the session manager is allowed to react to these implicitly.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AppLifecycleEvent {
    Background,
    Foreground,
}
