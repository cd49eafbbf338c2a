// SPDX-License-Identifier: MPL-2.0

//! Capture device abstraction
//!
//! The session manager owns exactly one boxed [`CaptureDevice`] and is the
//! only component that ever calls into it. Backends:
//!
//! - [`v4l2`]: real Linux cameras via V4L2, torch via sysfs LEDs
//! - [`virtual_device`]: scripted in-process device for tests and demos

pub mod torch;
pub mod v4l2;
pub mod v4l2_controls;
pub mod virtual_device;

pub use v4l2::V4l2Device;
pub use virtual_device::VirtualDevice;

use crate::errors::ScanResult;
use crate::session::types::{DeviceCaps, FrameSender, PermissionStatus, TorchMode};

/// Platform capture device seam.
///
/// Implementations deliver frames into the provided sender from their own
/// capture context. Backpressure is the channel's: when it is full the
/// newest frame is dropped, never buffered without bound.
pub trait CaptureDevice: Send {
    /// Stable device name for logs and session handles
    fn name(&self) -> &str;

    /// Current platform permission state, queried without side effects
    fn permission_status(&self) -> PermissionStatus;

    /// Trigger the platform permission request and report the outcome
    fn request_permission(&mut self) -> PermissionStatus;

    /// Acquire the device and start frame delivery into `frames`.
    ///
    /// Returns the negotiated capabilities. Errors map to the session
    /// taxonomy: permission, availability, configuration.
    fn open(&mut self, frames: FrameSender) -> ScanResult<DeviceCaps>;

    /// Stop frame delivery and release the device. Idempotent.
    fn close(&mut self);

    fn is_open(&self) -> bool;

    /// Switch the torch. Fails with `TorchUnavailable` when unsupported.
    fn set_torch(&mut self, mode: TorchMode) -> ScanResult<()>;

    /// Drive focus toward a normalized point. Fails with `FocusUnavailable`
    /// when the device has no focus actuator.
    fn focus_at(&mut self, x: f32, y: f32) -> ScanResult<()>;
}

/// A capture device discovered on this system
#[derive(Debug, Clone)]
pub struct DiscoveredDevice {
    /// Device node path, e.g. `/dev/video0`
    pub path: String,
    /// Card name from the driver, or the path when unreadable
    pub name: String,
}

/// Enumerate V4L2 capture nodes under `/dev`.
pub fn list_devices() -> Vec<DiscoveredDevice> {
    v4l2::enumerate()
}
