// SPDX-License-Identifier: MPL-2.0

//! Core types for detection results
//!
//! These types cross the boundary to the consuming UI layer, which renders
//! overlays from the bounding boxes and reacts to validated identifiers.

use crate::validator::ValidatedIsbn;
use serde::{Deserialize, Serialize};
use std::time::Instant;

/// A rectangular region within a frame
///
/// Coordinates are normalized (0.0 to 1.0) relative to the frame dimensions,
/// so they survive downscaling and display scaling unchanged.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct FrameRegion {
    /// Left edge (0.0 = left of frame, 1.0 = right of frame)
    pub x: f32,
    /// Top edge (0.0 = top of frame, 1.0 = bottom of frame)
    pub y: f32,
    /// Width as fraction of frame width
    pub width: f32,
    /// Height as fraction of frame height
    pub height: f32,
}

impl FrameRegion {
    /// The whole frame
    pub const FULL: FrameRegion = FrameRegion {
        x: 0.0,
        y: 0.0,
        width: 1.0,
        height: 1.0,
    };

    /// Create a frame region from pixel coordinates
    pub fn from_pixels(
        x: u32,
        y: u32,
        width: u32,
        height: u32,
        frame_width: u32,
        frame_height: u32,
    ) -> Self {
        Self {
            x: x as f32 / frame_width as f32,
            y: y as f32 / frame_height as f32,
            width: width as f32 / frame_width as f32,
            height: height as f32 / frame_height as f32,
        }
    }

    /// Whether this region overlaps another (shared edge does not count)
    pub fn intersects(&self, other: &FrameRegion) -> bool {
        self.x < other.x + other.width
            && other.x < self.x + self.width
            && self.y < other.y + other.height
            && other.y < self.y + self.height
    }

    /// Whether the region lies inside the unit square
    pub fn is_normalized(&self) -> bool {
        self.x >= 0.0
            && self.y >= 0.0
            && self.width > 0.0
            && self.height > 0.0
            && self.x + self.width <= 1.0
            && self.y + self.height <= 1.0
    }
}

/// Which strategy produced a detection
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum DetectionMethod {
    /// Software image analysis over raw frames; slower, tolerant of rotation
    /// and partial occlusion, reports a real confidence score
    Visual,
    /// Firmware/metadata-level symbol decoding; fast, fixed confidence 1.0
    HardwareDecoder,
}

impl std::fmt::Display for DetectionMethod {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            DetectionMethod::Visual => write!(f, "visual"),
            DetectionMethod::HardwareDecoder => write!(f, "hardware"),
        }
    }
}

/// A raw candidate published by one detection strategy.
///
/// Candidates still have to survive the ROI filter, the throttle, and
/// (when mandatory) validation before becoming a [`DetectionEvent`].
#[derive(Debug, Clone)]
pub struct Candidate {
    pub raw_value: String,
    pub confidence: f32,
    pub bounds: FrameRegion,
    pub method: DetectionMethod,
    /// Capture timestamp of the originating frame
    pub captured_at: Instant,
}

/// One detection instant, delivered to exactly one stream consumer.
///
/// Immutable once created. Events within one method arrive in capture order;
/// across methods only `timestamp` orders them — the visual strategy
/// typically lags the hardware decoder by a frame or more.
#[derive(Debug, Clone)]
pub struct DetectionEvent {
    /// Payload exactly as the strategy decoded it
    pub raw_value: String,
    /// Strategy confidence in [0, 1]
    pub confidence: f32,
    /// Capture timestamp of the originating frame
    pub timestamp: Instant,
    /// Strategy that produced this event (informational, not a sequencing signal)
    pub method: DetectionMethod,
    /// Normalized bounding box of the symbol
    pub bounds: FrameRegion,
    /// Checksum-validated identifier, `None` only in advisory mode
    pub validated: Option<ValidatedIsbn>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn from_pixels_normalizes() {
        let region = FrameRegion::from_pixels(100, 50, 200, 100, 1000, 500);
        assert!((region.x - 0.1).abs() < 0.001);
        assert!((region.y - 0.1).abs() < 0.001);
        assert!((region.width - 0.2).abs() < 0.001);
        assert!((region.height - 0.2).abs() < 0.001);
    }

    #[test]
    fn intersection_is_symmetric_and_edge_exclusive() {
        let a = FrameRegion { x: 0.0, y: 0.0, width: 0.5, height: 0.5 };
        let b = FrameRegion { x: 0.4, y: 0.4, width: 0.5, height: 0.5 };
        let c = FrameRegion { x: 0.5, y: 0.0, width: 0.5, height: 0.5 };
        assert!(a.intersects(&b));
        assert!(b.intersects(&a));
        assert!(!a.intersects(&c));
    }

    #[test]
    fn normalization_check() {
        assert!(FrameRegion::FULL.is_normalized());
        let out = FrameRegion { x: 0.8, y: 0.0, width: 0.4, height: 0.5 };
        assert!(!out.is_normalized());
    }
}
