// SPDX-License-Identifier: MPL-2.0

//! Error types for the scanning pipeline

use std::fmt;

/// Result type alias using ScanError
pub type ScanResult<T> = Result<T, ScanError>;

/// Failures surfaced by session lifecycle and stream operations.
///
/// Session-lifecycle failures (start/stop/torch/focus) are always returned
/// to the caller; per-frame analysis failures never appear here — a failed
/// frame simply yields no candidates.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ScanError {
    /// Camera access was denied by the platform
    PermissionDenied,
    /// No usable capture device, or the device disappeared
    DeviceUnavailable(String),
    /// Device was acquired but the capture pipeline could not be built
    ConfigurationFailed(String),
    /// The device has no controllable torch
    TorchUnavailable,
    /// The device has no focus control
    FocusUnavailable,
    /// A detection stream is already consuming this session
    StreamActive,
    /// Internal processing failure (channel breakage, task panic)
    ProcessingFailed(String),
}

impl fmt::Display for ScanError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ScanError::PermissionDenied => write!(f, "Camera permission denied"),
            ScanError::DeviceUnavailable(msg) => write!(f, "Device unavailable: {}", msg),
            ScanError::ConfigurationFailed(msg) => write!(f, "Configuration failed: {}", msg),
            ScanError::TorchUnavailable => write!(f, "Device has no torch"),
            ScanError::FocusUnavailable => write!(f, "Device has no focus control"),
            ScanError::StreamActive => write!(f, "A detection stream is already active"),
            ScanError::ProcessingFailed(msg) => write!(f, "Processing failed: {}", msg),
        }
    }
}

impl std::error::Error for ScanError {}

// Map device I/O errors to the user-visible taxonomy. EACCES and ENOENT
// must stay distinguishable so the consumer can offer the right remediation.
impl From<std::io::Error> for ScanError {
    fn from(err: std::io::Error) -> Self {
        match err.kind() {
            std::io::ErrorKind::PermissionDenied => ScanError::PermissionDenied,
            std::io::ErrorKind::NotFound => ScanError::DeviceUnavailable(err.to_string()),
            _ => ScanError::ConfigurationFailed(err.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io;

    #[test]
    fn io_error_mapping_keeps_kinds_distinct() {
        let denied: ScanError = io::Error::from(io::ErrorKind::PermissionDenied).into();
        let missing: ScanError = io::Error::from(io::ErrorKind::NotFound).into();
        assert_eq!(denied, ScanError::PermissionDenied);
        assert!(matches!(missing, ScanError::DeviceUnavailable(_)));
    }
}
