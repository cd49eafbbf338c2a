// SPDX-License-Identifier: GPL-3.0-only

//! Scanner configuration
//!
//! Supplied once at stream construction; there is no dynamic reload
//! mid-session.

use crate::detect::FrameRegion;
use crate::errors::{ScanError, ScanResult};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// What happens to candidates that fail checksum validation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum ValidationMode {
    /// Rejected candidates are dropped and never reach the subscriber
    #[default]
    Mandatory,
    /// Rejected candidates are still emitted, with `validated = None`
    Advisory,
}

/// Static configuration for one detection stream
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScannerConfig {
    /// Run the software image-analysis strategy
    pub visual_enabled: bool,
    /// Read firmware-decoded symbols from frame metadata
    pub hardware_decoder_enabled: bool,
    /// Window in which repeated detections of the same value are suppressed
    pub throttle: Duration,
    /// Normalized region of interest; `None` scans the full frame
    pub roi: Option<FrameRegion>,
    /// Mandatory (default) or advisory validation
    pub validation: ValidationMode,
}

impl Default for ScannerConfig {
    fn default() -> Self {
        Self {
            visual_enabled: true,
            hardware_decoder_enabled: true,
            throttle: Duration::from_secs(2),
            roi: None,
            validation: ValidationMode::Mandatory,
        }
    }
}

impl ScannerConfig {
    /// Reject configurations the pipeline cannot honor.
    pub fn validate(&self) -> ScanResult<()> {
        if self.throttle.is_zero() {
            return Err(ScanError::ConfigurationFailed(
                "throttle interval must be positive".to_string(),
            ));
        }
        if let Some(roi) = &self.roi
            && !roi.is_normalized()
        {
            return Err(ScanError::ConfigurationFailed(
                "ROI must lie within the unit square".to_string(),
            ));
        }
        if !self.visual_enabled && !self.hardware_decoder_enabled {
            return Err(ScanError::ConfigurationFailed(
                "at least one detection strategy must be enabled".to_string(),
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_is_valid() {
        assert!(ScannerConfig::default().validate().is_ok());
    }

    #[test]
    fn zero_throttle_is_rejected() {
        let config = ScannerConfig {
            throttle: Duration::ZERO,
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn out_of_bounds_roi_is_rejected() {
        let config = ScannerConfig {
            roi: Some(FrameRegion {
                x: 0.8,
                y: 0.2,
                width: 0.5,
                height: 0.5,
            }),
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn both_strategies_disabled_is_rejected() {
        let config = ScannerConfig {
            visual_enabled: false,
            hardware_decoder_enabled: false,
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }
}
