// SPDX-License-Identifier: GPL-3.0-only

//! Hardware decoder strategy
//!
//! Some capture stacks decode symbols in firmware and attach the results as
//! frame metadata. This strategy just lifts those into candidates: lowest
//! latency, fixed confidence of 1.0, and only as robust as the firmware.

use crate::detect::types::{Candidate, DetectionMethod};
use crate::session::types::CaptureFrame;

/// Lift firmware-decoded symbols out of frame metadata.
pub fn candidates(frame: &CaptureFrame) -> Vec<Candidate> {
    frame
        .decoded_symbols
        .iter()
        .map(|symbol| Candidate {
            raw_value: symbol.value.clone(),
            confidence: 1.0,
            bounds: symbol.bounds,
            method: DetectionMethod::HardwareDecoder,
            captured_at: frame.captured_at,
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::detect::FrameRegion;
    use crate::device::VirtualDevice;

    #[test]
    fn lifts_metadata_symbols() {
        let frame = VirtualDevice::symbol_frame("9780141036144", FrameRegion::FULL);
        let found = candidates(&frame);
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].raw_value, "9780141036144");
        assert_eq!(found[0].method, DetectionMethod::HardwareDecoder);
        assert_eq!(found[0].confidence, 1.0);
    }

    #[test]
    fn plain_frame_yields_nothing() {
        assert!(candidates(&VirtualDevice::blank_frame()).is_empty());
    }
}
