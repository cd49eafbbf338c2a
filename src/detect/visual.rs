// SPDX-License-Identifier: GPL-3.0-only

//! Visual barcode detection
//!
//! Software image analysis over raw luma frames: samples a set of scanlines,
//! binarizes each with a per-row threshold, and decodes EAN-13 symbols from
//! the bar/space run lengths. Slower than the hardware decoder but works on
//! any camera, and reports a real confidence score (the fraction of sampled
//! rows that agreed on the value).
//!
//! CPU-bound work runs in a blocking task so the async runtime is never
//! stalled by a frame.

use crate::detect::types::{Candidate, DetectionMethod, FrameRegion};
use crate::session::types::{CaptureFrame, PixelFormat};
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{trace, warn};

/// Left-digit run widths (space, bar, space, bar), in modules.
/// Each digit spans 7 modules split across 4 runs.
const L_WIDTHS: [[u32; 4]; 10] = [
    [3, 2, 1, 1],
    [2, 2, 2, 1],
    [2, 1, 2, 2],
    [1, 4, 1, 1],
    [1, 1, 3, 2],
    [1, 2, 3, 1],
    [1, 1, 1, 4],
    [1, 3, 1, 2],
    [1, 2, 1, 3],
    [3, 1, 1, 2],
];

/// Parity pattern of the six left digits encodes the implicit first digit
/// (`true` = G parity).
const PARITY: [[bool; 6]; 10] = [
    [false, false, false, false, false, false],
    [false, false, true, false, true, true],
    [false, false, true, true, false, true],
    [false, false, true, true, true, false],
    [false, true, false, false, true, true],
    [false, true, true, false, false, true],
    [false, true, true, true, false, false],
    [false, true, false, true, false, true],
    [false, true, false, true, true, false],
    [false, true, true, false, true, false],
];

/// A symbol needs 59 runs: start guard (3), six left digits (24), middle
/// guard (5), six right digits (24), end guard (3).
const SYMBOL_RUNS: usize = 59;

/// Visual EAN-13 detector over luma scanlines
pub struct VisualDetector {
    /// How many rows to sample per frame
    sample_rows: usize,
}

impl Default for VisualDetector {
    fn default() -> Self {
        Self::new()
    }
}

impl VisualDetector {
    pub fn new() -> Self {
        // Enough rows to ride out local print damage without burning a
        // whole frame interval on analysis
        Self { sample_rows: 9 }
    }

    pub fn with_sample_rows(sample_rows: usize) -> Self {
        Self {
            sample_rows: sample_rows.max(1),
        }
    }

    /// Analyze one frame. A failed or panicked analysis yields zero
    /// candidates; it never propagates into the stream.
    pub async fn detect(&self, frame: Arc<CaptureFrame>) -> Vec<Candidate> {
        let sample_rows = self.sample_rows;
        tokio::task::spawn_blocking(move || detect_sync(&frame, sample_rows))
            .await
            .unwrap_or_else(|e| {
                warn!(error = %e, "Visual detection task panicked");
                Vec::new()
            })
    }
}

/// One decoded scanline
struct RowDecode {
    value: String,
    start_px: u32,
    end_px: u32,
}

/// Synchronous detection (runs in a blocking task)
pub(crate) fn detect_sync(frame: &CaptureFrame, sample_rows: usize) -> Vec<Candidate> {
    let start = std::time::Instant::now();
    let height = frame.height as usize;

    // Per value: (agreeing rows, pixel extents)
    let mut votes: HashMap<String, (usize, u32, u32, u32, u32)> = HashMap::new();

    for i in 0..sample_rows {
        let y = (height * (i + 1)) / (sample_rows + 1);
        let Some(row) = luma_row(frame, y) else {
            continue;
        };
        if let Some(decode) = decode_row(&row) {
            let entry = votes.entry(decode.value).or_insert((
                0,
                decode.start_px,
                decode.end_px,
                y as u32,
                y as u32,
            ));
            entry.0 += 1;
            entry.1 = entry.1.min(decode.start_px);
            entry.2 = entry.2.max(decode.end_px);
            entry.3 = entry.3.min(y as u32);
            entry.4 = entry.4.max(y as u32);
        }
    }

    let candidates: Vec<Candidate> = votes
        .into_iter()
        .map(|(value, (rows, min_x, max_x, min_y, max_y))| Candidate {
            raw_value: value,
            confidence: (rows as f32 / sample_rows as f32).clamp(0.0, 1.0),
            bounds: FrameRegion::from_pixels(
                min_x,
                min_y,
                (max_x - min_x).max(1),
                (max_y - min_y).max(1),
                frame.width,
                frame.height,
            ),
            method: DetectionMethod::Visual,
            captured_at: frame.captured_at,
        })
        .collect();

    if !candidates.is_empty() {
        trace!(
            count = candidates.len(),
            elapsed_us = start.elapsed().as_micros(),
            "Visual scan found symbols"
        );
    }

    candidates
}

/// Extract one luma scanline from the frame, whatever its pixel format
fn luma_row(frame: &CaptureFrame, y: usize) -> Option<Vec<u8>> {
    let width = frame.width as usize;
    let stride = frame.stride as usize;
    let row_start = y * stride;

    match frame.format {
        PixelFormat::Gray8 => {
            let end = row_start + width;
            frame.data.get(row_start..end).map(|s| s.to_vec())
        }
        PixelFormat::Yuyv => {
            // Luma lives at even byte offsets of the packed Y0 U Y1 V layout
            let end = row_start + width * 2;
            let row = frame.data.get(row_start..end)?;
            Some(row.iter().step_by(2).copied().collect())
        }
        PixelFormat::Rgba => {
            let end = row_start + width * 4;
            let row = frame.data.get(row_start..end)?;
            Some(
                row.chunks_exact(4)
                    .map(|px| {
                        let r = px[0] as u32;
                        let g = px[1] as u32;
                        let b = px[2] as u32;
                        ((r * 77 + g * 150 + b * 29) >> 8) as u8
                    })
                    .collect(),
            )
        }
    }
}

/// Decode a single scanline into an EAN-13 value
fn decode_row(row: &[u8]) -> Option<RowDecode> {
    let min = *row.iter().min()?;
    let max = *row.iter().max()?;
    // A symbol needs real contrast; skip flat rows outright
    if max - min < 48 {
        return None;
    }
    let threshold = min + (max - min) / 2;

    // Run-length encode: (is_bar, width_px, start_px)
    let mut runs: Vec<(bool, u32, u32)> = Vec::with_capacity(64);
    for (x, &luma) in row.iter().enumerate() {
        let is_bar = luma < threshold;
        match runs.last_mut() {
            Some(last) if last.0 == is_bar => last.1 += 1,
            _ => runs.push((is_bar, 1, x as u32)),
        }
    }

    for i in 1..runs.len() {
        if !runs[i].0 || i + SYMBOL_RUNS > runs.len() {
            continue;
        }
        let window = &runs[i..i + SYMBOL_RUNS];
        // A symbol is preceded by a quiet zone several modules wide
        let unit = (window[0].1 + window[1].1 + window[2].1) as f32 / 3.0;
        if (runs[i - 1].1 as f32) < unit * 3.0 {
            continue;
        }
        if let Some(value) = decode_symbol(window) {
            let start_px = window[0].2;
            let last = window[SYMBOL_RUNS - 1];
            return Some(RowDecode {
                value,
                start_px,
                end_px: last.2 + last.1,
            });
        }
    }

    None
}

/// Attempt a full symbol decode at a candidate start guard
fn decode_symbol(window: &[(bool, u32, u32)]) -> Option<String> {
    // Start guard: three single-module runs establish the module width
    let unit = (window[0].1 + window[1].1 + window[2].1) as f32 / 3.0;
    if !guard_plausible(&window[..3], unit) {
        return None;
    }
    // Middle and end guards must agree with that width
    if !guard_plausible(&window[27..32], unit) || !guard_plausible(&window[56..59], unit) {
        return None;
    }

    let mut digits = [0u8; 13];
    let mut parity = [false; 6];

    for j in 0..6 {
        let (digit, is_g) = classify_digit(&window[3 + 4 * j..3 + 4 * j + 4], true)?;
        digits[1 + j] = digit;
        parity[j] = is_g;
    }
    // Right-half R patterns share run widths with L, so no parity there
    for j in 0..6 {
        let (digit, _) = classify_digit(&window[32 + 4 * j..32 + 4 * j + 4], false)?;
        digits[7 + j] = digit;
    }

    digits[0] = PARITY.iter().position(|p| *p == parity)? as u8;

    Some(digits.iter().map(|d| char::from(b'0' + d)).collect())
}

/// All guard runs must be close to one module wide
fn guard_plausible(runs: &[(bool, u32, u32)], unit: f32) -> bool {
    runs.iter().all(|&(_, width, _)| {
        let w = width as f32;
        w >= unit * 0.4 && w <= unit * 2.0
    })
}

/// Match four runs against the digit tables.
///
/// Returns the digit and whether the G table matched (left half only).
fn classify_digit(runs: &[(bool, u32, u32)], allow_g: bool) -> Option<(u8, bool)> {
    let widths: Vec<f32> = runs.iter().map(|&(_, w, _)| w as f32).collect();
    let total: f32 = widths.iter().sum();
    let unit = total / 7.0;

    let mut best: Option<(u8, bool, f32)> = None;
    for (digit, l_widths) in L_WIDTHS.iter().enumerate() {
        let err_l: f32 = widths
            .iter()
            .zip(l_widths.iter())
            .map(|(w, t)| (w - *t as f32 * unit).abs())
            .sum();
        if best.is_none_or(|(_, _, e)| err_l < e) {
            best = Some((digit as u8, false, err_l));
        }
        if allow_g {
            // G run widths are the L widths reversed
            let err_g: f32 = widths
                .iter()
                .zip(l_widths.iter().rev())
                .map(|(w, t)| (w - *t as f32 * unit).abs())
                .sum();
            if best.is_none_or(|(_, _, e)| err_g < e) {
                best = Some((digit as u8, true, err_g));
            }
        }
    }

    let (digit, is_g, err) = best?;
    // Exact prints score near zero; anything past three quarters of a
    // module across the four runs is too mangled to trust
    if err > unit * 0.75 {
        return None;
    }
    Some((digit, is_g))
}
