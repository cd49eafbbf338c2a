// SPDX-License-Identifier: GPL-3.0-only

//! CLI commands for scanner operations
//!
//! This module provides command-line functionality for:
//! - Listing available capture devices
//! - Running a live scan loop against a device

use bookscan::config::{ScannerConfig, ValidationMode};
use bookscan::detect::{DetectionEvent, DetectionMethod};
use bookscan::device::{self, V4l2Device};
use bookscan::session::SessionManager;
use bookscan::stream::DetectionStream;
use bookscan::validator::ValidatedIsbn;
use futures::StreamExt;
use serde::Serialize;
use std::time::Duration;

/// List all V4L2 capture devices
pub fn list_devices() -> Result<(), Box<dyn std::error::Error>> {
    let devices = device::list_devices();

    if devices.is_empty() {
        println!("No capture devices found.");
        return Ok(());
    }

    println!("Available capture devices:");
    println!();
    for found in &devices {
        println!("  {}  {}", found.path, found.name);
    }

    Ok(())
}

/// Scan from the given device until Ctrl-C
pub fn scan(
    device: &str,
    throttle_ms: u64,
    advisory: bool,
    no_visual: bool,
    json: bool,
) -> Result<(), Box<dyn std::error::Error>> {
    let runtime = tokio::runtime::Runtime::new()?;
    runtime.block_on(run_scan(device, throttle_ms, advisory, no_visual, json))
}

async fn run_scan(
    device: &str,
    throttle_ms: u64,
    advisory: bool,
    no_visual: bool,
    json: bool,
) -> Result<(), Box<dyn std::error::Error>> {
    let config = ScannerConfig {
        visual_enabled: !no_visual,
        throttle: Duration::from_millis(throttle_ms),
        validation: if advisory {
            ValidationMode::Advisory
        } else {
            ValidationMode::Mandatory
        },
        ..Default::default()
    };

    let manager = SessionManager::new(Box::new(V4l2Device::new(device)));
    let mut stream = DetectionStream::open(manager, config).await?;
    eprintln!("Scanning on {device}, press Ctrl-C to stop.");

    loop {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => break,
            maybe_event = stream.next() => {
                let Some(event) = maybe_event else {
                    eprintln!("Capture session ended.");
                    break;
                };
                print_event(&event, json)?;
            }
        }
    }

    stream.close().await?;
    Ok(())
}

#[derive(Serialize)]
struct DetectionRecord<'a> {
    raw_value: &'a str,
    confidence: f32,
    method: &'static str,
    isbn: Option<&'a ValidatedIsbn>,
}

fn print_event(event: &DetectionEvent, json: bool) -> Result<(), Box<dyn std::error::Error>> {
    let method = match event.method {
        DetectionMethod::Visual => "visual",
        DetectionMethod::HardwareDecoder => "hardware",
    };

    if json {
        let record = DetectionRecord {
            raw_value: &event.raw_value,
            confidence: event.confidence,
            method,
            isbn: event.validated.as_ref(),
        };
        println!("{}", serde_json::to_string(&record)?);
        return Ok(());
    }

    match &event.validated {
        Some(isbn) => println!(
            "{}  {}  ({}, {:.0}% confidence)",
            isbn.display,
            isbn.kind,
            method,
            event.confidence * 100.0
        ),
        None => println!(
            "{}  unvalidated  ({}, {:.0}% confidence)",
            event.raw_value,
            method,
            event.confidence * 100.0
        ),
    }

    Ok(())
}
