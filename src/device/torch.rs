// SPDX-License-Identifier: GPL-3.0-only

//! Torch LED control via Linux sysfs
//!
//! Discovers flash LEDs exposed at `/sys/class/leds/*:flash` (or `*:torch`)
//! and drives them through the group-writable `brightness` file. The torch
//! must be off before the capture device is released, so the session manager
//! always clears it during teardown.

use std::io;
use std::path::{Path, PathBuf};
use tracing::{info, warn};

/// A torch-capable LED discovered via sysfs
#[derive(Debug, Clone)]
pub struct TorchLed {
    /// Sysfs path, e.g. `/sys/class/leds/white:flash`
    path: PathBuf,
    /// Maximum brightness value (from `max_brightness`)
    max_brightness: u32,
    /// Directory basename
    name: String,
}

impl TorchLed {
    /// Scan `/sys/class/leds/` for writable `*:flash` / `*:torch` entries.
    pub fn discover() -> Vec<TorchLed> {
        let leds_dir = Path::new("/sys/class/leds");
        let Ok(entries) = std::fs::read_dir(leds_dir) else {
            return Vec::new();
        };

        let mut devices = Vec::new();

        for entry in entries.flatten() {
            let name = entry.file_name();
            let Some(name_str) = name.to_str() else {
                continue;
            };
            if !name_str.ends_with(":flash") && !name_str.ends_with(":torch") {
                continue;
            }

            let led_path = entry.path();
            let max_brightness = match std::fs::read_to_string(led_path.join("max_brightness")) {
                Ok(s) => match s.trim().parse::<u32>() {
                    Ok(v) if v > 0 => v,
                    _ => continue,
                },
                Err(_) => continue,
            };

            // Verify we can actually write to brightness
            let brightness_path = led_path.join("brightness");
            if let Err(e) = std::fs::OpenOptions::new().write(true).open(&brightness_path) {
                warn!(
                    path = %brightness_path.display(),
                    error = %e,
                    "Torch LED found but not writable"
                );
                continue;
            }

            info!(name = name_str, max_brightness, "Discovered torch LED");
            devices.push(TorchLed {
                path: led_path,
                max_brightness,
                name: name_str.to_string(),
            });
        }

        // Deterministic ordering
        devices.sort_by(|a, b| a.name.cmp(&b.name));
        devices
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Turn the LED fully on
    pub fn on(&self) -> io::Result<()> {
        self.set_brightness(self.max_brightness)
    }

    /// Turn the LED off
    pub fn off(&self) -> io::Result<()> {
        self.set_brightness(0)
    }

    fn set_brightness(&self, value: u32) -> io::Result<()> {
        let clamped = value.min(self.max_brightness);
        std::fs::write(self.path.join("brightness"), clamped.to_string())
    }
}
