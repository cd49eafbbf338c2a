// SPDX-License-Identifier: MPL-2.0

//! Bookscan - real-time book identifier acquisition
//!
//! This library turns a camera into a stream of validated book identifiers:
//! frames come off an exclusively owned capture session, two concurrent
//! detection strategies turn them into barcode candidates, and a serialized
//! pipeline filters, throttles and checksum-validates those into events.
//!
//! # Architecture
//!
//! The crate is organized into several modules:
//!
//! - [`session`]: capture session lifecycle on a single control task
//! - [`device`]: capture backend seam (V4L2 hardware, scripted virtual)
//! - [`detect`]: visual and hardware-decoder strategies plus the engine
//! - [`validator`]: ISBN-10 / ISBN-13 checksum validation and formatting
//! - [`stream`]: the consumer-facing detection event stream
//! - [`config`]: static per-stream scanner configuration
//!
//! # Example
//!
//! ```ignore
//! let manager = SessionManager::new(Box::new(V4l2Device::new("/dev/video0")));
//! let mut stream = DetectionStream::open(manager, ScannerConfig::default()).await?;
//! while let Some(event) = stream.next().await {
//!     println!("{event:?}");
//! }
//! ```

pub mod config;
pub mod detect;
pub mod device;
pub mod errors;
pub mod session;
pub mod stream;
pub mod validator;

// Re-export commonly used types
pub use config::{ScannerConfig, ValidationMode};
pub use detect::{DetectionEvent, DetectionMethod, FrameRegion};
pub use errors::{ScanError, ScanResult};
pub use session::{AppLifecycleEvent, SessionManager, SessionState, TorchMode};
pub use stream::{DetectionStream, ValidatedStream};
pub use validator::{IsbnKind, ValidatedIsbn};
