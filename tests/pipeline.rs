// SPDX-License-Identifier: GPL-3.0-only

//! End-to-end pipeline tests over the scripted virtual device

use bookscan::config::{ScannerConfig, ValidationMode};
use bookscan::detect::{DetectionMethod, FrameRegion};
use bookscan::device::VirtualDevice;
use bookscan::errors::ScanError;
use bookscan::session::{AppLifecycleEvent, SessionManager, SessionState};
use bookscan::stream::DetectionStream;
use futures::StreamExt;
use std::time::Duration;
use tokio::time::timeout;

const VALID_13: &str = "9780141036144";
const OTHER_13: &str = "9783161484100";

fn fast_config() -> ScannerConfig {
    ScannerConfig {
        throttle: Duration::from_millis(50),
        ..Default::default()
    }
}

#[tokio::test]
async fn end_to_end_validated_detection() {
    let device = VirtualDevice::new("virt0")
        .with_frames(vec![VirtualDevice::symbol_frame(VALID_13, FrameRegion::FULL)]);
    let probe = device.probe();
    let manager = SessionManager::new(Box::new(device));

    let mut stream = DetectionStream::open(manager, fast_config()).await.unwrap();
    let event = timeout(Duration::from_secs(2), stream.next())
        .await
        .expect("detection within deadline")
        .expect("stream still open");

    assert_eq!(event.raw_value, VALID_13);
    assert_eq!(event.method, DetectionMethod::HardwareDecoder);
    let isbn = event.validated.expect("checksum passes");
    assert_eq!(isbn.display, "978-0-1410-3614-4");

    let manager = stream.close().await.unwrap();
    assert_eq!(manager.state(), SessionState::Stopped);
    assert_eq!(probe.snapshot().closes, 1);
}

#[tokio::test]
async fn only_one_stream_can_attach_at_a_time() {
    let device = VirtualDevice::new("virt0").looping().with_frames(vec![
        VirtualDevice::symbol_frame(VALID_13, FrameRegion::FULL),
    ]);
    let manager = SessionManager::new(Box::new(device));

    let first = DetectionStream::open(manager.clone(), fast_config())
        .await
        .unwrap();

    // Every further attach fails deterministically while the first holds on
    for _ in 0..2 {
        let err = DetectionStream::open(manager.clone(), fast_config())
            .await
            .unwrap_err();
        assert_eq!(err, ScanError::StreamActive);
    }

    // Closing releases the session generation; the next attach succeeds
    let manager = first.close().await.unwrap();
    let second = DetectionStream::open(manager, fast_config()).await.unwrap();
    second.close().await.unwrap();
}

#[tokio::test]
async fn roi_filters_out_of_region_symbols() {
    let left = FrameRegion {
        x: 0.05,
        y: 0.1,
        width: 0.2,
        height: 0.3,
    };
    let right = FrameRegion {
        x: 0.7,
        y: 0.4,
        width: 0.2,
        height: 0.3,
    };
    let device = VirtualDevice::new("virt0").with_frames(vec![
        VirtualDevice::symbol_frame(VALID_13, left),
        VirtualDevice::symbol_frame(OTHER_13, right),
    ]);
    let manager = SessionManager::new(Box::new(device));

    let config = ScannerConfig {
        roi: Some(FrameRegion {
            x: 0.5,
            y: 0.0,
            width: 0.5,
            height: 1.0,
        }),
        ..fast_config()
    };
    let mut stream = DetectionStream::open(manager, config).await.unwrap();

    // The left-region symbol plays first but must never surface
    let event = timeout(Duration::from_secs(2), stream.next())
        .await
        .unwrap()
        .unwrap();
    assert_eq!(event.raw_value, OTHER_13);

    stream.close().await.unwrap();
}

#[tokio::test]
async fn repeated_reads_are_throttled_across_the_stream() {
    let device = VirtualDevice::new("virt0")
        .looping()
        .with_frame_interval(Duration::from_millis(5))
        .with_frames(vec![VirtualDevice::symbol_frame(VALID_13, FrameRegion::FULL)]);
    let manager = SessionManager::new(Box::new(device));

    let config = ScannerConfig {
        throttle: Duration::from_millis(200),
        ..Default::default()
    };
    let mut stream = DetectionStream::open(manager, config).await.unwrap();

    let first = timeout(Duration::from_secs(2), stream.next())
        .await
        .unwrap()
        .unwrap();
    let second = timeout(Duration::from_secs(2), stream.next())
        .await
        .unwrap()
        .unwrap();

    assert_eq!(first.raw_value, VALID_13);
    assert_eq!(second.raw_value, VALID_13);
    // Frames arrive every 5 ms; only the throttle explains a gap this wide
    assert!(second.timestamp.duration_since(first.timestamp) >= Duration::from_millis(150));

    stream.close().await.unwrap();
}

#[tokio::test]
async fn mandatory_validation_suppresses_bad_checksums() {
    // Same digits as VALID_13 with the check digit off by one
    let device = VirtualDevice::new("virt0").looping().with_frames(vec![
        VirtualDevice::symbol_frame("9780141036145", FrameRegion::FULL),
    ]);
    let manager = SessionManager::new(Box::new(device));

    let mut stream = DetectionStream::open(manager, fast_config()).await.unwrap();
    assert!(
        timeout(Duration::from_millis(300), stream.next())
            .await
            .is_err(),
        "rejected candidate must not surface"
    );
    stream.close().await.unwrap();
}

#[tokio::test]
async fn advisory_validation_passes_bad_checksums_through() {
    let device = VirtualDevice::new("virt0").looping().with_frames(vec![
        VirtualDevice::symbol_frame("9780141036145", FrameRegion::FULL),
    ]);
    let manager = SessionManager::new(Box::new(device));

    let config = ScannerConfig {
        validation: ValidationMode::Advisory,
        ..fast_config()
    };
    let mut stream = DetectionStream::open(manager, config).await.unwrap();
    let event = timeout(Duration::from_secs(2), stream.next())
        .await
        .unwrap()
        .unwrap();
    assert_eq!(event.raw_value, "9780141036145");
    assert!(event.validated.is_none());
    stream.close().await.unwrap();
}

#[tokio::test]
async fn validated_stream_yields_only_identifiers() {
    let device = VirtualDevice::new("virt0").with_frames(vec![
        VirtualDevice::symbol_frame("not-a-book", FrameRegion::FULL),
        VirtualDevice::symbol_frame(VALID_13, FrameRegion::FULL),
    ]);
    let manager = SessionManager::new(Box::new(device));

    let config = ScannerConfig {
        validation: ValidationMode::Advisory,
        ..fast_config()
    };
    let mut validated = DetectionStream::open(manager, config)
        .await
        .unwrap()
        .validated();

    let isbn = timeout(Duration::from_secs(2), validated.next())
        .await
        .unwrap()
        .unwrap();
    assert_eq!(isbn.normalized, VALID_13);
    validated.close().await.unwrap();
}

#[tokio::test]
async fn stream_survives_background_and_foreground() {
    let device = VirtualDevice::new("virt0")
        .looping()
        .with_frame_interval(Duration::from_millis(5))
        .with_frames(vec![VirtualDevice::symbol_frame(VALID_13, FrameRegion::FULL)]);
    let probe = device.probe();
    let manager = SessionManager::new(Box::new(device));

    let mut stream = DetectionStream::open(manager.clone(), fast_config())
        .await
        .unwrap();
    timeout(Duration::from_secs(2), stream.next())
        .await
        .unwrap()
        .unwrap();

    manager
        .app_lifecycle(AppLifecycleEvent::Background)
        .await
        .unwrap();
    assert_eq!(manager.state(), SessionState::Stopped);
    assert_eq!(probe.snapshot().closes, 1);

    manager
        .app_lifecycle(AppLifecycleEvent::Foreground)
        .await
        .unwrap();
    assert_eq!(manager.state(), SessionState::Running);

    // The same stream keeps delivering after resume
    let event = timeout(Duration::from_secs(2), stream.next())
        .await
        .expect("stream resumed")
        .expect("stream still open");
    assert_eq!(event.raw_value, VALID_13);

    stream.close().await.unwrap();
}

#[tokio::test]
async fn dropping_a_stream_still_stops_the_session() {
    let device = VirtualDevice::new("virt0").looping().with_frames(vec![
        VirtualDevice::symbol_frame(VALID_13, FrameRegion::FULL),
    ]);
    let probe = device.probe();
    let manager = SessionManager::new(Box::new(device));

    let stream = DetectionStream::open(manager.clone(), fast_config())
        .await
        .unwrap();
    assert_eq!(manager.state(), SessionState::Running);
    drop(stream);

    // The drop guard stops asynchronously
    let mut state = manager.watch_state();
    timeout(Duration::from_secs(2), async {
        while *state.borrow_and_update() != SessionState::Stopped {
            state.changed().await.unwrap();
        }
    })
    .await
    .expect("session stops after stream drop");
    assert_eq!(probe.snapshot().closes, 1);
}

#[tokio::test]
async fn open_fails_cleanly_on_unavailable_device() {
    let device = VirtualDevice::new("virt0")
        .failing_with(ScanError::DeviceUnavailable("virt0 is in use".to_string()));
    let manager = SessionManager::new(Box::new(device));

    let err = DetectionStream::open(manager.clone(), fast_config())
        .await
        .unwrap_err();
    assert!(matches!(err, ScanError::DeviceUnavailable(_)));
    assert_eq!(manager.last_error(), Some(err));
}

#[tokio::test]
async fn close_returns_while_the_event_queue_is_full() {
    // Forty distinct values in advisory mode overrun the bounded event
    // queue when nobody polls, parking the engine mid-delivery
    let frames: Vec<_> = (0..40)
        .map(|i| VirtualDevice::symbol_frame(&format!("shelf-{i:03}"), FrameRegion::FULL))
        .collect();
    let device = VirtualDevice::new("virt0")
        .looping()
        .with_frame_interval(Duration::from_millis(1))
        .with_frames(frames);
    let manager = SessionManager::new(Box::new(device));

    let config = ScannerConfig {
        validation: ValidationMode::Advisory,
        ..fast_config()
    };
    let stream = DetectionStream::open(manager, config).await.unwrap();
    tokio::time::sleep(Duration::from_millis(200)).await;

    let manager = timeout(Duration::from_secs(3), stream.close())
        .await
        .expect("close must return even with a full event queue")
        .unwrap();
    assert_eq!(manager.state(), SessionState::Stopped);
}

#[tokio::test]
async fn invalid_config_is_rejected_before_touching_the_device() {
    let device = VirtualDevice::new("virt0");
    let probe = device.probe();
    let manager = SessionManager::new(Box::new(device));

    let config = ScannerConfig {
        throttle: Duration::ZERO,
        ..Default::default()
    };
    let err = DetectionStream::open(manager, config).await.unwrap_err();
    assert!(matches!(err, ScanError::ConfigurationFailed(_)));
    assert_eq!(probe.snapshot().opens, 0);
}
