// SPDX-License-Identifier: GPL-3.0-only

//! Capture session lifecycle manager
//!
//! All device mutation — configuration, start/stop, torch, focus — runs on a
//! single control task that exclusively owns the boxed [`CaptureDevice`].
//! Public methods queue commands over a channel and await a reply, so
//! concurrent callers serialize instead of racing the hardware; the
//! underlying device APIs are not safe for concurrent configuration.
//!
//! Frame delivery is decoupled from the control task: the device pushes into
//! a bounded channel and drops the newest frame when the consumer lags.

pub mod types;

pub use types::{
    AppLifecycleEvent, CaptureFrame, CaptureSession, DecodedSymbol, DeviceCaps, FrameReceiver,
    FrameSender, PermissionStatus, PixelFormat, SessionState, TorchMode,
};

use crate::device::CaptureDevice;
use crate::errors::{ScanError, ScanResult};
use tokio::sync::{mpsc, oneshot, watch};
use tracing::{debug, info, warn};

/// Bounded frame queue between the capture device and the detection engine.
/// Small on purpose: a stale frame is worth less than a fresh one.
const FRAME_CHANNEL_CAPACITY: usize = 8;

const COMMAND_CHANNEL_CAPACITY: usize = 16;

enum Command {
    Start {
        reply: oneshot::Sender<ScanResult<CaptureSession>>,
    },
    Stop {
        /// `None` when fired from a drop guard that cannot await the reply
        reply: Option<oneshot::Sender<ScanResult<()>>>,
    },
    SetTorch {
        mode: TorchMode,
        reply: oneshot::Sender<ScanResult<()>>,
    },
    FocusAt {
        x: f32,
        y: f32,
        reply: oneshot::Sender<ScanResult<()>>,
    },
    Lifecycle {
        event: AppLifecycleEvent,
        reply: oneshot::Sender<()>,
    },
    TakeFrames {
        reply: oneshot::Sender<Option<FrameReceiver>>,
    },
}

/// Handle onto the session control task.
///
/// Cheap to clone; all clones talk to the same control task and therefore
/// the same exclusive device.
#[derive(Clone)]
pub struct SessionManager {
    commands: mpsc::Sender<Command>,
    state: watch::Receiver<SessionState>,
    last_error: watch::Receiver<Option<ScanError>>,
}

impl SessionManager {
    /// Spawn the control task around an exclusively owned device.
    pub fn new(device: Box<dyn CaptureDevice>) -> Self {
        let (commands, command_rx) = mpsc::channel(COMMAND_CHANNEL_CAPACITY);
        let (state_tx, state) = watch::channel(SessionState::Idle);
        let (error_tx, last_error) = watch::channel(None);
        let (frames_tx, frames_rx) = mpsc::channel(FRAME_CHANNEL_CAPACITY);

        let task = ControlTask {
            device,
            state: state_tx,
            last_error: error_tx,
            frames_tx,
            frames_rx: Some(frames_rx),
            session: None,
            next_session_id: 1,
            torch: TorchMode::Off,
            resume_on_foreground: false,
        };
        tokio::spawn(task.run(command_rx));

        Self {
            commands,
            state,
            last_error,
        }
    }

    /// Start (or reuse) the capture session.
    ///
    /// Idempotent while running: returns the existing session handle instead
    /// of reconfiguring the hardware. Not retried automatically on failure.
    pub async fn start_session(&self) -> ScanResult<CaptureSession> {
        let (reply, rx) = oneshot::channel();
        self.send(Command::Start { reply }).await?;
        rx.await.map_err(|_| control_task_gone())?
    }

    /// Stop the session and release the device. Idempotent.
    pub async fn stop_session(&self) -> ScanResult<()> {
        let (reply, rx) = oneshot::channel();
        self.send(Command::Stop { reply: Some(reply) }).await?;
        rx.await.map_err(|_| control_task_gone())?
    }

    /// Reserve a command slot for a later detached stop.
    ///
    /// Drop guards cannot await, and an unreserved `try_send` could be lost
    /// on a full channel, leaking the device until every handle drops.
    pub(crate) async fn reserve_stop(&self) -> ScanResult<StopPermit> {
        self.commands
            .clone()
            .reserve_owned()
            .await
            .map(StopPermit)
            .map_err(|_| control_task_gone())
    }

    pub async fn set_torch(&self, mode: TorchMode) -> ScanResult<()> {
        let (reply, rx) = oneshot::channel();
        self.send(Command::SetTorch { mode, reply }).await?;
        rx.await.map_err(|_| control_task_gone())?
    }

    /// Drive focus toward a normalized point within the frame.
    pub async fn focus_at(&self, x: f32, y: f32) -> ScanResult<()> {
        let (reply, rx) = oneshot::channel();
        self.send(Command::FocusAt { x, y, reply }).await?;
        rx.await.map_err(|_| control_task_gone())?
    }

    /// Feed an app foreground/background transition into the manager.
    ///
    /// This is the only path that may start or stop a session implicitly:
    /// backgrounding a running session disables the torch and stops it;
    /// foregrounding restarts it.
    pub async fn app_lifecycle(&self, event: AppLifecycleEvent) -> ScanResult<()> {
        let (reply, rx) = oneshot::channel();
        self.send(Command::Lifecycle { event, reply }).await?;
        rx.await.map_err(|_| control_task_gone())
    }

    /// Claim the frame receiver. Yields `Some` exactly once per session
    /// generation; a second claim while a consumer holds it returns `None`.
    pub async fn take_frames(&self) -> ScanResult<Option<FrameReceiver>> {
        let (reply, rx) = oneshot::channel();
        self.send(Command::TakeFrames { reply }).await?;
        rx.await.map_err(|_| control_task_gone())
    }

    /// Current session state
    pub fn state(&self) -> SessionState {
        self.state.borrow().clone()
    }

    /// Observable state channel for reactive consumers
    pub fn watch_state(&self) -> watch::Receiver<SessionState> {
        self.state.clone()
    }

    /// Most recent session-lifecycle failure, if any
    pub fn last_error(&self) -> Option<ScanError> {
        self.last_error.borrow().clone()
    }

    async fn send(&self, command: Command) -> ScanResult<()> {
        self.commands
            .send(command)
            .await
            .map_err(|_| control_task_gone())
    }
}

fn control_task_gone() -> ScanError {
    ScanError::ProcessingFailed("session control task terminated".to_string())
}

/// Pre-reserved command slot guaranteeing a detached stop can always be
/// queued. Dropping the permit unused releases the slot.
pub(crate) struct StopPermit(mpsc::OwnedPermit<Command>);

impl StopPermit {
    /// Queue a stop through the reserved slot, without waiting for it.
    pub(crate) fn stop(self) {
        self.0.send(Command::Stop { reply: None });
    }
}

/// State owned by the control task. Nothing here is ever touched from
/// another thread; serialization comes from the command channel.
struct ControlTask {
    device: Box<dyn CaptureDevice>,
    state: watch::Sender<SessionState>,
    last_error: watch::Sender<Option<ScanError>>,
    /// Persistent producer side of the frame channel. Surviving suspend and
    /// resume keeps an attached detection stream alive across both.
    frames_tx: FrameSender,
    frames_rx: Option<FrameReceiver>,
    session: Option<CaptureSession>,
    next_session_id: u64,
    torch: TorchMode,
    resume_on_foreground: bool,
}

impl ControlTask {
    async fn run(mut self, mut commands: mpsc::Receiver<Command>) {
        while let Some(command) = commands.recv().await {
            match command {
                Command::Start { reply } => {
                    let _ = reply.send(self.start());
                }
                Command::Stop { reply } => {
                    let result = self.stop(true);
                    if let Some(reply) = reply {
                        let _ = reply.send(result);
                    }
                }
                Command::SetTorch { mode, reply } => {
                    let result = self.device.set_torch(mode);
                    if result.is_ok() {
                        self.torch = mode;
                    }
                    let _ = reply.send(result);
                }
                Command::FocusAt { x, y, reply } => {
                    let _ = reply.send(self.device.focus_at(x, y));
                }
                Command::Lifecycle { event, reply } => {
                    self.lifecycle(event);
                    let _ = reply.send(());
                }
                Command::TakeFrames { reply } => {
                    let _ = reply.send(self.frames_rx.take());
                }
            }
        }

        // All manager handles dropped; never leave the device acquired.
        let _ = self.stop(false);
        debug!("Session control task ended");
    }

    fn start(&mut self) -> ScanResult<CaptureSession> {
        if let Some(session) = &self.session {
            debug!(id = session.id, "Session already running");
            return Ok(session.clone());
        }

        self.state.send_replace(SessionState::Configuring);

        let permission = match self.device.permission_status() {
            PermissionStatus::Authorized => PermissionStatus::Authorized,
            PermissionStatus::Denied => PermissionStatus::Denied,
            PermissionStatus::NotDetermined => self.device.request_permission(),
        };
        if permission != PermissionStatus::Authorized {
            return Err(self.fail(ScanError::PermissionDenied));
        }

        let caps = match self.device.open(self.frames_tx.clone()) {
            Ok(caps) => caps,
            Err(e) => return Err(self.fail(e)),
        };

        let session = CaptureSession {
            id: self.next_session_id,
            caps,
        };
        self.next_session_id += 1;
        self.session = Some(session.clone());
        self.state.send_replace(SessionState::Running);
        info!(id = session.id, device = %session.caps.name, "Capture session running");
        Ok(session)
    }

    /// Stop the session. `refresh_channel` replaces the frame channel so a
    /// later session generation gets a fresh receiver; suspend keeps the
    /// channel so an attached stream survives the background interval.
    fn stop(&mut self, refresh_channel: bool) -> ScanResult<()> {
        let Some(session) = self.session.take() else {
            debug!("Stop with no active session is a no-op");
            return Ok(());
        };

        // Torch must not stay lit on a released device
        if session.caps.has_torch && self.torch != TorchMode::Off {
            if let Err(e) = self.device.set_torch(TorchMode::Off) {
                warn!(error = %e, "Could not disable torch before release");
            }
            self.torch = TorchMode::Off;
        }

        self.device.close();

        if refresh_channel {
            let (tx, rx) = mpsc::channel(FRAME_CHANNEL_CAPACITY);
            self.frames_tx = tx;
            self.frames_rx = Some(rx);
        }

        self.state.send_replace(SessionState::Stopped);
        info!(id = session.id, "Capture session stopped");
        Ok(())
    }

    fn lifecycle(&mut self, event: AppLifecycleEvent) {
        match event {
            AppLifecycleEvent::Background => {
                if self.session.is_some() {
                    info!("App backgrounded, suspending capture session");
                    self.resume_on_foreground = true;
                    let _ = self.stop(false);
                }
            }
            AppLifecycleEvent::Foreground => {
                if self.resume_on_foreground {
                    self.resume_on_foreground = false;
                    info!("App foregrounded, resuming capture session");
                    if let Err(e) = self.start() {
                        warn!(error = %e, "Could not resume session on foreground");
                    }
                }
            }
        }
    }

    fn fail(&mut self, error: ScanError) -> ScanError {
        self.last_error.send_replace(Some(error.clone()));
        self.state.send_replace(SessionState::Error(error.clone()));
        error
    }
}
