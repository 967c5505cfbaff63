// SessionDriver - Runs a ScanSessionController inside a single tokio task
//
// The controller is not shared between threads. Instead the driver owns it and
// multiplexes three event sources onto it, one at a time:
// 1. Requests from any number of SessionHandles (commands, frames, settings)
// 2. Engine notices queued by the engine's callbacks
// 3. The poll ticker, armed only while the session is running

use crate::models::{
    AcquisitionMode, Command, CommandOutcome, Frame, ScanVideoView, SessionSnapshot, SessionState,
};
use crate::session::{ScanSessionController, SessionError};
use crate::state::{SessionChange, StateManager};
use std::time::Duration;
use tokio::sync::{broadcast, mpsc, oneshot};
use tokio::task::JoinHandle;
use tokio::time::{self, MissedTickBehavior};

/// Pending requests beyond this make senders wait
const REQUEST_CAPACITY: usize = 100;

type Reply<T> = oneshot::Sender<Result<T, SessionError>>;

/// Work sent from a [`SessionHandle`] to the driver task
#[derive(Debug)]
enum DriverRequest {
    Command {
        command: Command,
        reply: Reply<CommandOutcome>,
    },
    VideoFrame {
        reply: Reply<Frame>,
    },
    SetScanVideoView(ScanVideoView),
    SetRoiOverlay(bool),
    Shutdown,
}

/// Owns a controller and feeds it requests, engine notices and poll ticks
///
/// # Example
/// ```ignore
/// let controller = ScanSessionController::new(collaborators, settings);
/// let (handle, task) = SessionDriver::spawn(controller);
///
/// handle.command(Command::Play).await?;
/// // ... wait for SessionChange::SessionFinished on handle.subscribe()
/// handle.shutdown().await?;
/// let controller = task.await?;
/// ```
pub struct SessionDriver {
    controller: ScanSessionController,
    requests: mpsc::Receiver<DriverRequest>,
}

impl SessionDriver {
    /// Create a driver and the first handle to it
    ///
    /// The driver does nothing until [`run`](Self::run) is awaited.
    pub fn new(controller: ScanSessionController) -> (Self, SessionHandle) {
        let (requests_tx, requests) = mpsc::channel(REQUEST_CAPACITY);

        let handle = SessionHandle {
            requests: requests_tx,
            state: controller.state_manager(),
            preview_interval: controller.video_refresh_interval_for(AcquisitionMode::Preview),
            scan_interval: controller.video_refresh_interval_for(AcquisitionMode::Scan),
        };

        (
            Self {
                controller,
                requests,
            },
            handle,
        )
    }

    /// Spawn the driver on the current tokio runtime
    pub fn spawn(
        controller: ScanSessionController,
    ) -> (SessionHandle, JoinHandle<ScanSessionController>) {
        let (driver, handle) = Self::new(controller);
        (handle, tokio::spawn(driver.run()))
    }

    /// Process events until shutdown or until every handle is dropped
    ///
    /// Returns the controller so callers can inspect the finished session.
    pub async fn run(mut self) -> ScanSessionController {
        tracing::debug!("Session driver started");

        let mut ticker = time::interval(self.controller.poll_interval());
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
        let mut polling = self.controller.is_polling();

        loop {
            tokio::select! {
                request = self.requests.recv() => {
                    match request {
                        Some(DriverRequest::Shutdown) | None => break,
                        Some(request) => self.handle_request(request),
                    }
                }
                Some(notice) = self.controller.next_engine_notice() => {
                    self.controller.apply_engine_notice(notice);
                }
                _ = ticker.tick(), if polling => {
                    self.controller.poll_once();
                }
            }

            let now_polling = self.controller.is_polling();
            if now_polling && !polling {
                // First tick one full interval after entering Running
                ticker.reset();
            }
            polling = now_polling;
        }

        tracing::debug!(
            "Session driver terminated in state {}",
            self.controller.current_state()
        );
        self.controller
    }

    fn handle_request(&mut self, request: DriverRequest) {
        match request {
            DriverRequest::Command { command, reply } => {
                let _ = reply.send(self.controller.command(command));
            }
            DriverRequest::VideoFrame { reply } => {
                let _ = reply.send(self.controller.next_video_frame());
            }
            DriverRequest::SetScanVideoView(view) => self.controller.set_scan_video_view(view),
            DriverRequest::SetRoiOverlay(enabled) => self.controller.set_roi_overlay(enabled),
            DriverRequest::Shutdown => {}
        }
    }
}

/// Cloneable front door to a running [`SessionDriver`]
///
/// Every async method fails with [`SessionError::SessionClosed`] once the
/// driver has stopped.
#[derive(Clone)]
pub struct SessionHandle {
    requests: mpsc::Sender<DriverRequest>,
    state: StateManager,
    preview_interval: Duration,
    scan_interval: Duration,
}

impl SessionHandle {
    pub async fn command(&self, command: Command) -> Result<CommandOutcome, SessionError> {
        let (reply, response) = oneshot::channel();
        self.send(DriverRequest::Command { command, reply }).await?;
        response.await.map_err(|_| SessionError::SessionClosed)?
    }

    pub async fn next_video_frame(&self) -> Result<Frame, SessionError> {
        let (reply, response) = oneshot::channel();
        self.send(DriverRequest::VideoFrame { reply }).await?;
        response.await.map_err(|_| SessionError::SessionClosed)?
    }

    pub async fn set_scan_video_view(&self, view: ScanVideoView) -> Result<(), SessionError> {
        self.send(DriverRequest::SetScanVideoView(view)).await
    }

    pub async fn set_roi_overlay(&self, enabled: bool) -> Result<(), SessionError> {
        self.send(DriverRequest::SetRoiOverlay(enabled)).await
    }

    /// Ask the driver to stop; does not stop the scan itself
    pub async fn shutdown(&self) -> Result<(), SessionError> {
        self.send(DriverRequest::Shutdown).await
    }

    pub fn snapshot(&self) -> SessionSnapshot {
        self.state.snapshot()
    }

    pub fn current_state(&self) -> SessionState {
        self.state.session_state()
    }

    pub fn subscribe(&self) -> broadcast::Receiver<SessionChange> {
        self.state.subscribe()
    }

    /// How often a video view should request frames right now
    pub fn video_refresh_interval(&self) -> Duration {
        match self.state.read(|s| s.mode) {
            AcquisitionMode::Preview => self.preview_interval,
            AcquisitionMode::Scan => self.scan_interval,
        }
    }

    pub fn is_closed(&self) -> bool {
        self.requests.is_closed()
    }

    async fn send(&self, request: DriverRequest) -> Result<(), SessionError> {
        self.requests.send(request).await.map_err(|_| {
            tracing::warn!("Session request dropped - driver has stopped");
            SessionError::SessionClosed
        })
    }
}
