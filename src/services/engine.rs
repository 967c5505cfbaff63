use crate::models::{PointCloudFragment, Progress, ScanOutcome};
use std::fmt;
use thiserror::Error;
use tokio::sync::mpsc;

/// Errors reported by a scan engine
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum EngineError {
    #[error("Scanner is not connected")]
    Disconnected,

    #[error("No run in progress")]
    NotRunning,

    #[error("Engine rejected request: {0}")]
    Rejected(String),

    #[error("Hardware fault: {0}")]
    Hardware(String),
}

/// Hardware-driven scanning process
///
/// All requests are fire-and-forget: they return as soon as the engine has
/// accepted them. How a run ends is reported through the
/// [`ScanCallbacks`] handed to [`start`](Self::start).
///
/// [`drain_fragment`](Self::drain_fragment) is destructive: every point the
/// engine produces is returned by exactly one call.
pub trait ScanEngine: Send {
    fn start(&mut self, callbacks: ScanCallbacks) -> Result<(), EngineError>;

    fn pause(&mut self) -> Result<(), EngineError>;

    fn resume(&mut self) -> Result<(), EngineError>;

    fn stop(&mut self) -> Result<(), EngineError>;

    fn is_paused(&self) -> bool;

    fn get_progress(&mut self) -> Result<Progress, EngineError>;

    /// Points produced since the previous drain, or `None` if nothing is new.
    fn drain_fragment(&mut self) -> Result<Option<PointCloudFragment>, EngineError>;
}

pub type BeforeFn = Box<dyn FnOnce() + Send>;
pub type ProgressFn = Box<dyn FnMut(Progress) + Send>;
pub type CompleteFn = Box<dyn FnOnce(ScanOutcome) + Send>;

/// Notifications an engine delivers over the course of a run
///
/// `on_before` and `on_complete` fire at most once; later calls are ignored.
pub struct ScanCallbacks {
    on_before: Option<BeforeFn>,
    on_progress: Option<ProgressFn>,
    on_complete: Option<CompleteFn>,
}

impl ScanCallbacks {
    pub fn new(
        on_before: impl FnOnce() + Send + 'static,
        on_progress: Option<ProgressFn>,
        on_complete: impl FnOnce(ScanOutcome) + Send + 'static,
    ) -> Self {
        Self {
            on_before: Some(Box::new(on_before)),
            on_progress,
            on_complete: Some(Box::new(on_complete)),
        }
    }

    /// Callbacks that forward every notification into `tx` as an [`EngineNotice`].
    ///
    /// No progress callback is registered; progress is read on each poll tick.
    pub fn notifying(tx: mpsc::UnboundedSender<EngineNotice>) -> Self {
        let began = tx.clone();
        Self::new(
            move || {
                let _ = began.send(EngineNotice::Began);
            },
            None,
            move |outcome| {
                let _ = tx.send(EngineNotice::Completed(outcome));
            },
        )
    }

    /// The engine is about to drive the hardware.
    pub fn notify_before(&mut self) {
        if let Some(on_before) = self.on_before.take() {
            on_before();
        }
    }

    pub fn notify_progress(&mut self, progress: Progress) {
        if let Some(on_progress) = self.on_progress.as_mut() {
            on_progress(progress);
        }
    }

    /// The run ended on its own, successfully or not.
    pub fn notify_complete(&mut self, outcome: ScanOutcome) {
        if let Some(on_complete) = self.on_complete.take() {
            on_complete(outcome);
        }
    }

    pub fn has_progress_callback(&self) -> bool {
        self.on_progress.is_some()
    }
}

impl fmt::Debug for ScanCallbacks {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ScanCallbacks")
            .field("on_before", &self.on_before.is_some())
            .field("on_progress", &self.on_progress.is_some())
            .field("on_complete", &self.on_complete.is_some())
            .finish()
    }
}

/// Engine callback delivered to the controller's queue
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum EngineNotice {
    Began,
    Progress(Progress),
    Completed(ScanOutcome),
}
