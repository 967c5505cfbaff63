use crate::models::{Command, SessionState};
use crate::services::{CaptureError, EngineError};
use thiserror::Error;

/// Errors returned by the session controller
///
/// None of these are fatal: the controller records them in the snapshot and
/// keeps running. Engine failures during pause, resume or stop additionally
/// end the run.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SessionError {
    #[error("Cannot {command} while {state}")]
    InvalidTransition {
        command: Command,
        state: SessionState,
    },

    #[error("Scan engine unavailable: {0}")]
    EngineUnavailable(#[from] EngineError),

    #[error("Fragment has {points} points but {colors} colors")]
    FragmentMismatch { points: usize, colors: usize },

    #[error("Video capture failed: {0}")]
    CaptureUnavailable(#[from] CaptureError),

    #[error("Session driver has shut down")]
    SessionClosed,
}
