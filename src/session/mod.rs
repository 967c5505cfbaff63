//! Scan session orchestration.
//!
//! [`ScanSessionController`] owns the session state machine: it turns toolbar
//! commands into engine requests, merges drained fragments into the point
//! cloud on every poll tick and picks preview or scan frames for the video
//! view. [`SessionDriver`] runs a controller inside one tokio task and hands
//! out cloneable [`SessionHandle`]s.

pub mod controller;
pub mod driver;
pub mod error;

pub use controller::{Collaborators, PollReport, ScanSessionController, SessionSettings};
pub use driver::{SessionDriver, SessionHandle};
pub use error::SessionError;
