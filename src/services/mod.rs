//! Services module - Seams between a scan session and the scanner hardware.
//!
//! The session controller never talks to devices directly. Everything it needs
//! from the outside world goes through the traits defined here, which keeps the
//! controller testable with mocks and lets the headless binary run against the
//! in-process simulation.
//!
//! # Components
//!
//! - [`ScanEngine`]: The hardware-driven scanning process. Handles:
//!   - Starting, pausing, resuming and stopping a run
//!   - Reporting progress on request
//!   - Handing out newly produced points through a destructive drain
//!   - Announcing the end of a run through [`ScanCallbacks`]
//!
//! - [`CaptureSource`]: Camera frontend producing preview frames and engine frames
//! - [`RoiOverlay`]: Region-of-interest filter for frames and point clouds
//! - [`PointCloudSink`]: Destination for merged points
//! - [`Confirmation`]: Yes/no prompts before destructive actions
//!
//! # Simulation
//!
//! [`simulated`] provides a turntable engine, a camera, a cylindrical region of
//! interest and fixed prompt answers. They are deterministic when stepped by
//! hand and are what `scanbench` runs against when no hardware is present.

pub mod engine;
pub mod simulated;
pub mod vision;

pub use engine::{EngineError, EngineNotice, ScanCallbacks, ScanEngine};
pub use simulated::{
    CylinderRoi, FixedConfirmation, SimulatedCamera, SimulatedScanEngine, SimulationControl,
};
pub use vision::{CaptureError, CaptureSource, Confirmation, PointCloudSink, RoiOverlay};
