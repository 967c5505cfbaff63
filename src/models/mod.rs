//! Data models for the scan workbench.
//!
//! - [`SessionState`], [`Command`], [`AcquisitionMode`], [`Progress`],
//!   [`ScanOutcome`] and the [`enablement`] projection describe a scan session
//! - [`PointCloudFragment`], [`PointCloud`] and [`Frame`] carry scan data and video
//! - [`SessionSnapshot`] is the observable state held by
//!   [`StateManager`](crate::state::StateManager)
//! - [`WorkbenchConfig`] is loaded from `Scanbench Settings.yaml`

pub mod config;
pub mod point_cloud;
pub mod session;
pub mod snapshot;

pub use config::{
    LoggingSettings, RoiSettings, ScanningSettings, SimulationSettings, VideoSettings,
    WorkbenchConfig,
};
pub use point_cloud::{Frame, Point3, PointCloud, PointCloudFragment, Rgb};
pub use session::{
    AcquisitionMode, Command, CommandOutcome, Enablement, Progress, ScanOutcome, ScanVideoView,
    SessionState, enablement,
};
pub use snapshot::SessionSnapshot;
