use super::session::ScanVideoView;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Workbench configuration from `Scanbench Settings.yaml`.
///
/// Every section falls back to its defaults when missing, so a partial file
/// (or no file at all) is valid.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct WorkbenchConfig {
    #[serde(default)]
    pub scanning: ScanningSettings,

    #[serde(default)]
    pub video: VideoSettings,

    #[serde(default)]
    pub roi: RoiSettings,

    #[serde(default)]
    pub simulation: SimulationSettings,

    #[serde(default)]
    pub logging: LoggingSettings,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScanningSettings {
    /// Interval between poll-and-merge ticks while a run is active.
    #[serde(default = "default_poll_interval_ms")]
    pub poll_interval_ms: u64,
}

impl Default for ScanningSettings {
    fn default() -> Self {
        Self {
            poll_interval_ms: default_poll_interval_ms(),
        }
    }
}

impl ScanningSettings {
    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms.max(1))
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VideoSettings {
    /// Video refresh interval outside of a run.
    #[serde(default = "default_preview_interval_ms")]
    pub preview_interval_ms: u64,

    /// Video refresh interval during a run; the engine owns the camera then.
    #[serde(default = "default_scan_interval_ms")]
    pub scan_interval_ms: u64,

    /// Draw the region of interest over preview frames.
    #[serde(default)]
    pub show_roi_overlay: bool,

    #[serde(default)]
    pub scan_view: ScanVideoView,
}

impl Default for VideoSettings {
    fn default() -> Self {
        Self {
            preview_interval_ms: default_preview_interval_ms(),
            scan_interval_ms: default_scan_interval_ms(),
            show_roi_overlay: false,
            scan_view: ScanVideoView::default(),
        }
    }
}

/// Cylindrical region of interest centred on the turntable.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RoiSettings {
    #[serde(default = "default_roi_diameter_mm")]
    pub diameter_mm: f32,

    #[serde(default = "default_roi_height_mm")]
    pub height_mm: f32,
}

impl Default for RoiSettings {
    fn default() -> Self {
        Self {
            diameter_mm: default_roi_diameter_mm(),
            height_mm: default_roi_height_mm(),
        }
    }
}

/// Parameters for the simulated turntable engine used by the headless binary.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SimulationSettings {
    /// Turntable steps per revolution.
    #[serde(default = "default_steps")]
    pub steps: u64,

    #[serde(default = "default_points_per_step")]
    pub points_per_step: usize,

    #[serde(default = "default_step_interval_ms")]
    pub step_interval_ms: u64,

    /// Radius of the simulated subject.
    #[serde(default = "default_object_radius_mm")]
    pub object_radius_mm: f32,

    #[serde(default = "default_frame_width")]
    pub frame_width: u32,

    #[serde(default = "default_frame_height")]
    pub frame_height: u32,
}

impl Default for SimulationSettings {
    fn default() -> Self {
        Self {
            steps: default_steps(),
            points_per_step: default_points_per_step(),
            step_interval_ms: default_step_interval_ms(),
            object_radius_mm: default_object_radius_mm(),
            frame_width: default_frame_width(),
            frame_height: default_frame_height(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LoggingSettings {
    #[serde(default = "default_log_dir")]
    pub dir: String,

    #[serde(default)]
    pub debug: bool,

    #[serde(default = "default_console")]
    pub console: bool,
}

impl Default for LoggingSettings {
    fn default() -> Self {
        Self {
            dir: default_log_dir(),
            debug: false,
            console: default_console(),
        }
    }
}

fn default_poll_interval_ms() -> u64 {
    50
}

fn default_preview_interval_ms() -> u64 {
    10
}

fn default_scan_interval_ms() -> u64 {
    200
}

fn default_roi_diameter_mm() -> f32 {
    200.0
}

fn default_roi_height_mm() -> f32 {
    200.0
}

fn default_steps() -> u64 {
    400
}

fn default_points_per_step() -> usize {
    64
}

fn default_step_interval_ms() -> u64 {
    5
}

fn default_object_radius_mm() -> f32 {
    60.0
}

fn default_frame_width() -> u32 {
    320
}

fn default_frame_height() -> u32 {
    240
}

fn default_log_dir() -> String {
    "logs".to_string()
}

fn default_console() -> bool {
    true
}
