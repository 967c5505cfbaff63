//! In-process stand-ins for the scanner hardware.
//!
//! These drive the headless binary and the driver tests: a turntable engine
//! that produces a ring of points per step, a camera that returns solid
//! frames, a cylindrical region of interest, and fixed prompt answers.

use super::engine::{EngineError, ScanCallbacks, ScanEngine};
use super::vision::{CaptureError, CaptureSource, Confirmation, RoiOverlay};
use crate::models::{
    Frame, Point3, PointCloudFragment, Progress, Rgb, RoiSettings, ScanOutcome, ScanVideoView,
    SimulationSettings,
};
use std::f32::consts::TAU;
use std::sync::{Arc, Mutex, PoisonError};
use std::thread;
use std::time::Duration;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Phase {
    Idle,
    Running,
    Paused,
    Stopped,
    Completed,
}

struct Simulation {
    settings: SimulationSettings,
    phase: Phase,
    step: u64,
    fault_at_step: Option<u64>,
    callbacks: Option<ScanCallbacks>,

    // Everything produced so far; `cursor` marks the first undrained point.
    points: Vec<Point3>,
    colors: Vec<Rgb>,
    cursor: usize,
}

impl Simulation {
    /// Rotate the turntable one step. Returns false once the run is over.
    fn advance(&mut self) -> bool {
        if self.phase != Phase::Running {
            return self.phase == Phase::Paused;
        }

        if self.fault_at_step == Some(self.step) {
            self.phase = Phase::Completed;
            tracing::warn!("Simulated laser fault at step {}", self.step);
            if let Some(callbacks) = self.callbacks.as_mut() {
                callbacks.notify_complete(ScanOutcome::failure(format!(
                    "laser fault at step {}",
                    self.step
                )));
            }
            return false;
        }

        self.capture_step();
        self.step += 1;

        if self.step >= self.settings.steps {
            self.phase = Phase::Completed;
            tracing::debug!("Simulated run completed after {} steps", self.step);
            if let Some(callbacks) = self.callbacks.as_mut() {
                callbacks.notify_complete(ScanOutcome::success());
            }
            return false;
        }

        true
    }

    /// Triangulate the laser line for the current turntable angle.
    fn capture_step(&mut self) {
        let settings = &self.settings;
        let angle = TAU * self.step as f32 / settings.steps.max(1) as f32;
        let radius = settings.object_radius_mm;
        let top = radius * 2.0;
        let count = settings.points_per_step;

        for i in 0..count {
            let z = top * (i as f32 + 0.5) / count as f32;
            // Every eighth sample hits the background behind the turntable.
            let (r, color) = if i % 8 == 7 {
                (radius * 3.0, Rgb::new(30, 30, 30))
            } else {
                let shade = 40 + (200.0 * z / top) as u8;
                (radius * (1.0 + 0.1 * (z * 0.05).sin()), Rgb::new(shade, shade, shade))
            };
            self.points
                .push(Point3::new(r * angle.cos(), r * angle.sin(), z));
            self.colors.push(color);
        }
    }
}

/// Turntable engine producing a deterministic cylinder-like subject
///
/// With a non-zero `step_interval_ms` a background thread rotates the table;
/// with zero the run only advances through [`SimulationControl::advance`].
pub struct SimulatedScanEngine {
    shared: Arc<Mutex<Simulation>>,
    step_interval: Duration,
}

impl SimulatedScanEngine {
    pub fn new(settings: SimulationSettings) -> Self {
        let step_interval = Duration::from_millis(settings.step_interval_ms);
        Self {
            shared: Arc::new(Mutex::new(Simulation {
                settings,
                phase: Phase::Idle,
                step: 0,
                fault_at_step: None,
                callbacks: None,
                points: Vec::new(),
                colors: Vec::new(),
                cursor: 0,
            })),
            step_interval,
        }
    }

    /// Fail the run with a hardware fault when it reaches `step`.
    pub fn with_fault_at(self, step: u64) -> Self {
        self.lock().fault_at_step = Some(step);
        self
    }

    /// Handle for stepping the table by hand.
    pub fn control(&self) -> SimulationControl {
        SimulationControl {
            shared: Arc::clone(&self.shared),
        }
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Simulation> {
        self.shared.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn spawn_turntable(&self) {
        let shared = Arc::clone(&self.shared);
        let interval = self.step_interval;

        thread::spawn(move || {
            tracing::debug!("Simulated turntable thread started");
            loop {
                thread::sleep(interval);
                let mut simulation = shared.lock().unwrap_or_else(PoisonError::into_inner);
                if !simulation.advance() {
                    break;
                }
            }
            tracing::debug!("Simulated turntable thread terminated");
        });
    }
}

impl ScanEngine for SimulatedScanEngine {
    fn start(&mut self, mut callbacks: ScanCallbacks) -> Result<(), EngineError> {
        {
            let mut simulation = self.lock();
            if simulation.phase != Phase::Idle {
                return Err(EngineError::Rejected("run already started".to_string()));
            }
            callbacks.notify_before();
            simulation.callbacks = Some(callbacks);
            simulation.phase = Phase::Running;
        }

        if !self.step_interval.is_zero() {
            self.spawn_turntable();
        }
        Ok(())
    }

    fn pause(&mut self) -> Result<(), EngineError> {
        let mut simulation = self.lock();
        match simulation.phase {
            Phase::Running | Phase::Paused => {
                simulation.phase = Phase::Paused;
                Ok(())
            }
            _ => Err(EngineError::NotRunning),
        }
    }

    fn resume(&mut self) -> Result<(), EngineError> {
        let mut simulation = self.lock();
        match simulation.phase {
            Phase::Running | Phase::Paused => {
                simulation.phase = Phase::Running;
                Ok(())
            }
            _ => Err(EngineError::NotRunning),
        }
    }

    fn stop(&mut self) -> Result<(), EngineError> {
        let mut simulation = self.lock();
        match simulation.phase {
            Phase::Idle => Err(EngineError::NotRunning),
            Phase::Completed => Ok(()),
            _ => {
                simulation.phase = Phase::Stopped;
                // An aborted run never reports completion.
                simulation.callbacks = None;
                Ok(())
            }
        }
    }

    fn is_paused(&self) -> bool {
        self.lock().phase == Phase::Paused
    }

    fn get_progress(&mut self) -> Result<Progress, EngineError> {
        let simulation = self.lock();
        Ok(Progress::new(simulation.step, simulation.settings.steps))
    }

    fn drain_fragment(&mut self) -> Result<Option<PointCloudFragment>, EngineError> {
        let mut simulation = self.lock();
        let end = simulation.points.len();
        if simulation.cursor >= end {
            return Ok(None);
        }

        let start = simulation.cursor;
        simulation.cursor = end;
        Ok(Some(PointCloudFragment::new(
            simulation.points[start..end].to_vec(),
            simulation.colors[start..end].to_vec(),
        )))
    }
}

impl Drop for SimulatedScanEngine {
    fn drop(&mut self) {
        let mut simulation = self.lock();
        if matches!(simulation.phase, Phase::Running | Phase::Paused) {
            simulation.phase = Phase::Stopped;
        }
    }
}

/// Manual stepping for a [`SimulatedScanEngine`]
#[derive(Clone)]
pub struct SimulationControl {
    shared: Arc<Mutex<Simulation>>,
}

impl SimulationControl {
    /// Rotate up to `steps` steps; returns how many were taken.
    pub fn advance(&self, steps: u64) -> u64 {
        let mut simulation = self.shared.lock().unwrap_or_else(PoisonError::into_inner);
        let mut taken = 0;
        while taken < steps && simulation.phase == Phase::Running {
            simulation.advance();
            taken += 1;
        }
        taken
    }

    /// Points produced so far, drained or not.
    pub fn produced_points(&self) -> usize {
        self.shared
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .points
            .len()
    }
}

/// Camera returning solid frames, one color per capture mode
pub struct SimulatedCamera {
    width: u32,
    height: u32,
    connected: bool,
}

impl SimulatedCamera {
    pub const PREVIEW_COLOR: Rgb = Rgb::new(60, 60, 60);

    pub fn new(width: u32, height: u32) -> Self {
        Self {
            width,
            height,
            connected: true,
        }
    }

    pub fn disconnected(width: u32, height: u32) -> Self {
        Self {
            connected: false,
            ..Self::new(width, height)
        }
    }

    pub fn scan_color(view: ScanVideoView) -> Rgb {
        match view {
            ScanVideoView::Texture => Rgb::new(128, 110, 90),
            ScanVideoView::Laser => Rgb::new(255, 0, 0),
            ScanVideoView::Gray => Rgb::new(128, 128, 128),
            ScanVideoView::Line => Rgb::new(255, 255, 255),
        }
    }
}

impl CaptureSource for SimulatedCamera {
    fn capture_preview(&mut self) -> Result<Frame, CaptureError> {
        if !self.connected {
            return Err(CaptureError::Disconnected);
        }
        Ok(Frame::filled(self.width, self.height, Self::PREVIEW_COLOR))
    }

    fn capture_scan(&mut self, view: ScanVideoView) -> Result<Frame, CaptureError> {
        if !self.connected {
            return Err(CaptureError::Disconnected);
        }
        Ok(Frame::filled(self.width, self.height, Self::scan_color(view)))
    }
}

/// Upright cylinder standing on the turntable centre
#[derive(Clone, Debug, PartialEq)]
pub struct CylinderRoi {
    pub radius_mm: f32,
    pub height_mm: f32,
}

impl CylinderRoi {
    pub const OVERLAY_COLOR: Rgb = Rgb::new(0, 255, 0);

    pub fn new(radius_mm: f32, height_mm: f32) -> Self {
        Self {
            radius_mm,
            height_mm,
        }
    }

    pub fn contains(&self, point: &Point3) -> bool {
        point.radial_distance() <= self.radius_mm && point.z >= 0.0 && point.z <= self.height_mm
    }

    /// Pixel box the cylinder occupies in a `width` x `height` frame.
    ///
    /// Uses a fixed projection: the cylinder spans the middle half of the
    /// frame horizontally and all but an eighth at top and bottom.
    pub fn overlay_box(width: u32, height: u32) -> (u32, u32, u32, u32) {
        let left = width / 4;
        let right = (width * 3 / 4).saturating_sub(1).max(left);
        let top = height / 8;
        let bottom = height.saturating_sub(1 + height / 8).max(top);
        (left, top, right, bottom)
    }
}

impl From<&RoiSettings> for CylinderRoi {
    fn from(settings: &RoiSettings) -> Self {
        Self::new(settings.diameter_mm / 2.0, settings.height_mm)
    }
}

impl RoiOverlay for CylinderRoi {
    fn annotate(&self, mut frame: Frame) -> Frame {
        if frame.width == 0 || frame.height == 0 {
            return frame;
        }

        let (left, top, right, bottom) = Self::overlay_box(frame.width, frame.height);
        for x in left..=right {
            frame.set_pixel(x, top, Self::OVERLAY_COLOR);
            frame.set_pixel(x, bottom, Self::OVERLAY_COLOR);
        }
        for y in top..=bottom {
            frame.set_pixel(left, y, Self::OVERLAY_COLOR);
            frame.set_pixel(right, y, Self::OVERLAY_COLOR);
        }
        frame
    }

    fn mask(&self, points: Vec<Point3>, colors: Vec<Rgb>) -> (Vec<Point3>, Vec<Rgb>) {
        points
            .into_iter()
            .zip(colors)
            .filter(|(point, _)| self.contains(point))
            .unzip()
    }
}

/// Prompt answers fixed up front
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct FixedConfirmation {
    pub stop: bool,
    pub discard: bool,
}

impl FixedConfirmation {
    pub fn accept_all() -> Self {
        Self {
            stop: true,
            discard: true,
        }
    }

    pub fn decline_all() -> Self {
        Self {
            stop: false,
            discard: false,
        }
    }
}

impl Confirmation for FixedConfirmation {
    fn confirm_stop(&mut self) -> bool {
        self.stop
    }

    fn confirm_discard_cloud(&mut self) -> bool {
        self.discard
    }
}
