//! Shared fixtures for session integration tests

#![allow(dead_code)]

use mockall::mock;
use scanbench::models::{
    Point3, PointCloud, PointCloudFragment, Progress, Rgb, ScanOutcome, SimulationSettings,
};
use scanbench::services::{
    CylinderRoi, EngineError, FixedConfirmation, PointCloudSink, ScanCallbacks, ScanEngine,
    SimulatedCamera,
};
use scanbench::{Collaborators, ScanSessionController, SessionSettings};
use std::sync::{Arc, Mutex};

mock! {
    pub Engine {}

    impl ScanEngine for Engine {
        fn start(&mut self, callbacks: ScanCallbacks) -> Result<(), EngineError>;
        fn pause(&mut self) -> Result<(), EngineError>;
        fn resume(&mut self) -> Result<(), EngineError>;
        fn stop(&mut self) -> Result<(), EngineError>;
        fn is_paused(&self) -> bool;
        fn get_progress(&mut self) -> Result<Progress, EngineError>;
        fn drain_fragment(&mut self) -> Result<Option<PointCloudFragment>, EngineError>;
    }
}

/// Callbacks captured from `start`, so a test can complete the run
#[derive(Clone, Default)]
pub struct CapturedCallbacks(Arc<Mutex<Option<ScanCallbacks>>>);

impl CapturedCallbacks {
    pub fn complete(&self, outcome: ScanOutcome) {
        let mut callbacks = self
            .0
            .lock()
            .unwrap()
            .take()
            .expect("engine was never started");
        callbacks.notify_complete(outcome);
    }
}

/// Expect exactly one successful `start`, keeping its callbacks
pub fn expect_start(engine: &mut MockEngine) -> CapturedCallbacks {
    let captured = CapturedCallbacks::default();
    let slot = captured.0.clone();
    engine.expect_start().times(1).returning(move |mut callbacks| {
        callbacks.notify_before();
        *slot.lock().unwrap() = Some(callbacks);
        Ok(())
    });
    captured
}

/// Point cloud the test keeps a handle on after the controller takes the sink
#[derive(Clone, Default)]
pub struct SharedCloud(pub Arc<Mutex<PointCloud>>);

impl SharedCloud {
    pub fn len(&self) -> usize {
        self.0.lock().unwrap().len()
    }

    pub fn points(&self) -> Vec<Point3> {
        self.0.lock().unwrap().points().to_vec()
    }

    pub fn colors(&self) -> Vec<Rgb> {
        self.0.lock().unwrap().colors().to_vec()
    }
}

impl PointCloudSink for SharedCloud {
    fn reset(&mut self) {
        self.0.lock().unwrap().clear();
    }

    fn append(&mut self, points: &[Point3], colors: &[Rgb]) {
        self.0.lock().unwrap().extend(points, colors);
    }

    fn point_count(&self) -> usize {
        self.len()
    }
}

/// A fragment of `n` points inside the default region of interest
pub fn fragment(n: usize) -> PointCloudFragment {
    fragment_from(0, n)
}

/// `n` points with distinct coordinates starting at index `first`
pub fn fragment_from(first: usize, n: usize) -> PointCloudFragment {
    PointCloudFragment::new(
        (first..first + n)
            .map(|i| Point3::new(0.01 * i as f32, 0.0, 10.0))
            .collect(),
        (first..first + n)
            .map(|i| Rgb::new((i % 256) as u8, 0, 0))
            .collect(),
    )
}

pub fn controller(
    engine: impl ScanEngine + 'static,
    sink: SharedCloud,
    confirmation: FixedConfirmation,
) -> ScanSessionController {
    ScanSessionController::new(
        Collaborators {
            engine: Box::new(engine),
            capture: Box::new(SimulatedCamera::new(32, 24)),
            roi: Box::new(CylinderRoi::new(100.0, 200.0)),
            sink: Box::new(sink),
            confirmation: Box::new(confirmation),
        },
        SessionSettings::default(),
    )
}

pub fn manual_simulation(steps: u64, points_per_step: usize) -> SimulationSettings {
    SimulationSettings {
        steps,
        points_per_step,
        step_interval_ms: 0,
        ..SimulationSettings::default()
    }
}

/// Wire `pause`, `resume` and `is_paused` to a shared flag
///
/// `pause` and `resume` may be called any number of times.
pub fn track_pause(engine: &mut MockEngine) -> Arc<std::sync::atomic::AtomicBool> {
    use std::sync::atomic::{AtomicBool, Ordering};

    let paused = Arc::new(AtomicBool::new(false));

    let flag = paused.clone();
    engine.expect_pause().returning(move || {
        flag.store(true, Ordering::SeqCst);
        Ok(())
    });
    let flag = paused.clone();
    engine.expect_resume().returning(move || {
        flag.store(false, Ordering::SeqCst);
        Ok(())
    });
    let flag = paused.clone();
    engine
        .expect_is_paused()
        .returning(move || flag.load(Ordering::SeqCst));

    paused
}
