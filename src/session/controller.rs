// Scan session controller
//
// Owns the session state machine and every collaborator a run needs. All
// mutation of the session goes through here; observers read the snapshot via
// the StateManager or subscribe to its change events.

use crate::metrics::Metrics;
use crate::models::{
    AcquisitionMode, Command, CommandOutcome, Frame, Progress, ScanOutcome, ScanVideoView,
    SessionSnapshot, SessionState, WorkbenchConfig,
};
use crate::services::{
    CaptureSource, Confirmation, EngineError, EngineNotice, PointCloudSink, RoiOverlay,
    ScanCallbacks, ScanEngine,
};
use crate::session::SessionError;
use crate::state::{SessionChange, StateManager};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::{broadcast, mpsc};

/// Everything outside the controller that a scan session talks to
pub struct Collaborators {
    pub engine: Box<dyn ScanEngine>,
    pub capture: Box<dyn CaptureSource>,
    pub roi: Box<dyn RoiOverlay>,
    pub sink: Box<dyn PointCloudSink>,
    pub confirmation: Box<dyn Confirmation>,
}

/// Timing and video settings for one session
#[derive(Clone, Debug, PartialEq)]
pub struct SessionSettings {
    pub poll_interval: Duration,
    pub preview_interval: Duration,
    pub scan_interval: Duration,
    pub show_roi_overlay: bool,
    pub scan_video_view: ScanVideoView,
}

impl From<&WorkbenchConfig> for SessionSettings {
    fn from(config: &WorkbenchConfig) -> Self {
        Self {
            poll_interval: config.scanning.poll_interval(),
            preview_interval: Duration::from_millis(config.video.preview_interval_ms),
            scan_interval: Duration::from_millis(config.video.scan_interval_ms),
            show_roi_overlay: config.video.show_roi_overlay,
            scan_video_view: config.video.scan_view,
        }
    }
}

impl Default for SessionSettings {
    fn default() -> Self {
        Self::from(&WorkbenchConfig::default())
    }
}

/// What a single poll tick did
#[derive(Clone, Debug, Default, PartialEq)]
pub struct PollReport {
    /// Progress read this tick, if the engine answered
    pub progress: Option<Progress>,

    /// Points appended to the sink after masking
    pub merged_points: usize,

    /// Failures that did not stop the tick
    pub errors: Vec<SessionError>,
}

/// Drives one scan session from `Idle` to `Finished`
///
/// The controller is single-threaded: it is either called directly (tests,
/// benchmarks) or owned by a [`SessionDriver`](crate::session::SessionDriver)
/// task that feeds it commands, poll ticks and engine notices in order.
///
/// Engine completion arrives as an [`EngineNotice`] on an internal queue. The
/// queue is drained before every command and poll tick, so a run that ended
/// on its own is never paused or polled afterwards.
pub struct ScanSessionController {
    engine: Box<dyn ScanEngine>,
    capture: Box<dyn CaptureSource>,
    roi: Box<dyn RoiOverlay>,
    sink: Box<dyn PointCloudSink>,
    confirmation: Box<dyn Confirmation>,

    state: StateManager,
    metrics: Arc<Metrics>,

    poll_interval: Duration,
    preview_interval: Duration,
    scan_interval: Duration,

    notice_tx: mpsc::UnboundedSender<EngineNotice>,
    notice_rx: mpsc::UnboundedReceiver<EngineNotice>,
}

impl ScanSessionController {
    pub fn new(collaborators: Collaborators, settings: SessionSettings) -> Self {
        let Collaborators {
            engine,
            capture,
            roi,
            sink,
            confirmation,
        } = collaborators;
        let (notice_tx, notice_rx) = mpsc::unbounded_channel();

        Self {
            engine,
            capture,
            roi,
            sink,
            confirmation,
            state: StateManager::with_snapshot(SessionSnapshot::with_video(
                settings.show_roi_overlay,
                settings.scan_video_view,
            )),
            metrics: Arc::new(Metrics::new()),
            poll_interval: settings.poll_interval,
            preview_interval: settings.preview_interval,
            scan_interval: settings.scan_interval,
            notice_tx,
            notice_rx,
        }
    }

    /// Share an existing metrics instance instead of the controller's own
    pub fn with_metrics(mut self, metrics: Arc<Metrics>) -> Self {
        self.metrics = metrics;
        self
    }

    // Accessors

    pub fn current_state(&self) -> SessionState {
        self.state.session_state()
    }

    pub fn current_mode(&self) -> AcquisitionMode {
        self.state.read(|s| s.mode)
    }

    /// Outcome of the run once the session has finished
    pub fn last_outcome(&self) -> Option<ScanOutcome> {
        self.state.read(|s| s.outcome.clone())
    }

    pub fn snapshot(&self) -> SessionSnapshot {
        self.state.snapshot()
    }

    pub fn subscribe(&self) -> broadcast::Receiver<SessionChange> {
        self.state.subscribe()
    }

    /// Read-only handle on the session state for observers
    pub fn state_manager(&self) -> StateManager {
        self.state.clone()
    }

    pub fn metrics(&self) -> &Arc<Metrics> {
        &self.metrics
    }

    pub fn sink(&self) -> &dyn PointCloudSink {
        self.sink.as_ref()
    }

    pub fn is_polling(&self) -> bool {
        self.current_state().is_polling()
    }

    pub fn poll_interval(&self) -> Duration {
        self.poll_interval
    }

    /// How often the video view should ask for a frame in the current mode
    pub fn video_refresh_interval(&self) -> Duration {
        self.video_refresh_interval_for(self.current_mode())
    }

    pub fn video_refresh_interval_for(&self, mode: AcquisitionMode) -> Duration {
        match mode {
            AcquisitionMode::Preview => self.preview_interval,
            AcquisitionMode::Scan => self.scan_interval,
        }
    }

    // Commands

    /// Apply a toolbar command
    ///
    /// Commands the current state has no edge for are rejected with
    /// [`SessionError::InvalidTransition`] and leave the session untouched.
    pub fn command(&mut self, command: Command) -> Result<CommandOutcome, SessionError> {
        self.drain_engine_notices();

        let state = self.current_state();
        tracing::debug!("Command {} received while {}", command, state);

        match (command, state) {
            (Command::Play, SessionState::Idle) => self.start(),
            (Command::Play, SessionState::Paused) => self.resume(),
            (Command::Pause, SessionState::Running) => self.pause(),
            (Command::Stop, SessionState::Running | SessionState::Paused) => {
                self.request_stop(state)
            }
            (Command::Stop, SessionState::Stopping | SessionState::Finished) => {
                Ok(CommandOutcome::Unchanged { state })
            }
            _ => {
                tracing::warn!("Ignoring {} while {}", command, state);
                self.metrics.record_command_rejected();
                Err(SessionError::InvalidTransition { command, state })
            }
        }
    }

    fn start(&mut self) -> Result<CommandOutcome, SessionError> {
        if self.sink.has_points() && !self.confirmation.confirm_discard_cloud() {
            tracing::info!("Start declined; keeping the current point cloud");
            return Ok(CommandOutcome::Declined {
                state: SessionState::Idle,
            });
        }

        let callbacks = ScanCallbacks::notifying(self.notice_tx.clone());
        if let Err(e) = self.engine.start(callbacks) {
            tracing::error!("Scan engine refused to start: {}", e);
            self.state.record_error(format!("start request failed: {e}"));
            return Err(e.into());
        }

        self.sink.reset();
        self.move_to(SessionState::Running);
        tracing::info!("Scan started");

        Ok(CommandOutcome::Applied {
            from: SessionState::Idle,
            to: SessionState::Running,
        })
    }

    fn pause(&mut self) -> Result<CommandOutcome, SessionError> {
        if !self.engine.is_paused() {
            if let Err(e) = self.engine.pause() {
                return Err(self.fail_run(format!("pause request failed: {e}"), e));
            }
        }

        self.move_to(SessionState::Paused);
        tracing::info!("Scan paused");

        Ok(CommandOutcome::Applied {
            from: SessionState::Running,
            to: SessionState::Paused,
        })
    }

    fn resume(&mut self) -> Result<CommandOutcome, SessionError> {
        if let Err(e) = self.engine.resume() {
            return Err(self.fail_run(format!("resume request failed: {e}"), e));
        }

        self.move_to(SessionState::Running);
        tracing::info!("Scan resumed");

        Ok(CommandOutcome::Applied {
            from: SessionState::Paused,
            to: SessionState::Running,
        })
    }

    /// Pause, ask, then either abort the run or put it back as it was
    fn request_stop(&mut self, state: SessionState) -> Result<CommandOutcome, SessionError> {
        let mut paused_here = false;
        if !self.engine.is_paused() {
            match self.engine.pause() {
                Ok(()) => paused_here = true,
                Err(e) => tracing::warn!("Could not pause before confirming stop: {}", e),
            }
        }

        if !self.confirmation.confirm_stop() {
            if paused_here {
                if let Err(e) = self.engine.resume() {
                    return Err(self.fail_run(format!("resume request failed: {e}"), e));
                }
            }
            tracing::info!("Stop declined; scan stays {}", state);
            return Ok(CommandOutcome::Declined { state });
        }

        self.move_to(SessionState::Stopping);
        tracing::info!("Stopping scan");

        match self.engine.stop() {
            Ok(()) => {
                self.finish(ScanOutcome::aborted());
                Ok(CommandOutcome::Applied {
                    from: state,
                    to: SessionState::Finished,
                })
            }
            Err(e) => {
                tracing::error!("Scan engine failed to stop: {}", e);
                self.finish(ScanOutcome::failure(format!("stop request failed: {e}")));
                Err(e.into())
            }
        }
    }

    /// End the run after the engine failed a request it had to honor
    fn fail_run(&mut self, detail: String, error: EngineError) -> SessionError {
        tracing::error!("{}; ending scan", detail);

        self.move_to(SessionState::Stopping);
        if let Err(e) = self.engine.stop() {
            tracing::warn!("Stop after engine failure also failed: {}", e);
        }
        self.finish(ScanOutcome::failure(detail));

        SessionError::EngineUnavailable(error)
    }

    fn finish(&mut self, outcome: ScanOutcome) {
        let succeeded = outcome.succeeded;
        if let Err(rejected) = self.state.finish(outcome) {
            tracing::error!(
                "Refusing transition {} -> {}",
                rejected.from,
                rejected.to
            );
            return;
        }
        tracing::info!(
            "Scan finished: succeeded={}, {}",
            succeeded,
            self.state.read(|s| s.progress_summary())
        );
    }

    fn move_to(&self, to: SessionState) {
        if let Err(rejected) = self.state.transition(to) {
            tracing::error!(
                "Refusing transition {} -> {}",
                rejected.from,
                rejected.to
            );
        }
    }

    // Engine notices

    /// Apply one notification delivered by the engine's callbacks
    pub fn apply_engine_notice(&mut self, notice: EngineNotice) {
        let state = self.current_state();

        match notice {
            EngineNotice::Began => {
                tracing::debug!("Scan engine began driving the hardware");
            }
            EngineNotice::Progress(progress) => {
                if state.is_active() {
                    self.state.record_progress(progress.clamped());
                }
            }
            EngineNotice::Completed(outcome) => {
                if !state.is_active() {
                    tracing::debug!("Ignoring completion while {}", state);
                    return;
                }

                // Points produced just before completion still belong to the run
                if let Err(e) = self.merge_next_fragment() {
                    tracing::warn!("Final merge failed: {}", e);
                }
                if let Ok(progress) = self.engine.get_progress() {
                    self.state.record_progress(progress.clamped());
                }

                self.finish(outcome);
            }
        }
    }

    /// Apply every queued engine notice; returns how many there were
    pub fn drain_engine_notices(&mut self) -> usize {
        let mut applied = 0;
        while let Ok(notice) = self.notice_rx.try_recv() {
            self.apply_engine_notice(notice);
            applied += 1;
        }
        applied
    }

    /// Wait for the next engine notice without applying it
    pub async fn next_engine_notice(&mut self) -> Option<EngineNotice> {
        self.notice_rx.recv().await
    }

    // Poll and merge

    /// One poll-and-merge tick
    ///
    /// Returns `None` unless the session is running. Progress and the
    /// fragment merge are independent: a failure in one is reported and the
    /// other still happens. Every engine failure is recorded as the
    /// session's last error. When both requests fail in the same tick the
    /// scanner is treated as gone and the run ends as failed.
    pub fn poll_once(&mut self) -> Option<PollReport> {
        self.drain_engine_notices();
        if !self.is_polling() {
            return None;
        }

        let started = Instant::now();
        let mut report = PollReport::default();

        let progress_failed = match self.engine.get_progress() {
            Ok(progress) => {
                let progress = progress.clamped();
                self.state.record_progress(progress);
                report.progress = Some(progress);
                false
            }
            Err(e) => {
                tracing::warn!("Progress query failed: {}", e);
                self.metrics.record_progress_failure();
                self.state.record_error(format!("progress query failed: {e}"));
                report.errors.push(e.into());
                true
            }
        };

        match self.merge_next_fragment() {
            Ok(points) => report.merged_points = points,
            Err(SessionError::EngineUnavailable(e)) if progress_failed => {
                let detail = format!("scan engine unreachable: {e}");
                report.errors.push(self.fail_run(detail, e));
            }
            Err(e) => report.errors.push(e),
        }

        self.metrics.record_poll_tick(started.elapsed());
        Some(report)
    }

    fn merge_next_fragment(&mut self) -> Result<usize, SessionError> {
        let fragment = match self.engine.drain_fragment() {
            Ok(Some(fragment)) => fragment,
            Ok(None) => return Ok(0),
            Err(e) => {
                tracing::warn!("Fragment drain failed: {}", e);
                self.metrics.record_drain_failure();
                self.state.record_error(format!("fragment drain failed: {e}"));
                return Err(e.into());
            }
        };

        if fragment.is_empty() {
            return Ok(0);
        }
        if !fragment.is_paired() {
            return Err(self.reject_fragment(fragment.points.len(), fragment.colors.len()));
        }

        let (points, colors) = self.roi.mask(fragment.points, fragment.colors);
        if points.len() != colors.len() {
            return Err(self.reject_fragment(points.len(), colors.len()));
        }

        if !points.is_empty() {
            self.sink.append(&points, &colors);
        }
        self.state.record_merge(points.len());
        self.metrics.record_merge(points.len());

        tracing::trace!(
            "Merged {} points ({} in cloud)",
            points.len(),
            self.sink.point_count()
        );
        Ok(points.len())
    }

    fn reject_fragment(&self, points: usize, colors: usize) -> SessionError {
        let error = SessionError::FragmentMismatch { points, colors };
        tracing::warn!("Discarding fragment: {}", error);
        self.metrics.record_rejected_fragment();
        self.state.record_rejected_fragment(error.to_string());
        error
    }

    // Video

    /// Frame for the video view in the current acquisition mode
    ///
    /// Scan frames are returned as the engine sees them; preview frames get
    /// the region of interest drawn on them when the overlay is enabled.
    pub fn next_video_frame(&mut self) -> Result<Frame, SessionError> {
        let (show_roi, view) = self
            .state
            .read(|s| (s.show_roi_overlay, s.scan_video_view));

        match self.current_mode() {
            AcquisitionMode::Scan => {
                let frame = self
                    .capture
                    .capture_scan(view)
                    .inspect_err(|e| tracing::warn!("Scan frame capture failed: {}", e))?;
                self.metrics.record_scan_frame();
                Ok(frame)
            }
            AcquisitionMode::Preview => {
                let frame = self
                    .capture
                    .capture_preview()
                    .inspect_err(|e| tracing::warn!("Preview frame capture failed: {}", e))?;
                self.metrics.record_preview_frame();
                Ok(if show_roi {
                    self.roi.annotate(frame)
                } else {
                    frame
                })
            }
        }
    }

    pub fn set_scan_video_view(&mut self, view: ScanVideoView) {
        tracing::debug!("Scan video view set to {:?}", view);
        self.state.update(|s| s.scan_video_view = view);
    }

    pub fn set_roi_overlay(&mut self, enabled: bool) {
        tracing::debug!("ROI overlay {}", if enabled { "enabled" } else { "disabled" });
        self.state.update(|s| s.show_roi_overlay = enabled);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Point3, PointCloud, PointCloudFragment, Rgb, enablement};
    use crate::services::{CylinderRoi, FixedConfirmation, SimulatedCamera};
    use std::collections::VecDeque;
    use std::sync::Mutex;

    #[derive(Default)]
    struct Script {
        progress: Progress,
        fragments: VecDeque<PointCloudFragment>,
        paused: bool,
        fail_start: bool,
        fail_pause: bool,
        fail_stop: bool,
        calls: Vec<&'static str>,
        callbacks: Option<ScanCallbacks>,
    }

    /// Engine whose behaviour is scripted from the test
    #[derive(Clone, Default)]
    struct ScriptedEngine(Arc<Mutex<Script>>);

    impl ScriptedEngine {
        fn script(&self) -> std::sync::MutexGuard<'_, Script> {
            self.0.lock().unwrap()
        }

        fn complete(&self, outcome: ScanOutcome) {
            let mut callbacks = self.script().callbacks.take().unwrap();
            callbacks.notify_complete(outcome);
        }

        fn calls(&self) -> Vec<&'static str> {
            self.script().calls.clone()
        }
    }

    impl ScanEngine for ScriptedEngine {
        fn start(&mut self, mut callbacks: ScanCallbacks) -> Result<(), EngineError> {
            let mut script = self.script();
            script.calls.push("start");
            if script.fail_start {
                return Err(EngineError::Disconnected);
            }
            callbacks.notify_before();
            script.callbacks = Some(callbacks);
            Ok(())
        }

        fn pause(&mut self) -> Result<(), EngineError> {
            let mut script = self.script();
            script.calls.push("pause");
            if script.fail_pause {
                return Err(EngineError::Hardware("motor stalled".to_string()));
            }
            script.paused = true;
            Ok(())
        }

        fn resume(&mut self) -> Result<(), EngineError> {
            let mut script = self.script();
            script.calls.push("resume");
            script.paused = false;
            Ok(())
        }

        fn stop(&mut self) -> Result<(), EngineError> {
            let mut script = self.script();
            script.calls.push("stop");
            if script.fail_stop {
                return Err(EngineError::Disconnected);
            }
            Ok(())
        }

        fn is_paused(&self) -> bool {
            self.0.lock().unwrap().paused
        }

        fn get_progress(&mut self) -> Result<Progress, EngineError> {
            Ok(self.script().progress)
        }

        fn drain_fragment(&mut self) -> Result<Option<PointCloudFragment>, EngineError> {
            Ok(self.script().fragments.pop_front())
        }
    }

    fn fragment(n: usize) -> PointCloudFragment {
        PointCloudFragment::new(
            (0..n).map(|i| Point3::new(i as f32, 0.0, 10.0)).collect(),
            (0..n).map(|i| Rgb::new(i as u8, 0, 0)).collect(),
        )
    }

    fn controller_with(
        engine: &ScriptedEngine,
        sink: PointCloud,
        confirmation: FixedConfirmation,
    ) -> ScanSessionController {
        ScanSessionController::new(
            Collaborators {
                engine: Box::new(engine.clone()),
                capture: Box::new(SimulatedCamera::new(16, 16)),
                roi: Box::new(CylinderRoi::new(100.0, 200.0)),
                sink: Box::new(sink),
                confirmation: Box::new(confirmation),
            },
            SessionSettings::default(),
        )
    }

    fn controller(engine: &ScriptedEngine) -> ScanSessionController {
        controller_with(engine, PointCloud::new(), FixedConfirmation::accept_all())
    }

    #[test]
    fn test_play_starts_run() {
        let engine = ScriptedEngine::default();
        let mut session = controller(&engine);

        let outcome = session.command(Command::Play).unwrap();

        assert_eq!(
            outcome,
            CommandOutcome::Applied {
                from: SessionState::Idle,
                to: SessionState::Running
            }
        );
        assert_eq!(session.current_mode(), AcquisitionMode::Scan);
        assert_eq!(session.snapshot().enablement, enablement(SessionState::Running));
        assert_eq!(engine.calls(), vec!["start"]);
    }

    #[test]
    fn test_start_failure_stays_idle() {
        let engine = ScriptedEngine::default();
        engine.script().fail_start = true;
        let mut session = controller(&engine);

        let result = session.command(Command::Play);

        assert_eq!(
            result,
            Err(SessionError::EngineUnavailable(EngineError::Disconnected))
        );
        assert_eq!(session.current_state(), SessionState::Idle);
        assert!(session.snapshot().last_error.is_some());
    }

    #[test]
    fn test_declined_discard_keeps_cloud() {
        let engine = ScriptedEngine::default();
        let mut cloud = PointCloud::new();
        cloud.extend(&[Point3::new(1.0, 1.0, 1.0)], &[Rgb::new(1, 1, 1)]);
        let mut session = controller_with(&engine, cloud, FixedConfirmation::decline_all());

        let outcome = session.command(Command::Play).unwrap();

        assert_eq!(
            outcome,
            CommandOutcome::Declined {
                state: SessionState::Idle
            }
        );
        assert_eq!(session.sink().point_count(), 1);
        assert!(engine.calls().is_empty());
    }

    #[test]
    fn test_accepted_discard_resets_cloud() {
        let engine = ScriptedEngine::default();
        let mut cloud = PointCloud::new();
        cloud.extend(&[Point3::new(1.0, 1.0, 1.0)], &[Rgb::new(1, 1, 1)]);
        let mut session = controller_with(&engine, cloud, FixedConfirmation::accept_all());

        session.command(Command::Play).unwrap();

        assert_eq!(session.sink().point_count(), 0);
    }

    #[test]
    fn test_poll_merges_and_reports_progress() {
        let engine = ScriptedEngine::default();
        let mut session = controller(&engine);
        session.command(Command::Play).unwrap();

        {
            let mut script = engine.script();
            script.progress = Progress::new(3, 10);
            script.fragments.push_back(fragment(2));
        }

        let report = session.poll_once().unwrap();

        assert_eq!(report.progress, Some(Progress::new(3, 10)));
        assert_eq!(report.merged_points, 2);
        assert!(report.errors.is_empty());
        assert_eq!(session.sink().point_count(), 2);
        assert_eq!(session.snapshot().progress, Progress::new(3, 10));
    }

    #[test]
    fn test_progress_is_clamped() {
        let engine = ScriptedEngine::default();
        let mut session = controller(&engine);
        session.command(Command::Play).unwrap();
        engine.script().progress = Progress::new(12, 10);

        let report = session.poll_once().unwrap();

        assert_eq!(report.progress, Some(Progress::new(10, 10)));
    }

    #[test]
    fn test_mismatched_fragment_discarded() {
        let engine = ScriptedEngine::default();
        let mut session = controller(&engine);
        session.command(Command::Play).unwrap();

        {
            let mut script = engine.script();
            let mut bad = fragment(2);
            bad.colors.pop();
            script.fragments.push_back(bad);
            script.fragments.push_back(fragment(3));
        }

        let report = session.poll_once().unwrap();
        assert_eq!(
            report.errors,
            vec![SessionError::FragmentMismatch {
                points: 2,
                colors: 1
            }]
        );
        assert_eq!(session.sink().point_count(), 0);

        // Polling carries on with the next fragment
        let report = session.poll_once().unwrap();
        assert_eq!(report.merged_points, 3);
        assert_eq!(session.snapshot().fragments_rejected, 1);
        assert_eq!(session.current_state(), SessionState::Running);
    }

    #[test]
    fn test_empty_fragment_skipped() {
        let engine = ScriptedEngine::default();
        let mut session = controller(&engine);
        session.command(Command::Play).unwrap();
        engine.script().fragments.push_back(PointCloudFragment::default());

        let report = session.poll_once().unwrap();

        assert_eq!(report.merged_points, 0);
        assert!(report.errors.is_empty());
        assert_eq!(session.snapshot().fragments_merged, 0);
    }

    #[test]
    fn test_poll_outside_running_is_noop() {
        let engine = ScriptedEngine::default();
        let mut session = controller(&engine);
        engine.script().fragments.push_back(fragment(2));

        assert!(session.poll_once().is_none());

        session.command(Command::Play).unwrap();
        session.command(Command::Pause).unwrap();
        assert!(session.poll_once().is_none());
        assert_eq!(session.sink().point_count(), 0);
    }

    #[test]
    fn test_pause_and_resume() {
        let engine = ScriptedEngine::default();
        let mut session = controller(&engine);
        session.command(Command::Play).unwrap();

        session.command(Command::Pause).unwrap();
        assert_eq!(session.current_state(), SessionState::Paused);
        assert_eq!(session.current_mode(), AcquisitionMode::Scan);

        session.command(Command::Play).unwrap();
        assert_eq!(session.current_state(), SessionState::Running);
        assert_eq!(engine.calls(), vec!["start", "pause", "resume"]);
    }

    #[test]
    fn test_pause_failure_ends_run() {
        let engine = ScriptedEngine::default();
        let mut session = controller(&engine);
        session.command(Command::Play).unwrap();
        engine.script().fail_pause = true;

        let result = session.command(Command::Pause);

        assert!(matches!(result, Err(SessionError::EngineUnavailable(_))));
        assert_eq!(session.current_state(), SessionState::Finished);
        let outcome = session.last_outcome().unwrap();
        assert!(!outcome.succeeded);
        assert!(outcome.detail.unwrap().contains("pause request failed"));
        assert_eq!(engine.calls(), vec!["start", "pause", "stop"]);
    }

    #[test]
    fn test_confirmed_stop_aborts() {
        let engine = ScriptedEngine::default();
        let mut session = controller(&engine);
        session.command(Command::Play).unwrap();

        let outcome = session.command(Command::Stop).unwrap();

        assert_eq!(
            outcome,
            CommandOutcome::Applied {
                from: SessionState::Running,
                to: SessionState::Finished
            }
        );
        assert_eq!(session.last_outcome(), Some(ScanOutcome::aborted()));
        assert_eq!(session.current_mode(), AcquisitionMode::Preview);
        assert_eq!(engine.calls(), vec!["start", "pause", "stop"]);

        // Idempotent once finished
        assert_eq!(
            session.command(Command::Stop).unwrap(),
            CommandOutcome::Unchanged {
                state: SessionState::Finished
            }
        );
    }

    #[test]
    fn test_declined_stop_resumes_running_scan() {
        let engine = ScriptedEngine::default();
        let mut session = controller_with(
            &engine,
            PointCloud::new(),
            FixedConfirmation {
                stop: false,
                discard: true,
            },
        );
        session.command(Command::Play).unwrap();

        let outcome = session.command(Command::Stop).unwrap();

        assert_eq!(
            outcome,
            CommandOutcome::Declined {
                state: SessionState::Running
            }
        );
        assert_eq!(session.current_state(), SessionState::Running);
        assert!(!engine.script().paused);
        assert_eq!(engine.calls(), vec!["start", "pause", "resume"]);
    }

    #[test]
    fn test_declined_stop_keeps_paused_scan_paused() {
        let engine = ScriptedEngine::default();
        let mut session = controller_with(
            &engine,
            PointCloud::new(),
            FixedConfirmation {
                stop: false,
                discard: true,
            },
        );
        session.command(Command::Play).unwrap();
        session.command(Command::Pause).unwrap();

        session.command(Command::Stop).unwrap();

        assert_eq!(session.current_state(), SessionState::Paused);
        assert!(engine.script().paused);
        assert_eq!(engine.calls(), vec!["start", "pause"]);
    }

    #[test]
    fn test_stop_failure_still_finishes() {
        let engine = ScriptedEngine::default();
        let mut session = controller(&engine);
        session.command(Command::Play).unwrap();
        engine.script().fail_stop = true;

        let result = session.command(Command::Stop);

        assert!(matches!(result, Err(SessionError::EngineUnavailable(_))));
        assert_eq!(session.current_state(), SessionState::Finished);
        assert!(!session.last_outcome().unwrap().succeeded);
    }

    #[test]
    fn test_completion_finishes_and_flushes() {
        let engine = ScriptedEngine::default();
        let mut session = controller(&engine);
        session.command(Command::Play).unwrap();
        {
            let mut script = engine.script();
            script.progress = Progress::new(10, 10);
            script.fragments.push_back(fragment(4));
        }

        engine.complete(ScanOutcome::success());
        assert_eq!(session.drain_engine_notices(), 2);

        assert_eq!(session.current_state(), SessionState::Finished);
        assert_eq!(session.last_outcome(), Some(ScanOutcome::success()));
        assert_eq!(session.sink().point_count(), 4);
        assert_eq!(session.snapshot().progress, Progress::new(10, 10));

        engine.script().fragments.push_back(fragment(2));
        assert!(session.poll_once().is_none());
        assert_eq!(session.sink().point_count(), 4);
    }

    #[test]
    fn test_completion_after_stop_ignored() {
        let engine = ScriptedEngine::default();
        let mut session = controller(&engine);
        session.command(Command::Play).unwrap();
        session.command(Command::Stop).unwrap();

        engine.complete(ScanOutcome::success());
        session.drain_engine_notices();

        assert_eq!(session.last_outcome(), Some(ScanOutcome::aborted()));
    }

    #[test]
    fn test_invalid_commands_rejected() {
        let engine = ScriptedEngine::default();
        let mut session = controller(&engine);

        assert_eq!(
            session.command(Command::Pause),
            Err(SessionError::InvalidTransition {
                command: Command::Pause,
                state: SessionState::Idle
            })
        );
        assert_eq!(session.current_state(), SessionState::Idle);

        session.command(Command::Play).unwrap();
        assert!(matches!(
            session.command(Command::Play),
            Err(SessionError::InvalidTransition { .. })
        ));
        assert_eq!(
            session
                .metrics()
                .commands_rejected
                .load(std::sync::atomic::Ordering::Relaxed),
            2
        );
    }

    #[test]
    fn test_video_frames_follow_mode() {
        let engine = ScriptedEngine::default();
        let mut session = controller(&engine);

        let preview = session.next_video_frame().unwrap();
        assert_eq!(preview.pixel(0, 0), Some(SimulatedCamera::PREVIEW_COLOR));
        assert_eq!(
            session.video_refresh_interval(),
            Duration::from_millis(10)
        );

        session.set_roi_overlay(true);
        let annotated = session.next_video_frame().unwrap();
        let (left, top, _, _) = CylinderRoi::overlay_box(16, 16);
        assert_eq!(annotated.pixel(left, top), Some(CylinderRoi::OVERLAY_COLOR));

        session.command(Command::Play).unwrap();
        session.set_scan_video_view(ScanVideoView::Laser);
        let scan = session.next_video_frame().unwrap();
        assert_eq!(
            scan.pixel(left, top),
            Some(SimulatedCamera::scan_color(ScanVideoView::Laser))
        );
        assert_eq!(
            session.video_refresh_interval(),
            Duration::from_millis(200)
        );
    }
}
