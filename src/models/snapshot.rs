use super::session::{
    AcquisitionMode, Enablement, Progress, ScanOutcome, ScanVideoView, SessionState, enablement,
};

/// Single source of truth for the observable state of a scan session.
///
/// `SessionSnapshot` is held by [`crate::state::StateManager`] and only mutated
/// by the session controller. Readers get clones through
/// [`snapshot()`](crate::state::StateManager::snapshot) or closures through
/// [`read()`](crate::state::StateManager::read).
///
/// `mode` and `enablement` are projections of `state`; they are recomputed by
/// [`set_state`](Self::set_state) and never assigned on their own.
#[derive(Clone, Debug, PartialEq)]
pub struct SessionSnapshot {
    // Lifecycle
    pub state: SessionState,
    pub mode: AcquisitionMode,
    pub enablement: Enablement,

    // Progress of the current run
    pub progress: Progress,
    pub outcome: Option<ScanOutcome>,

    // Merge bookkeeping
    pub fragments_merged: usize,
    pub points_merged: usize,
    pub fragments_rejected: usize,

    /// Most recent recoverable error, rendered for display.
    pub last_error: Option<String>,

    // Video settings that can change during a session
    pub show_roi_overlay: bool,
    pub scan_video_view: ScanVideoView,
}

impl Default for SessionSnapshot {
    fn default() -> Self {
        let state = SessionState::Idle;
        Self {
            state,
            mode: state.acquisition_mode(),
            enablement: enablement(state),
            progress: Progress::default(),
            outcome: None,
            fragments_merged: 0,
            points_merged: 0,
            fragments_rejected: 0,
            last_error: None,
            show_roi_overlay: false,
            scan_video_view: ScanVideoView::default(),
        }
    }
}

impl SessionSnapshot {
    /// Snapshot of a fresh session with the given video settings.
    pub fn with_video(show_roi_overlay: bool, scan_video_view: ScanVideoView) -> Self {
        Self {
            show_roi_overlay,
            scan_video_view,
            ..Self::default()
        }
    }

    /// Move to `state` and recompute everything derived from it.
    pub fn set_state(&mut self, state: SessionState) {
        self.state = state;
        self.mode = state.acquisition_mode();
        self.enablement = enablement(state);
    }

    /// Clear per-run counters before a new run starts.
    pub fn reset_run(&mut self) {
        self.progress = Progress::default();
        self.outcome = None;
        self.fragments_merged = 0;
        self.points_merged = 0;
        self.fragments_rejected = 0;
        self.last_error = None;
    }

    /// Account for a merged fragment of `points` points.
    pub fn record_merge(&mut self, points: usize) {
        self.fragments_merged += 1;
        self.points_merged += points;
    }

    /// Human readable progress line, empty until the engine reports a total.
    pub fn progress_summary(&self) -> String {
        if self.progress.total == 0 {
            return String::new();
        }

        format!(
            "{}/{} steps ({:.0}%), {} points",
            self.progress.completed,
            self.progress.total,
            self.progress.fraction() * 100.0,
            self.points_merged
        )
    }
}
