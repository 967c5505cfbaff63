// State management module
//
// This module provides the StateManager which wraps SessionSnapshot with thread-safe
// access using Arc<RwLock<T>> and emits change events for observers.

use crate::models::{
    AcquisitionMode, Enablement, Progress, ScanOutcome, SessionSnapshot, SessionState,
};
use std::sync::{Arc, PoisonError, RwLock};
use tokio::sync::broadcast;

/// Change events emitted when the session snapshot is modified
///
/// Observers (a UI, the headless driver, tests) subscribe to these instead of
/// polling the snapshot.
#[derive(Clone, Debug, PartialEq)]
pub enum SessionChange {
    /// The session moved along an edge of the state graph
    StateChanged {
        from: SessionState,
        to: SessionState,
    },

    /// The video feed switched between preview and scan frames
    ModeChanged {
        mode: AcquisitionMode,
    },

    /// The set of available workbench actions changed
    EnablementChanged(Enablement),

    /// The engine reported new progress
    ProgressUpdated {
        completed: u64,
        total: u64,
    },

    /// A fragment was merged into the point cloud
    FragmentMerged {
        points: usize,
        total_points: usize,
    },

    /// A fragment was discarded because its points and colors did not pair up
    FragmentRejected {
        rejected: usize,
    },

    /// The run ended; emitted once per session
    SessionFinished {
        outcome: ScanOutcome,
    },

    /// A recoverable error was recorded
    ErrorRecorded {
        message: String,
    },

    /// ROI overlay or scan video view changed
    SettingsChanged,
}

/// A transition that is not an edge of the session graph
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct RejectedTransition {
    pub from: SessionState,
    pub to: SessionState,
}

/// Thread-safe session state with event emission
///
/// - Provides shared access to [`SessionSnapshot`] via `Arc<RwLock<T>>`
/// - Detects snapshot changes and emits [`SessionChange`] events
/// - Validates state transitions against the session graph
/// - Supports subscribing to changes via tokio broadcast channels
///
/// Reading is public; mutation is reserved to the crate so that only the
/// [`ScanSessionController`](crate::session::ScanSessionController) ever
/// changes the session state.
pub struct StateManager {
    /// The session snapshot protected by RwLock for thread-safe access
    state: Arc<RwLock<SessionSnapshot>>,

    /// Broadcast channel for emitting change events
    state_tx: broadcast::Sender<SessionChange>,
}

impl StateManager {
    /// Create a new StateManager holding a fresh `Idle` snapshot
    pub fn new() -> Self {
        Self::with_snapshot(SessionSnapshot::default())
    }

    /// Create a StateManager starting from `initial`
    ///
    /// The broadcast channel buffers 256 events.
    pub fn with_snapshot(initial: SessionSnapshot) -> Self {
        let (state_tx, _) = broadcast::channel(256);
        Self {
            state: Arc::new(RwLock::new(initial)),
            state_tx,
        }
    }

    /// Get a clone of the current snapshot
    pub fn snapshot(&self) -> SessionSnapshot {
        self.state
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Execute a function with read access to the snapshot
    ///
    /// # Example
    /// ```ignore
    /// let running = state_manager.read(|s| s.state == SessionState::Running);
    /// ```
    pub fn read<F, R>(&self, f: F) -> R
    where
        F: FnOnce(&SessionSnapshot) -> R,
    {
        let state = self.state.read().unwrap_or_else(PoisonError::into_inner);
        f(&state)
    }

    /// Current session state
    pub fn session_state(&self) -> SessionState {
        self.read(|s| s.state)
    }

    /// Subscribe to change events
    ///
    /// Returns a receiver for all future changes. Multiple subscribers can listen
    /// simultaneously.
    pub fn subscribe(&self) -> broadcast::Receiver<SessionChange> {
        self.state_tx.subscribe()
    }

    /// Update the snapshot and emit change events
    ///
    /// 1. Captures the old snapshot
    /// 2. Applies the update function
    /// 3. Detects what changed
    /// 4. Emits the matching events
    ///
    /// Returns the events that were emitted.
    pub(crate) fn update<F>(&self, update_fn: F) -> Vec<SessionChange>
    where
        F: FnOnce(&mut SessionSnapshot),
    {
        let mut state = self.state.write().unwrap_or_else(PoisonError::into_inner);
        let old_state = state.clone();

        update_fn(&mut state);

        let changes = Self::detect_changes(&old_state, &state);

        for change in &changes {
            // Ignore send errors - it's OK if no one is listening
            let _ = self.state_tx.send(change.clone());
        }

        changes
    }

    /// Detect what changed between two snapshots and generate events
    fn detect_changes(old: &SessionSnapshot, new: &SessionSnapshot) -> Vec<SessionChange> {
        let mut changes = Vec::new();

        if old.state != new.state {
            changes.push(SessionChange::StateChanged {
                from: old.state,
                to: new.state,
            });
        }

        if old.mode != new.mode {
            changes.push(SessionChange::ModeChanged { mode: new.mode });
        }

        if old.enablement != new.enablement {
            changes.push(SessionChange::EnablementChanged(new.enablement));
        }

        if old.progress != new.progress {
            changes.push(SessionChange::ProgressUpdated {
                completed: new.progress.completed,
                total: new.progress.total,
            });
        }

        if new.fragments_merged > old.fragments_merged {
            changes.push(SessionChange::FragmentMerged {
                points: new.points_merged.saturating_sub(old.points_merged),
                total_points: new.points_merged,
            });
        }

        if new.fragments_rejected > old.fragments_rejected {
            changes.push(SessionChange::FragmentRejected {
                rejected: new.fragments_rejected,
            });
        }

        if old.outcome.is_none() {
            if let Some(outcome) = &new.outcome {
                changes.push(SessionChange::SessionFinished {
                    outcome: outcome.clone(),
                });
            }
        }

        if old.last_error != new.last_error {
            if let Some(message) = &new.last_error {
                changes.push(SessionChange::ErrorRecorded {
                    message: message.clone(),
                });
            }
        }

        if old.show_roi_overlay != new.show_roi_overlay
            || old.scan_video_view != new.scan_video_view
        {
            changes.push(SessionChange::SettingsChanged);
        }

        changes
    }

    // Convenience methods for the controller

    /// Move the session to `to` if that is an edge of the state graph
    pub(crate) fn transition(
        &self,
        to: SessionState,
    ) -> Result<Vec<SessionChange>, RejectedTransition> {
        let from = self.session_state();
        if !from.can_transition_to(to) {
            return Err(RejectedTransition { from, to });
        }

        Ok(self.update(|s| {
            if from == SessionState::Idle {
                s.reset_run();
            }
            s.set_state(to);
        }))
    }

    /// Move to `Finished` and record the outcome in one update
    ///
    /// Readers never see a finished session without its outcome.
    pub(crate) fn finish(
        &self,
        outcome: ScanOutcome,
    ) -> Result<Vec<SessionChange>, RejectedTransition> {
        let from = self.session_state();
        if !from.can_transition_to(SessionState::Finished) {
            return Err(RejectedTransition {
                from,
                to: SessionState::Finished,
            });
        }

        Ok(self.update(|s| {
            s.set_state(SessionState::Finished);
            if s.outcome.is_none() {
                s.outcome = Some(outcome);
            }
        }))
    }

    pub(crate) fn record_progress(&self, progress: Progress) -> Vec<SessionChange> {
        self.update(|s| s.progress = progress)
    }

    pub(crate) fn record_merge(&self, points: usize) -> Vec<SessionChange> {
        self.update(|s| s.record_merge(points))
    }

    pub(crate) fn record_rejected_fragment(&self, message: String) -> Vec<SessionChange> {
        self.update(|s| {
            s.fragments_rejected += 1;
            s.last_error = Some(message);
        })
    }

    pub(crate) fn record_error(&self, message: String) -> Vec<SessionChange> {
        self.update(|s| s.last_error = Some(message))
    }
}

impl Default for StateManager {
    fn default() -> Self {
        Self::new()
    }
}

// Clones share the same snapshot and channel
impl Clone for StateManager {
    fn clone(&self) -> Self {
        Self {
            state: Arc::clone(&self.state),
            state_tx: self.state_tx.clone(),
        }
    }
}
