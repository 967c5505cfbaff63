use serde::{Deserialize, Serialize};
use std::fmt;

/// Lifecycle of a single scan session.
///
/// A session starts in [`SessionState::Idle`] and ends in
/// [`SessionState::Finished`]. Finished is terminal: restarting requires a new
/// [`ScanSessionController`](crate::session::ScanSessionController).
///
/// Valid edges:
///
/// ```text
/// Idle ──start──► Running ◄──resume── Paused
///                    │ └────pause────────►│
///                    ├──stop──► Stopping ◄┤
///                    │            │       │
///                    └─complete─► Finished ◄─complete─┘
/// ```
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum SessionState {
    #[default]
    Idle,
    Running,
    Paused,
    Stopping,
    Finished,
}

impl SessionState {
    /// Every state, in lifecycle order.
    pub const ALL: [SessionState; 5] = [
        SessionState::Idle,
        SessionState::Running,
        SessionState::Paused,
        SessionState::Stopping,
        SessionState::Finished,
    ];

    /// Whether `self -> next` is an edge of the session graph.
    pub fn can_transition_to(self, next: SessionState) -> bool {
        use SessionState::*;
        matches!(
            (self, next),
            (Idle, Running)
                | (Running, Paused)
                | (Paused, Running)
                | (Running, Stopping)
                | (Paused, Stopping)
                | (Stopping, Finished)
                | (Running, Finished)
                | (Paused, Finished)
        )
    }

    /// Video acquisition mode implied by this state.
    pub fn acquisition_mode(self) -> AcquisitionMode {
        match self {
            SessionState::Running | SessionState::Paused => AcquisitionMode::Scan,
            _ => AcquisitionMode::Preview,
        }
    }

    /// The poll loop runs in this state and no other.
    pub fn is_polling(self) -> bool {
        self == SessionState::Running
    }

    /// A run is in progress (started and not yet stopping or finished).
    pub fn is_active(self) -> bool {
        matches!(self, SessionState::Running | SessionState::Paused)
    }

    pub fn is_terminal(self) -> bool {
        self == SessionState::Finished
    }

    pub fn label(self) -> &'static str {
        match self {
            SessionState::Idle => "idle",
            SessionState::Running => "running",
            SessionState::Paused => "paused",
            SessionState::Stopping => "stopping",
            SessionState::Finished => "finished",
        }
    }
}

impl fmt::Display for SessionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// User-level command issued to a session (toolbar play/pause/stop).
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Command {
    /// Start a new run from `Idle`, or resume a paused one.
    Play,
    Pause,
    /// Confirmed abort of the current run.
    Stop,
}

impl Command {
    pub const ALL: [Command; 3] = [Command::Play, Command::Pause, Command::Stop];

    /// State the command leads to when issued from `state`, if it is accepted.
    ///
    /// `Stop` targets `Stopping`; the confirmation prompt may still decline it.
    pub fn target(self, state: SessionState) -> Option<SessionState> {
        use SessionState::*;
        match (self, state) {
            (Command::Play, Idle) | (Command::Play, Paused) => Some(Running),
            (Command::Pause, Running) => Some(Paused),
            (Command::Stop, Running) | (Command::Stop, Paused) => Some(Stopping),
            _ => None,
        }
    }
}

impl fmt::Display for Command {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Command::Play => "play",
            Command::Pause => "pause",
            Command::Stop => "stop",
        })
    }
}

/// What happened to a command that passed validation.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum CommandOutcome {
    /// The session moved from `from` to `to` (possibly through intermediate states).
    Applied { from: SessionState, to: SessionState },
    /// A confirmation prompt said no; the session is back in `state`.
    Declined { state: SessionState },
    /// Nothing to do (e.g. `Stop` on a session that is already stopping or finished).
    Unchanged { state: SessionState },
}

impl CommandOutcome {
    /// State of the session after the command.
    pub fn state(&self) -> SessionState {
        match *self {
            CommandOutcome::Applied { to, .. } => to,
            CommandOutcome::Declined { state } | CommandOutcome::Unchanged { state } => state,
        }
    }
}

/// Which kind of frame the video view asks the capture source for.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum AcquisitionMode {
    #[default]
    Preview,
    Scan,
}

/// Engine image shown in the video view while a run is active.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ScanVideoView {
    #[default]
    Texture,
    Laser,
    Gray,
    Line,
}

impl ScanVideoView {
    pub const ALL: [ScanVideoView; 4] = [
        ScanVideoView::Texture,
        ScanVideoView::Laser,
        ScanVideoView::Gray,
        ScanVideoView::Line,
    ];
}

/// Scan progress as reported by the engine.
///
/// `total` stays 0 until the engine knows how many steps the run has.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct Progress {
    pub completed: u64,
    pub total: u64,
}

impl Progress {
    pub fn new(completed: u64, total: u64) -> Self {
        Self { completed, total }
    }

    /// Clamp `completed` into `[0, total]` once a bound is known.
    pub fn clamped(self) -> Self {
        if self.total > 0 && self.completed > self.total {
            Self {
                completed: self.total,
                total: self.total,
            }
        } else {
            self
        }
    }

    /// Completion ratio in `[0, 1]`, 0 while the total is unknown.
    pub fn fraction(&self) -> f64 {
        if self.total == 0 {
            0.0
        } else {
            self.clamped().completed as f64 / self.total as f64
        }
    }
}

/// Result of a run, delivered once when the session reaches `Finished`.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ScanOutcome {
    pub succeeded: bool,
    pub detail: Option<String>,
}

impl ScanOutcome {
    pub fn success() -> Self {
        Self {
            succeeded: true,
            detail: None,
        }
    }

    pub fn failure(detail: impl Into<String>) -> Self {
        Self {
            succeeded: false,
            detail: Some(detail.into()),
        }
    }

    /// Outcome synthesized when the user stops a run.
    pub fn aborted() -> Self {
        Self {
            succeeded: false,
            detail: None,
        }
    }
}

/// Which workbench actions are available.
///
/// Always derived from [`SessionState`] via [`enablement`]; never toggled
/// field by field.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct Enablement {
    pub play: bool,
    pub pause: bool,
    pub stop: bool,
    /// Disconnecting the scanner hardware.
    pub disconnect: bool,
    /// Selector for the [`ScanVideoView`] shown during a run.
    pub video_view_selector: bool,
    /// Load / save / clear model.
    pub model_menu: bool,
    /// Open / save / reset calibration and scan profiles.
    pub profile_menu: bool,
    pub preferences: bool,
    pub exit: bool,
    /// Motor speed and acceleration used while scanning.
    pub motor_settings: bool,
    /// Restoring default panel values.
    pub restore: bool,
}

impl Enablement {
    /// Whether the workbench offers `command` right now.
    pub fn allows(&self, command: Command) -> bool {
        match command {
            Command::Play => self.play,
            Command::Pause => self.pause,
            Command::Stop => self.stop,
        }
    }
}

/// Project a session state onto the set of enabled workbench actions.
pub fn enablement(state: SessionState) -> Enablement {
    // Everything outside the toolbar is locked while a run owns the hardware.
    let settled = matches!(state, SessionState::Idle | SessionState::Finished);

    Enablement {
        play: matches!(state, SessionState::Idle | SessionState::Paused),
        pause: state == SessionState::Running,
        stop: state.is_active(),
        disconnect: settled,
        video_view_selector: state.is_active(),
        model_menu: settled,
        profile_menu: settled,
        preferences: settled,
        exit: settled,
        motor_settings: settled,
        restore: settled,
    }
}
