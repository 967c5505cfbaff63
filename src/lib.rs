// Scanbench - Scan-session controller for turntable laser scanners
//
// This is the library crate containing the session state machine, the
// collaborator traits and the simulated hardware. The binary crate (main.rs)
// runs a headless session against the simulation.

pub mod config;
pub mod logging;
pub mod metrics;
pub mod models;
pub mod services;
pub mod session;
pub mod state;

// Re-export commonly used types for convenience
pub use config::ConfigManager;
pub use metrics::Metrics;
pub use models::{
    AcquisitionMode, Command, CommandOutcome, Enablement, SessionSnapshot, SessionState,
    WorkbenchConfig, enablement,
};
pub use session::{
    Collaborators, ScanSessionController, SessionDriver, SessionError, SessionHandle,
    SessionSettings,
};
pub use state::{SessionChange, StateManager};

/// Application version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Application name
pub const APP_NAME: &str = env!("CARGO_PKG_NAME");
