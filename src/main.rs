//! Scanbench - headless scan session runner
//!
//! Runs one scan session end to end against the simulated turntable.
//!
//! # Execution Flow
//!
//! 1. Load `Scanbench Data/Scanbench Settings.yaml` (defaults if absent,
//!    `SCANBENCH_*` environment overrides on top)
//! 2. Initialize logging → logs/scanbench.<date>
//! 3. Create a tokio runtime with 2 worker threads
//! 4. Build the simulated collaborators and a [`ScanSessionController`]
//! 5. Spawn the [`SessionDriver`], start the scan and stream video frames
//! 6. Wait for the session to finish (Ctrl-C stops the scan)
//! 7. Log the metrics summary and shut the runtime down with a 5s timeout

use anyhow::{Context, Result};
use scanbench::models::{PointCloud, ScanOutcome};
use scanbench::services::{CylinderRoi, FixedConfirmation, SimulatedCamera, SimulatedScanEngine};
use scanbench::{
    APP_NAME, Collaborators, Command, ConfigManager, Metrics, ScanSessionController,
    SessionChange, SessionDriver, SessionError, SessionHandle, SessionSettings, VERSION,
    WorkbenchConfig,
};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::broadcast::error::RecvError;

/// Progress is logged every this many turntable steps
const PROGRESS_LOG_EVERY: u64 = 50;

fn main() -> Result<()> {
    let config_manager = ConfigManager::new("Scanbench Data")?;
    let config = config_manager.load_config()?;

    // Must be held until exit so buffered log lines are flushed
    let _guard = scanbench::logging::setup_logging_with_console(
        &config.logging.dir,
        "scanbench",
        config.logging.debug,
        config.logging.console,
    )?;

    tracing::info!("Starting {} v{}", APP_NAME, VERSION);
    tracing::info!("Settings loaded from {}", config_manager.settings_path());

    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .worker_threads(2)
        .thread_name("scanbench-worker")
        .build()?;

    let metrics = Arc::new(Metrics::new());
    let result = runtime.block_on(run_session(&config, Arc::clone(&metrics)));

    metrics.log_summary();
    runtime.shutdown_timeout(Duration::from_secs(5));

    match &result {
        Ok(outcome) if outcome.succeeded => tracing::info!("Scan completed"),
        Ok(outcome) => tracing::warn!(
            "Scan did not complete: {}",
            outcome.detail.as_deref().unwrap_or("stopped by user")
        ),
        Err(e) => tracing::error!("Session failed: {:#}", e),
    }
    tracing::info!("Shutdown complete");

    result.map(|_| ())
}

async fn run_session(config: &WorkbenchConfig, metrics: Arc<Metrics>) -> Result<ScanOutcome> {
    let simulation = &config.simulation;
    let collaborators = Collaborators {
        engine: Box::new(SimulatedScanEngine::new(simulation.clone())),
        capture: Box::new(SimulatedCamera::new(
            simulation.frame_width,
            simulation.frame_height,
        )),
        roi: Box::new(CylinderRoi::from(&config.roi)),
        sink: Box::new(PointCloud::new()),
        confirmation: Box::new(FixedConfirmation::accept_all()),
    };

    let controller = ScanSessionController::new(collaborators, SessionSettings::from(config))
        .with_metrics(Arc::clone(&metrics));
    let (handle, task) = SessionDriver::spawn(controller);
    let mut changes = handle.subscribe();

    let video = tokio::spawn(stream_video(handle.clone()));

    handle
        .command(Command::Play)
        .await
        .context("Failed to start scan")?;

    let outcome = loop {
        tokio::select! {
            change = changes.recv() => match change {
                Ok(SessionChange::SessionFinished { outcome }) => break outcome,
                Ok(SessionChange::ProgressUpdated { completed, total })
                    if completed % PROGRESS_LOG_EVERY == 0 =>
                {
                    tracing::info!("{}", handle.snapshot().progress_summary());
                    tracing::debug!("Progress {}/{}", completed, total);
                    metrics.log_periodic();
                }
                Ok(SessionChange::ErrorRecorded { message }) => {
                    tracing::warn!("Session error: {}", message);
                }
                Ok(_) => {}
                Err(RecvError::Lagged(skipped)) => {
                    tracing::debug!("Skipped {} session changes", skipped);
                }
                Err(RecvError::Closed) => anyhow::bail!("Session closed before finishing"),
            },
            _ = tokio::signal::ctrl_c() => {
                tracing::warn!("Interrupted - stopping scan");
                handle
                    .command(Command::Stop)
                    .await
                    .context("Failed to stop scan")?;
            }
        }
    };

    handle.shutdown().await?;
    let controller = task.await.context("Session driver panicked")?;
    video.await.context("Video task panicked")?;

    tracing::info!(
        "Session {}: {} points in cloud, {}",
        controller.current_state(),
        controller.sink().point_count(),
        controller.snapshot().progress_summary()
    );

    Ok(outcome)
}

/// Request frames at the mode's refresh interval until the driver stops
async fn stream_video(handle: SessionHandle) {
    loop {
        match handle.next_video_frame().await {
            Ok(frame) => tracing::trace!("Frame {}x{}", frame.width, frame.height),
            Err(SessionError::SessionClosed) => break,
            Err(e) => tracing::debug!("No video frame: {}", e),
        }
        tokio::time::sleep(handle.video_refresh_interval()).await;
    }
    tracing::debug!("Video stream ended");
}
