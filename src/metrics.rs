// Session metrics module
//
// Provides lightweight counters for monitoring the poll loop and video feed

use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::time::{Duration, Instant};

/// Counters collected over the lifetime of a session
///
/// Uses atomic operations for thread-safe tracking without locks. The
/// controller updates them; the binary logs them on shutdown.
#[derive(Debug)]
pub struct Metrics {
    /// Poll-and-merge ticks executed while running
    pub poll_ticks: AtomicU64,

    /// Fragments appended to the point cloud
    pub fragments_merged: AtomicUsize,

    /// Points appended after ROI masking
    pub points_merged: AtomicUsize,

    /// Fragments discarded because points and colors did not pair up
    pub fragments_rejected: AtomicUsize,

    /// Failed progress queries
    pub progress_failures: AtomicU64,

    /// Failed fragment drains
    pub drain_failures: AtomicU64,

    /// Preview frames served
    pub preview_frames: AtomicU64,

    /// Scan frames served
    pub scan_frames: AtomicU64,

    /// Commands refused because the current state does not accept them
    pub commands_rejected: AtomicU64,

    /// Total time spent inside poll ticks in microseconds
    pub total_poll_time_us: AtomicU64,

    /// Session start time
    start_time: Instant,
}

impl Metrics {
    /// Create a new Metrics instance
    pub fn new() -> Self {
        Self {
            poll_ticks: AtomicU64::new(0),
            fragments_merged: AtomicUsize::new(0),
            points_merged: AtomicUsize::new(0),
            fragments_rejected: AtomicUsize::new(0),
            progress_failures: AtomicU64::new(0),
            drain_failures: AtomicU64::new(0),
            preview_frames: AtomicU64::new(0),
            scan_frames: AtomicU64::new(0),
            commands_rejected: AtomicU64::new(0),
            total_poll_time_us: AtomicU64::new(0),
            start_time: Instant::now(),
        }
    }

    /// Record one poll tick and how long it took
    pub fn record_poll_tick(&self, duration: Duration) {
        self.poll_ticks.fetch_add(1, Ordering::Relaxed);
        self.total_poll_time_us
            .fetch_add(duration.as_micros() as u64, Ordering::Relaxed);
    }

    /// Record a merged fragment of `points` points
    pub fn record_merge(&self, points: usize) {
        self.fragments_merged.fetch_add(1, Ordering::Relaxed);
        self.points_merged.fetch_add(points, Ordering::Relaxed);
    }

    pub fn record_rejected_fragment(&self) {
        self.fragments_rejected.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_progress_failure(&self) {
        self.progress_failures.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_drain_failure(&self) {
        self.drain_failures.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_preview_frame(&self) {
        self.preview_frames.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_scan_frame(&self) {
        self.scan_frames.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_command_rejected(&self) {
        self.commands_rejected.fetch_add(1, Ordering::Relaxed);
    }

    /// Get total uptime
    pub fn uptime(&self) -> Duration {
        self.start_time.elapsed()
    }

    /// Average time per poll tick in milliseconds
    pub fn avg_poll_time_ms(&self) -> f64 {
        let total = self.total_poll_time_us.load(Ordering::Relaxed);
        let count = self.poll_ticks.load(Ordering::Relaxed);
        if count > 0 {
            total as f64 / count as f64 / 1000.0
        } else {
            0.0
        }
    }

    /// Log metrics summary
    pub fn log_summary(&self) {
        let uptime = self.uptime();
        tracing::info!("=== Session Metrics Summary ===");
        tracing::info!("Uptime: {:.2}s", uptime.as_secs_f64());
        tracing::info!(
            "Poll ticks: {} (avg: {:.3}ms per tick)",
            self.poll_ticks.load(Ordering::Relaxed),
            self.avg_poll_time_ms()
        );
        tracing::info!(
            "Fragments: {} merged ({} points), {} rejected",
            self.fragments_merged.load(Ordering::Relaxed),
            self.points_merged.load(Ordering::Relaxed),
            self.fragments_rejected.load(Ordering::Relaxed)
        );
        tracing::info!(
            "Engine errors: {} progress, {} drain",
            self.progress_failures.load(Ordering::Relaxed),
            self.drain_failures.load(Ordering::Relaxed)
        );
        tracing::info!(
            "Video frames: {} preview, {} scan",
            self.preview_frames.load(Ordering::Relaxed),
            self.scan_frames.load(Ordering::Relaxed)
        );
        tracing::info!(
            "Rejected commands: {}",
            self.commands_rejected.load(Ordering::Relaxed)
        );
    }

    /// Log periodic metrics (for long runs)
    pub fn log_periodic(&self) {
        tracing::info!(
            "Metrics: {} ticks, {} points merged, {} fragments rejected, uptime {:.0}s",
            self.poll_ticks.load(Ordering::Relaxed),
            self.points_merged.load(Ordering::Relaxed),
            self.fragments_rejected.load(Ordering::Relaxed),
            self.uptime().as_secs_f64()
        );
    }
}

impl Default for Metrics {
    fn default() -> Self {
        Self::new()
    }
}
