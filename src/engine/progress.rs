//! Progress observation for extraction and conversion runs

use std::path::Path;
use std::sync::Mutex;
use std::time::{Duration, Instant};

use tracing::{info, warn};

use crate::domain::errors::DomainError;
use crate::engine::{ImageReport, TrackOutcome, TrackReport};
use crate::utils::calculate_progress;
use crate::utils::time::{format_elapsed, throughput_kib};

/// Receives pipeline events; every method defaults to a no-op
pub trait ProgressObserver: Send + Sync {
    /// An image (or a directory batch) starts; `tracks` is the number of work items
    fn on_image_start(&self, _source: &Path, _tracks: u32) {}

    fn on_track_start(&self, _track: u32, _title: &str, _dest: &Path) {}

    /// Bytes moved for the current track so far
    fn on_track_progress(&self, _track: u32, _done: u64, _total: u64) {}

    /// Non-fatal problem tied to a track, such as a stream underrun
    fn on_warning(&self, _track: u32, _error: &DomainError) {}

    fn on_track_finished(&self, _report: &TrackReport) {}

    fn on_image_finished(&self, _report: &ImageReport) {}

    /// The image could not be processed at all
    fn on_image_failed(&self, _source: &Path, _error: &DomainError) {}
}

/// Observer that ignores every event
pub struct NoProgress;

impl ProgressObserver for NoProgress {}

/// Observer that logs through `tracing`, throttling per-chunk updates
pub struct TracingProgress {
    last_update: Mutex<Instant>,
    update_interval: Duration,
}

impl TracingProgress {
    pub fn new() -> Self {
        Self::with_interval(Duration::from_millis(100)) // Update at most 10 times per second
    }

    pub fn with_interval(update_interval: Duration) -> Self {
        Self {
            last_update: Mutex::new(Instant::now()),
            update_interval,
        }
    }

    fn should_update(&self) -> bool {
        match self.last_update.lock() {
            Ok(mut last) if last.elapsed() >= self.update_interval => {
                *last = Instant::now();
                true
            }
            _ => false,
        }
    }
}

impl Default for TracingProgress {
    fn default() -> Self {
        Self::new()
    }
}

impl ProgressObserver for TracingProgress {
    fn on_image_start(&self, source: &Path, tracks: u32) {
        info!(source = %source.display(), tracks = tracks, "Transcoding");
    }

    fn on_track_start(&self, track: u32, title: &str, dest: &Path) {
        info!(track = track, title = %title, dest = %dest.display(), "Track started");
    }

    fn on_track_progress(&self, track: u32, done: u64, total: u64) {
        if self.should_update() {
            info!(
                track = track,
                percent = %format!("{:.0}", calculate_progress(done, total)),
                "Track progress"
            );
        }
    }

    fn on_warning(&self, track: u32, error: &DomainError) {
        warn!(track = track, error = %error, "Track warning");
    }

    fn on_track_finished(&self, report: &TrackReport) {
        match &report.outcome {
            TrackOutcome::Renamed => {
                info!(track = report.number, dest = %report.dest.display(), "Track done")
            }
            TrackOutcome::Skipped { reason } => {
                info!(track = report.number, reason = ?reason, "Track skipped")
            }
            TrackOutcome::Failed { message, .. } => {
                warn!(track = report.number, error = %message, "Track failed")
            }
        }
    }

    fn on_image_finished(&self, report: &ImageReport) {
        info!(
            source = %report.source.display(),
            elapsed = %format_elapsed(report.elapsed),
            kib_per_sec = %format!("{:.2}", throughput_kib(report.bytes_streamed, report.elapsed)),
            failed = report.failed_count(),
            "Done"
        );
    }

    fn on_image_failed(&self, source: &Path, error: &DomainError) {
        warn!(source = %source.display(), error = %error, "Image failed");
    }
}
