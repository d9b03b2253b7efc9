//! Terminal progress bar observer

use std::path::Path;

use indicatif::{ProgressBar, ProgressDrawTarget, ProgressStyle};

use crate::domain::errors::DomainError;
use crate::engine::{ImageReport, ProgressObserver, TrackOutcome, TrackReport};

/// Progress bar on stderr, one bar per track
pub struct IndicatifProgress {
    bar: ProgressBar,
}

impl IndicatifProgress {
    pub fn new() -> Self {
        let bar = ProgressBar::new(0);
        bar.set_draw_target(ProgressDrawTarget::stderr());
        let style = ProgressStyle::with_template(
            "{spinner:.green} [{elapsed_precise}] {bar:40.cyan/blue} {bytes}/{total_bytes} {msg}",
        )
        .unwrap_or_else(|_| ProgressStyle::default_bar());
        bar.set_style(style);
        Self { bar }
    }

    pub fn finish(&self) {
        self.bar.finish_and_clear();
    }
}

impl Default for IndicatifProgress {
    fn default() -> Self {
        Self::new()
    }
}

impl ProgressObserver for IndicatifProgress {
    fn on_image_start(&self, source: &Path, tracks: u32) {
        self.bar.println(format!("{} ({} tracks)", source.display(), tracks));
    }

    fn on_track_start(&self, _track: u32, title: &str, _dest: &Path) {
        self.bar.reset();
        self.bar.set_length(0);
        self.bar.set_message(title.to_string());
    }

    fn on_track_progress(&self, _track: u32, done: u64, total: u64) {
        self.bar.set_length(total);
        self.bar.set_position(done.min(total));
    }

    fn on_warning(&self, track: u32, error: &DomainError) {
        self.bar.println(format!("  warning: track {:02}: {}", track, error));
    }

    fn on_track_finished(&self, report: &TrackReport) {
        if let TrackOutcome::Failed { message, .. } = &report.outcome {
            self.bar.println(format!("  failed: {}: {}", report.title, message));
        }
    }

    fn on_image_finished(&self, _report: &ImageReport) {
        self.bar.set_message(String::new());
    }

    fn on_image_failed(&self, source: &Path, error: &DomainError) {
        self.bar.println(format!("{}: {}", source.display(), error));
    }
}
