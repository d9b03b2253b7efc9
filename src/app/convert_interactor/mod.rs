// Convert interactor - Whole-file lossless to lossy conversion

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;

use tracing::{debug, info};
use walkdir::WalkDir;

use crate::app::{finalize_output, prepare_output};
use crate::domain::errors::DomainError;
use crate::domain::model::*;
use crate::domain::rules::TranscodeProfileSelector;
use crate::engine::{ImageReport, ProgressObserver, SkipReason, TrackOutcome, TrackReport};
use crate::error::CueSplitResult;
use crate::ports::{EncodeInput, EncodeJob, FsPort, TranscodePort};
use crate::utils::path::{PathMapper, TEMP_PREFIX};

/// Extensions picked up when walking a directory
pub const LOSSLESS_EXTENSIONS: &[&str] = &["flac", "ape", "wav", "m4a", "alac", "wv", "aif"];

/// Interactor for converting whole lossless files
pub struct ConvertInteractor {
    config: RunConfig,
    profile: TranscodeProfile,
    transcoder: Arc<dyn TranscodePort>,
    fs: Arc<dyn FsPort>,
}

impl ConvertInteractor {
    pub fn new(config: RunConfig, transcoder: Arc<dyn TranscodePort>, fs: Arc<dyn FsPort>) -> Self {
        let profile = TranscodeProfileSelector::select(&config.format, &config.quality);
        Self {
            config,
            profile,
            transcoder,
            fs,
        }
    }

    pub fn profile(&self) -> &TranscodeProfile {
        &self.profile
    }

    /// Lossless files under `root`, sorted; `root` may also be a single file
    pub fn collect_sources(root: &Path) -> CueSplitResult<Vec<PathBuf>> {
        let mut sources = Vec::new();
        for entry in WalkDir::new(root).follow_links(true).sort_by_file_name() {
            let entry = entry?;
            if entry.file_type().is_file() && is_lossless(entry.path()) {
                sources.push(entry.into_path());
            }
        }
        Ok(sources)
    }

    /// Convert every lossless file under `root`; one report entry per file
    pub async fn convert(
        &self,
        root: &Path,
        observer: &dyn ProgressObserver,
    ) -> CueSplitResult<ImageReport> {
        let started = Instant::now();
        let sources = Self::collect_sources(root)?;

        info!(
            root = %root.display(),
            files = sources.len(),
            format = %self.profile.format,
            "Converting directory"
        );
        observer.on_image_start(root, sources.len() as u32);

        let mut report = ImageReport::new(root.to_path_buf(), None);
        for (index, source) in sources.iter().enumerate() {
            let track = self.convert_file(index as u32 + 1, source, observer).await;
            observer.on_track_finished(&track);
            report.tracks.push(track);
        }

        report.elapsed = started.elapsed();
        observer.on_image_finished(&report);
        Ok(report)
    }

    async fn convert_file(
        &self,
        number: u32,
        source: &Path,
        observer: &dyn ProgressObserver,
    ) -> TrackReport {
        let title = source
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_default();
        let dest = PathMapper::converted_destination(
            source,
            &self.profile.extension,
            self.config.dest_root.as_deref(),
            self.config.preserve,
        );

        let report = |outcome| TrackReport {
            number,
            title: title.clone(),
            dest: dest.clone(),
            outcome,
            bytes: 0,
            underrun: false,
        };

        if self.fs.exists(&dest).await {
            debug!(source = %source.display(), dest = %dest.display(), "Destination exists, skipping");
            return report(TrackOutcome::Skipped {
                reason: SkipReason::AlreadyPresent,
            });
        }

        observer.on_track_start(number, &title, &dest);
        match self.encode(source, &dest).await {
            Ok(()) => report(TrackOutcome::Renamed),
            Err(e) => report(TrackOutcome::failed(&e)),
        }
    }

    async fn encode(&self, source: &Path, dest: &Path) -> Result<(), DomainError> {
        let output = prepare_output(self.fs.as_ref(), dest, &self.profile.extension).await?;

        let job = EncodeJob {
            profile: &self.profile,
            tags: &[],
            extra_metadata: &self.config.extra_metadata,
            input: EncodeInput::File {
                path: self.fs.safe_alias(source).await,
                seek: None,
            },
            output: output.alias.clone(),
        };
        let encoded = self.transcoder.run(&job).await;

        finalize_output(
            self.fs.as_ref(),
            &output,
            dest,
            encoded,
            self.config.pipeline.rename_attempts,
            self.profile.settle_delay,
        )
        .await
    }
}

/// Lossless by extension, ignoring our own in-progress files
fn is_lossless(path: &Path) -> bool {
    let in_progress = path
        .file_name()
        .is_some_and(|n| n.to_string_lossy().starts_with(TEMP_PREFIX));
    let lossless = path
        .extension()
        .map(|e| e.to_string_lossy().to_ascii_lowercase())
        .is_some_and(|e| LOSSLESS_EXTENSIONS.contains(&e.as_str()));
    lossless && !in_progress
}
