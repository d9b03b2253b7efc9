//! Disc image extraction
//!
//! One decoder per image streams raw PCM through a [`PcmCursor`]; each track
//! takes exactly its byte quota, either into its own encoder or into the void
//! when the track is skipped. The seek strategy instead decodes the image once
//! to a WAV file and cuts every track out of it by timestamp.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;

use tracing::{debug, info, warn};
use walkdir::WalkDir;

use crate::app::{finalize_output, prepare_output};
use crate::cue::{locate_cue, CueSheetParser};
use crate::domain::errors::DomainError;
use crate::domain::model::*;
use crate::domain::rules::TranscodeProfileSelector;
use crate::engine::{
    ImageReport, PcmCursor, PipelineState, ProgressObserver, SkipReason, TrackOutcome, TrackReport,
};
use crate::error::CueSplitResult;
use crate::planner::BoundaryConverter;
use crate::ports::{EncodeInput, EncodeJob, FsPort, TranscodePort};
use crate::utils::path::{PathMapper, TEMP_PREFIX};

/// Extensions of disc images picked up when a directory is given
pub const IMAGE_EXTENSIONS: &[&str] = &["ape", "flac", "wav"];

/// A catalog entry with its destination and skip decision
struct PlannedTrack<'a> {
    entry: &'a TrackEntry,
    dest: PathBuf,
    skip: Option<SkipReason>,
}

impl PlannedTrack<'_> {
    fn report(&self, outcome: TrackOutcome, bytes: u64, underrun: bool) -> TrackReport {
        TrackReport {
            number: self.entry.number,
            title: self.entry.title.clone(),
            dest: self.dest.clone(),
            outcome,
            bytes,
            underrun,
        }
    }
}

/// Splits disc images into per-track files
pub struct TrackPipeline {
    config: RunConfig,
    profile: TranscodeProfile,
    parser: CueSheetParser,
    converter: BoundaryConverter,
    transcoder: Arc<dyn TranscodePort>,
    fs: Arc<dyn FsPort>,
}

impl TrackPipeline {
    /// Create a pipeline; the transcode profile is selected once here
    pub fn new(config: RunConfig, transcoder: Arc<dyn TranscodePort>, fs: Arc<dyn FsPort>) -> Self {
        let profile = TranscodeProfileSelector::select(&config.format, &config.quality);
        let parser = CueSheetParser::from_config(&config);
        Self {
            config,
            profile,
            parser,
            converter: BoundaryConverter::new(PcmFormat::CD),
            transcoder,
            fs,
        }
    }

    pub fn profile(&self) -> &TranscodeProfile {
        &self.profile
    }

    /// Disc images under `source`, sorted; a file is taken as given
    pub fn collect_images(source: &Path) -> CueSplitResult<Vec<PathBuf>> {
        if !source.is_dir() {
            return Ok(vec![source.to_path_buf()]);
        }

        let mut images = Vec::new();
        for entry in WalkDir::new(source).follow_links(true).sort_by_file_name() {
            let entry = entry?;
            if entry.file_type().is_file() && is_image(entry.path()) {
                images.push(entry.into_path());
            }
        }
        debug!(root = %source.display(), images = images.len(), "Collected disc images");
        Ok(images)
    }

    /// Extract every track of `image`
    ///
    /// Only a missing or unparsable cue sheet is an error; per-track failures
    /// are recorded in the report.
    pub async fn extract(
        &self,
        image: &Path,
        observer: &dyn ProgressObserver,
    ) -> Result<ImageReport, DomainError> {
        let started = Instant::now();
        let cue_path = locate_cue(image, self.config.cue_override.as_deref());

        let catalog = match self.parser.parse_file(&cue_path) {
            Ok(catalog) => catalog,
            Err(e) => {
                observer.on_image_failed(image, &e);
                return Err(e);
            }
        };

        info!(
            image = %image.display(),
            cue = %cue_path.display(),
            tracks = catalog.track_count(),
            format = %self.profile.format,
            "Extracting disc image"
        );
        observer.on_image_start(image, catalog.track_count());

        let plan = self.plan(image, &catalog).await;
        let mut report = ImageReport::new(image.to_path_buf(), Some(cue_path));

        match self.config.strategy {
            DecodeStrategy::Stream => self.extract_streamed(image, &plan, &mut report, observer).await,
            DecodeStrategy::Seek => self.extract_seeked(image, &plan, &mut report, observer).await,
        }

        report.elapsed = started.elapsed();
        observer.on_image_finished(&report);
        Ok(report)
    }

    async fn plan<'a>(&self, image: &Path, catalog: &'a CueCatalog) -> Vec<PlannedTrack<'a>> {
        let mut plan = Vec::with_capacity(catalog.track_count() as usize);
        for entry in catalog.iter() {
            let dest = PathMapper::track_destination(
                image,
                &entry.title,
                &self.profile.extension,
                self.config.dest_root.as_deref(),
                self.config.preserve,
            );

            let skip = if !self.config.selection.contains(entry.number) {
                Some(SkipReason::Excluded)
            } else if self.fs.exists(&dest).await {
                Some(SkipReason::AlreadyPresent)
            } else {
                None
            };

            plan.push(PlannedTrack { entry, dest, skip });
        }
        plan
    }

    fn record(&self, report: &mut ImageReport, track: TrackReport, observer: &dyn ProgressObserver) {
        observer.on_track_finished(&track);
        report.bytes_streamed += track.bytes;
        report.tracks.push(track);
    }

    /// Mark every track as skipped or failed without touching the decoder
    fn record_without_decode(
        &self,
        plan: &[PlannedTrack<'_>],
        report: &mut ImageReport,
        observer: &dyn ProgressObserver,
        error: Option<&DomainError>,
    ) {
        for track in plan {
            let outcome = match (track.skip, error) {
                (Some(reason), _) => TrackOutcome::Skipped { reason },
                (None, Some(e)) => TrackOutcome::failed(e),
                (None, None) => continue,
            };
            self.record(report, track.report(outcome, 0, false), observer);
        }
    }

    async fn extract_streamed(
        &self,
        image: &Path,
        plan: &[PlannedTrack<'_>],
        report: &mut ImageReport,
        observer: &dyn ProgressObserver,
    ) {
        let mut state = PipelineState::Idle;

        let Some(last_needed) = plan.iter().rposition(|t| t.skip.is_none()) else {
            debug!(image = %image.display(), "Every track is skipped, not decoding");
            self.record_without_decode(plan, report, observer, None);
            return;
        };

        let pcm = *self.converter.pcm();
        let source = self.fs.safe_alias(image).await;
        transition(&mut state, PipelineState::DecodingHeader);
        let decoder = match self.transcoder.spawn_decoder(&source, &pcm).await {
            Ok(decoder) => decoder,
            Err(e) => {
                warn!(image = %image.display(), error = %e, "Decoder failed to start");
                self.record_without_decode(plan, report, observer, Some(&e));
                return;
            }
        };
        let mut cursor = PcmCursor::new(decoder, self.config.pipeline.chunk_size);

        for (index, track) in plan.iter().enumerate() {
            if index > last_needed {
                let reason = track.skip.unwrap_or(SkipReason::Excluded);
                self.record(report, track.report(TrackOutcome::Skipped { reason }, 0, false), observer);
                continue;
            }

            transition(&mut state, PipelineState::Streaming(track.entry.number));
            let range = self.converter.byte_range(track.entry);
            let lead_in = range.start.saturating_sub(cursor.position());
            if lead_in > 0 {
                cursor.drain(lead_in).await;
            }

            let is_final = index + 1 == plan.len();
            let result = match track.skip {
                Some(reason) => {
                    let drained = cursor.drain(range.length).await;
                    track.report(TrackOutcome::Skipped { reason }, drained, false)
                }
                None => {
                    self.encode_streamed(track, &mut cursor, range.length, is_final, pcm, observer)
                        .await
                }
            };
            self.record(report, result, observer);
        }

        if let Err(e) = cursor.terminate().await {
            warn!(image = %image.display(), error = %e, "Decoder did not terminate cleanly");
            report.decoder_error = Some(TrackOutcome::failed(&e));
        }
        transition(&mut state, PipelineState::Done);
    }

    async fn encode_streamed(
        &self,
        track: &PlannedTrack<'_>,
        cursor: &mut PcmCursor,
        quota: u64,
        is_final: bool,
        pcm: PcmFormat,
        observer: &dyn ProgressObserver,
    ) -> TrackReport {
        let number = track.entry.number;
        observer.on_track_start(number, &track.entry.title, &track.dest);

        if let Some(e) = cursor.failure() {
            return track.report(TrackOutcome::failed(e), 0, false);
        }

        let output = match prepare_output(self.fs.as_ref(), &track.dest, &self.profile.extension).await {
            Ok(output) => output,
            Err(e) => {
                let drained = cursor.drain(quota).await;
                return track.report(TrackOutcome::failed(&e), drained, false);
            }
        };

        let job = EncodeJob {
            profile: &self.profile,
            tags: &track.entry.metadata,
            extra_metadata: &self.config.extra_metadata,
            input: EncodeInput::RawPcm(pcm),
            output: output.alias.clone(),
        };

        let mut sink = match self.transcoder.spawn_encoder(&job).await {
            Ok(sink) => sink,
            Err(e) => {
                let drained = cursor.drain(quota).await;
                if let Err(cleanup) = self.fs.remove_file(&output.temp).await {
                    debug!(path = %output.temp.display(), error = %cleanup, "Could not remove temporary output");
                }
                return track.report(TrackOutcome::failed(&e), drained, false);
            }
        };

        let pumped = cursor
            .pump(sink.as_mut(), quota, |done| observer.on_track_progress(number, done, quota))
            .await;
        let finished = sink.finish(self.config.pipeline.encoder_grace).await;

        let underrun = pumped.transferred < quota && !is_final;
        if underrun {
            let e = DomainError::StreamUnderrun {
                track: number,
                expected: quota,
                received: pumped.transferred,
            };
            warn!(track = number, error = %e, "Stream underrun");
            observer.on_warning(number, &e);
        }

        // A failed decoder means the PCM is incomplete whatever the encoder says
        let encoded = match (cursor.failure().cloned(), finished, pumped.write_error) {
            (Some(e), _, _) | (None, Err(e), _) | (None, Ok(()), Some(e)) => Err(e),
            (None, Ok(()), None) => Ok(()),
        };

        let outcome = match finalize_output(
            self.fs.as_ref(),
            &output,
            &track.dest,
            encoded,
            self.config.pipeline.rename_attempts,
            self.profile.settle_delay,
        )
        .await
        {
            Ok(()) => TrackOutcome::Renamed,
            Err(e) => TrackOutcome::failed(&e),
        };

        track.report(outcome, pumped.transferred, underrun)
    }

    async fn extract_seeked(
        &self,
        image: &Path,
        plan: &[PlannedTrack<'_>],
        report: &mut ImageReport,
        observer: &dyn ProgressObserver,
    ) {
        let mut state = PipelineState::Idle;

        if plan.iter().all(|t| t.skip.is_some()) {
            debug!(image = %image.display(), "Every track is skipped, not decoding");
            self.record_without_decode(plan, report, observer, None);
            return;
        }

        transition(&mut state, PipelineState::DecodingHeader);
        // Removed when dropped at the end of this scope
        let wav = match intermediate_wav() {
            Ok(wav) => wav,
            Err(e) => {
                self.record_without_decode(plan, report, observer, Some(&e));
                return;
            }
        };

        let source = self.fs.safe_alias(image).await;
        let wav_alias = self.fs.safe_alias(&wav).await;
        info!(image = %image.display(), wav = %wav.display(), "Decoding image to intermediate WAV");
        if let Err(e) = self.transcoder.decode_to_wav(&source, &wav_alias).await {
            warn!(image = %image.display(), error = %e, "Intermediate decode failed");
            self.record_without_decode(plan, report, observer, Some(&e));
            return;
        }

        for track in plan {
            let result = match track.skip {
                Some(reason) => track.report(TrackOutcome::Skipped { reason }, 0, false),
                None => {
                    transition(&mut state, PipelineState::Streaming(track.entry.number));
                    self.encode_seeked(track, &wav_alias, observer).await
                }
            };
            self.record(report, result, observer);
        }

        transition(&mut state, PipelineState::Done);
    }

    async fn encode_seeked(
        &self,
        track: &PlannedTrack<'_>,
        wav: &Path,
        observer: &dyn ProgressObserver,
    ) -> TrackReport {
        let number = track.entry.number;
        let bytes = self.converter.byte_range(track.entry).length;
        observer.on_track_start(number, &track.entry.title, &track.dest);

        let output = match prepare_output(self.fs.as_ref(), &track.dest, &self.profile.extension).await {
            Ok(output) => output,
            Err(e) => return track.report(TrackOutcome::failed(&e), 0, false),
        };

        let job = EncodeJob {
            profile: &self.profile,
            tags: &track.entry.metadata,
            extra_metadata: &self.config.extra_metadata,
            input: EncodeInput::File {
                path: wav.to_path_buf(),
                seek: Some(self.converter.seek_bounds(track.entry)),
            },
            output: output.alias.clone(),
        };

        let encoded = self.transcoder.run(&job).await;
        if encoded.is_ok() {
            observer.on_track_progress(number, bytes, bytes);
        }

        match finalize_output(
            self.fs.as_ref(),
            &output,
            &track.dest,
            encoded,
            self.config.pipeline.rename_attempts,
            self.profile.settle_delay,
        )
        .await
        {
            Ok(()) => track.report(TrackOutcome::Renamed, bytes, false),
            Err(e) => track.report(TrackOutcome::failed(&e), 0, false),
        }
    }
}

fn is_image(path: &Path) -> bool {
    let temporary = path
        .file_name()
        .map(|name| name.to_string_lossy().starts_with(TEMP_PREFIX))
        .unwrap_or(false);
    let known = path
        .extension()
        .map(|ext| {
            let ext = ext.to_string_lossy().to_lowercase();
            IMAGE_EXTENSIONS.contains(&ext.as_str())
        })
        .unwrap_or(false);
    known && !temporary
}

fn transition(state: &mut PipelineState, next: PipelineState) {
    debug!(from = ?*state, to = ?next, "Pipeline state");
    *state = next;
}

/// Empty WAV file in the system temp directory, deleted on drop
fn intermediate_wav() -> Result<tempfile::TempPath, DomainError> {
    tempfile::Builder::new()
        .prefix(TEMP_PREFIX)
        .suffix(".wav")
        .tempfile()
        .map(|file| file.into_temp_path())
        .map_err(|e| DomainError::FsFail(format!("Failed to create intermediate WAV: {}", e)))
}

#[cfg(test)]
mod tests;
