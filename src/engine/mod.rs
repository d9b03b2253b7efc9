//! Streaming engine, pipeline state and run reports

use std::path::PathBuf;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::domain::errors::{DomainError, FailureKind};
use crate::utils::time::throughput_kib;

pub mod progress;
pub mod stream;

pub use progress::{NoProgress, ProgressObserver, TracingProgress};
pub use stream::{PcmCursor, PumpOutcome};

/// Pipeline phases for one disc image
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case", tag = "state", content = "track")]
pub enum PipelineState {
    Idle,
    /// Decoder spawned, nothing consumed yet
    DecodingHeader,
    /// Streaming the given track
    Streaming(u32),
    Done,
}

/// Why a track was not encoded
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SkipReason {
    /// Not in the track selection
    Excluded,
    /// Destination already exists
    AlreadyPresent,
}

/// Final state of one track or file
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case", tag = "status")]
pub enum TrackOutcome {
    Renamed,
    Skipped { reason: SkipReason },
    Failed { kind: FailureKind, message: String },
}

impl TrackOutcome {
    pub fn failed(error: &DomainError) -> Self {
        TrackOutcome::Failed {
            kind: error.kind(),
            message: error.to_string(),
        }
    }

    pub fn is_failed(&self) -> bool {
        matches!(self, TrackOutcome::Failed { .. })
    }
}

/// What happened to one track
#[derive(Debug, Clone, Serialize)]
pub struct TrackReport {
    pub number: u32,
    pub title: String,
    pub dest: PathBuf,
    pub outcome: TrackOutcome,
    /// PCM bytes covered by this track (zero for whole-file jobs)
    pub bytes: u64,
    /// Set when the decoder ended before this track's quota was met
    pub underrun: bool,
}

/// Summary of one image extraction or one directory conversion
#[derive(Debug, Clone, Serialize)]
pub struct ImageReport {
    pub source: PathBuf,
    pub cue: Option<PathBuf>,
    pub started_at: DateTime<Utc>,
    #[serde(serialize_with = "serialize_secs")]
    pub elapsed: Duration,
    pub bytes_streamed: u64,
    pub tracks: Vec<TrackReport>,
    /// Decoder failure noticed only when it was stopped
    #[serde(skip_serializing_if = "Option::is_none")]
    pub decoder_error: Option<TrackOutcome>,
}

impl ImageReport {
    pub fn new(source: PathBuf, cue: Option<PathBuf>) -> Self {
        Self {
            source,
            cue,
            started_at: Utc::now(),
            elapsed: Duration::ZERO,
            bytes_streamed: 0,
            tracks: Vec::new(),
            decoder_error: None,
        }
    }

    pub fn count(&self, pred: impl Fn(&TrackOutcome) -> bool) -> usize {
        self.tracks.iter().filter(|t| pred(&t.outcome)).count()
    }

    pub fn renamed_count(&self) -> usize {
        self.count(|o| matches!(o, TrackOutcome::Renamed))
    }

    pub fn skipped_count(&self) -> usize {
        self.count(|o| matches!(o, TrackOutcome::Skipped { .. }))
    }

    pub fn failed_count(&self) -> usize {
        self.count(TrackOutcome::is_failed)
    }

    pub fn has_failures(&self) -> bool {
        self.failed_count() > 0 || self.decoder_error.is_some()
    }

    /// KiB/s over the elapsed time
    pub fn throughput_kib(&self) -> f64 {
        throughput_kib(self.bytes_streamed, self.elapsed)
    }
}

fn serialize_secs<S: serde::Serializer>(value: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
    serializer.serialize_f64(value.as_secs_f64())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn report(number: u32, outcome: TrackOutcome) -> TrackReport {
        TrackReport {
            number,
            title: format!("{:02} Track", number),
            dest: PathBuf::from(format!("{:02}.mp3", number)),
            outcome,
            bytes: 0,
            underrun: false,
        }
    }

    #[test]
    fn test_image_report_counts() {
        let mut image = ImageReport::new(PathBuf::from("disc.flac"), None);
        image.tracks.push(report(1, TrackOutcome::Renamed));
        image.tracks.push(report(2, TrackOutcome::Skipped { reason: SkipReason::Excluded }));
        image.tracks.push(report(
            3,
            TrackOutcome::failed(&DomainError::process("ffmpeg", "exited with 1")),
        ));

        assert_eq!(image.renamed_count(), 1);
        assert_eq!(image.skipped_count(), 1);
        assert_eq!(image.failed_count(), 1);
        assert!(image.has_failures());
    }

    #[test]
    fn test_decoder_error_fails_the_image() {
        let mut image = ImageReport::new(PathBuf::from("disc.flac"), None);
        image.tracks.push(report(1, TrackOutcome::Renamed));
        assert!(!image.has_failures());

        image.decoder_error = Some(TrackOutcome::failed(&DomainError::process("ffmpeg", "exited with 1")));
        assert!(image.has_failures());
        let json = serde_json::to_value(&image).unwrap();
        assert_eq!(json["decoder_error"]["kind"], "external_process");
    }

    #[test]
    fn test_outcome_json_shape() {
        let json = serde_json::to_value(TrackOutcome::Skipped {
            reason: SkipReason::AlreadyPresent,
        })
        .unwrap();
        assert_eq!(json["status"], "skipped");
        assert_eq!(json["reason"], "already_present");

        let failed = serde_json::to_value(TrackOutcome::failed(&DomainError::StreamUnderrun {
            track: 2,
            expected: 10,
            received: 5,
        }))
        .unwrap();
        assert_eq!(failed["kind"], "stream_underrun");
    }
}
