// Run configuration threaded into every component

use std::fmt;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use encoding_rs::Encoding;

use super::{DecodeStrategy, TrackSelection, TranscodeFormat};

/// Hook applied to every track display name after sanitizing
pub type TitleTransform = Arc<dyn Fn(&str) -> String + Send + Sync>;

/// External program locations
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ToolPaths {
    pub ffmpeg: PathBuf,
    pub qaac: PathBuf,
}

impl Default for ToolPaths {
    fn default() -> Self {
        Self {
            ffmpeg: PathBuf::from("ffmpeg"),
            qaac: PathBuf::from("qaac"),
        }
    }
}

/// Streaming and finalization knobs
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PipelineSettings {
    /// Upper bound for a single read from the decoder
    pub chunk_size: usize,
    /// Rename attempts before giving up on a finished track
    pub rename_attempts: u32,
    /// How long a finished encoder may take to exit before it is killed
    pub encoder_grace: Duration,
}

impl Default for PipelineSettings {
    fn default() -> Self {
        Self {
            chunk_size: 352_800,
            rename_attempts: 5,
            encoder_grace: Duration::from_secs(5),
        }
    }
}

/// Immutable options for one invocation
#[derive(Clone)]
pub struct RunConfig {
    pub format: TranscodeFormat,
    pub quality: String,
    pub dest_root: Option<PathBuf>,
    pub preserve: usize,
    /// Static metadata added to every output, as `(key, value)`
    pub extra_metadata: Vec<(String, String)>,
    pub cue_override: Option<PathBuf>,
    pub selection: TrackSelection,
    pub strategy: DecodeStrategy,
    pub tools: ToolPaths,
    pub pipeline: PipelineSettings,
    /// Candidate encodings tried in order for each cue sheet line
    pub cue_encodings: Vec<&'static Encoding>,
    pub title_transform: Option<TitleTransform>,
}

impl Default for RunConfig {
    fn default() -> Self {
        Self {
            format: TranscodeFormat::Mp3,
            quality: "6".to_string(),
            dest_root: None,
            preserve: 1,
            extra_metadata: Vec::new(),
            cue_override: None,
            selection: TrackSelection::all(),
            strategy: DecodeStrategy::Stream,
            tools: ToolPaths::default(),
            pipeline: PipelineSettings::default(),
            cue_encodings: vec![encoding_rs::UTF_8, encoding_rs::WINDOWS_1252],
            title_transform: None,
        }
    }
}

impl fmt::Debug for RunConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RunConfig")
            .field("format", &self.format)
            .field("quality", &self.quality)
            .field("dest_root", &self.dest_root)
            .field("preserve", &self.preserve)
            .field("extra_metadata", &self.extra_metadata)
            .field("cue_override", &self.cue_override)
            .field("selection", &self.selection)
            .field("strategy", &self.strategy)
            .field("tools", &self.tools)
            .field("pipeline", &self.pipeline)
            .field(
                "cue_encodings",
                &self.cue_encodings.iter().map(|e| e.name()).collect::<Vec<_>>(),
            )
            .field("title_transform", &self.title_transform.is_some())
            .finish()
    }
}
