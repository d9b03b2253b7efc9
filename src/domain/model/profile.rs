// Output format and encoder profile types

use std::fmt;
use std::time::Duration;

use serde::Serialize;

use super::MetadataTag;

/// Supported output formats
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum TranscodeFormat {
    Mp3,
    Vorbis,
    Opus,
    Wma,
    AacLc,
    HeAac,
    /// Unknown name, handed to ffmpeg as an output extension
    Passthrough(String),
}

impl TranscodeFormat {
    /// Map a user supplied format name; never fails, unknown names pass through
    pub fn parse(name: &str) -> Self {
        let name = name.trim().trim_start_matches('.').to_lowercase();
        match name.as_str() {
            "mp3" => TranscodeFormat::Mp3,
            "ogg" | "vorbis" => TranscodeFormat::Vorbis,
            "opus" | "oga" => TranscodeFormat::Opus,
            "wma" => TranscodeFormat::Wma,
            "aac" | "m4a" | "aac-lc" => TranscodeFormat::AacLc,
            "he-aac" | "aacplus" | "heaac" => TranscodeFormat::HeAac,
            _ => TranscodeFormat::Passthrough(name),
        }
    }

    pub fn name(&self) -> &str {
        match self {
            TranscodeFormat::Mp3 => "mp3",
            TranscodeFormat::Vorbis => "vorbis",
            TranscodeFormat::Opus => "opus",
            TranscodeFormat::Wma => "wma",
            TranscodeFormat::AacLc => "aac",
            TranscodeFormat::HeAac => "he-aac",
            TranscodeFormat::Passthrough(name) => name,
        }
    }
}

impl fmt::Display for TranscodeFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name().to_uppercase())
    }
}

/// Unit the encoder expects for its quality value
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum QualityMode {
    /// Constant-quality factor (`-aq`)
    QualityFactor,
    /// Target bitrate in bits per second (`-b:a`)
    Bitrate,
    /// Average bitrate in kbit/s (qaac `-a`)
    AverageBitrate,
}

/// External program that performs the encode
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum EncoderKind {
    Ffmpeg,
    Qaac,
}

impl EncoderKind {
    pub fn program_name(&self) -> &'static str {
        match self {
            EncoderKind::Ffmpeg => "ffmpeg",
            EncoderKind::Qaac => "qaac",
        }
    }
}

/// Metadata key naming used by the output container
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum MetadataStyle {
    /// ID3v2 frame names
    Id3,
    /// Vorbis comment field names
    VorbisComment,
    /// ffmpeg generic keys, remapped by the muxer
    Generic,
}

impl MetadataStyle {
    pub fn key(&self, tag: MetadataTag) -> &'static str {
        match (self, tag) {
            (MetadataStyle::Id3, MetadataTag::TrackNumber) => "TRCK",
            (MetadataStyle::Id3, MetadataTag::Performer) => "TPE1",
            (MetadataStyle::Id3, MetadataTag::Title) => "TIT2",
            (MetadataStyle::Id3, MetadataTag::Album) => "TALB",
            (MetadataStyle::Id3, MetadataTag::AlbumPerformer) => "TPE2",
            (MetadataStyle::VorbisComment, MetadataTag::TrackNumber) => "TRACKNUMBER",
            (MetadataStyle::VorbisComment, MetadataTag::Performer) => "ARTIST",
            (MetadataStyle::VorbisComment, MetadataTag::Title) => "TITLE",
            (MetadataStyle::VorbisComment, MetadataTag::Album) => "ALBUM",
            (MetadataStyle::VorbisComment, MetadataTag::AlbumPerformer) => "ALBUMARTIST",
            (MetadataStyle::Generic, MetadataTag::TrackNumber) => "track",
            (MetadataStyle::Generic, MetadataTag::Performer) => "artist",
            (MetadataStyle::Generic, MetadataTag::Title) => "title",
            (MetadataStyle::Generic, MetadataTag::Album) => "album",
            (MetadataStyle::Generic, MetadataTag::AlbumPerformer) => "album_artist",
        }
    }
}

/// Encoder command shape for one output format, selected once per run
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TranscodeProfile {
    pub format: TranscodeFormat,
    /// Output extension without the dot
    pub extension: String,
    pub quality_mode: QualityMode,
    pub quality_flag: &'static str,
    /// Quality value after floor coercion
    pub quality: String,
    /// Codec arguments for the stream encoder
    pub codec_args: Vec<String>,
    /// Codec arguments for the whole-file encoder
    pub file_codec_args: Vec<String>,
    /// Encoder for raw PCM fed through stdin
    pub stream_encoder: EncoderKind,
    /// Encoder for whole-file conversions
    pub file_encoder: EncoderKind,
    pub metadata_style: MetadataStyle,
    /// Time the encoder may keep its output handle after exit
    pub settle_delay: Duration,
    /// Whether the requested quality was raised to the codec floor
    pub quality_coerced: bool,
}

impl TranscodeProfile {
    /// Quality flag and value in the form the given encoder understands
    pub fn quality_args(&self, encoder: EncoderKind) -> Vec<String> {
        match (encoder, self.quality_mode) {
            (EncoderKind::Ffmpeg, QualityMode::AverageBitrate) => {
                vec!["-b:a".to_string(), format!("{}k", self.quality)]
            }
            _ => vec![self.quality_flag.to_string(), self.quality.clone()],
        }
    }

    /// Encoder and encoding arguments for streamed raw PCM
    pub fn stream_args(&self) -> (EncoderKind, Vec<String>) {
        let mut args = self.quality_args(self.stream_encoder);
        args.extend(self.codec_args.iter().cloned());
        (self.stream_encoder, args)
    }

    /// Encoder and encoding arguments for a whole-file conversion
    pub fn file_args(&self) -> (EncoderKind, Vec<String>) {
        let mut args = self.quality_args(self.file_encoder);
        args.extend(self.file_codec_args.iter().cloned());
        (self.file_encoder, args)
    }
}
