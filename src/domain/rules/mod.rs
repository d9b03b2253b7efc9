// Domain rules - Business logic and policies

use std::time::Duration;

use tracing::debug;

use crate::domain::model::*;

/// Rename retry interval after an ffmpeg encoder exits
const FFMPEG_SETTLE_DELAY: Duration = Duration::from_millis(500);

/// qaac keeps its output handle open a little longer
const QAAC_SETTLE_DELAY: Duration = Duration::from_secs(1);

/// Business rules for mapping an output format onto an encoder command shape
pub struct TranscodeProfileSelector;

impl TranscodeProfileSelector {
    /// Select the profile for a format; total over every format
    pub fn select(format: &TranscodeFormat, requested_quality: &str) -> TranscodeProfile {
        let requested_quality = requested_quality.trim();

        match format {
            TranscodeFormat::Mp3 => Self::ffmpeg_profile(
                format,
                "mp3",
                QualityMode::QualityFactor,
                "-aq",
                requested_quality.to_string(),
                &[],
                MetadataStyle::Id3,
            ),
            TranscodeFormat::Vorbis => Self::ffmpeg_profile(
                format,
                "oga",
                QualityMode::QualityFactor,
                "-aq",
                requested_quality.to_string(),
                &["-c:a", "libvorbis", "-f", "ogg"],
                MetadataStyle::VorbisComment,
            ),
            TranscodeFormat::Opus => {
                let (quality, coerced) = Self::coerce_floor(format, requested_quality, 32_000, 64_000);
                let mut profile = Self::ffmpeg_profile(
                    format,
                    "oga",
                    QualityMode::Bitrate,
                    "-b:a",
                    quality,
                    &["-c:a", "libopus", "-f", "ogg"],
                    MetadataStyle::VorbisComment,
                );
                profile.quality_coerced = coerced;
                profile
            }
            TranscodeFormat::Wma => Self::ffmpeg_profile(
                format,
                "wma",
                QualityMode::Bitrate,
                "-b:a",
                requested_quality.to_string(),
                &["-c:a", "wmav2", "-f", "asf", "-cutoff", "18000"],
                MetadataStyle::Generic,
            ),
            TranscodeFormat::AacLc => {
                let (quality, coerced) = Self::coerce_floor(format, requested_quality, 32, 128);
                TranscodeProfile {
                    format: format.clone(),
                    extension: "m4a".to_string(),
                    quality_mode: QualityMode::AverageBitrate,
                    quality_flag: "-a",
                    quality,
                    codec_args: args(&["-s"]),
                    file_codec_args: args(&["-c:a", "aac"]),
                    stream_encoder: EncoderKind::Qaac,
                    file_encoder: EncoderKind::Ffmpeg,
                    metadata_style: MetadataStyle::Generic,
                    settle_delay: QAAC_SETTLE_DELAY,
                    quality_coerced: coerced,
                }
            }
            TranscodeFormat::HeAac => {
                let (quality, coerced) = Self::coerce_floor(format, requested_quality, 32, 64);
                TranscodeProfile {
                    format: format.clone(),
                    extension: "m4a".to_string(),
                    quality_mode: QualityMode::AverageBitrate,
                    quality_flag: "-a",
                    quality,
                    codec_args: args(&["-s", "--he"]),
                    file_codec_args: args(&["-s", "--he"]),
                    stream_encoder: EncoderKind::Qaac,
                    file_encoder: EncoderKind::Qaac,
                    metadata_style: MetadataStyle::Generic,
                    settle_delay: QAAC_SETTLE_DELAY,
                    quality_coerced: coerced,
                }
            }
            TranscodeFormat::Passthrough(name) => Self::ffmpeg_profile(
                format,
                name,
                QualityMode::QualityFactor,
                "-aq",
                requested_quality.to_string(),
                &[],
                MetadataStyle::Generic,
            ),
        }
    }

    fn ffmpeg_profile(
        format: &TranscodeFormat,
        extension: &str,
        quality_mode: QualityMode,
        quality_flag: &'static str,
        quality: String,
        codec_args: &[&str],
        metadata_style: MetadataStyle,
    ) -> TranscodeProfile {
        TranscodeProfile {
            format: format.clone(),
            extension: extension.to_string(),
            quality_mode,
            quality_flag,
            quality,
            codec_args: args(codec_args),
            file_codec_args: args(codec_args),
            stream_encoder: EncoderKind::Ffmpeg,
            file_encoder: EncoderKind::Ffmpeg,
            metadata_style,
            settle_delay: FFMPEG_SETTLE_DELAY,
            quality_coerced: false,
        }
    }

    /// Raise values below `floor` (or unparsable ones) to `replacement`
    fn coerce_floor(
        format: &TranscodeFormat,
        requested: &str,
        floor: u64,
        replacement: u64,
    ) -> (String, bool) {
        match requested.parse::<u64>() {
            Ok(value) if value >= floor => (requested.to_string(), false),
            _ => {
                debug!(
                    format = %format,
                    requested = requested,
                    coerced = replacement,
                    "Quality below codec floor, using default"
                );
                (replacement.to_string(), true)
            }
        }
    }
}

fn args(values: &[&str]) -> Vec<String> {
    values.iter().map(|v| v.to_string()).collect()
}
