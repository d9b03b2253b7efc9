//! Configuration initialization and hierarchy management
//!
//! Precedence: CLI > Env > File > Defaults. Options that have a CLI flag read
//! their environment variable through clap; the pipeline tuning knobs without
//! a flag are read here.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use encoding_rs::Encoding;
use tracing::{debug, info};

use crate::adapters::toml_config::FileConfig;
use crate::domain::model::*;
use crate::error::{CueSplitError, CueSplitResult};

pub const ENV_CHUNK_SIZE: &str = "CUESPLIT_CHUNK_SIZE";
pub const ENV_RENAME_ATTEMPTS: &str = "CUESPLIT_RENAME_ATTEMPTS";
pub const ENV_ENCODER_GRACE_MS: &str = "CUESPLIT_ENCODER_GRACE_MS";
pub const ENV_CUE_ENCODINGS: &str = "CUESPLIT_CUE_ENCODINGS";

/// Values given on the command line (or through their clap `env` fallbacks)
#[derive(Debug, Clone, Default)]
pub struct ConfigOverrides {
    pub format: Option<String>,
    pub quality: Option<String>,
    pub dest_dir: Option<PathBuf>,
    pub preserve: Option<usize>,
    /// Raw `KEY=VALUE` pairs
    pub extra_metadata: Vec<String>,
    pub cue: Option<PathBuf>,
    pub track_list: Option<String>,
    pub strategy: Option<String>,
    pub ffmpeg: Option<PathBuf>,
    pub qaac: Option<PathBuf>,
}

/// Build the run configuration from CLI values, the process environment and the config file
pub fn build_run_config(overrides: &ConfigOverrides, file: &FileConfig) -> CueSplitResult<RunConfig> {
    build_run_config_with_env(overrides, file, |key| std::env::var(key).ok())
}

/// Same as [`build_run_config`] with an explicit environment lookup
pub fn build_run_config_with_env(
    overrides: &ConfigOverrides,
    file: &FileConfig,
    env: impl Fn(&str) -> Option<String>,
) -> CueSplitResult<RunConfig> {
    let defaults = RunConfig::default();
    let file_defaults = &file.defaults;

    let format = overrides
        .format
        .as_deref()
        .or(file_defaults.format.as_deref())
        .map(TranscodeFormat::parse)
        .unwrap_or(defaults.format);

    let quality = overrides
        .quality
        .clone()
        .or_else(|| file_defaults.quality.clone())
        .unwrap_or(defaults.quality);

    let preserve = overrides
        .preserve
        .or(file_defaults.preserve)
        .unwrap_or(defaults.preserve);

    let strategy = match overrides.strategy.as_deref().or(file_defaults.strategy.as_deref()) {
        Some(name) => DecodeStrategy::parse(name)?,
        None => defaults.strategy,
    };

    let selection = match overrides.track_list.as_deref() {
        Some(list) => TrackSelection::parse(list)?,
        None => TrackSelection::all(),
    };

    let extra_metadata = overrides
        .extra_metadata
        .iter()
        .map(|pair| parse_metadata_pair(pair))
        .collect::<CueSplitResult<Vec<_>>>()?;

    let tools = ToolPaths {
        ffmpeg: overrides
            .ffmpeg
            .clone()
            .or_else(|| file.tools.ffmpeg.clone())
            .unwrap_or(defaults.tools.ffmpeg),
        qaac: overrides
            .qaac
            .clone()
            .or_else(|| file.tools.qaac.clone())
            .unwrap_or(defaults.tools.qaac),
    };

    let pipeline = PipelineSettings {
        chunk_size: env_number(&env, ENV_CHUNK_SIZE)?
            .or(file.pipeline.chunk_size)
            .unwrap_or(defaults.pipeline.chunk_size),
        rename_attempts: env_number(&env, ENV_RENAME_ATTEMPTS)?
            .or(file.pipeline.rename_attempts)
            .unwrap_or(defaults.pipeline.rename_attempts),
        encoder_grace: env_number(&env, ENV_ENCODER_GRACE_MS)?
            .or(file.pipeline.encoder_grace_ms)
            .map(Duration::from_millis)
            .unwrap_or(defaults.pipeline.encoder_grace),
    };
    validate_pipeline(&pipeline)?;

    let encoding_labels: Option<Vec<String>> = match env(ENV_CUE_ENCODINGS) {
        Some(value) => Some(value.split(',').map(|s| s.trim().to_string()).collect()),
        None => file.cue.encodings.clone(),
    };
    let cue_encodings = match encoding_labels {
        Some(labels) => resolve_encodings(&labels)?,
        None => defaults.cue_encodings,
    };

    let config = RunConfig {
        format,
        quality,
        dest_root: overrides.dest_dir.clone().or_else(|| file_defaults.dest_dir.clone()),
        preserve,
        extra_metadata,
        cue_override: overrides.cue.clone(),
        selection,
        strategy,
        tools,
        pipeline,
        cue_encodings,
        title_transform: title_strip_transform(&file.cue.title_strip),
    };

    info!(format = %config.format, quality = %config.quality, strategy = ?config.strategy, "Configuration resolved");
    debug!(config = ?config, "Run configuration");
    Ok(config)
}

/// Split `KEY=VALUE`; the value may itself contain `=`
pub fn parse_metadata_pair(pair: &str) -> CueSplitResult<(String, String)> {
    match pair.split_once('=') {
        Some((key, value)) if !key.trim().is_empty() => {
            Ok((key.trim().to_string(), value.to_string()))
        }
        _ => Err(CueSplitError::InvalidConfig {
            message: format!("Metadata must be KEY=VALUE, got '{}'", pair),
        }),
    }
}

fn env_number<T: std::str::FromStr>(
    env: &impl Fn(&str) -> Option<String>,
    key: &str,
) -> CueSplitResult<Option<T>> {
    match env(key) {
        Some(value) => value.trim().parse().map(Some).map_err(|_| CueSplitError::InvalidConfig {
            message: format!("{} must be a non-negative integer, got '{}'", key, value),
        }),
        None => Ok(None),
    }
}

fn validate_pipeline(pipeline: &PipelineSettings) -> CueSplitResult<()> {
    if pipeline.chunk_size == 0 {
        return Err(CueSplitError::InvalidConfig {
            message: "chunk_size must be greater than zero".to_string(),
        });
    }
    if pipeline.rename_attempts == 0 {
        return Err(CueSplitError::InvalidConfig {
            message: "rename_attempts must be at least 1".to_string(),
        });
    }
    Ok(())
}

fn resolve_encodings(labels: &[String]) -> CueSplitResult<Vec<&'static Encoding>> {
    if labels.is_empty() {
        return Err(CueSplitError::InvalidConfig {
            message: "at least one cue sheet encoding is required".to_string(),
        });
    }
    labels
        .iter()
        .map(|label| {
            Encoding::for_label(label.as_bytes()).ok_or_else(|| CueSplitError::InvalidConfig {
                message: format!("Unknown cue sheet encoding '{}'", label),
            })
        })
        .collect()
}

/// Transform removing every configured substring from display names
fn title_strip_transform(strip: &[String]) -> Option<TitleTransform> {
    let strip: Vec<String> = strip.iter().filter(|s| !s.is_empty()).cloned().collect();
    if strip.is_empty() {
        return None;
    }

    Some(Arc::new(move |title: &str| {
        let mut title = title.to_string();
        for needle in &strip {
            title = title.replace(needle.as_str(), "");
        }
        title.trim().to_string()
    }))
}
