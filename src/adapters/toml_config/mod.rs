// TOML config adapter - Configuration file loading

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::error::{CueSplitError, CueSplitResult};
use crate::utils::logging::{LogFormat, LogLevel};

/// Contents of a `cuesplit.toml` file; every field is optional
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct FileConfig {
    pub tools: ToolsSection,
    pub pipeline: PipelineSection,
    pub cue: CueSection,
    pub defaults: DefaultsSection,
    pub logging: LoggingSection,
}

/// `[tools]`
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ToolsSection {
    pub ffmpeg: Option<PathBuf>,
    pub qaac: Option<PathBuf>,
}

/// `[pipeline]`
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct PipelineSection {
    pub chunk_size: Option<usize>,
    pub rename_attempts: Option<u32>,
    pub encoder_grace_ms: Option<u64>,
}

/// `[cue]`
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct CueSection {
    /// Encoding labels tried in order, e.g. `["utf-8", "windows-1252"]`
    pub encodings: Option<Vec<String>>,
    /// Substrings removed from every track display name
    pub title_strip: Vec<String>,
}

/// `[defaults]`
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct DefaultsSection {
    pub format: Option<String>,
    pub quality: Option<String>,
    pub dest_dir: Option<PathBuf>,
    pub preserve: Option<usize>,
    pub strategy: Option<String>,
}

/// `[logging]`
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct LoggingSection {
    pub level: Option<LogLevel>,
    pub format: Option<LogFormat>,
}

/// TOML configuration adapter
pub struct TomlConfigAdapter;

impl TomlConfigAdapter {
    /// Locations searched when no file is given explicitly
    pub fn default_config_paths() -> Vec<PathBuf> {
        let mut paths = vec![PathBuf::from("cuesplit.toml")];
        // On Windows, use %APPDATA%/cuesplit/config.toml
        if let Some(appdata) = std::env::var_os("APPDATA") {
            paths.push(PathBuf::from(appdata).join("cuesplit").join("config.toml"));
        }
        paths
    }

    /// Parse configuration text; `origin` names the source in errors
    pub fn parse(content: &str, origin: &Path) -> CueSplitResult<FileConfig> {
        toml::from_str(content).map_err(|source| CueSplitError::ConfigParse {
            path: origin.display().to_string(),
            source,
        })
    }

    pub fn load(path: &Path) -> CueSplitResult<FileConfig> {
        let content = std::fs::read_to_string(path)?;
        let config = Self::parse(&content, path)?;
        info!(path = %path.display(), "Loaded configuration file");
        Ok(config)
    }

    /// Load the explicit file, else the first default location that exists, else defaults
    ///
    /// An explicit path that does not exist is an error.
    pub fn discover(explicit: Option<&Path>) -> CueSplitResult<FileConfig> {
        if let Some(path) = explicit {
            if !path.is_file() {
                return Err(CueSplitError::InvalidConfig {
                    message: format!("Config file does not exist: {}", path.display()),
                });
            }
            return Self::load(path);
        }

        for path in Self::default_config_paths() {
            if path.is_file() {
                return Self::load(&path);
            }
        }

        debug!("No configuration file found, using defaults");
        Ok(FileConfig::default())
    }
}
