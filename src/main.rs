//! cuesplit
//!
//! Splits compressed disc images into tracks using their cue sheets and
//! converts lossless libraries to lossy formats, driving ffmpeg and qaac.
//!
//! # Usage
//!
//! ```bash
//! cuesplit extract "Album.flac" -t ogg -q 6
//! cuesplit extract "Album.ape" -t he-aac -q 64 -d D:/Music -p 2 -l 1,3
//! cuesplit convert "C:/Lossless" -t mp3 -q 2 -d D:/Portable -p 3
//! cuesplit inspect "Album.cue"
//! ```

use anyhow::{Context, Result};
use clap::Parser;
use tracing::debug;

use cuesplit_cli::adapters::TomlConfigAdapter;
use cuesplit_cli::cli::{commands, Cli};
use cuesplit_cli::utils::logging::{LoggingConfig, LoggingSystem};

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let file = TomlConfigAdapter::discover(cli.config.as_deref()).context("Failed to load configuration")?;

    // CLI > Env (through clap) > File > Defaults
    let defaults = LoggingConfig::default();
    let logging = LoggingConfig {
        level: cli.log_level.or(file.logging.level).unwrap_or(defaults.level),
        format: cli.log_format.or(file.logging.format).unwrap_or(defaults.format),
        ..defaults
    };
    if let Err(e) = LoggingSystem::new(logging).initialize() {
        eprintln!("Failed to initialize logging: {}", e);
    }
    debug!(command = ?cli.command, "Starting cuesplit");

    let succeeded = commands::run(cli, &file).await?;

    if !succeeded {
        std::process::exit(1);
    }
    Ok(())
}
