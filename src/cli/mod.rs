//! CLI module for cuesplit
//!
//! This module handles command-line argument parsing and command execution.

use std::path::PathBuf;

use clap::{Parser, Subcommand};

use crate::utils::logging::{LogFormat, LogLevel};

pub mod args;
pub mod commands;
pub mod progress;

/// cuesplit
///
/// Split compressed disc images into tracks using their cue sheets, and
/// convert lossless libraries to lossy formats, by driving ffmpeg and qaac.
#[derive(Parser, Debug)]
#[command(name = "cuesplit")]
#[command(about = "Cue sheet driven track extraction and lossless to lossy conversion")]
#[command(version)]
#[command(long_about = None)]
pub struct Cli {
    /// Logging level (RUST_LOG takes precedence)
    #[arg(long, value_enum, global = true, env = "CUESPLIT_LOG_LEVEL")]
    pub log_level: Option<LogLevel>,

    /// Log output format
    #[arg(long, value_enum, global = true, env = "CUESPLIT_LOG_FORMAT")]
    pub log_format: Option<LogFormat>,

    /// Configuration file (default: ./cuesplit.toml, then %APPDATA%/cuesplit/config.toml)
    #[arg(long, global = true, env = "CUESPLIT_CONFIG")]
    pub config: Option<PathBuf>,

    /// ffmpeg executable
    #[arg(long, global = true, env = "CUESPLIT_FFMPEG")]
    pub ffmpeg: Option<PathBuf>,

    /// qaac executable
    #[arg(long, global = true, env = "CUESPLIT_QAAC")]
    pub qaac: Option<PathBuf>,

    /// The command to execute
    #[command(subcommand)]
    pub command: Commands,
}

/// Available commands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Split disc images into tracks using their cue sheets
    Extract(args::ExtractArgs),
    /// Convert every lossless file under the given directories
    Convert(args::ConvertArgs),
    /// Show the tracks and boundaries of a cue sheet
    Inspect(args::InspectArgs),
}
