//! cuesplit library
//!
//! Cue-sheet driven track segmentation and streaming transcoding. The crate
//! never touches sample data itself: it plans byte and timestamp boundaries
//! from a cue sheet and drives external `ffmpeg` and `qaac` processes.

pub mod adapters;
pub mod app;
pub mod cli;
pub mod config_initialization;
pub mod cue;
pub mod domain;
pub mod engine;
pub mod error;
pub mod planner;
pub mod ports;
pub mod utils;

// Re-export commonly used types
pub use app::{ConvertInteractor, TrackPipeline};
pub use cue::CueSheetParser;
pub use domain::errors::DomainError;
pub use domain::model::{CueCatalog, CueTime, RunConfig, TrackEntry, TranscodeFormat};
pub use error::{CueSplitError, CueSplitResult};
