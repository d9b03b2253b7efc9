// Domain errors - Error types for the domain layer

use std::fmt;
use std::path::PathBuf;

/// Domain-specific error types
#[derive(Debug, Clone)]
pub enum DomainError {
    /// Invalid arguments provided
    BadArgs(String),
    /// Cue sheet missing
    CueNotFound(PathBuf),
    /// Cue sheet present but unreadable
    CueUnreadable { path: PathBuf, message: String },
    /// Destination directory could not be created for a reason other than "already exists"
    DirectoryCreate { path: PathBuf, message: String },
    /// Decode stream ended before the track quota was consumed
    StreamUnderrun { track: u32, expected: u64, received: u64 },
    /// Final rename still failing after every retry
    RenameRetryExhausted { from: PathBuf, to: PathBuf, attempts: u32 },
    /// Decoder or encoder subprocess failed or could not be reached
    ExternalProcess { process: String, message: String },
    /// Filesystem operation failed
    FsFail(String),
}

impl DomainError {
    /// Shorthand for a failing subprocess
    pub fn process(process: impl Into<String>, message: impl Into<String>) -> Self {
        DomainError::ExternalProcess {
            process: process.into(),
            message: message.into(),
        }
    }

    /// Classify the error for run reports
    pub fn kind(&self) -> FailureKind {
        match self {
            DomainError::BadArgs(_) => FailureKind::BadArgs,
            DomainError::CueNotFound(_) | DomainError::CueUnreadable { .. } => FailureKind::CueParse,
            DomainError::DirectoryCreate { .. } => FailureKind::DirectoryCreate,
            DomainError::StreamUnderrun { .. } => FailureKind::StreamUnderrun,
            DomainError::RenameRetryExhausted { .. } => FailureKind::RenameRetryExhausted,
            DomainError::ExternalProcess { .. } => FailureKind::ExternalProcess,
            DomainError::FsFail(_) => FailureKind::Filesystem,
        }
    }
}

/// Failure classes surfaced to observers and JSON reports
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureKind {
    BadArgs,
    CueParse,
    DirectoryCreate,
    StreamUnderrun,
    RenameRetryExhausted,
    ExternalProcess,
    Filesystem,
}

impl fmt::Display for DomainError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DomainError::BadArgs(msg) => write!(f, "Bad arguments: {}", msg),
            DomainError::CueNotFound(path) => write!(f, "Cue sheet not found: {}", path.display()),
            DomainError::CueUnreadable { path, message } => {
                write!(f, "Cue sheet unreadable: {}: {}", path.display(), message)
            }
            DomainError::DirectoryCreate { path, message } => {
                write!(f, "Failed to create directory {}: {}", path.display(), message)
            }
            DomainError::StreamUnderrun {
                track,
                expected,
                received,
            } => write!(
                f,
                "Decode stream ended early in track {}: {} of {} bytes",
                track, received, expected
            ),
            DomainError::RenameRetryExhausted { from, to, attempts } => write!(
                f,
                "Error renaming from \"{}\" to \"{}\" after {} attempts",
                from.display(),
                to.display(),
                attempts
            ),
            DomainError::ExternalProcess { process, message } => {
                write!(f, "External process {} failed: {}", process, message)
            }
            DomainError::FsFail(msg) => write!(f, "Filesystem error: {}", msg),
        }
    }
}

impl std::error::Error for DomainError {}
