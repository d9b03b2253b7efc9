// Ports - Interface definitions (contracts)

use std::path::{Path, PathBuf};
use std::time::Duration;

use async_trait::async_trait;

use crate::domain::errors::*;
use crate::domain::model::*;
use crate::planner::SeekBounds;

/// Where an encoder reads its audio from
#[derive(Debug, Clone, PartialEq)]
pub enum EncodeInput {
    /// Raw interleaved PCM written to the encoder's stdin
    RawPcm(PcmFormat),
    /// A file on disk, optionally limited to one track
    File {
        path: PathBuf,
        seek: Option<SeekBounds>,
    },
}

/// One encoder invocation
#[derive(Debug, Clone)]
pub struct EncodeJob<'a> {
    pub profile: &'a TranscodeProfile,
    /// Track tags, mapped to container keys by the profile's metadata style
    pub tags: &'a [(MetadataTag, String)],
    /// User supplied `KEY=VALUE` pairs passed through verbatim
    pub extra_metadata: &'a [(String, String)],
    pub input: EncodeInput,
    /// Path the encoder writes to (a temporary file, renamed afterwards)
    pub output: PathBuf,
}

/// Read side of a running decoder
#[async_trait]
pub trait DecodeStream: Send {
    /// Read up to `buf.len()` bytes; `Ok(0)` means end of stream
    async fn read(&mut self, buf: &mut [u8]) -> Result<usize, DomainError>;

    /// Stop the decoder without consuming the rest of its output
    async fn terminate(&mut self) -> Result<(), DomainError>;
}

/// Write side of a running encoder
#[async_trait]
pub trait EncodeSink: Send {
    async fn write_all(&mut self, buf: &[u8]) -> Result<(), DomainError>;

    /// Close the input, wait up to `grace` for exit, kill the process if it is still running
    async fn finish(&mut self, grace: Duration) -> Result<(), DomainError>;
}

/// Port for driving the external transcoders
#[async_trait]
pub trait TranscodePort: Send + Sync {
    /// Start a decoder producing raw PCM for the whole source
    async fn spawn_decoder(
        &self,
        source: &Path,
        pcm: &PcmFormat,
    ) -> Result<Box<dyn DecodeStream>, DomainError>;

    /// Start an encoder reading raw PCM from its input
    async fn spawn_encoder(&self, job: &EncodeJob<'_>) -> Result<Box<dyn EncodeSink>, DomainError>;

    /// Run a file-input encode to completion
    async fn run(&self, job: &EncodeJob<'_>) -> Result<(), DomainError>;

    /// Decode the whole source once to a WAV file
    async fn decode_to_wav(&self, source: &Path, wav: &Path) -> Result<(), DomainError>;
}

/// Port for file system operations
#[async_trait]
pub trait FsPort: Send + Sync {
    /// Check if a file or directory exists
    async fn exists(&self, path: &Path) -> bool;

    /// Path form the external programs can open
    async fn safe_alias(&self, path: &Path) -> PathBuf;

    /// Create a directory and its parents; an existing directory is fine
    async fn create_dir_all(&self, path: &Path) -> Result<(), DomainError>;

    /// Create a collision-free temporary file next to `final_dest`
    async fn temp_output_path(&self, final_dest: &Path, extension: &str)
        -> Result<PathBuf, DomainError>;

    /// Single rename attempt
    async fn rename(&self, from: &Path, to: &Path) -> Result<(), DomainError>;

    async fn remove_file(&self, path: &Path) -> Result<(), DomainError>;
}
