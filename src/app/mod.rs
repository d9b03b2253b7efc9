// Application layer - Use case interactors

use std::path::{Path, PathBuf};
use std::time::Duration;

use tracing::debug;

use crate::domain::errors::DomainError;
use crate::ports::FsPort;

pub mod container;
pub mod convert_interactor;
pub mod track_pipeline;

// Re-export interactors
pub use container::{AppContainer, DefaultAppContainer};
pub use convert_interactor::ConvertInteractor;
pub use track_pipeline::TrackPipeline;

/// Temporary output prepared for one encode
pub(crate) struct PreparedOutput {
    /// Temporary file, renamed to the destination once the encode succeeds
    pub temp: PathBuf,
    /// Form of `temp` handed to the encoder
    pub alias: PathBuf,
}

/// Create the destination directory and a temporary output next to `dest`
pub(crate) async fn prepare_output(
    fs: &dyn FsPort,
    dest: &Path,
    extension: &str,
) -> Result<PreparedOutput, DomainError> {
    if let Some(parent) = dest.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs.create_dir_all(parent).await?;
    }
    let temp = fs.temp_output_path(dest, extension).await?;
    let alias = fs.safe_alias(&temp).await;
    Ok(PreparedOutput { temp, alias })
}

/// Rename `from` to `to`, retrying while the encoder may still hold the file
pub(crate) async fn rename_with_retry(
    fs: &dyn FsPort,
    from: &Path,
    to: &Path,
    attempts: u32,
    interval: Duration,
) -> Result<(), DomainError> {
    let attempts = attempts.max(1);
    for attempt in 1..=attempts {
        match fs.rename(from, to).await {
            Ok(()) => return Ok(()),
            Err(e) => {
                debug!(attempt = attempt, error = %e, "Rename failed");
                if attempt < attempts {
                    tokio::time::sleep(interval).await;
                }
            }
        }
    }

    Err(DomainError::RenameRetryExhausted {
        from: from.to_path_buf(),
        to: to.to_path_buf(),
        attempts,
    })
}

/// Rename after a successful encode, or drop the temporary file after a failed one
///
/// A temporary file whose rename kept failing is left in place.
pub(crate) async fn finalize_output(
    fs: &dyn FsPort,
    output: &PreparedOutput,
    dest: &Path,
    encoded: Result<(), DomainError>,
    attempts: u32,
    interval: Duration,
) -> Result<(), DomainError> {
    if let Err(e) = encoded {
        if let Err(cleanup) = fs.remove_file(&output.temp).await {
            debug!(path = %output.temp.display(), error = %cleanup, "Could not remove temporary output");
        }
        return Err(e);
    }

    rename_with_retry(fs, &output.temp, dest, attempts, interval).await
}
