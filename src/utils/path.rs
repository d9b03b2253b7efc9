//! Destination path mapping

use std::io;
use std::path::{Path, PathBuf};

/// Prefix for in-progress output files
pub const TEMP_PREFIX: &str = ".cuesplit-";

/// Maps source paths onto destination paths
pub struct PathMapper;

impl PathMapper {
    /// Join the last `preserve` segments of `source` onto `dest_root`
    ///
    /// ```text
    /// C:/A0/A1/A2/F.x + X:/B  ->  X:/B/F.x        preserve == 1
    ///                         ->  X:/B/A2/F.x     preserve == 2
    ///                         ->  X:/B/A1/A2/F.x  preserve == 3
    /// ```
    ///
    /// Backslashes count as separators, a leading drive or root is dropped and
    /// `preserve` is clamped to `[1, segments - 1]` (the file name counts).
    pub fn merge(source: &Path, dest_root: &Path, preserve: usize) -> PathBuf {
        let normalized = source.to_string_lossy().replace('\\', "/");
        let mut segments: Vec<&str> = normalized.split('/').filter(|s| !s.is_empty()).collect();
        if segments.first().is_some_and(|s| s.contains(':')) {
            segments.remove(0);
        }

        let upper = segments.len().saturating_sub(1).max(1);
        let preserve = preserve.clamp(1, upper).min(segments.len());

        let mut dest = dest_root.to_path_buf();
        for segment in &segments[segments.len() - preserve..] {
            dest.push(segment);
        }
        dest
    }

    /// Create an empty, uniquely named temporary file next to `final_dest`
    ///
    /// The file lives in the destination directory so the final rename never
    /// crosses a filesystem boundary.
    pub fn temp_output_path(final_dest: &Path, extension: &str) -> io::Result<PathBuf> {
        let dir = match final_dest.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent,
            _ => Path::new("."),
        };

        let suffix = format!(".{}", extension.trim_start_matches('.'));
        let file = tempfile::Builder::new()
            .prefix(TEMP_PREFIX)
            .suffix(&suffix)
            .tempfile_in(dir)?;
        let (_, path) = file.keep().map_err(|e| e.error)?;
        Ok(path)
    }

    /// Destination of one extracted track
    pub fn track_destination(
        image: &Path,
        display_name: &str,
        extension: &str,
        dest_root: Option<&Path>,
        preserve: usize,
    ) -> PathBuf {
        let file_name = format!("{}.{}", display_name, extension);
        let local = match image.parent() {
            Some(dir) => dir.join(file_name),
            None => PathBuf::from(file_name),
        };

        match dest_root {
            Some(root) => Self::merge(&local, root, preserve),
            None => local,
        }
    }

    /// Destination of one whole-file conversion
    pub fn converted_destination(
        source: &Path,
        extension: &str,
        dest_root: Option<&Path>,
        preserve: usize,
    ) -> PathBuf {
        let local = source.with_extension(extension);
        match dest_root {
            Some(root) => Self::merge(&local, root, preserve),
            None => local,
        }
    }
}
