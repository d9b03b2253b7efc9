// Windows filesystem adapter - File system operations with long-path handling

use std::io;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use tracing::debug;

use crate::domain::errors::*;
use crate::ports::*;
use crate::utils::path::PathMapper;

/// Paths at least this long get the `\\?\` prefix on Windows
#[cfg_attr(not(windows), allow(dead_code))]
const LONG_PATH_THRESHOLD: usize = 255;

#[cfg(windows)]
const VERBATIM_PREFIX: &str = r"\\?\";

/// Filesystem adapter; on Windows it works around `MAX_PATH` for us and for the transcoders
pub struct FsWindowsAdapter;

impl FsWindowsAdapter {
    pub fn new() -> Self {
        Self
    }

    /// Convert path to Windows long-path format if needed
    #[cfg(windows)]
    pub fn to_long_path(path: &Path) -> PathBuf {
        let text = path.to_string_lossy();
        if text.len() < LONG_PATH_THRESHOLD || text.starts_with(VERBATIM_PREFIX) {
            return path.to_path_buf();
        }

        let absolute = std::path::absolute(path).unwrap_or_else(|_| path.to_path_buf());
        let mut long = std::ffi::OsString::from(VERBATIM_PREFIX);
        long.push(absolute.as_os_str());
        PathBuf::from(long)
    }

    #[cfg(not(windows))]
    pub fn to_long_path(path: &Path) -> PathBuf {
        path.to_path_buf()
    }

    /// 8.3 short name of an existing path, without any verbatim prefix
    #[cfg(windows)]
    fn short_path(path: &Path) -> Option<PathBuf> {
        use std::ffi::OsString;
        use std::os::windows::ffi::{OsStrExt, OsStringExt};
        use winapi::um::fileapi::GetShortPathNameW;

        let wide: Vec<u16> = Self::to_long_path(path)
            .as_os_str()
            .encode_wide()
            .chain(Some(0))
            .collect();

        // SAFETY: `wide` is NUL terminated; a null buffer with zero length asks for the size
        let needed = unsafe { GetShortPathNameW(wide.as_ptr(), std::ptr::null_mut(), 0) };
        if needed == 0 {
            return None;
        }

        let mut buf = vec![0u16; needed as usize];
        // SAFETY: `buf` holds `needed` elements
        let written = unsafe { GetShortPathNameW(wide.as_ptr(), buf.as_mut_ptr(), needed) };
        if written == 0 || written >= needed {
            return None;
        }
        buf.truncate(written as usize);

        let short = OsString::from_wide(&buf);
        let short = short.to_string_lossy();
        Some(PathBuf::from(
            short.strip_prefix(VERBATIM_PREFIX).unwrap_or(&*short).to_string(),
        ))
    }

    #[cfg(not(windows))]
    fn short_path(path: &Path) -> Option<PathBuf> {
        Some(path.to_path_buf())
    }
}

impl Default for FsWindowsAdapter {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl FsPort for FsWindowsAdapter {
    async fn exists(&self, path: &Path) -> bool {
        tokio::fs::try_exists(Self::to_long_path(path))
            .await
            .unwrap_or(false)
    }

    async fn safe_alias(&self, path: &Path) -> PathBuf {
        match Self::short_path(path) {
            Some(alias) => alias,
            None => {
                debug!(path = %path.display(), "No short name available, using long path");
                Self::to_long_path(path)
            }
        }
    }

    async fn create_dir_all(&self, path: &Path) -> Result<(), DomainError> {
        tokio::fs::create_dir_all(Self::to_long_path(path))
            .await
            .map_err(|e| DomainError::DirectoryCreate {
                path: path.to_path_buf(),
                message: e.to_string(),
            })
    }

    async fn temp_output_path(
        &self,
        final_dest: &Path,
        extension: &str,
    ) -> Result<PathBuf, DomainError> {
        PathMapper::temp_output_path(&Self::to_long_path(final_dest), extension).map_err(|e| {
            DomainError::FsFail(format!(
                "Failed to create temporary file for {}: {}",
                final_dest.display(),
                e
            ))
        })
    }

    async fn rename(&self, from: &Path, to: &Path) -> Result<(), DomainError> {
        tokio::fs::rename(Self::to_long_path(from), Self::to_long_path(to))
            .await
            .map_err(|e| {
                DomainError::FsFail(format!(
                    "Failed to rename {} to {}: {}",
                    from.display(),
                    to.display(),
                    e
                ))
            })
    }

    async fn remove_file(&self, path: &Path) -> Result<(), DomainError> {
        match tokio::fs::remove_file(Self::to_long_path(path)).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(DomainError::FsFail(format!(
                "Failed to remove {}: {}",
                path.display(),
                e
            ))),
        }
    }
}
