//! Cue sheet parsing and lookup

use std::path::{Path, PathBuf};

pub mod parser;

pub use parser::CueSheetParser;

/// Suffixes tried next to a disc image, in order
pub const CUE_SUFFIXES: &[&str] = &[".cue", ".ape.cue", ".flac.cue", ".wav.cue"];

/// Find the cue sheet for a disc image
///
/// An explicit override always wins. Otherwise the first existing
/// `<stem><suffix>` from [`CUE_SUFFIXES`] is used, falling back to
/// `<image>.cue` so the caller gets a meaningful `CueNotFound` path.
pub fn locate_cue(image: &Path, cue_override: Option<&Path>) -> PathBuf {
    if let Some(cue) = cue_override {
        return cue.to_path_buf();
    }

    let stem = image.with_extension("");
    for suffix in CUE_SUFFIXES {
        let mut candidate = stem.clone().into_os_string();
        candidate.push(suffix);
        let candidate = PathBuf::from(candidate);
        if candidate.is_file() {
            return candidate;
        }
    }

    let mut fallback = image.as_os_str().to_os_string();
    fallback.push(".cue");
    PathBuf::from(fallback)
}
