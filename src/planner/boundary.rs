//! Cue mark to byte offset and timestamp conversion

use serde::Serialize;

use crate::domain::model::{CueTime, PcmFormat, TrackEntry};
use crate::utils::time::format_hms_millis;

/// Track position as ffmpeg seek arguments
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SeekBounds {
    /// `HH:MM:SS.mmm` for `-ss`
    pub start: String,
    /// `HH:MM:SS.mmm` for `-t`
    pub duration: String,
    pub start_ms: u64,
    pub duration_ms: u64,
}

/// Track position within a raw PCM stream
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ByteRange {
    pub start: u64,
    pub length: u64,
}

impl ByteRange {
    pub fn end(&self) -> u64 {
        self.start + self.length
    }
}

/// Pure conversion of cue marks for a fixed PCM layout
#[derive(Debug, Clone, Copy, Default)]
pub struct BoundaryConverter {
    pcm: PcmFormat,
}

impl BoundaryConverter {
    pub fn new(pcm: PcmFormat) -> Self {
        Self { pcm }
    }

    pub fn pcm(&self) -> &PcmFormat {
        &self.pcm
    }

    /// Seek arguments; the duration is `ms(end) - ms(start)` so rounding never accumulates
    pub fn seek_bounds(&self, entry: &TrackEntry) -> SeekBounds {
        self.seek_between(entry.start, entry.end())
    }

    pub fn seek_between(&self, start: CueTime, end: CueTime) -> SeekBounds {
        let start_ms = start.to_millis();
        let duration_ms = end.to_millis().saturating_sub(start_ms);

        SeekBounds {
            start: format_hms_millis(start_ms),
            duration: format_hms_millis(duration_ms),
            start_ms,
            duration_ms,
        }
    }

    /// Exact byte range in the decoded stream
    pub fn byte_range(&self, entry: &TrackEntry) -> ByteRange {
        self.bytes_between(entry.start, entry.end())
    }

    pub fn bytes_between(&self, start: CueTime, end: CueTime) -> ByteRange {
        let start = start.to_byte_offset(&self.pcm);
        let end = end.to_byte_offset(&self.pcm);

        ByteRange {
            start,
            length: end.saturating_sub(start),
        }
    }
}
