// Domain models - Core types and data structures

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

use serde::Serialize;

use crate::domain::errors::DomainError;

mod config;
mod profile;

pub use config::*;
pub use profile::*;

/// CD timing: one frame is 1/75 of a second
pub const FRAMES_PER_SECOND: u64 = 75;

const FRAMES_PER_MINUTE: u64 = FRAMES_PER_SECOND * 60;

/// Cue sheet timestamp (minutes:seconds:frames), stored as a total frame count
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize)]
pub struct CueTime {
    frames: u64,
}

impl CueTime {
    /// Create a timestamp from its components, validating the sub-minute fields
    pub fn new(minutes: u32, seconds: u32, frames: u32) -> Result<Self, DomainError> {
        if seconds >= 60 {
            return Err(DomainError::BadArgs(format!(
                "Seconds must be less than 60, got {}",
                seconds
            )));
        }
        if u64::from(frames) >= FRAMES_PER_SECOND {
            return Err(DomainError::BadArgs(format!(
                "Frames must be less than 75, got {}",
                frames
            )));
        }
        Ok(Self {
            frames: u64::from(minutes) * FRAMES_PER_MINUTE
                + u64::from(seconds) * FRAMES_PER_SECOND
                + u64::from(frames),
        })
    }

    /// Create a timestamp from a total frame count
    pub fn from_frames(frames: u64) -> Self {
        Self { frames }
    }

    /// End-of-disc mark placed after the last real INDEX entry (99:00:00)
    pub fn sentinel() -> Self {
        Self {
            frames: 99 * FRAMES_PER_MINUTE,
        }
    }

    /// Parse the `MM:SS:FF` form used by INDEX directives
    pub fn parse(msf: &str) -> Result<Self, DomainError> {
        let parts: Vec<&str> = msf.trim().split(':').collect();
        if parts.len() != 3 {
            return Err(DomainError::BadArgs(format!(
                "Invalid MSF timestamp: {}",
                msf
            )));
        }

        let field = |s: &str| {
            s.parse::<u32>()
                .map_err(|_| DomainError::BadArgs(format!("Invalid MSF timestamp: {}", msf)))
        };

        Self::new(field(parts[0])?, field(parts[1])?, field(parts[2])?)
    }

    pub fn total_frames(&self) -> u64 {
        self.frames
    }

    pub fn minutes(&self) -> u64 {
        self.frames / FRAMES_PER_MINUTE
    }

    pub fn seconds(&self) -> u64 {
        (self.frames / FRAMES_PER_SECOND) % 60
    }

    /// Frames within the current second
    pub fn frames(&self) -> u64 {
        self.frames % FRAMES_PER_SECOND
    }

    /// Milliseconds, rounding the frame part to the nearest millisecond
    pub fn to_millis(&self) -> u64 {
        self.minutes() * 60_000 + self.seconds() * 1_000 + (self.frames() * 2_000 + 75) / 150
    }

    /// Byte offset of this mark in a raw PCM rendering of the disc
    pub fn to_byte_offset(&self, pcm: &PcmFormat) -> u64 {
        let bps = pcm.bytes_per_second();
        self.minutes() * 60 * bps + self.seconds() * bps + self.frames() * pcm.bytes_per_frame()
    }

    pub fn checked_sub(self, earlier: CueTime) -> Option<CueTime> {
        self.frames.checked_sub(earlier.frames).map(Self::from_frames)
    }

    pub fn saturating_add(self, other: CueTime) -> CueTime {
        Self::from_frames(self.frames.saturating_add(other.frames))
    }
}

impl fmt::Display for CueTime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{:02}:{:02}:{:02}",
            self.minutes(),
            self.seconds(),
            self.frames()
        )
    }
}

/// Raw interleaved PCM layout produced by the decoder
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct PcmFormat {
    pub sample_rate: u32,
    pub channels: u16,
    pub bytes_per_sample: u16,
}

impl PcmFormat {
    /// Red Book audio: 44.1 kHz, 16-bit, stereo
    pub const CD: PcmFormat = PcmFormat {
        sample_rate: 44_100,
        channels: 2,
        bytes_per_sample: 2,
    };

    pub fn bytes_per_second(&self) -> u64 {
        u64::from(self.sample_rate) * u64::from(self.channels) * u64::from(self.bytes_per_sample)
    }

    /// Bytes per CD frame (2352 for Red Book audio)
    pub fn bytes_per_frame(&self) -> u64 {
        self.bytes_per_second() / FRAMES_PER_SECOND
    }

    /// ffmpeg sample format name for this layout
    pub fn ffmpeg_sample_format(&self) -> &'static str {
        match self.bytes_per_sample {
            1 => "u8",
            3 => "s24le",
            4 => "s32le",
            _ => "s16le",
        }
    }
}

impl Default for PcmFormat {
    fn default() -> Self {
        Self::CD
    }
}

/// Metadata carried per track, mapped to container-specific keys by the profile
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum MetadataTag {
    TrackNumber,
    Performer,
    Title,
    Album,
    AlbumPerformer,
}

/// One track of a parsed cue sheet
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TrackEntry {
    pub number: u32,
    /// Display name used for the output file, e.g. `03 Some Title`
    pub title: String,
    pub start: CueTime,
    pub duration: CueTime,
    pub metadata: Vec<(MetadataTag, String)>,
}

impl TrackEntry {
    pub fn end(&self) -> CueTime {
        self.start.saturating_add(self.duration)
    }

    /// First value recorded for a tag, if any
    pub fn tag(&self, tag: MetadataTag) -> Option<&str> {
        self.metadata
            .iter()
            .find(|(t, _)| *t == tag)
            .map(|(_, v)| v.as_str())
    }
}

/// Ordered, immutable catalog of the tracks in one cue sheet
#[derive(Debug, Clone, Default, Serialize)]
pub struct CueCatalog {
    tracks: BTreeMap<u32, TrackEntry>,
    album: Option<String>,
    album_performer: Option<String>,
}

impl CueCatalog {
    /// Build a catalog; track numbers must run 1..=N without gaps
    pub fn new(
        entries: Vec<TrackEntry>,
        album: Option<String>,
        album_performer: Option<String>,
    ) -> Result<Self, DomainError> {
        let mut tracks = BTreeMap::new();
        for (index, entry) in entries.into_iter().enumerate() {
            let expected = index as u32 + 1;
            if entry.number != expected {
                return Err(DomainError::BadArgs(format!(
                    "Track numbers must be contiguous: expected {}, got {}",
                    expected, entry.number
                )));
            }
            tracks.insert(entry.number, entry);
        }

        Ok(Self {
            tracks,
            album,
            album_performer,
        })
    }

    pub fn track_count(&self) -> u32 {
        self.tracks.len() as u32
    }

    pub fn is_empty(&self) -> bool {
        self.tracks.is_empty()
    }

    pub fn get(&self, number: u32) -> Option<&TrackEntry> {
        self.tracks.get(&number)
    }

    /// Tracks in ascending track-number order
    pub fn iter(&self) -> impl Iterator<Item = &TrackEntry> {
        self.tracks.values()
    }

    pub fn album(&self) -> Option<&str> {
        self.album.as_deref()
    }

    pub fn album_performer(&self) -> Option<&str> {
        self.album_performer.as_deref()
    }
}

/// User-selected subset of tracks (`1,3,5-9`); empty means every track
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TrackSelection {
    tracks: Option<BTreeSet<u32>>,
}

impl TrackSelection {
    pub fn all() -> Self {
        Self { tracks: None }
    }

    /// Parse a comma separated list of numbers and inclusive ranges
    pub fn parse(list: &str) -> Result<Self, DomainError> {
        let list = list.trim();
        if list.is_empty() {
            return Ok(Self::all());
        }

        let number = |s: &str| {
            s.trim()
                .parse::<u32>()
                .map_err(|_| DomainError::BadArgs(format!("Invalid track number '{}' in list '{}'", s, list)))
        };

        let mut tracks = BTreeSet::new();
        for item in list.split(',').map(str::trim).filter(|s| !s.is_empty()) {
            match item.split_once('-') {
                Some((first, last)) => {
                    let (first, last) = (number(first)?, number(last)?);
                    if first > last {
                        return Err(DomainError::BadArgs(format!(
                            "Invalid track range '{}': start exceeds end",
                            item
                        )));
                    }
                    tracks.extend(first..=last);
                }
                None => {
                    tracks.insert(number(item)?);
                }
            }
        }

        Ok(Self {
            tracks: Some(tracks),
        })
    }

    pub fn contains(&self, track: u32) -> bool {
        self.tracks.as_ref().map_or(true, |set| set.contains(&track))
    }

    pub fn is_all(&self) -> bool {
        self.tracks.is_none()
    }
}

/// How the disc image is decoded before per-track encoding
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum DecodeStrategy {
    /// One continuous raw decode sliced by byte offsets
    #[default]
    Stream,
    /// Decode to an intermediate WAV once, then one seek/duration encode per track
    Seek,
}

impl DecodeStrategy {
    pub fn parse(strategy: &str) -> Result<Self, DomainError> {
        match strategy.trim().to_lowercase().as_str() {
            "stream" | "byte" | "bytes" => Ok(DecodeStrategy::Stream),
            "seek" | "time" => Ok(DecodeStrategy::Seek),
            other => Err(DomainError::BadArgs(format!(
                "Invalid decode strategy: {}. Valid strategies: stream, seek",
                other
            ))),
        }
    }
}
