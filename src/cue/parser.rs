//! Line-oriented cue sheet parser
//!
//! Only the directives needed for track segmentation are recognised:
//! `TRACK`, `PERFORMER`, `TITLE` and `INDEX 01`. Everything else is skipped.

use std::borrow::Cow;
use std::io;
use std::path::Path;
use std::sync::OnceLock;

use encoding_rs::Encoding;
use regex::Regex;
use tracing::{debug, warn};

use crate::domain::errors::DomainError;
use crate::domain::model::*;

const UTF8_BOM: &[u8] = b"\xEF\xBB\xBF";

struct Directives {
    track: Regex,
    performer: Regex,
    title: Regex,
    index: Regex,
}

impl Directives {
    fn compile() -> Result<Self, regex::Error> {
        Ok(Self {
            track: Regex::new(r"(?i)^\s*TRACK\s+(\d{2,})")?,
            performer: Regex::new(r"(?i)^\s*PERFORMER\s+(.+)")?,
            title: Regex::new(r"(?i)^\s*TITLE\s+(.+)")?,
            index: Regex::new(r"(?i)^\s*INDEX\s+01\s+(\d{2}:\d{2}:\d{2})\b")?,
        })
    }
}

fn directives() -> Result<&'static Directives, DomainError> {
    static DIRECTIVES: OnceLock<Result<Directives, regex::Error>> = OnceLock::new();
    DIRECTIVES
        .get_or_init(Directives::compile)
        .as_ref()
        .map_err(|e| DomainError::BadArgs(format!("Cue directive pattern failed to compile: {}", e)))
}

/// Track block accumulated while reading lines
#[derive(Debug, Default)]
struct PendingTrack {
    cue_number: String,
    title: Option<String>,
    performers: Vec<String>,
    index: Option<CueTime>,
}

/// Parses cue sheets into a [`CueCatalog`]
#[derive(Clone)]
pub struct CueSheetParser {
    encodings: Vec<&'static Encoding>,
    title_transform: Option<TitleTransform>,
}

impl CueSheetParser {
    pub fn new(encodings: Vec<&'static Encoding>, title_transform: Option<TitleTransform>) -> Self {
        Self {
            encodings,
            title_transform,
        }
    }

    pub fn from_config(config: &RunConfig) -> Self {
        Self::new(config.cue_encodings.clone(), config.title_transform.clone())
    }

    /// Read and parse a cue sheet from disk
    pub fn parse_file(&self, path: &Path) -> Result<CueCatalog, DomainError> {
        let bytes = std::fs::read(path).map_err(|e| match e.kind() {
            io::ErrorKind::NotFound => DomainError::CueNotFound(path.to_path_buf()),
            _ => DomainError::CueUnreadable {
                path: path.to_path_buf(),
                message: e.to_string(),
            },
        })?;

        debug!(path = %path.display(), bytes = bytes.len(), "Parsing cue sheet");
        self.parse_bytes(path, &bytes)
    }

    /// Parse raw cue sheet bytes; `origin` is only used for error reporting
    pub fn parse_bytes(&self, origin: &Path, bytes: &[u8]) -> Result<CueCatalog, DomainError> {
        let bytes = bytes.strip_prefix(UTF8_BOM).unwrap_or(bytes);
        let re = directives()?;

        let mut album = None;
        let mut album_performer = None;
        let mut tracks: Vec<PendingTrack> = Vec::new();

        for raw in bytes.split(|b| *b == b'\n') {
            let line = self.decode_line(raw);
            let line = line.trim_end_matches(['\r', '\n']);

            if let Some(caps) = re.track.captures(line) {
                tracks.push(PendingTrack {
                    cue_number: caps[1].to_string(),
                    ..PendingTrack::default()
                });
                continue;
            }

            if let Some(caps) = re.performer.captures(line) {
                let performer = unquote(&caps[1]);
                match tracks.last_mut() {
                    Some(track) => track.performers.push(performer),
                    None => album_performer = Some(performer),
                }
                continue;
            }

            if let Some(caps) = re.title.captures(line) {
                let title = unquote(&caps[1]);
                match tracks.last_mut() {
                    Some(track) => track.title = Some(title),
                    None => album = Some(title),
                }
                continue;
            }

            if let Some(caps) = re.index.captures(line) {
                let Some(track) = tracks.last_mut() else {
                    debug!(line = line, "INDEX 01 outside a track block, ignored");
                    continue;
                };
                match CueTime::parse(&caps[1]) {
                    Ok(mark) => track.index = Some(mark),
                    Err(e) => debug!(line = line, error = %e, "Malformed INDEX 01, ignored"),
                }
            }
        }

        self.build_catalog(origin, tracks, album, album_performer)
    }

    fn build_catalog(
        &self,
        origin: &Path,
        pending: Vec<PendingTrack>,
        album: Option<String>,
        album_performer: Option<String>,
    ) -> Result<CueCatalog, DomainError> {
        let mut indexed = Vec::with_capacity(pending.len());
        for track in pending {
            match track.index {
                Some(mark) => indexed.push((track, mark)),
                None => warn!(
                    cue = %origin.display(),
                    track = %track.cue_number,
                    "Track has no INDEX 01 mark and is dropped"
                ),
            }
        }

        let mut marks: Vec<CueTime> = indexed.iter().map(|(_, mark)| *mark).collect();
        marks.push(CueTime::sentinel());

        let mut entries = Vec::with_capacity(indexed.len());
        for (position, (track, start)) in indexed.into_iter().enumerate() {
            let number = position as u32 + 1;
            let next = marks[position + 1];
            let duration = next.checked_sub(start).filter(|d| d.total_frames() > 0).ok_or_else(|| {
                DomainError::CueUnreadable {
                    path: origin.to_path_buf(),
                    message: format!(
                        "INDEX 01 marks must increase: track {} starts at {}, next mark is {}",
                        number, start, next
                    ),
                }
            })?;

            entries.push(self.entry(number, track, start, duration, &album, &album_performer));
        }

        let catalog = CueCatalog::new(entries, album, album_performer)?;
        debug!(cue = %origin.display(), tracks = catalog.track_count(), "Cue sheet parsed");
        Ok(catalog)
    }

    fn entry(
        &self,
        number: u32,
        track: PendingTrack,
        start: CueTime,
        duration: CueTime,
        album: &Option<String>,
        album_performer: &Option<String>,
    ) -> TrackEntry {
        let raw_title = track.title.unwrap_or_else(|| format!("Track {:02}", number));

        let display = format!("{:02} {}", number, sanitize_title(&raw_title));
        let title = match &self.title_transform {
            Some(transform) => transform(&display),
            None => display,
        };

        let mut metadata = vec![(MetadataTag::TrackNumber, track.cue_number)];
        metadata.extend(
            track
                .performers
                .into_iter()
                .map(|p| (MetadataTag::Performer, p)),
        );
        metadata.push((MetadataTag::Title, raw_title));
        if let Some(album) = album {
            metadata.push((MetadataTag::Album, album.clone()));
        }
        if let Some(performer) = album_performer {
            metadata.push((MetadataTag::AlbumPerformer, performer.clone()));
        }

        TrackEntry {
            number,
            title,
            start,
            duration,
            metadata,
        }
    }

    /// Decode one line with the first candidate encoding that accepts it
    fn decode_line<'a>(&self, raw: &'a [u8]) -> Cow<'a, str> {
        self.encodings
            .iter()
            .find_map(|encoding| encoding.decode_without_bom_handling_and_without_replacement(raw))
            .unwrap_or_else(|| String::from_utf8_lossy(raw))
    }
}

/// Strip a surrounding pair of double quotes
fn unquote(value: &str) -> String {
    let value = value.trim();
    value
        .strip_prefix('"')
        .and_then(|v| v.strip_suffix('"'))
        .unwrap_or(value)
        .to_string()
}

/// Remove characters that are not allowed in file names
pub fn sanitize_title(title: &str) -> String {
    title
        .chars()
        .filter(|c| !matches!(c, '"' | ':' | '?' | '*' | '/' | '\\' | '\r' | '\n'))
        .collect::<String>()
        .trim()
        .to_string()
}
