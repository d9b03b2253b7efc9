//! Track boundary planning
//!
//! Turns cue sheet marks into the two forms the pipeline consumes: byte ranges
//! over a raw PCM stream and `-ss`/`-t` timestamps for seek-based extraction.

use serde::Serialize;

use crate::domain::model::{CueCatalog, PcmFormat};

pub mod boundary;

pub use boundary::{BoundaryConverter, ByteRange, SeekBounds};

/// Both boundary representations of one track
#[derive(Debug, Clone, Serialize)]
pub struct TrackPlan {
    pub number: u32,
    pub title: String,
    pub bytes: ByteRange,
    pub seek: SeekBounds,
}

/// Per-track plan for a whole catalog
#[derive(Debug, Clone, Serialize)]
pub struct CatalogPlan {
    pub pcm: PcmFormat,
    pub tracks: Vec<TrackPlan>,
}

impl CatalogPlan {
    pub fn build(catalog: &CueCatalog, converter: &BoundaryConverter) -> Self {
        let tracks = catalog
            .iter()
            .map(|entry| TrackPlan {
                number: entry.number,
                title: entry.title.clone(),
                bytes: converter.byte_range(entry),
                seek: converter.seek_bounds(entry),
            })
            .collect();

        Self {
            pcm: *converter.pcm(),
            tracks,
        }
    }

    /// Total bytes covered by the plan, first start included
    pub fn total_bytes(&self) -> u64 {
        self.tracks.last().map_or(0, |t| t.bytes.end())
    }
}
