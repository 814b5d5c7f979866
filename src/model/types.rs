//! Core type definitions shared by the engine and the CLI

use serde::{Deserialize, Serialize};

/// Where playable audio comes from
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PlaybackSource {
    /// Catalog preview clips (the track's `preview_url`)
    #[default]
    Spotify,
    /// Full-length audio matched on the external video index
    YouTube,
}

impl std::fmt::Display for PlaybackSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PlaybackSource::Spotify => write!(f, "spotify"),
            PlaybackSource::YouTube => write!(f, "youtube"),
        }
    }
}

/// What kind of remote resource a session plays
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum CollectionKind {
    Single,
    Album,
    Playlist,
}

impl CollectionKind {
    pub fn from_uri_segment(segment: &str) -> Option<Self> {
        match segment {
            "track" => Some(Self::Single),
            "album" => Some(Self::Album),
            "playlist" => Some(Self::Playlist),
            _ => None,
        }
    }
}

/// Everything needed to start playing a collection
#[derive(Clone, Debug)]
pub struct CollectionRequest {
    pub kind: CollectionKind,
    /// Catalog endpoint listing the collection's tracks (or the track itself for `Single`)
    pub tracks_href: String,
    /// Total number of tracks, 0 when unknown
    pub total: usize,
    /// Display name for messages
    pub name: String,
}

/// Which edge of the window a load extends
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum LoadDirection {
    Forward,
    Backward,
}
