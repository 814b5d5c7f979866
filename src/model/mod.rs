//! Model module - Data types and remote clients
//!
//! It is organized into submodules by responsibility:
//!
//! - `types`: Core type definitions (playback source, collection kind, requests)
//! - `track`: Track, album and artist descriptors parsed from catalog JSON
//! - `playback`: Playable sources and the metadata shown for them
//! - `spotify_client`: Spotify catalog client wrapper
//! - `video_index`: Innertube client for the external video index

mod types;
mod track;
mod playback;
mod spotify_client;
mod video_index;

// Re-export all public types for convenient access
pub use types::{CollectionKind, CollectionRequest, LoadDirection, PlaybackSource};

pub use track::{Album, Artist, Track};

pub use playback::{AudioLocator, ResolvedSource, TrackMetadata};

pub use spotify_client::{parse_collection_uri, SpotifyClient};

pub use video_index::InnertubeClient;
