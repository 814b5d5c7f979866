//! Playable sources handed to the queue

use std::sync::Arc;

use super::track::Track;

/// Metadata shown for a queued item
#[derive(Clone, Debug)]
pub struct TrackMetadata {
    pub name: String,
    pub artist: String,
    pub artists: Vec<String>,
    pub album: String,
    pub image_url: String,
    pub duration_ms: u32,
    pub uri: String,
}

impl TrackMetadata {
    pub fn from_track(track: &Track) -> Self {
        Self {
            name: track.name.clone(),
            artist: track.main_artist_name().to_string(),
            artists: track.artists.iter().map(|a| a.name.clone()).collect(),
            album: track.album.name.clone(),
            image_url: track.album.image_url.clone(),
            duration_ms: track.duration_ms,
            uri: format!("spotify:track:{}", track.id),
        }
    }
}

/// Concrete audio behind a queue entry
#[derive(Clone, Debug, Default)]
pub enum AudioLocator {
    /// Nothing playable was found
    #[default]
    Unresolved,
    /// Streamable URL (preview clip or adaptive audio stream)
    Remote(String),
    /// A fully downloaded muxed stream
    Buffered { data: Arc<Vec<u8>>, mime_type: String },
}

impl AudioLocator {
    pub fn is_resolved(&self) -> bool {
        match self {
            AudioLocator::Unresolved => false,
            AudioLocator::Remote(url) => !url.is_empty(),
            AudioLocator::Buffered { .. } => true,
        }
    }
}

/// A track paired with the audio that will play for it
#[derive(Clone, Debug)]
pub struct ResolvedSource {
    pub track: Track,
    pub locator: AudioLocator,
}

impl ResolvedSource {
    pub fn new(track: Track, locator: AudioLocator) -> Self {
        Self { track, locator }
    }

    pub fn unresolved(track: Track) -> Self {
        Self::new(track, AudioLocator::Unresolved)
    }

    pub fn is_resolved(&self) -> bool {
        self.locator.is_resolved()
    }

    /// Id the queue tags this source with
    pub fn entry_id(&self) -> &str {
        &self.track.id
    }

    pub fn metadata(&self) -> TrackMetadata {
        TrackMetadata::from_track(&self.track)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_remote_url_is_unresolved() {
        assert!(!AudioLocator::Remote(String::new()).is_resolved());
        assert!(AudioLocator::Remote("https://a/b.mp3".into()).is_resolved());
        assert!(!AudioLocator::Unresolved.is_resolved());
    }

    #[test]
    fn metadata_uses_main_artist_and_album_art() {
        let mut track = Track {
            id: "abc".into(),
            name: "Song".into(),
            ..Default::default()
        };
        track.album.name = "Record".into();
        track.album.image_url = "https://img".into();
        track.artists.push(super::super::track::Artist { name: "Band".into() });

        let meta = ResolvedSource::unresolved(track).metadata();
        assert_eq!(meta.artist, "Band");
        assert_eq!(meta.image_url, "https://img");
        assert_eq!(meta.uri, "spotify:track:abc");
    }
}
