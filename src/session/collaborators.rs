//! Interfaces the playback window calls into
//!
//! The engine owns no network, queue or UI code of its own. Everything it
//! touches outside the session goes through these traits:
//!
//! - `CatalogClient`: authenticated GET against the remote catalog
//! - `VideoIndexClient`: search and stream enumeration on the external video index
//! - `QueueSink`: the ordered playback queue
//! - `ProgressSink`, `ErrorSink`, `CancelPrompt`: user-facing feedback

use anyhow::Result;
use async_trait::async_trait;
use tokio_util::sync::CancellationToken;

use crate::model::{PlaybackSource, ResolvedSource};

/// Id the queue assigns to an enqueued source
pub type EntryId = String;

/// Generic access to the remote track catalog
#[async_trait]
pub trait CatalogClient: Send + Sync {
    /// GET a catalog URL and return the raw body
    async fn get(&self, url: &str) -> Result<String>;

    /// Encode query parameters as `k=v&k2=v2`
    fn build_query(&self, params: &[(&str, String)]) -> String {
        url::form_urlencoded::Serializer::new(String::new())
            .extend_pairs(params.iter().map(|(k, v)| (*k, v.as_str())))
            .finish()
    }
}

/// One stream offered by the video index for a video
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct StreamCandidate {
    pub itag: u32,
    pub is_audio_only: bool,
    pub bitrate: u64,
    pub mime_type: String,
    /// Direct URL when the index hands one out
    pub url: Option<String>,
}

/// External video index used to find full-length audio
#[async_trait]
pub trait VideoIndexClient: Send + Sync {
    /// Best matching video id for a free-text query
    async fn search(&self, query: &str) -> Result<Option<String>>;

    /// Every stream available for a video
    async fn list_streams(&self, video_id: &str) -> Result<Vec<StreamCandidate>>;

    /// Playable URI for a candidate
    async fn stream_uri(&self, candidate: &StreamCandidate) -> Result<String> {
        candidate
            .url
            .clone()
            .filter(|url| !url.is_empty())
            .ok_or_else(|| anyhow::anyhow!("stream itag {} has no direct url", candidate.itag))
    }

    /// Download a whole stream into memory
    async fn fetch_stream(&self, uri: &str) -> Result<Vec<u8>>;
}

/// The ordered playback queue
#[async_trait]
pub trait QueueSink: Send + Sync {
    async fn enqueue_end(&self, source: ResolvedSource) -> EntryId;
    async fn enqueue_front(&self, source: ResolvedSource) -> EntryId;
    async fn remove(&self, entry_id: &str);
    async fn current_entry_id(&self) -> Option<EntryId>;
    /// Start playing from the first queued item
    async fn start_playback(&self);
    /// Drop every queued item
    async fn clear(&self);
}

/// Loading progress and status line
pub trait ProgressSink: Send + Sync {
    fn report(&self, source: PlaybackSource, completed: usize, total: usize, context_key: u64);
    fn report_message(&self, text: &str, context_key: u64);
    fn loading_started(&self, _context_key: u64) {}
    fn loading_finished(&self, _context_key: u64) {}
}

/// User-visible error display
pub trait ErrorSink: Send + Sync {
    fn show(&self, message: &str, context_key: u64);
}

/// "Still working" prompt for slow stream downloads
///
/// The prompt owner cancels `token` when the user gives up on the track.
pub trait CancelPrompt: Send + Sync {
    fn show(&self, track_name: &str, token: CancellationToken, context_key: u64);
    fn hide(&self, context_key: u64);
}
