#![allow(dead_code)]

use std::collections::HashSet;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use anyhow::Result;
use async_trait::async_trait;
use serde_json::{json, Value};
use tokio::sync::{Notify, Semaphore};
use tokio_util::sync::CancellationToken;
use url::Url;

use spotify_window::config::WindowConfig;
use spotify_window::model::{CollectionKind, CollectionRequest, PlaybackSource, ResolvedSource};
use spotify_window::session::{
    CancelPrompt, CatalogClient, Collaborators, EntryId, ErrorSink, PlaybackSession, ProgressSink,
    QueueSink, SessionContext, SessionGuard, SessionRequest, StreamCandidate, VideoIndexClient,
};

pub const API: &str = "https://api.test/v1";

pub fn track_json(i: usize, with_preview: bool) -> Value {
    json!({
        "id": format!("t{i}"),
        "href": format!("{API}/tracks/t{i}"),
        "name": format!("Track {i}"),
        "preview_url": if with_preview { Value::from(format!("https://preview.test/t{i}")) } else { Value::Null },
        "duration_ms": 180000,
        "album": {
            "id": "a1",
            "name": "Album",
            "images": [{"url": "https://img.test/a1.jpg"}],
            "artists": [{"name": "Band"}]
        },
        "artists": [{"name": format!("Artist {i}")}, {"name": "Guest"}]
    })
}

pub fn tracks(total: usize, without_preview: &[usize]) -> Vec<Value> {
    (0..total).map(|i| track_json(i, !without_preview.contains(&i))).collect()
}

// ============================================================================
// Catalog
// ============================================================================

/// Serves a collection the way the catalog's track listings do
pub struct FakeCatalog {
    kind: CollectionKind,
    tracks: Vec<Value>,
    body_override: Mutex<Option<String>>,
    requests: Mutex<Vec<String>>,
    gate: Option<Semaphore>,
    pub entered: Notify,
}

impl FakeCatalog {
    pub fn new(kind: CollectionKind, tracks: Vec<Value>) -> Self {
        Self {
            kind,
            tracks,
            body_override: Mutex::new(None),
            requests: Mutex::new(Vec::new()),
            gate: None,
            entered: Notify::new(),
        }
    }

    /// Every request waits for [`FakeCatalog::release`]
    pub fn gated(mut self) -> Self {
        self.gate = Some(Semaphore::new(0));
        self
    }

    pub fn release(&self, requests: usize) {
        if let Some(gate) = &self.gate {
            gate.add_permits(requests);
        }
    }

    pub fn respond_with(&self, body: &str) {
        *self.body_override.lock().unwrap() = Some(body.to_string());
    }

    pub fn requests(&self) -> Vec<String> {
        self.requests.lock().unwrap().clone()
    }

    /// `(offset, limit)` of every page request
    pub fn page_requests(&self) -> Vec<(usize, usize)> {
        self.requests()
            .iter()
            .filter_map(|r| {
                let url = Url::parse(r).ok()?;
                let get = |key: &str| {
                    url.query_pairs()
                        .find(|(k, _)| k == key)
                        .and_then(|(_, v)| v.parse::<usize>().ok())
                };
                Some((get("offset")?, get("limit")?))
            })
            .collect()
    }

    pub fn href(&self) -> String {
        match self.kind {
            CollectionKind::Single => format!("{API}/tracks/t0"),
            CollectionKind::Album => format!("{API}/albums/a1/tracks"),
            CollectionKind::Playlist => format!("{API}/playlists/p1/tracks"),
        }
    }

    fn track_by_id(&self, id: &str) -> Option<&Value> {
        self.tracks.iter().find(|t| t["id"] == id)
    }

    fn page(&self, url: &Url) -> Value {
        let get = |key: &str| {
            url.query_pairs()
                .find(|(k, _)| k == key)
                .and_then(|(_, v)| v.parse::<usize>().ok())
        };
        let offset = get("offset").unwrap_or(0);
        let limit = get("limit").unwrap_or(20);

        let items: Vec<Value> = self
            .tracks
            .iter()
            .skip(offset)
            .take(limit)
            .map(|t| match self.kind {
                CollectionKind::Album => json!({
                    "id": t["id"],
                    "name": t["name"],
                    "href": t["href"],
                    "artists": t["artists"],
                }),
                _ => json!({ "track": t }),
            })
            .collect();
        json!({ "items": items, "total": self.tracks.len() })
    }
}

#[async_trait]
impl CatalogClient for FakeCatalog {
    async fn get(&self, url: &str) -> Result<String> {
        self.requests.lock().unwrap().push(url.to_string());
        self.entered.notify_one();
        if let Some(gate) = &self.gate {
            gate.acquire().await?.forget();
        }

        if let Some(body) = self.body_override.lock().unwrap().clone() {
            return Ok(body);
        }

        let parsed = Url::parse(url)?;
        let path = parsed.path().to_string();
        if let Some(id) = path.strip_prefix("/v1/tracks/") {
            return match self.track_by_id(id) {
                Some(track) => Ok(track.to_string()),
                None => Err(anyhow::anyhow!("404 for {url}")),
            };
        }
        Ok(self.page(&parsed).to_string())
    }
}

// ============================================================================
// Video index
// ============================================================================

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum StreamMode {
    AudioOnly,
    MuxedOnly,
    None,
}

pub struct FakeVideoIndex {
    pub mode: StreamMode,
    /// Download time for muxed streams; `None` never finishes
    pub download_time: Option<Duration>,
    pub unmatched: HashSet<String>,
    searches: Mutex<Vec<String>>,
}

impl FakeVideoIndex {
    pub fn new(mode: StreamMode) -> Self {
        Self {
            mode,
            download_time: Some(Duration::ZERO),
            unmatched: HashSet::new(),
            searches: Mutex::new(Vec::new()),
        }
    }

    pub fn searches(&self) -> Vec<String> {
        self.searches.lock().unwrap().clone()
    }
}

#[async_trait]
impl VideoIndexClient for FakeVideoIndex {
    async fn search(&self, query: &str) -> Result<Option<String>> {
        self.searches.lock().unwrap().push(query.to_string());
        if self.unmatched.iter().any(|name| query.starts_with(name.as_str())) {
            return Ok(None);
        }
        Ok(Some(format!("vid-{}", query.len())))
    }

    async fn list_streams(&self, video_id: &str) -> Result<Vec<StreamCandidate>> {
        let muxed = StreamCandidate {
            itag: 18,
            is_audio_only: false,
            bitrate: 500_000,
            mime_type: "video/mp4".into(),
            url: Some(format!("https://stream.test/{video_id}/18")),
        };
        let audio = |itag: u32, bitrate: u64| StreamCandidate {
            itag,
            is_audio_only: true,
            bitrate,
            mime_type: "audio/webm".into(),
            url: Some(format!("https://stream.test/{video_id}/{itag}")),
        };
        Ok(match self.mode {
            StreamMode::AudioOnly => vec![muxed, audio(250, 64_000), audio(251, 160_000)],
            StreamMode::MuxedOnly => vec![muxed],
            StreamMode::None => Vec::new(),
        })
    }

    async fn fetch_stream(&self, _uri: &str) -> Result<Vec<u8>> {
        match self.download_time {
            Some(delay) => {
                tokio::time::sleep(delay).await;
                Ok(vec![0x1a, 0x45, 0xdf, 0xa3])
            }
            None => std::future::pending().await,
        }
    }
}

// ============================================================================
// Queue and UI sinks
// ============================================================================

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum QueueOp {
    End(EntryId),
    Front(EntryId),
    Remove(EntryId),
    Start,
    Clear,
}

#[derive(Default)]
pub struct FakeQueue {
    ops: Mutex<Vec<QueueOp>>,
    entries: Mutex<Vec<EntryId>>,
}

impl FakeQueue {
    pub fn ops(&self) -> Vec<QueueOp> {
        self.ops.lock().unwrap().clone()
    }

    pub fn entries(&self) -> Vec<EntryId> {
        self.entries.lock().unwrap().clone()
    }
}

#[async_trait]
impl QueueSink for FakeQueue {
    async fn enqueue_end(&self, source: ResolvedSource) -> EntryId {
        let id = source.entry_id().to_string();
        self.entries.lock().unwrap().push(id.clone());
        self.ops.lock().unwrap().push(QueueOp::End(id.clone()));
        id
    }

    async fn enqueue_front(&self, source: ResolvedSource) -> EntryId {
        let id = source.entry_id().to_string();
        self.entries.lock().unwrap().insert(0, id.clone());
        self.ops.lock().unwrap().push(QueueOp::Front(id.clone()));
        id
    }

    async fn remove(&self, entry_id: &str) {
        self.entries.lock().unwrap().retain(|id| id != entry_id);
        self.ops.lock().unwrap().push(QueueOp::Remove(entry_id.to_string()));
    }

    async fn current_entry_id(&self) -> Option<EntryId> {
        None
    }

    async fn start_playback(&self) {
        self.ops.lock().unwrap().push(QueueOp::Start);
    }

    async fn clear(&self) {
        self.entries.lock().unwrap().clear();
        self.ops.lock().unwrap().push(QueueOp::Clear);
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum UiEvent {
    Progress { completed: usize, total: usize },
    Message(String),
    LoadingStarted,
    LoadingFinished,
    Error(String),
    PromptShown(String),
    PromptHidden,
}

#[derive(Default)]
pub struct FakeUi {
    events: Mutex<Vec<UiEvent>>,
    /// Cancel slow downloads as soon as the prompt appears
    pub cancel_on_prompt: bool,
}

impl FakeUi {
    pub fn cancelling() -> Self {
        Self {
            cancel_on_prompt: true,
            ..Self::default()
        }
    }

    pub fn events(&self) -> Vec<UiEvent> {
        self.events.lock().unwrap().clone()
    }

    pub fn messages(&self) -> Vec<String> {
        self.events()
            .into_iter()
            .filter_map(|e| match e {
                UiEvent::Message(m) => Some(m),
                _ => None,
            })
            .collect()
    }

    fn push(&self, event: UiEvent) {
        self.events.lock().unwrap().push(event);
    }
}

impl ProgressSink for FakeUi {
    fn report(&self, _source: PlaybackSource, completed: usize, total: usize, _context_key: u64) {
        self.push(UiEvent::Progress { completed, total });
    }

    fn report_message(&self, text: &str, _context_key: u64) {
        self.push(UiEvent::Message(text.to_string()));
    }

    fn loading_started(&self, _context_key: u64) {
        self.push(UiEvent::LoadingStarted);
    }

    fn loading_finished(&self, _context_key: u64) {
        self.push(UiEvent::LoadingFinished);
    }
}

impl ErrorSink for FakeUi {
    fn show(&self, message: &str, _context_key: u64) {
        self.push(UiEvent::Error(message.to_string()));
    }
}

impl CancelPrompt for FakeUi {
    fn show(&self, track_name: &str, token: CancellationToken, _context_key: u64) {
        self.push(UiEvent::PromptShown(track_name.to_string()));
        if self.cancel_on_prompt {
            token.cancel();
        }
    }

    fn hide(&self, _context_key: u64) {
        self.push(UiEvent::PromptHidden);
    }
}

// ============================================================================
// Harness
// ============================================================================

pub struct Harness {
    pub context: Arc<SessionContext>,
    pub catalog: Arc<FakeCatalog>,
    pub video: Arc<FakeVideoIndex>,
    pub queue: Arc<FakeQueue>,
    pub ui: Arc<FakeUi>,
}

impl Harness {
    pub fn new(catalog: FakeCatalog) -> Self {
        Self::with_parts(catalog, FakeVideoIndex::new(StreamMode::AudioOnly), FakeUi::default())
    }

    pub fn with_parts(catalog: FakeCatalog, video: FakeVideoIndex, ui: FakeUi) -> Self {
        let catalog = Arc::new(catalog);
        let video = Arc::new(video);
        let queue = Arc::new(FakeQueue::default());
        let ui = Arc::new(ui);
        let collaborators = Collaborators {
            catalog: catalog.clone(),
            video_index: video.clone(),
            queue: queue.clone(),
            progress: ui.clone(),
            errors: ui.clone(),
            cancel_prompt: ui.clone(),
        };
        Self {
            context: Arc::new(SessionContext::new(collaborators)),
            catalog,
            video,
            queue,
            ui,
        }
    }

    pub fn collaborators(&self) -> Collaborators {
        self.context.collaborators().clone()
    }

    /// Guard for a fresh generation
    pub fn guard(&self) -> SessionGuard {
        let generation = self.context.advance_generation();
        SessionGuard::new(self.context.clone(), generation)
    }

    pub fn request(&self, kind: CollectionKind, total: usize) -> SessionRequest {
        SessionRequest {
            collection: CollectionRequest {
                kind,
                tracks_href: self.catalog.href(),
                total,
                name: "Test collection".into(),
            },
            source: PlaybackSource::Spotify,
            shuffle: false,
            repeat: false,
            market: None,
        }
    }

    pub fn session(&self, request: SessionRequest) -> PlaybackSession {
        PlaybackSession::new(self.guard(), request, WindowConfig::default())
    }

    /// Count of every externally visible write so far
    pub fn writes(&self) -> usize {
        self.queue.ops().len() + self.ui.events().len()
    }
}

pub fn ids(range: std::ops::Range<usize>) -> Vec<String> {
    range.map(|i| format!("t{i}")).collect()
}
