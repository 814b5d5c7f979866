//! In-memory playback queue
//!
//! Holds the resolved sources a session has queued, tracks which one is
//! playing and reports movement on an event channel the controller listens to.

use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::{mpsc, Mutex};

use crate::model::{ResolvedSource, TrackMetadata};
use crate::session::{EntryId, QueueSink};

/// Something the queue wants the session to know about
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum QueueEvent {
    /// A different entry is now playing
    Advanced(EntryId),
    /// The entry could not be played
    ItemFailed(EntryId),
}

pub type QueueEventChannel = mpsc::UnboundedReceiver<QueueEvent>;

#[derive(Default)]
struct QueueState {
    entries: Vec<(EntryId, ResolvedSource)>,
    current: Option<usize>,
    auto_repeat: bool,
}

impl QueueState {
    fn current_id(&self) -> Option<EntryId> {
        self.current
            .and_then(|i| self.entries.get(i))
            .map(|(id, _)| id.clone())
    }
}

#[derive(Clone)]
pub struct QueueBackend {
    state: Arc<Mutex<QueueState>>,
    events: mpsc::UnboundedSender<QueueEvent>,
}

impl QueueBackend {
    pub fn new() -> (Self, QueueEventChannel) {
        let (events, channel) = mpsc::unbounded_channel();
        let backend = Self {
            state: Arc::new(Mutex::new(QueueState::default())),
            events,
        };
        (backend, channel)
    }

    fn emit(&self, event: QueueEvent) {
        if self.events.send(event).is_err() {
            tracing::debug!("Queue event dropped, no listener");
        }
    }

    pub async fn set_auto_repeat(&self, enabled: bool) {
        self.state.lock().await.auto_repeat = enabled;
        tracing::debug!(enabled, "Queue auto repeat changed");
    }

    /// Move to the next entry, wrapping to the first when auto repeat is on
    pub async fn next(&self) -> Option<EntryId> {
        let id = {
            let mut state = self.state.lock().await;
            let len = state.entries.len();
            let next = match state.current {
                Some(i) if i + 1 < len => i + 1,
                Some(_) if state.auto_repeat && len > 0 => 0,
                None if len > 0 => 0,
                _ => return None,
            };
            state.current = Some(next);
            state.current_id()
        }?;
        tracing::debug!(entry_id = %id, "Queue moved forward");
        self.emit(QueueEvent::Advanced(id.clone()));
        Some(id)
    }

    pub async fn previous(&self) -> Option<EntryId> {
        let id = {
            let mut state = self.state.lock().await;
            match state.current {
                Some(i) if i > 0 => state.current = Some(i - 1),
                _ => return None,
            }
            state.current_id()
        }?;
        tracing::debug!(entry_id = %id, "Queue moved back");
        self.emit(QueueEvent::Advanced(id.clone()));
        Some(id)
    }

    /// Report the playing entry as unplayable
    pub async fn fail_current(&self) -> Option<EntryId> {
        let id = self.state.lock().await.current_id()?;
        tracing::warn!(entry_id = %id, "Queue entry marked as failed");
        self.emit(QueueEvent::ItemFailed(id.clone()));
        Some(id)
    }

    /// Queued entries in play order, with the index of the playing one
    pub async fn entries(&self) -> (Vec<(EntryId, TrackMetadata)>, Option<usize>) {
        let state = self.state.lock().await;
        let entries = state
            .entries
            .iter()
            .map(|(id, source)| (id.clone(), source.metadata()))
            .collect();
        (entries, state.current)
    }
}

#[async_trait]
impl QueueSink for QueueBackend {
    async fn enqueue_end(&self, source: ResolvedSource) -> EntryId {
        let id = source.entry_id().to_string();
        self.state.lock().await.entries.push((id.clone(), source));
        id
    }

    async fn enqueue_front(&self, source: ResolvedSource) -> EntryId {
        let id = source.entry_id().to_string();
        let mut state = self.state.lock().await;
        state.entries.insert(0, (id.clone(), source));
        if let Some(current) = state.current.as_mut() {
            *current += 1;
        }
        id
    }

    async fn remove(&self, entry_id: &str) {
        let mut state = self.state.lock().await;
        let Some(index) = state.entries.iter().position(|(id, _)| id == entry_id) else {
            return;
        };
        state.entries.remove(index);

        let len = state.entries.len();
        state.current = match state.current {
            _ if len == 0 => None,
            Some(current) if index < current => Some(current - 1),
            Some(current) => Some(current.min(len - 1)),
            None => None,
        };
    }

    async fn current_entry_id(&self) -> Option<EntryId> {
        self.state.lock().await.current_id()
    }

    async fn start_playback(&self) {
        let id = {
            let mut state = self.state.lock().await;
            if state.entries.is_empty() {
                return;
            }
            state.current = Some(0);
            state.current_id()
        };
        if let Some(id) = id {
            tracing::info!(entry_id = %id, "Playback started");
            self.emit(QueueEvent::Advanced(id));
        }
    }

    async fn clear(&self) {
        let mut state = self.state.lock().await;
        state.entries.clear();
        state.current = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{AudioLocator, Track};

    fn source(id: &str) -> ResolvedSource {
        let track = Track {
            id: id.to_string(),
            name: format!("Track {id}"),
            ..Track::default()
        };
        ResolvedSource::new(track, AudioLocator::Remote(format!("https://audio/{id}")))
    }

    #[tokio::test]
    async fn start_playback_announces_first_entry() {
        let (queue, mut events) = QueueBackend::new();
        queue.enqueue_end(source("a")).await;
        queue.enqueue_end(source("b")).await;
        queue.start_playback().await;

        assert_eq!(events.recv().await, Some(QueueEvent::Advanced("a".into())));
        assert_eq!(queue.current_entry_id().await.as_deref(), Some("a"));
    }

    #[tokio::test]
    async fn next_wraps_only_with_auto_repeat() {
        let (queue, _events) = QueueBackend::new();
        queue.enqueue_end(source("a")).await;
        queue.enqueue_end(source("b")).await;
        queue.start_playback().await;

        assert_eq!(queue.next().await.as_deref(), Some("b"));
        assert_eq!(queue.next().await, None);

        queue.set_auto_repeat(true).await;
        assert_eq!(queue.next().await.as_deref(), Some("a"));
    }

    #[tokio::test]
    async fn front_insert_and_removal_keep_current_entry() {
        let (queue, _events) = QueueBackend::new();
        queue.enqueue_end(source("b")).await;
        queue.enqueue_end(source("c")).await;
        queue.start_playback().await;

        queue.enqueue_front(source("a")).await;
        assert_eq!(queue.current_entry_id().await.as_deref(), Some("b"));

        queue.remove("a").await;
        assert_eq!(queue.current_entry_id().await.as_deref(), Some("b"));

        queue.remove("missing").await;
        let (entries, current) = queue.entries().await;
        assert_eq!(entries.len(), 2);
        assert_eq!(current, Some(0));
    }

    #[tokio::test]
    async fn fail_current_reports_the_playing_entry() {
        let (queue, mut events) = QueueBackend::new();
        assert_eq!(queue.fail_current().await, None);

        queue.enqueue_end(source("a")).await;
        queue.start_playback().await;
        let _ = events.recv().await;

        queue.fail_current().await;
        assert_eq!(events.recv().await, Some(QueueEvent::ItemFailed("a".into())));
    }
}
