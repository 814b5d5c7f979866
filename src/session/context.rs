//! Generation tokens and guarded access to shared collaborators

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};

use tokio_util::sync::CancellationToken;

use super::collaborators::{
    CancelPrompt, CatalogClient, EntryId, ErrorSink, ProgressSink, QueueSink, VideoIndexClient,
};
use crate::model::{PlaybackSource, ResolvedSource};

/// Handles to everything outside the engine
#[derive(Clone)]
pub struct Collaborators {
    pub catalog: Arc<dyn CatalogClient>,
    pub video_index: Arc<dyn VideoIndexClient>,
    pub queue: Arc<dyn QueueSink>,
    pub progress: Arc<dyn ProgressSink>,
    pub errors: Arc<dyn ErrorSink>,
    pub cancel_prompt: Arc<dyn CancelPrompt>,
}

/// Shared coordinator state: the live generation and the collaborators
///
/// Starting a new session bumps the generation; sessions holding an older
/// value stop writing to the queue and the UI.
pub struct SessionContext {
    generation: AtomicU64,
    loading_keys: AtomicU64,
    background: AtomicBool,
    collaborators: Collaborators,
}

impl SessionContext {
    pub fn new(collaborators: Collaborators) -> Self {
        Self {
            generation: AtomicU64::new(0),
            loading_keys: AtomicU64::new(0),
            background: AtomicBool::new(false),
            collaborators,
        }
    }

    pub fn current_generation(&self) -> u64 {
        self.generation.load(Ordering::SeqCst)
    }

    /// Invalidate every existing session and return the new generation
    pub fn advance_generation(&self) -> u64 {
        self.generation.fetch_add(1, Ordering::SeqCst) + 1
    }

    pub fn next_loading_key(&self) -> u64 {
        self.loading_keys.fetch_add(1, Ordering::Relaxed) + 1
    }

    pub fn is_background(&self) -> bool {
        self.background.load(Ordering::SeqCst)
    }

    /// While in background mode UI-facing writes are dropped
    pub fn set_background(&self, background: bool) {
        self.background.store(background, Ordering::SeqCst);
        tracing::debug!(background, "Background mode changed");
    }

    pub fn collaborators(&self) -> &Collaborators {
        &self.collaborators
    }
}

/// A session's view of the context, pinned to the generation it was created in
///
/// Every externally visible write goes through here and is skipped once the
/// generation has moved on.
#[derive(Clone)]
pub struct SessionGuard {
    context: Arc<SessionContext>,
    generation: u64,
}

impl SessionGuard {
    pub fn new(context: Arc<SessionContext>, generation: u64) -> Self {
        Self { context, generation }
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn is_current(&self) -> bool {
        self.context.current_generation() == self.generation
    }

    pub fn context(&self) -> &SessionContext {
        &self.context
    }

    pub fn catalog(&self) -> &dyn CatalogClient {
        self.context.collaborators.catalog.as_ref()
    }

    pub fn video_index(&self) -> &dyn VideoIndexClient {
        self.context.collaborators.video_index.as_ref()
    }

    fn ui_visible(&self) -> bool {
        self.is_current() && !self.context.is_background()
    }

    pub fn report_progress(&self, source: PlaybackSource, completed: usize, total: usize, key: u64) {
        if self.ui_visible() {
            self.context.collaborators.progress.report(source, completed, total, key);
        }
    }

    pub fn report_message(&self, text: &str, key: u64) {
        if self.ui_visible() {
            self.context.collaborators.progress.report_message(text, key);
        }
    }

    pub fn loading_started(&self, key: u64) {
        if self.ui_visible() {
            self.context.collaborators.progress.loading_started(key);
        }
    }

    /// Delivered in background mode too, so a load never leaves a spinner behind
    pub fn loading_finished(&self, key: u64) {
        if self.is_current() {
            self.context.collaborators.progress.loading_finished(key);
        }
    }

    pub fn show_error(&self, message: &str, key: u64) {
        if self.ui_visible() {
            self.context.collaborators.errors.show(message, key);
        }
    }

    pub fn show_cancel_prompt(&self, track_name: &str, token: CancellationToken, key: u64) {
        if self.ui_visible() {
            self.context.collaborators.cancel_prompt.show(track_name, token, key);
        }
    }

    /// Delivered in background mode too, so a prompt shown before the switch is taken down
    pub fn hide_cancel_prompt(&self, key: u64) {
        if self.is_current() {
            self.context.collaborators.cancel_prompt.hide(key);
        }
    }

    pub async fn enqueue_end(&self, source: ResolvedSource) -> Option<EntryId> {
        if !self.is_current() {
            return None;
        }
        Some(self.context.collaborators.queue.enqueue_end(source).await)
    }

    pub async fn enqueue_front(&self, source: ResolvedSource) -> Option<EntryId> {
        if !self.is_current() {
            return None;
        }
        Some(self.context.collaborators.queue.enqueue_front(source).await)
    }

    pub async fn remove_from_queue(&self, entry_id: &str) -> bool {
        if !self.is_current() {
            return false;
        }
        self.context.collaborators.queue.remove(entry_id).await;
        true
    }

    pub async fn start_playback(&self) {
        if self.is_current() {
            self.context.collaborators.queue.start_playback().await;
        }
    }

    pub async fn clear_queue(&self) {
        if self.is_current() {
            self.context.collaborators.queue.clear().await;
        }
    }
}
