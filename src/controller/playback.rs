//! Playback control methods

use crate::model::CollectionRequest;
use crate::session::{LoadOutcome, PlaybackSession, SessionGuard, SessionRequest};

use super::PlaybackController;

impl PlaybackController {
    /// Supersede the current session with one for `request` and load its opening window
    ///
    /// Any load still running for the previous session becomes inert.
    pub async fn start_session(&self, request: SessionRequest) -> (PlaybackSession, LoadOutcome) {
        let generation = self.context.advance_generation();
        let guard = SessionGuard::new(self.context.clone(), generation);
        guard.clear_queue().await;

        let name = request.collection.name.clone();
        let session = PlaybackSession::new(guard.clone(), request, self.window.clone());
        self.replace_session(session.clone()).await;

        tracing::info!(generation, name = %name, "Starting playback session");
        let outcome = session.start().await;

        let nothing_queued = outcome.report().is_some_and(|r| r.materialized == 0);
        if nothing_queued {
            tracing::warn!(generation, name = %name, "Nothing in the collection could be played");
            let key = self.context.next_loading_key();
            guard.show_error(&format!("Unable to play {name}"), key);
        }

        (session, outcome)
    }

    /// Convenience for starting from a catalog lookup with the given modes
    pub async fn play_collection(
        &self,
        collection: CollectionRequest,
        settings: &crate::config::Settings,
        shuffle: bool,
        repeat: bool,
    ) -> (PlaybackSession, LoadOutcome) {
        let request = SessionRequest {
            collection,
            source: settings.source,
            shuffle,
            repeat,
            market: settings.market.clone(),
        };
        self.start_session(request).await
    }

    pub async fn set_repeat(&self, enabled: bool) {
        match self.current_session().await {
            Some(session) => session.toggle_repeat(enabled).await,
            None => tracing::debug!(enabled, "Repeat changed with no session"),
        }
    }

    pub fn set_background(&self, background: bool) {
        self.context.set_background(background);
    }

    pub fn is_background(&self) -> bool {
        self.context.is_background()
    }
}
