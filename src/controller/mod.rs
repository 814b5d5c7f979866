//! Controller module - Session coordination and event handling
//!
//! The controller owns "the current session": starting a collection replaces
//! it, and queue events are routed into whichever session is current.
//! It is organized into submodules by responsibility:
//!
//! - `playback`: Starting sessions and playback mode changes
//! - `player_events`: Queue event listener

mod playback;
mod player_events;

use std::sync::Arc;
use tokio::sync::Mutex;

use crate::config::WindowConfig;
use crate::session::{Collaborators, PlaybackSession, SessionContext};

#[derive(Clone)]
pub struct PlaybackController {
    pub(crate) context: Arc<SessionContext>,
    pub(crate) window: WindowConfig,
    session: Arc<Mutex<Option<PlaybackSession>>>,
}

impl PlaybackController {
    pub fn new(collaborators: Collaborators, window: WindowConfig) -> Self {
        Self {
            context: Arc::new(SessionContext::new(collaborators)),
            window,
            session: Arc::new(Mutex::new(None)),
        }
    }

    pub fn context(&self) -> &Arc<SessionContext> {
        &self.context
    }

    pub async fn current_session(&self) -> Option<PlaybackSession> {
        self.session.lock().await.clone()
    }

    pub(crate) async fn replace_session(&self, session: PlaybackSession) {
        *self.session.lock().await = Some(session);
    }
}
