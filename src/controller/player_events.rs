//! Queue event listener

use crate::queue::{QueueEvent, QueueEventChannel};
use crate::session::AdvanceOutcome;
use super::PlaybackController;

impl PlaybackController {
    /// Route queue events into the current session until the queue goes away
    ///
    /// Events are applied in arrival order. Only the edge load an advance asks
    /// for is spawned, so a slow load does not hold up later notifications;
    /// overlapping loads are rejected by the session.
    pub fn start_queue_event_listener(&self, mut event_channel: QueueEventChannel) {
        let controller = self.clone();
        tracing::info!("Starting queue event listener");

        tokio::spawn(async move {
            while let Some(event) = event_channel.recv().await {
                controller.dispatch_queue_event(event).await;
            }
            tracing::debug!("Queue event listener shutting down");
        });
    }

    async fn dispatch_queue_event(&self, event: QueueEvent) {
        let Some(session) = self.current_session().await else {
            tracing::debug!(?event, "Queue event with no session");
            return;
        };

        match event {
            QueueEvent::Advanced(entry_id) => {
                tracing::debug!(entry_id = %entry_id, "QueueEvent::Advanced");
                match session.plan_advance(&entry_id).await {
                    Ok(plan) => {
                        let direction = plan.direction();
                        tokio::spawn(async move {
                            let outcome = session.run_advance(plan).await;
                            tracing::debug!(?direction, ?outcome, "Advance handled");
                        });
                    }
                    Err(outcome) => tracing::trace!(?outcome, "Advance handled"),
                }
            }
            QueueEvent::ItemFailed(entry_id) => {
                tracing::debug!(entry_id = %entry_id, "QueueEvent::ItemFailed");
                session.item_failed_to_open(&entry_id).await;
            }
        }
    }

    /// Handle one event to completion, including any load it triggers
    pub async fn handle_queue_event(&self, event: QueueEvent) {
        let Some(session) = self.current_session().await else {
            tracing::debug!(?event, "Queue event with no session");
            return;
        };

        match event {
            QueueEvent::Advanced(entry_id) => {
                tracing::debug!(entry_id = %entry_id, "QueueEvent::Advanced");
                match session.on_advance(&entry_id).await {
                    AdvanceOutcome::Loaded { direction, outcome, evicted } => {
                        tracing::debug!(?direction, ?outcome, evicted, "Advance handled");
                    }
                    other => tracing::trace!(outcome = ?other, "Advance handled"),
                }
            }
            QueueEvent::ItemFailed(entry_id) => {
                tracing::debug!(entry_id = %entry_id, "QueueEvent::ItemFailed");
                session.item_failed_to_open(&entry_id).await;
            }
        }
    }
}
