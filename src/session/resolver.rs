//! Turning catalog tracks into playable audio

use std::sync::Arc;
use std::time::Duration;

use tokio_util::sync::CancellationToken;

use super::collaborators::StreamCandidate;
use super::context::SessionGuard;
use crate::model::{AudioLocator, PlaybackSource, ResolvedSource, Track};

/// How a session finds audio for its tracks, chosen once per session
pub enum SourceResolver {
    /// Catalog preview clips
    Preview,
    /// Full tracks matched on the video index
    Video(VideoResolver),
}

impl SourceResolver {
    pub fn for_source(source: PlaybackSource, guard: SessionGuard, stream_timeout: Duration) -> Self {
        match source {
            PlaybackSource::Spotify => SourceResolver::Preview,
            PlaybackSource::YouTube => SourceResolver::Video(VideoResolver::new(guard, stream_timeout)),
        }
    }

    pub fn source(&self) -> PlaybackSource {
        match self {
            SourceResolver::Preview => PlaybackSource::Spotify,
            SourceResolver::Video(_) => PlaybackSource::YouTube,
        }
    }

    /// Resolve one track; failures come back as an unresolved source
    pub async fn resolve(&self, track: Track, context_key: u64) -> ResolvedSource {
        match self {
            SourceResolver::Preview => {
                if track.preview_url.is_empty() {
                    tracing::debug!(track_id = %track.id, "Track has no preview clip");
                    return ResolvedSource::unresolved(track);
                }
                let url = track.preview_url.clone();
                ResolvedSource::new(track, AudioLocator::Remote(url))
            }
            SourceResolver::Video(resolver) => resolver.resolve(track, context_key).await,
        }
    }
}

/// Matches tracks on the video index and picks the best audio stream
pub struct VideoResolver {
    guard: SessionGuard,
    stream_timeout: Duration,
}

enum SlowFetch {
    Finished(anyhow::Result<Vec<u8>>),
    Cancelled,
}

impl VideoResolver {
    pub fn new(guard: SessionGuard, stream_timeout: Duration) -> Self {
        Self { guard, stream_timeout }
    }

    pub async fn resolve(&self, track: Track, context_key: u64) -> ResolvedSource {
        let locator = self.locate(&track, context_key).await;
        ResolvedSource::new(track, locator)
    }

    async fn locate(&self, track: &Track, context_key: u64) -> AudioLocator {
        if !self.guard.is_current() {
            return AudioLocator::Unresolved;
        }

        let query = track.search_query();
        crate::log_api_request!("video_search", query = %query);
        let video_id = match self.guard.video_index().search(&query).await {
            Ok(Some(id)) if !id.is_empty() => id,
            Ok(_) => {
                tracing::info!(track = %track.name, "No video match");
                return AudioLocator::Unresolved;
            }
            Err(e) => {
                tracing::warn!(track = %track.name, error = %e, "Video search failed");
                return AudioLocator::Unresolved;
            }
        };

        if !self.guard.is_current() {
            return AudioLocator::Unresolved;
        }

        let candidates = match self.guard.video_index().list_streams(&video_id).await {
            Ok(candidates) => candidates,
            Err(e) => {
                tracing::warn!(video_id, error = %e, "Listing streams failed");
                return AudioLocator::Unresolved;
            }
        };

        let (best_audio, best_muxed) = pick_candidates(&candidates);
        if let Some(audio) = best_audio {
            return match self.guard.video_index().stream_uri(audio).await {
                Ok(uri) => {
                    tracing::debug!(video_id, itag = audio.itag, bitrate = audio.bitrate, "Using audio-only stream");
                    AudioLocator::Remote(uri)
                }
                Err(e) => {
                    tracing::warn!(video_id, error = %e, "Audio stream has no usable uri");
                    AudioLocator::Unresolved
                }
            };
        }

        match best_muxed {
            Some(muxed) => self.download_muxed(track, &video_id, muxed, context_key).await,
            None => {
                tracing::info!(video_id, "Video has no streams");
                AudioLocator::Unresolved
            }
        }
    }

    /// Fetch a muxed stream, asking the user once the time budget runs out
    async fn download_muxed(
        &self,
        track: &Track,
        video_id: &str,
        candidate: &StreamCandidate,
        context_key: u64,
    ) -> AudioLocator {
        let uri = match self.guard.video_index().stream_uri(candidate).await {
            Ok(uri) => uri,
            Err(e) => {
                tracing::warn!(video_id, error = %e, "Muxed stream has no usable uri");
                return AudioLocator::Unresolved;
            }
        };

        let index = self.guard.video_index();
        let fetch = index.fetch_stream(&uri);
        tokio::pin!(fetch);

        let outcome = tokio::select! {
            result = &mut fetch => SlowFetch::Finished(result),
            _ = tokio::time::sleep(self.stream_timeout) => {
                let cancel = CancellationToken::new();
                if self.guard.context().is_background() {
                    cancel.cancel();
                    tracing::info!(video_id, "Slow stream download dropped in background");
                    SlowFetch::Cancelled
                } else {
                    tracing::info!(video_id, track = %track.name, "Stream download is slow, prompting");
                    self.guard.show_cancel_prompt(&track.name, cancel.clone(), context_key);
                    let outcome = tokio::select! {
                        result = &mut fetch => SlowFetch::Finished(result),
                        _ = cancel.cancelled() => SlowFetch::Cancelled,
                    };
                    self.guard.hide_cancel_prompt(context_key);
                    outcome
                }
            }
        };

        match outcome {
            SlowFetch::Finished(Ok(data)) => {
                tracing::debug!(video_id, bytes = data.len(), "Downloaded muxed stream");
                AudioLocator::Buffered {
                    data: Arc::new(data),
                    mime_type: candidate.mime_type.clone(),
                }
            }
            SlowFetch::Finished(Err(e)) => {
                tracing::warn!(video_id, error = %e, "Muxed stream download failed");
                AudioLocator::Unresolved
            }
            SlowFetch::Cancelled => {
                tracing::info!(video_id, "Muxed stream download cancelled");
                AudioLocator::Unresolved
            }
        }
    }
}

/// Highest-bitrate audio-only stream and highest-bitrate muxed stream
pub fn pick_candidates(candidates: &[StreamCandidate]) -> (Option<&StreamCandidate>, Option<&StreamCandidate>) {
    let best_audio = candidates
        .iter()
        .filter(|c| c.is_audio_only)
        .max_by_key(|c| c.bitrate);
    let best_muxed = candidates
        .iter()
        .filter(|c| !c.is_audio_only)
        .max_by_key(|c| c.bitrate);
    (best_audio, best_muxed)
}
