//! Spotify catalog client wrapper

use std::sync::Arc;

use anyhow::{Context, Result};
use async_trait::async_trait;
use tokio::sync::RwLock;
use rspotify::{
    model::{AlbumId, PlaylistId, TrackId},
    prelude::*,
    AuthCodeSpotify,
};
use url::Url;

use super::types::{CollectionKind, CollectionRequest};
use crate::session::CatalogClient;

const API_BASE: &str = "https://api.spotify.com/v1";

/// Spotify API client with token refresh support
///
/// Uses rspotify for typed lookups and a plain authenticated GET for the
/// paged track listings the playback window reads.
#[derive(Clone)]
pub struct SpotifyClient {
    client: Arc<AuthCodeSpotify>,
    http: reqwest::Client,
    refresh_token: Arc<RwLock<String>>,
    token_expires_at: Arc<RwLock<Option<chrono::DateTime<chrono::Utc>>>>,
}

impl SpotifyClient {
    pub fn new(
        client: AuthCodeSpotify,
        refresh_token: String,
        expires_at: Option<chrono::DateTime<chrono::Utc>>,
    ) -> Self {
        Self {
            client: Arc::new(client),
            http: reqwest::Client::new(),
            refresh_token: Arc::new(RwLock::new(refresh_token)),
            token_expires_at: Arc::new(RwLock::new(expires_at)),
        }
    }

    pub async fn token_needs_refresh(&self) -> bool {
        let expires_at = self.token_expires_at.read().await;
        if let Some(exp) = *expires_at {
            let remaining = exp - chrono::Utc::now();
            // Refresh if less than 5 minutes remaining
            remaining.num_seconds() < 300
        } else {
            false
        }
    }

    pub async fn refresh_token_if_needed(&self) -> Result<bool> {
        if !self.token_needs_refresh().await {
            return Ok(false);
        }

        let refresh_token = self.refresh_token.read().await.clone();

        tracing::info!("Token expiring soon, refreshing...");

        match crate::auth::refresh_access_token(&refresh_token).await {
            Ok((new_access_token, new_refresh_token, new_expires_at)) => {
                let new_token = crate::auth::rspotify_token(new_access_token, new_expires_at);

                *self
                    .client
                    .token
                    .lock()
                    .await
                    .map_err(|_| anyhow::anyhow!("rspotify token lock poisoned"))? = Some(new_token);

                *self.refresh_token.write().await = new_refresh_token;
                *self.token_expires_at.write().await = Some(new_expires_at);

                tracing::info!("Token refreshed successfully");
                Ok(true)
            }
            Err(e) => {
                tracing::error!(error = %e, "Failed to refresh token");
                Err(e)
            }
        }
    }

    async fn access_token(&self) -> Result<String> {
        let token = self
            .client
            .token
            .lock()
            .await
            .map_err(|_| anyhow::anyhow!("rspotify token lock poisoned"))?;
        token
            .as_ref()
            .map(|t| t.access_token.clone())
            .context("no access token set")
    }

    /// Display name of the logged-in user
    pub async fn current_user_name(&self) -> Result<String> {
        crate::log_api_request!("me", authenticated = true);
        let result = self.client.me().await;
        crate::log_api_result!("me", result);
        let user = result?;
        Ok(user.display_name.unwrap_or_else(|| user.id.id().to_string()))
    }

    /// Resolve a track, album or playlist link into something a session can play
    pub async fn lookup_collection(&self, uri: &str) -> Result<CollectionRequest> {
        let (kind, id) = parse_collection_uri(uri)?;
        crate::log_api_request!("lookup_collection", kind = ?kind, id = %id);

        let request = match kind {
            CollectionKind::Single => {
                let track = self.client.track(TrackId::from_id(&id)?, None).await?;
                CollectionRequest {
                    kind,
                    tracks_href: format!("{API_BASE}/tracks/{id}"),
                    total: 1,
                    name: track.name,
                }
            }
            CollectionKind::Album => {
                let album = self.client.album(AlbumId::from_id(&id)?, None).await?;
                CollectionRequest {
                    kind,
                    tracks_href: album.tracks.href,
                    total: album.tracks.total as usize,
                    name: album.name,
                }
            }
            CollectionKind::Playlist => {
                let playlist = self.client.playlist(PlaylistId::from_id(&id)?, None, None).await?;
                CollectionRequest {
                    kind,
                    tracks_href: playlist.tracks.href,
                    total: playlist.tracks.total as usize,
                    name: playlist.name,
                }
            }
        };

        tracing::info!(kind = ?request.kind, total = request.total, name = %request.name, "Collection found");
        Ok(request)
    }
}

#[async_trait]
impl CatalogClient for SpotifyClient {
    async fn get(&self, url: &str) -> Result<String> {
        if let Err(e) = self.refresh_token_if_needed().await {
            tracing::warn!(error = %e, "Token refresh check failed");
        }

        let token = self.access_token().await?;
        let response = self
            .http
            .get(url)
            .bearer_auth(token)
            .send()
            .await
            .with_context(|| format!("GET {url}"))?
            .error_for_status()?;

        Ok(response.text().await?)
    }
}

/// Split `spotify:<kind>:<id>` or an open.spotify.com link into kind and id
pub fn parse_collection_uri(uri: &str) -> Result<(CollectionKind, String)> {
    let uri = uri.trim();

    if let Some(rest) = uri.strip_prefix("spotify:") {
        let mut parts = rest.splitn(2, ':');
        let kind = parts.next().and_then(CollectionKind::from_uri_segment);
        let id = parts.next().filter(|id| !id.is_empty());
        return match (kind, id) {
            (Some(kind), Some(id)) => Ok((kind, id.to_string())),
            _ => Err(anyhow::anyhow!("unsupported Spotify uri: {uri}")),
        };
    }

    let url = Url::parse(uri).with_context(|| format!("not a Spotify uri or link: {uri}"))?;
    if url.host_str() != Some("open.spotify.com") {
        anyhow::bail!("not a Spotify link: {uri}");
    }

    let segments: Vec<&str> = url
        .path_segments()
        .map(|s| s.filter(|seg| !seg.is_empty() && !seg.starts_with("intl-")).collect())
        .unwrap_or_default();

    match segments.as_slice() {
        [kind, id, ..] => {
            let kind = CollectionKind::from_uri_segment(kind)
                .with_context(|| format!("unsupported Spotify link: {uri}"))?;
            Ok((kind, id.to_string()))
        }
        _ => Err(anyhow::anyhow!("unsupported Spotify link: {uri}")),
    }
}
