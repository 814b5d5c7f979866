//! Slices of track metadata from the remote catalog

use serde_json::Value;
use url::Url;

use super::context::SessionGuard;
use crate::model::{CollectionKind, Track};

const PLAYLIST_FIELDS: &str =
    "items(track(id,href,name,preview_url,duration_ms,album(id,name,images,artists(name)),artists(name)))";

/// Tracks returned by one fetch
#[derive(Debug, Default)]
pub struct FetchedPage {
    pub tracks: Vec<Track>,
    /// Set when the fetch learned the collection size (single tracks)
    pub total: Option<usize>,
}

/// Reads a collection's tracks page by page
///
/// Never fails: unreachable pages, malformed payloads and items missing
/// required fields simply shorten the returned list.
pub struct RemotePageFetcher {
    guard: SessionGuard,
    kind: CollectionKind,
    tracks_href: String,
    market: Option<String>,
}

impl RemotePageFetcher {
    pub fn new(guard: SessionGuard, kind: CollectionKind, tracks_href: String, market: Option<String>) -> Self {
        Self {
            guard,
            kind,
            tracks_href,
            market,
        }
    }

    /// Up to `count` tracks starting at `start`, clamped to `total` when known
    pub async fn fetch_range(&self, start: usize, count: usize, total: usize) -> FetchedPage {
        if self.kind == CollectionKind::Single {
            return self.fetch_single().await;
        }

        let count = if total > 0 { count.min(total.saturating_sub(start)) } else { count };
        if count == 0 {
            return FetchedPage::default();
        }

        FetchedPage {
            tracks: self.fetch_page(start, count, true).await,
            total: None,
        }
    }

    /// One track per drawn position, in draw order
    pub async fn fetch_random(&self, positions: &[usize]) -> FetchedPage {
        if self.kind == CollectionKind::Single {
            return self.fetch_single().await;
        }

        let mut tracks = Vec::with_capacity(positions.len());
        for &position in positions {
            if !self.guard.is_current() {
                break;
            }
            tracks.extend(self.fetch_page(position, 1, false).await);
        }
        FetchedPage { tracks, total: None }
    }

    async fn fetch_single(&self) -> FetchedPage {
        let Some(json) = self.get_json(&self.tracks_href).await else {
            return FetchedPage::default();
        };
        FetchedPage {
            tracks: Track::from_json(&json).into_iter().collect(),
            total: Some(1),
        }
    }

    async fn fetch_page(&self, offset: usize, limit: usize, with_fields: bool) -> Vec<Track> {
        let Some(url) = self.page_url(offset, limit, with_fields) else {
            return Vec::new();
        };
        let Some(json) = self.get_json(&url).await else {
            return Vec::new();
        };
        let Some(items) = json.get("items").and_then(Value::as_array) else {
            tracing::warn!(offset, limit, "Catalog page has no items array");
            return Vec::new();
        };

        let mut tracks = Vec::with_capacity(items.len());
        for item in items {
            if !self.guard.is_current() {
                break;
            }
            let track = match self.kind {
                CollectionKind::Album => self.album_track(item).await,
                _ => Track::from_playlist_item(item),
            };
            match track {
                Some(track) => tracks.push(track),
                None => tracing::debug!(offset, "Skipping catalog item without track data"),
            }
        }
        tracks
    }

    /// Album listings carry simplified tracks; follow `href` for the full object
    async fn album_track(&self, item: &Value) -> Option<Track> {
        if item.get("album").is_some_and(Value::is_object) {
            return Track::from_json(item);
        }
        let href = item.get("href").and_then(Value::as_str)?;
        let full = self.get_json(href).await?;
        Track::from_json(&full)
    }

    fn page_url(&self, offset: usize, limit: usize, with_fields: bool) -> Option<String> {
        let mut url = match Url::parse(&self.tracks_href) {
            Ok(url) => url,
            Err(e) => {
                tracing::error!(href = %self.tracks_href, error = %e, "Invalid tracks href");
                return None;
            }
        };

        let mut params = vec![("limit", limit.to_string()), ("offset", offset.to_string())];
        // Only the playlist items endpoint understands `fields`
        if with_fields && self.kind == CollectionKind::Playlist {
            params.push(("fields", PLAYLIST_FIELDS.to_string()));
        }
        if let Some(market) = &self.market {
            params.push(("market", market.clone()));
        }

        let query = self.guard.catalog().build_query(&params);
        url.set_query(Some(&query));
        Some(url.to_string())
    }

    async fn get_json(&self, url: &str) -> Option<Value> {
        crate::log_api_request!("catalog_get", url);
        let result = self.guard.catalog().get(url).await;
        crate::log_api_result!("catalog_get", result);
        let body = result.ok()?;

        if !self.guard.is_current() {
            return None;
        }

        match serde_json::from_str::<Value>(&body) {
            Ok(json) => Some(json),
            Err(e) => {
                tracing::warn!(url, error = %e, "Malformed catalog payload");
                None
            }
        }
    }
}
