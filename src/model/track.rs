//! Logical track descriptors parsed from catalog JSON

use serde_json::Value;

/// An artist credited on a track
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Artist {
    pub name: String,
}

impl Artist {
    pub fn from_json(json: &Value) -> Self {
        Self {
            name: str_field(json, "name"),
        }
    }
}

/// The album a track belongs to
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Album {
    pub id: String,
    pub name: String,
    pub image_url: String,
    pub artists: Vec<Artist>,
}

impl Album {
    pub fn from_json(json: &Value) -> Self {
        let image_url = json
            .get("images")
            .and_then(Value::as_array)
            .and_then(|images| images.first())
            .map(|image| str_field(image, "url"))
            .unwrap_or_default();

        Self {
            id: str_field(json, "id"),
            name: str_field(json, "name"),
            image_url,
            artists: artists_field(json),
        }
    }
}

/// A track as described by the remote catalog
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Track {
    pub id: String,
    pub href: String,
    pub name: String,
    pub album: Album,
    /// Contributing artists, the first one is the main artist
    pub artists: Vec<Artist>,
    /// Direct preview clip, empty when the catalog has none
    pub preview_url: String,
    pub duration_ms: u32,
}

impl Track {
    /// Build a track from a full track object.
    ///
    /// Returns `None` when the object has no `id`, the one field the window
    /// needs to track a queue entry.
    pub fn from_json(json: &Value) -> Option<Self> {
        let id = json.get("id").and_then(Value::as_str)?;
        if id.is_empty() {
            return None;
        }

        Some(Self {
            id: id.to_string(),
            href: str_field(json, "href"),
            name: str_field(json, "name"),
            album: json.get("album").filter(|a| a.is_object()).map(Album::from_json).unwrap_or_default(),
            artists: artists_field(json),
            preview_url: str_field(json, "preview_url"),
            duration_ms: json
                .get("duration_ms")
                .and_then(Value::as_u64)
                .map_or(0, |ms| u32::try_from(ms).unwrap_or(u32::MAX)),
        })
    }

    /// Build a track from a playlist item wrapper (`{ "track": { ... } }`)
    pub fn from_playlist_item(json: &Value) -> Option<Self> {
        json.get("track").filter(|t| t.is_object()).and_then(Self::from_json)
    }

    /// Name of the first credited artist, or empty
    pub fn main_artist_name(&self) -> &str {
        self.artists.first().map(|a| a.name.as_str()).unwrap_or("")
    }

    /// Query used to find this track on the video index
    pub fn search_query(&self) -> String {
        format!("{} {} {}", self.name, self.main_artist_name(), self.album.name)
    }
}

fn str_field(json: &Value, key: &str) -> String {
    json.get(key).and_then(Value::as_str).unwrap_or_default().to_string()
}

fn artists_field(json: &Value) -> Vec<Artist> {
    json.get("artists")
        .and_then(Value::as_array)
        .map(|artists| artists.iter().map(Artist::from_json).collect())
        .unwrap_or_default()
}
