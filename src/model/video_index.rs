//! Innertube client for the external video index
//!
//! Only the two calls the resolver needs: `/search` for a video id and
//! `/player` for the stream list. Streams behind a signature cipher are
//! skipped since they have no direct url.

use anyhow::{Context, Result};
use async_trait::async_trait;
use serde_json::{json, Value};

use crate::session::{StreamCandidate, VideoIndexClient};

const CLIENT_NAME: &str = "ANDROID";
const CLIENT_NAME_ID: i32 = 3;
const CLIENT_VERSION: &str = "19.44.38";
const ANDROID_SDK_VERSION: i32 = 34;
const USER_AGENT: &str = "com.google.android.youtube/19.44.38 (Linux; U; Android 14; en_US; Pixel 8) gzip";

#[derive(Clone)]
pub struct InnertubeClient {
    http: reqwest::Client,
    base_url: String,
}

impl InnertubeClient {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            http: reqwest::Client::new(),
            base_url: base_url.into().trim_end_matches('/').to_string(),
        }
    }

    fn context() -> Value {
        json!({
            "client": {
                "clientName": CLIENT_NAME,
                "clientVersion": CLIENT_VERSION,
                "androidSdkVersion": ANDROID_SDK_VERSION,
                "hl": "en",
                "gl": "US",
            }
        })
    }

    async fn post(&self, endpoint: &str, body: Value) -> Result<Value> {
        let url = format!("{}/youtubei/v1/{}?prettyPrint=false", self.base_url, endpoint);
        let response = self
            .http
            .post(&url)
            .header("User-Agent", USER_AGENT)
            .header("X-YouTube-Client-Name", CLIENT_NAME_ID.to_string())
            .header("X-YouTube-Client-Version", CLIENT_VERSION)
            .json(&body)
            .send()
            .await
            .with_context(|| format!("POST {url}"))?
            .error_for_status()?;

        response.json::<Value>().await.context("invalid innertube response")
    }
}

#[async_trait]
impl VideoIndexClient for InnertubeClient {
    async fn search(&self, query: &str) -> Result<Option<String>> {
        crate::log_api_request!("innertube_search", query);
        let body = json!({
            "context": Self::context(),
            "query": query,
        });
        let result = self.post("search", body).await;
        crate::log_api_result!("innertube_search", result);
        Ok(first_video_id(&result?))
    }

    async fn list_streams(&self, video_id: &str) -> Result<Vec<StreamCandidate>> {
        crate::log_api_request!("innertube_player", video_id);
        let body = json!({
            "context": Self::context(),
            "videoId": video_id,
            "contentCheckOk": true,
            "racyCheckOk": true,
        });
        let result = self.post("player", body).await;
        crate::log_api_result!("innertube_player", result);
        let candidates = stream_candidates(&result?);
        tracing::debug!(video_id, count = candidates.len(), "Streams listed");
        Ok(candidates)
    }

    async fn fetch_stream(&self, uri: &str) -> Result<Vec<u8>> {
        let response = self
            .http
            .get(uri)
            .header("User-Agent", USER_AGENT)
            .send()
            .await
            .context("stream request failed")?
            .error_for_status()?;
        Ok(response.bytes().await?.to_vec())
    }
}

/// First `videoRenderer.videoId` anywhere in a search response
pub fn first_video_id(json: &Value) -> Option<String> {
    match json {
        Value::Object(map) => {
            if let Some(id) = map
                .get("videoRenderer")
                .and_then(|r| r.get("videoId"))
                .and_then(Value::as_str)
            {
                return Some(id.to_string());
            }
            map.values().find_map(first_video_id)
        }
        Value::Array(items) => items.iter().find_map(first_video_id),
        _ => None,
    }
}

/// Muxed `formats` plus audio-only `adaptiveFormats` from a player response
pub fn stream_candidates(json: &Value) -> Vec<StreamCandidate> {
    let Some(streaming) = json.get("streamingData") else {
        return Vec::new();
    };

    let muxed = streaming
        .get("formats")
        .and_then(Value::as_array)
        .into_iter()
        .flatten()
        .filter_map(|f| candidate(f, false));

    let audio_only = streaming
        .get("adaptiveFormats")
        .and_then(Value::as_array)
        .into_iter()
        .flatten()
        .filter(|f| {
            f.get("mimeType")
                .and_then(Value::as_str)
                .is_some_and(|m| m.starts_with("audio/"))
        })
        .filter_map(|f| candidate(f, true));

    muxed.chain(audio_only).collect()
}

fn candidate(format: &Value, is_audio_only: bool) -> Option<StreamCandidate> {
    let url = format.get("url").and_then(Value::as_str)?;
    Some(StreamCandidate {
        itag: format.get("itag").and_then(Value::as_u64)? as u32,
        is_audio_only,
        bitrate: format.get("bitrate").and_then(Value::as_u64).unwrap_or(0),
        mime_type: format
            .get("mimeType")
            .and_then(Value::as_str)
            .map(|m| m.split(';').next().unwrap_or(m).trim().to_string())
            .unwrap_or_default(),
        url: Some(url.to_string()),
    })
}
