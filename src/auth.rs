use std::collections::HashSet;
use std::fs;
use std::time::Instant;

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use librespot_oauth::{OAuthClient, OAuthClientBuilder, OAuthToken};
use rspotify::Token;

const SPOTIFY_CLIENT_ID: &str = "492e1e45ea814fa3ac555fe1576aaf5b";
const SPOTIFY_REDIRECT_URI: &str = "http://127.0.0.1:8898/login";
pub const SCOPES: &str = "user-read-private playlist-read-private playlist-read-collaborative user-library-read";

const RESPONSE: &str = r#"
<!doctype html>
<html>
<head><title>Success</title></head>
<body><h1>Authentication Successful!</h1><script>window.close();</script></body>
</html>
"#;
const CACHE: &str = ".cache";
const REFRESH_TOKEN_FILE: &str = ".cache/refresh_token";

#[derive(Clone)]
pub struct AuthResult {
    pub rspotify_token: Token,
    pub refresh_token: String,
}

fn oauth_client(interactive: bool) -> Result<OAuthClient> {
    let builder = OAuthClientBuilder::new(
        SPOTIFY_CLIENT_ID,
        SPOTIFY_REDIRECT_URI,
        SCOPES.split_whitespace().collect(),
    );
    let builder = if interactive {
        builder.open_in_browser().with_custom_message(RESPONSE)
    } else {
        builder
    };
    builder.build().context("Failed to build OAuth client")
}

fn save_refresh_token(refresh_token: &str) {
    if let Err(e) = fs::create_dir_all(CACHE).and_then(|_| fs::write(REFRESH_TOKEN_FILE, refresh_token)) {
        tracing::warn!(error = %e, "Could not persist refresh token");
    } else {
        tracing::debug!("Saved refresh token to disk");
    }
}

fn expiry(token: &OAuthToken) -> DateTime<Utc> {
    let remaining = token.expires_at.saturating_duration_since(Instant::now());
    Utc::now() + chrono::Duration::from_std(remaining).unwrap_or_else(|_| chrono::Duration::seconds(3600))
}

pub fn rspotify_token(access_token: String, expires_at: DateTime<Utc>) -> Token {
    Token {
        access_token,
        expires_in: expires_at - Utc::now(),
        expires_at: Some(expires_at),
        scopes: SCOPES
            .split_whitespace()
            .map(|s| s.to_string())
            .collect::<HashSet<String>>(),
        refresh_token: None,
    }
}

async fn perform_browser_auth() -> Result<OAuthToken> {
    tracing::info!("Starting browser-based OAuth flow");
    let token = oauth_client(true)?
        .get_access_token_async()
        .await
        .context("Failed to get token")?;

    save_refresh_token(&token.refresh_token);
    tracing::info!("Browser authentication completed successfully");
    Ok(token)
}

/// Exchange a refresh token for a new access token
///
/// Returns the access token, the (possibly rotated) refresh token and the expiry.
pub async fn refresh_access_token(refresh_token: &str) -> Result<(String, String, DateTime<Utc>)> {
    let token = oauth_client(false)?
        .refresh_token_async(refresh_token)
        .await
        .context("Token refresh failed")?;

    save_refresh_token(&token.refresh_token);
    let expires_at = expiry(&token);
    Ok((token.access_token, token.refresh_token, expires_at))
}

/// Reuse the stored refresh token when it still works, otherwise log in through the browser
pub async fn perform_oauth_flow() -> Result<AuthResult> {
    let stored_refresh_token = fs::read_to_string(REFRESH_TOKEN_FILE).ok();

    let token = match stored_refresh_token {
        Some(refresh_token) if !refresh_token.trim().is_empty() => {
            tracing::info!("Found cached refresh token");
            match oauth_client(false)?.refresh_token_async(refresh_token.trim()).await {
                Ok(token) => {
                    save_refresh_token(&token.refresh_token);
                    tracing::debug!("Token refreshed successfully");
                    token
                }
                Err(e) => {
                    tracing::warn!(error = %e, "Cached refresh token failed, re-authenticating");
                    perform_browser_auth().await?
                }
            }
        }
        _ => {
            tracing::info!("No cached credentials found, starting browser authentication");
            perform_browser_auth().await?
        }
    };

    let expires_at = expiry(&token);
    Ok(AuthResult {
        rspotify_token: rspotify_token(token.access_token, expires_at),
        refresh_token: token.refresh_token,
    })
}
