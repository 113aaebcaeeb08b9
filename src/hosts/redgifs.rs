//! RedGifs clips through the v2 API.
//!
//! The API needs a bearer token even for public clips. A temporary token is
//! requested from `/v2/auth/temporary` on first use and cached; a `401` on a
//! clip lookup drops the cached token and retries once with a fresh one.

use async_trait::async_trait;
use reqwest::header::AUTHORIZATION;
use reqwest::{Client, StatusCode};
use serde::Deserialize;
use tokio::sync::Mutex;
use tracing::debug;

use super::{MediaHost, ensure_success, transport_error};
use crate::classify::PendingMedia;
use crate::error::FetchError;
use crate::media::{MediaResult, MediaVariant};

/// Public RedGifs API base URL.
pub const DEFAULT_REDGIFS_API_URL: &str = "https://api.redgifs.com";

#[derive(Debug, Deserialize)]
struct TemporaryToken {
    token: String,
}

#[derive(Debug, Deserialize)]
struct GifResponse {
    gif: GifInfo,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct GifInfo {
    urls: GifUrls,
    duration: Option<f64>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct GifUrls {
    hd: Option<String>,
    sd: Option<String>,
    gif: Option<String>,
    thumbnail: Option<String>,
    poster: Option<String>,
}

/// Completes [`PendingMedia::RedGifs`].
pub struct RedGifsHost {
    client: Client,
    api_base_url: String,
    token: Mutex<Option<String>>,
}

impl RedGifsHost {
    /// Creates a host talking to `api_base_url` (see [`DEFAULT_REDGIFS_API_URL`]).
    #[must_use]
    pub fn new(client: Client, api_base_url: impl Into<String>) -> Self {
        Self {
            client,
            api_base_url: api_base_url.into().trim_end_matches('/').to_string(),
            token: Mutex::new(None),
        }
    }

    async fn bearer(&self) -> Result<String, FetchError> {
        let mut cached = self.token.lock().await;
        if let Some(token) = cached.as_ref() {
            return Ok(token.clone());
        }

        let url = format!("{}/v2/auth/temporary", self.api_base_url);
        let response = self
            .client
            .get(&url)
            .send()
            .await
            .map_err(|error| transport_error("redgifs", &url, &error))?;
        let token: TemporaryToken = ensure_success("redgifs", &url, response)?
            .json()
            .await
            .map_err(|error| {
                FetchError::upstream(format!("redgifs: invalid token response from {url}: {error}"))
            })?;
        if token.token.is_empty() {
            return Err(FetchError::upstream("redgifs: empty temporary token"));
        }

        debug!("Acquired RedGifs temporary token");
        let bearer = format!("Bearer {}", token.token);
        *cached = Some(bearer.clone());
        Ok(bearer)
    }

    async fn lookup(&self, gif_id: &str) -> Result<GifInfo, FetchError> {
        let url = format!("{}/v2/gifs/{gif_id}", self.api_base_url);

        for attempt in 0..2 {
            let bearer = self.bearer().await?;
            let response = self
                .client
                .get(&url)
                .header(AUTHORIZATION, bearer)
                .send()
                .await
                .map_err(|error| transport_error("redgifs", &url, &error))?;

            if response.status() == StatusCode::UNAUTHORIZED && attempt == 0 {
                debug!("RedGifs token rejected; requesting a new one");
                self.token.lock().await.take();
                continue;
            }

            let body: GifResponse = ensure_success("redgifs", &url, response)?
                .json()
                .await
                .map_err(|error| {
                    FetchError::upstream(format!("redgifs: invalid gif response from {url}: {error}"))
                })?;
            return Ok(body.gif);
        }

        Err(FetchError::upstream(format!(
            "redgifs: {url} rejected a fresh token"
        )))
    }
}

impl std::fmt::Debug for RedGifsHost {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RedGifsHost")
            .field("api_base_url", &self.api_base_url)
            .finish_non_exhaustive()
    }
}

#[async_trait]
impl MediaHost for RedGifsHost {
    fn name(&self) -> &'static str {
        "redgifs"
    }

    fn can_handle(&self, pending: &PendingMedia) -> bool {
        matches!(pending, PendingMedia::RedGifs { .. })
    }

    #[tracing::instrument(skip(self, pending), fields(host = "redgifs"))]
    async fn fetch(&self, pending: &PendingMedia) -> Result<MediaResult, FetchError> {
        let PendingMedia::RedGifs { gif_id, meta } = pending else {
            return Err(FetchError::internal("redgifs host given other media"));
        };

        let info = self.lookup(gif_id).await?;
        let variants = gif_variants(&info.urls);
        if variants.is_empty() {
            return Err(FetchError::upstream(format!(
                "redgifs: gif {gif_id} has no media urls"
            )));
        }

        let mut meta = meta.clone();
        if let Some(thumbnail) = info.urls.thumbnail.or(info.urls.poster) {
            meta.thumbnail = Some(thumbnail);
        }
        if let Some(duration) = info.duration.filter(|d| d.is_finite() && *d > 0.0) {
            meta.duration_secs = whole_seconds(duration);
        }
        Ok(meta.into_result(variants))
    }
}

#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
fn whole_seconds(duration: f64) -> u64 {
    duration.round() as u64
}

/// `hd`, `sd`, `gif` renditions, in that order, labelled by their field name.
fn gif_variants(urls: &GifUrls) -> Vec<MediaVariant> {
    [("hd", &urls.hd), ("sd", &urls.sd), ("gif", &urls.gif)]
        .into_iter()
        .filter_map(|(label, link)| {
            link.as_deref()
                .filter(|link| !link.is_empty())
                .map(|link| MediaVariant::new(link, label))
        })
        .collect()
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_gif_variants_order_and_labels() {
        let urls = GifUrls {
            hd: Some("https://media.redgifs.com/A.mp4".to_string()),
            sd: Some("https://media.redgifs.com/A-mobile.mp4".to_string()),
            gif: None,
            thumbnail: None,
            poster: None,
        };
        let labels: Vec<String> = gif_variants(&urls).into_iter().map(|v| v.quality).collect();
        assert_eq!(labels, vec!["hd", "sd"]);
    }

    #[test]
    fn test_gif_response_tolerates_missing_fields() {
        let body: GifResponse = serde_json::from_str(r#"{"gif": {"urls": {"sd": "x"}}}"#).unwrap();
        assert_eq!(body.gif.urls.sd.as_deref(), Some("x"));
        assert!(body.gif.duration.is_none());
    }

    #[test]
    fn test_debug_hides_token() {
        let host = RedGifsHost::new(Client::builder().no_proxy().build().unwrap(), "https://api.redgifs.com/");
        let debug = format!("{host:?}");
        assert!(debug.contains("https://api.redgifs.com"));
        assert!(!debug.contains("token"));
    }
}
