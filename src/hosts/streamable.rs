//! Streamable pages: the video link is published in the `og:video` meta tag.

use async_trait::async_trait;
use reqwest::Client;
use reqwest::header::ACCEPT;

use super::{MediaHost, ensure_success, transport_error};
use crate::classify::PendingMedia;
use crate::error::FetchError;
use crate::media::{MediaResult, MediaVariant, ORIGINAL_QUALITY_LABEL};
use crate::utils::{OG_VIDEO_RE, extract_meta_value};

/// Completes [`PendingMedia::Streamable`].
#[derive(Debug, Clone)]
pub struct StreamableHost {
    client: Client,
}

impl StreamableHost {
    /// Creates a host using the shared media client.
    #[must_use]
    pub fn new(client: Client) -> Self {
        Self { client }
    }
}

#[async_trait]
impl MediaHost for StreamableHost {
    fn name(&self) -> &'static str {
        "streamable"
    }

    fn can_handle(&self, pending: &PendingMedia) -> bool {
        matches!(pending, PendingMedia::Streamable { .. })
    }

    #[tracing::instrument(skip(self, pending), fields(host = "streamable"))]
    async fn fetch(&self, pending: &PendingMedia) -> Result<MediaResult, FetchError> {
        let PendingMedia::Streamable { page_url, meta } = pending else {
            return Err(FetchError::internal("streamable host given other media"));
        };

        let response = self
            .client
            .get(page_url)
            .header(ACCEPT, "text/html,application/xhtml+xml")
            .send()
            .await
            .map_err(|error| transport_error("streamable", page_url, &error))?;
        let html = ensure_success("streamable", page_url, response)?
            .text()
            .await
            .map_err(|error| transport_error("streamable", page_url, &error))?;

        let link = extract_meta_value(&html, &OG_VIDEO_RE).ok_or_else(|| {
            FetchError::upstream(format!("streamable: no og:video tag on {page_url}"))
        })?;
        Ok(meta
            .clone()
            .into_result(vec![MediaVariant::new(link, ORIGINAL_QUALITY_LABEL)]))
    }
}
