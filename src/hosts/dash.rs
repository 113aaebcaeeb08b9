//! Reddit-hosted video: fetch the DASH manifest and build the quality ladder.

use async_trait::async_trait;
use reqwest::Client;
use tracing::debug;

use super::{MediaHost, ensure_success, transport_error};
use crate::classify::PendingMedia;
use crate::error::FetchError;
use crate::media::MediaResult;
use crate::media::dash::{build_quality_ladder, manifest_base_url, parse_manifest};

/// Completes [`PendingMedia::DashManifest`].
#[derive(Debug, Clone)]
pub struct DashHost {
    client: Client,
}

impl DashHost {
    /// Creates a host using the shared media client.
    #[must_use]
    pub fn new(client: Client) -> Self {
        Self { client }
    }
}

#[async_trait]
impl MediaHost for DashHost {
    fn name(&self) -> &'static str {
        "dash"
    }

    fn can_handle(&self, pending: &PendingMedia) -> bool {
        matches!(pending, PendingMedia::DashManifest { .. })
    }

    #[tracing::instrument(skip(self, pending), fields(host = "dash"))]
    async fn fetch(&self, pending: &PendingMedia) -> Result<MediaResult, FetchError> {
        let PendingMedia::DashManifest { manifest_url, meta } = pending else {
            return Err(FetchError::internal("dash host given non-DASH media"));
        };

        let response = self
            .client
            .get(manifest_url)
            .send()
            .await
            .map_err(|error| transport_error("dash", manifest_url, &error))?;
        let xml = ensure_success("dash", manifest_url, response)?
            .text()
            .await
            .map_err(|error| transport_error("dash", manifest_url, &error))?;

        let available = parse_manifest(&xml)?;
        debug!(
            videos = available.videos.len(),
            audios = available.audios.len(),
            "Parsed DASH manifest"
        );
        let ladder = build_quality_ladder(&manifest_base_url(manifest_url), &available)?;
        Ok(meta.clone().into_result(ladder))
    }
}
