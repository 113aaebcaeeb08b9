//! Network completion of [`PendingMedia`].
//!
//! Classification stops at the first piece of media that needs another
//! round-trip. A [`MediaHost`] knows how to finish one kind of pending media;
//! the [`HostRegistry`] dispatches to the first host that accepts it.
//!
//! - [`DashHost`] - Reddit-hosted video via its DASH manifest
//! - [`StreamableHost`] - Streamable pages via the `og:video` meta tag
//! - [`RedGifsHost`] - RedGifs clips via the v2 API

mod dash;
mod redgifs;
mod streamable;

pub use dash::DashHost;
pub use redgifs::{DEFAULT_REDGIFS_API_URL, RedGifsHost};
pub use streamable::StreamableHost;

use async_trait::async_trait;
use reqwest::Response;
use tracing::debug;

use crate::classify::PendingMedia;
use crate::error::FetchError;
use crate::media::MediaResult;

/// A third-party or Reddit media endpoint that completes pending media.
#[async_trait]
pub trait MediaHost: Send + Sync {
    /// Short name used in logs.
    fn name(&self) -> &'static str;

    /// Returns true when this host can complete `pending`.
    fn can_handle(&self, pending: &PendingMedia) -> bool;

    /// Fetches what is missing and returns the finished media.
    ///
    /// # Errors
    ///
    /// Returns an upstream [`FetchError`] on network, status or decode failures.
    async fn fetch(&self, pending: &PendingMedia) -> Result<MediaResult, FetchError>;
}

/// Ordered collection of media hosts.
#[derive(Default)]
pub struct HostRegistry {
    hosts: Vec<Box<dyn MediaHost>>,
}

impl HostRegistry {
    /// Creates an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self { hosts: Vec::new() }
    }

    /// Registers a host; earlier registrations win.
    #[tracing::instrument(skip(self, host), fields(host_name = host.name()))]
    pub fn register(&mut self, host: Box<dyn MediaHost>) {
        debug!("Registering media host");
        self.hosts.push(host);
    }

    /// Returns the number of registered hosts.
    #[must_use]
    pub fn host_count(&self) -> usize {
        self.hosts.len()
    }

    /// Returns true if no hosts are registered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.hosts.is_empty()
    }

    /// Completes `pending` with the first host that accepts it.
    ///
    /// # Errors
    ///
    /// Returns the host's [`FetchError`], or an internal error when no host
    /// is registered for this kind of media.
    pub async fn complete(&self, pending: &PendingMedia) -> Result<MediaResult, FetchError> {
        let Some(host) = self.hosts.iter().find(|host| host.can_handle(pending)) else {
            return Err(FetchError::internal(format!(
                "no media host registered for {pending:?}"
            )));
        };
        debug!(host = host.name(), "Completing pending media");
        host.fetch(pending).await
    }
}

impl std::fmt::Debug for HostRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let names: Vec<&str> = self.hosts.iter().map(|host| host.name()).collect();
        f.debug_struct("HostRegistry").field("hosts", &names).finish()
    }
}

/// Maps a transport failure of `host` into an upstream error.
fn transport_error(host: &str, url: &str, error: &reqwest::Error) -> FetchError {
    FetchError::upstream(format!("{host}: request to {url} failed: {error}"))
}

/// Rejects non-success responses with an upstream error.
fn ensure_success(host: &str, url: &str, response: Response) -> Result<Response, FetchError> {
    let status = response.status();
    if status.is_success() {
        Ok(response)
    } else {
        Err(FetchError::upstream(format!(
            "{host}: {url} returned HTTP {status}"
        )))
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::classify::MediaMeta;
    use crate::error::FetchErrorKind;
    use crate::media::{MediaKind, MediaVariant};

    struct FixedHost;

    #[async_trait]
    impl MediaHost for FixedHost {
        fn name(&self) -> &'static str {
            "fixed"
        }

        fn can_handle(&self, pending: &PendingMedia) -> bool {
            matches!(pending, PendingMedia::Streamable { .. })
        }

        async fn fetch(&self, pending: &PendingMedia) -> Result<MediaResult, FetchError> {
            Ok(pending
                .meta()
                .clone()
                .into_result(vec![MediaVariant::new("https://cdn/v.mp4", "Original")]))
        }
    }

    fn meta() -> MediaMeta {
        MediaMeta {
            title: "clip".to_string(),
            thumbnail: None,
            duration_secs: 3,
            kind: MediaKind::Video,
        }
    }

    #[tokio::test]
    async fn test_registry_dispatches_to_accepting_host() {
        let mut registry = HostRegistry::new();
        registry.register(Box::new(FixedHost));
        assert_eq!(registry.host_count(), 1);

        let pending = PendingMedia::Streamable {
            page_url: "https://streamable.com/x".to_string(),
            meta: meta(),
        };
        let media = registry.complete(&pending).await.unwrap();
        assert_eq!(media.title, "clip");
        assert_eq!(media.duration_secs, 3);
        assert_eq!(media.variants.len(), 1);
    }

    #[tokio::test]
    async fn test_registry_without_handler_is_internal_error() {
        let mut registry = HostRegistry::new();
        registry.register(Box::new(FixedHost));

        let pending = PendingMedia::RedGifs {
            gif_id: "abc".to_string(),
            meta: meta(),
        };
        let err = registry.complete(&pending).await.unwrap_err();
        assert_eq!(err.kind(), FetchErrorKind::Internal);
    }

    #[test]
    fn test_empty_registry() {
        let registry = HostRegistry::default();
        assert!(registry.is_empty());
        assert_eq!(format!("{registry:?}"), "HostRegistry { hosts: [] }");
    }
}
