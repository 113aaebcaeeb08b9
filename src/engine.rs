//! The resolution facade: pasted text in, [`ResolvedResult`] out.
//!
//! [`ResolutionEngine::resolve`] runs the whole pipeline:
//!
//! 1. extract the post or comment id from the text (following at most one
//!    redirect for share and `v.redd.it` links)
//! 2. fetch the `api/info` document with the application token
//! 3. classify it, which either finishes the result or yields pending media
//! 4. complete pending media through the registered media hosts
//!
//! Every failure is a [`FetchError`]. Its internal detail is logged here at
//! `warn`; callers show [`FetchError::user_message`] to the user.

use tracing::{info, instrument, warn};

use crate::classify::{ClassifyPolicy, ClassifyStep, ContentClassifier};
use crate::error::FetchError;
use crate::hosts::{DEFAULT_REDGIFS_API_URL, DashHost, HostRegistry, RedGifsHost, StreamableHost};
use crate::http_client::{HttpTimeouts, build_http_client};
use crate::media::ResolvedResult;
use crate::reddit::{
    DEFAULT_API_BASE_URL, DEFAULT_TOKEN_URL, HeadRedirectFollower, PostIdentifierResolver,
    RateLimitWindow, RedditCredentials, ThingKind, TokenAuthority,
};
use crate::user_agent::{DEFAULT_UA_AUTHOR, media_host_user_agent, reddit_user_agent};

/// Base URLs of every remote service the engine talks to.
///
/// Overridden in tests to point at mock servers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Endpoints {
    /// Reddit OAuth token endpoint.
    pub reddit_token_url: String,
    /// Reddit API base URL (`/api/info/` is appended).
    pub reddit_api_base_url: String,
    /// RedGifs API base URL (`/v2/...` is appended).
    pub redgifs_api_base_url: String,
}

impl Default for Endpoints {
    fn default() -> Self {
        Self {
            reddit_token_url: DEFAULT_TOKEN_URL.to_string(),
            reddit_api_base_url: DEFAULT_API_BASE_URL.to_string(),
            redgifs_api_base_url: DEFAULT_REDGIFS_API_URL.to_string(),
        }
    }
}

/// Configuration of a [`ResolutionEngine`].
#[derive(Debug, Clone)]
pub struct EngineConfig {
    /// Reddit application credentials.
    pub credentials: RedditCredentials,
    /// Reject posts marked NSFW.
    pub deny_nsfw: bool,
    /// Timeouts applied to every outbound request.
    pub timeouts: HttpTimeouts,
    /// Reddit username advertised in the API User-Agent.
    pub ua_author: String,
    /// Remote service base URLs.
    pub endpoints: Endpoints,
}

impl EngineConfig {
    /// Creates a configuration with default policy, timeouts and endpoints.
    #[must_use]
    pub fn new(credentials: RedditCredentials) -> Self {
        Self {
            credentials,
            deny_nsfw: false,
            timeouts: HttpTimeouts::default(),
            ua_author: DEFAULT_UA_AUTHOR.to_string(),
            endpoints: Endpoints::default(),
        }
    }
}

/// Builds the media host registry: DASH manifests, Streamable, RedGifs.
#[must_use]
pub fn build_default_host_registry(
    client: &reqwest::Client,
    redgifs_api_base_url: &str,
) -> HostRegistry {
    let mut registry = HostRegistry::new();
    registry.register(Box::new(DashHost::new(client.clone())));
    registry.register(Box::new(StreamableHost::new(client.clone())));
    registry.register(Box::new(RedGifsHost::new(
        client.clone(),
        redgifs_api_base_url,
    )));
    registry
}

/// Resolves pasted text into typed Reddit content.
///
/// One engine serves any number of concurrent [`resolve`](Self::resolve)
/// calls. It owns the token refresh task, which stops on
/// [`shutdown`](Self::shutdown) or drop.
#[derive(Debug)]
pub struct ResolutionEngine {
    authority: TokenAuthority,
    post_ids: PostIdentifierResolver,
    classifier: ContentClassifier,
    hosts: HostRegistry,
}

impl ResolutionEngine {
    /// Builds the HTTP clients, acquires the first Reddit token and starts
    /// the refresh task.
    ///
    /// # Errors
    ///
    /// Returns a [`FetchError`] when a client cannot be built or the first
    /// token cannot be acquired.
    pub async fn new(config: EngineConfig) -> Result<Self, FetchError> {
        let reddit_client = build_http_client(
            "reddit",
            reddit_user_agent(&config.ua_author),
            config.timeouts,
        )?;
        let media_client = build_http_client("media", media_host_user_agent(), config.timeouts)?;

        let authority = TokenAuthority::start(
            reddit_client.clone(),
            config.credentials,
            config.endpoints.reddit_token_url,
            config.endpoints.reddit_api_base_url,
        )
        .await?;

        info!(deny_nsfw = config.deny_nsfw, "Resolution engine ready");
        Ok(Self {
            authority,
            post_ids: PostIdentifierResolver::new(Box::new(HeadRedirectFollower::new(
                reddit_client,
            ))),
            classifier: ContentClassifier::new(ClassifyPolicy {
                deny_nsfw: config.deny_nsfw,
            }),
            hosts: build_default_host_registry(
                &media_client,
                &config.endpoints.redgifs_api_base_url,
            ),
        })
    }

    /// Resolves the first Reddit link in `text`.
    ///
    /// # Errors
    ///
    /// Returns a [`FetchError`] describing why the content could not be
    /// resolved; see [`FetchErrorKind`](crate::error::FetchErrorKind).
    #[instrument(skip(self, text))]
    pub async fn resolve(&self, text: &str) -> Result<ResolvedResult, FetchError> {
        let result = self.resolve_inner(text).await;
        if let Err(error) = &result
            && let Some(detail) = error.internal_detail()
        {
            warn!(kind = ?error.kind(), detail, "Resolution failed");
        }
        result
    }

    async fn resolve_inner(&self, text: &str) -> Result<ResolvedResult, FetchError> {
        let target = self.post_ids.resolve(text).await?;

        if target.is_comment {
            let document = self
                .authority
                .get_thing(ThingKind::Comment, &target.id)
                .await?;
            return self.classifier.classify_comment_document(document);
        }

        let document = self.authority.get_thing(ThingKind::Post, &target.id).await?;
        match self.classifier.classify_document(document)? {
            ClassifyStep::Done(result) => Ok(result),
            ClassifyStep::Fetch(pending) => {
                Ok(ResolvedResult::Media(self.hosts.complete(&pending).await?))
            }
        }
    }

    /// Returns the shared Reddit rate-limit window.
    #[must_use]
    pub fn rate_limit(&self) -> &RateLimitWindow {
        self.authority.rate_limit()
    }

    /// Stops the token refresh task. In-flight and later calls keep using the
    /// last token until it expires.
    pub fn shutdown(&self) {
        self.authority.shutdown();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_endpoints() {
        let endpoints = Endpoints::default();
        assert_eq!(
            endpoints.reddit_token_url,
            "https://www.reddit.com/api/v1/access_token"
        );
        assert_eq!(endpoints.reddit_api_base_url, "https://api.reddit.com");
        assert_eq!(endpoints.redgifs_api_base_url, "https://api.redgifs.com");
    }

    #[test]
    fn test_engine_config_defaults() {
        let config = EngineConfig::new(RedditCredentials::new("id", "secret"));
        assert!(!config.deny_nsfw);
        assert_eq!(config.ua_author, DEFAULT_UA_AUTHOR);
        assert_eq!(config.timeouts, HttpTimeouts::default());
        assert!(!format!("{config:?}").contains("secret"));
    }

    #[test]
    fn test_default_host_registry_has_every_host() {
        let client = reqwest::Client::builder().no_proxy().build();
        if let Ok(client) = client {
            let registry = build_default_host_registry(&client, DEFAULT_REDGIFS_API_URL);
            assert_eq!(registry.host_count(), 3);
        }
    }
}
