//! OAuth client-credentials token lifecycle and authenticated Reddit API calls.
//!
//! [`TokenAuthority`] acquires an application-only bearer token at start-up,
//! keeps it fresh from a single background task, and performs every
//! authenticated `api/info` call while enforcing the shared
//! [`RateLimitWindow`].
//!
//! # Refresh schedule
//!
//! The refresh task sleeps until one minute before the current token expires,
//! but never less than [`MIN_REFRESH_DELAY`].
//! If the rate-limit window is closed when a refresh is due, it first waits for
//! the window to open and then refreshes immediately. A failed refresh is
//! retried after [`REFRESH_RETRY_BACKOFF`]; the previous token keeps serving
//! requests in the meantime.

use std::sync::{Arc, PoisonError, RwLock};
use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use reqwest::header::{AUTHORIZATION, CONTENT_TYPE};
use serde::Deserialize;
use thiserror::Error;
use tokio::task::JoinHandle;
use tracing::{debug, info, instrument, warn};

use crate::error::FetchError;

use super::rate_limit::RateLimitWindow;

/// Form body of the client-credentials grant.
const TOKEN_GRANT_BODY: &str = "grant_type=client_credentials&duration=permanent";

/// A token is refreshed this long before it expires.
pub const REFRESH_MARGIN: Duration = Duration::from_secs(60);

/// Delay before retrying a failed refresh.
pub const REFRESH_RETRY_BACKOFF: Duration = Duration::from_secs(120);

/// Shortest pause between two scheduled refreshes.
pub const MIN_REFRESH_DELAY: Duration = Duration::from_secs(30);

/// Errors produced by token acquisition and authenticated API calls.
#[derive(Debug, Error)]
pub enum TokenError {
    /// The rate-limit window is closed; no request was made or the response exhausted the budget.
    #[error("Reddit API rate limited until unix second {resume_at}")]
    RateLimited {
        /// Unix second at which calls may resume.
        resume_at: u64,
    },

    /// Transport-level failure (DNS, connect, TLS, timeout, body read).
    #[error("request to {url} failed: {source}")]
    Transport {
        /// The requested URL.
        url: String,
        /// The underlying client error.
        #[source]
        source: reqwest::Error,
    },

    /// Non-success HTTP status.
    #[error("{url} returned HTTP {status}")]
    Status {
        /// The requested URL.
        url: String,
        /// The HTTP status code.
        status: u16,
    },

    /// Response body could not be decoded.
    #[error("cannot decode response from {url}: {reason}")]
    Decode {
        /// The requested URL.
        url: String,
        /// Why decoding failed.
        reason: String,
    },
}

impl From<TokenError> for FetchError {
    fn from(error: TokenError) -> Self {
        match error {
            TokenError::RateLimited { .. } => Self::rate_limited(error.to_string()),
            other => Self::upstream(other.to_string()),
        }
    }
}

/// Reddit application credentials.
#[derive(Clone)]
pub struct RedditCredentials {
    client_id: String,
    client_secret: String,
}

impl RedditCredentials {
    /// Creates credentials from a client id and secret.
    #[must_use]
    pub fn new(client_id: impl Into<String>, client_secret: impl Into<String>) -> Self {
        Self {
            client_id: client_id.into(),
            client_secret: client_secret.into(),
        }
    }

    /// Returns the client id.
    #[must_use]
    pub fn client_id(&self) -> &str {
        &self.client_id
    }
}

impl std::fmt::Debug for RedditCredentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RedditCredentials")
            .field("client_id", &self.client_id)
            .finish_non_exhaustive()
    }
}

/// Kind of Reddit "thing" looked up through `api/info`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ThingKind {
    /// A link post (`t3_`).
    Post,
    /// A comment (`t1_`).
    Comment,
}

impl ThingKind {
    /// Returns the fullname prefix of this kind.
    #[must_use]
    pub fn prefix(self) -> &'static str {
        match self {
            Self::Post => "t3",
            Self::Comment => "t1",
        }
    }
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
    expires_in: u64,
}

struct AuthorityState {
    client: Client,
    credentials: RedditCredentials,
    token_url: String,
    api_base_url: String,
    auth_header: RwLock<String>,
    rate_limit: RateLimitWindow,
}

impl AuthorityState {
    #[instrument(skip(self), fields(client_id = %self.credentials.client_id))]
    async fn request_token(&self) -> Result<TokenResponse, TokenError> {
        let url = self.token_url.as_str();
        let response = self
            .client
            .post(url)
            .basic_auth(
                &self.credentials.client_id,
                Some(&self.credentials.client_secret),
            )
            .header(CONTENT_TYPE, "application/x-www-form-urlencoded")
            .body(TOKEN_GRANT_BODY)
            .send()
            .await
            .map_err(|source| TokenError::Transport {
                url: url.to_string(),
                source,
            })?;

        let status = response.status();
        if !status.is_success() {
            return Err(TokenError::Status {
                url: url.to_string(),
                status: status.as_u16(),
            });
        }

        let body = response
            .bytes()
            .await
            .map_err(|source| TokenError::Transport {
                url: url.to_string(),
                source,
            })?;
        let token: TokenResponse =
            serde_json::from_slice(&body).map_err(|error| TokenError::Decode {
                url: url.to_string(),
                reason: error.to_string(),
            })?;
        if token.access_token.is_empty() {
            return Err(TokenError::Decode {
                url: url.to_string(),
                reason: "empty access_token".to_string(),
            });
        }

        Ok(token)
    }

    fn current_header(&self) -> String {
        self.auth_header
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}

/// Something the refresh loop can rotate: a token source guarded by a rate-limit window.
#[async_trait]
trait TokenSource: Send + Sync {
    /// Requests a new token, swaps it in and returns its lifetime.
    async fn refresh(&self) -> Result<Duration, TokenError>;

    fn window(&self) -> &RateLimitWindow;
}

#[async_trait]
impl TokenSource for AuthorityState {
    async fn refresh(&self) -> Result<Duration, TokenError> {
        let token = self.request_token().await?;
        let header = format!("bearer {}", token.access_token);
        *self
            .auth_header
            .write()
            .unwrap_or_else(PoisonError::into_inner) = header;
        debug!(expires_in = token.expires_in, "Reddit token refreshed");
        Ok(Duration::from_secs(token.expires_in))
    }

    fn window(&self) -> &RateLimitWindow {
        &self.rate_limit
    }
}

/// Owner of the Reddit bearer token and the rate-limit window.
///
/// Construct once with [`TokenAuthority::start`] and share by reference. The
/// background refresh task stops on [`TokenAuthority::shutdown`] or drop.
pub struct TokenAuthority {
    state: Arc<AuthorityState>,
    refresh_task: std::sync::Mutex<Option<JoinHandle<()>>>,
}

impl TokenAuthority {
    /// Acquires the first token and starts the refresh task.
    ///
    /// Must be called from within a Tokio runtime.
    ///
    /// # Errors
    ///
    /// Returns [`TokenError`] when the initial token cannot be acquired.
    pub async fn start(
        client: Client,
        credentials: RedditCredentials,
        token_url: impl Into<String>,
        api_base_url: impl Into<String>,
    ) -> Result<Self, TokenError> {
        let state = Arc::new(AuthorityState {
            client,
            credentials,
            token_url: token_url.into(),
            api_base_url: api_base_url.into().trim_end_matches('/').to_string(),
            auth_header: RwLock::new(String::new()),
            rate_limit: RateLimitWindow::new(),
        });

        let expires_in = state.refresh().await?;
        info!(
            expires_in_secs = expires_in.as_secs(),
            "Reddit token acquired"
        );

        let task = tokio::spawn(refresh_loop(Arc::clone(&state), expires_in));
        Ok(Self {
            state,
            refresh_task: std::sync::Mutex::new(Some(task)),
        })
    }

    /// Stops the background refresh task. The current token stays usable.
    pub fn shutdown(&self) {
        let task = self
            .refresh_task
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        if let Some(task) = task {
            task.abort();
            debug!("token refresh task stopped");
        }
    }

    /// Returns the shared rate-limit window.
    #[must_use]
    pub fn rate_limit(&self) -> &RateLimitWindow {
        &self.state.rate_limit
    }

    /// Fetches `api/info` for a single post or comment.
    ///
    /// Fails fast without a network call while the rate-limit window is
    /// closed. When a response reports an exhausted budget the window is
    /// closed first and the call is reported as rate limited, even if the
    /// body was valid.
    ///
    /// # Errors
    ///
    /// Returns [`TokenError`] on rate limiting, transport failure, non-success
    /// status, or an undecodable body.
    #[instrument(skip(self), fields(thing = kind.prefix()))]
    pub async fn get_thing(
        &self,
        kind: ThingKind,
        id: &str,
    ) -> Result<serde_json::Value, TokenError> {
        let rate_limit = &self.state.rate_limit;
        if rate_limit.remaining().is_some() {
            return Err(TokenError::RateLimited {
                resume_at: rate_limit.resume_at(),
            });
        }

        let url = format!(
            "{}/api/info/?id={}_{id}",
            self.state.api_base_url,
            kind.prefix()
        );
        let response = self
            .state
            .client
            .get(&url)
            .header(AUTHORIZATION, self.state.current_header())
            .send()
            .await
            .map_err(|source| TokenError::Transport {
                url: url.clone(),
                source,
            })?;

        if rate_limit.record_headers(response.headers()) {
            return Err(TokenError::RateLimited {
                resume_at: rate_limit.resume_at(),
            });
        }

        let status = response.status();
        if !status.is_success() {
            return Err(TokenError::Status {
                url,
                status: status.as_u16(),
            });
        }

        let body = response
            .bytes()
            .await
            .map_err(|source| TokenError::Transport {
                url: url.clone(),
                source,
            })?;
        serde_json::from_slice(&body).map_err(|error| TokenError::Decode {
            url,
            reason: error.to_string(),
        })
    }
}

impl Drop for TokenAuthority {
    fn drop(&mut self) {
        self.shutdown();
    }
}

impl std::fmt::Debug for TokenAuthority {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TokenAuthority")
            .field("credentials", &self.state.credentials)
            .field("token_url", &self.state.token_url)
            .field("api_base_url", &self.state.api_base_url)
            .field("rate_limit", &self.state.rate_limit)
            .finish_non_exhaustive()
    }
}

/// Delay until the next refresh for a token valid for `expires_in`.
///
/// Never shorter than [`MIN_REFRESH_DELAY`].
#[must_use]
pub fn refresh_delay(expires_in: Duration) -> Duration {
    expires_in
        .saturating_sub(REFRESH_MARGIN)
        .max(MIN_REFRESH_DELAY)
}

async fn refresh_loop<S: TokenSource + ?Sized>(state: Arc<S>, first_expiry: Duration) {
    let mut delay = refresh_delay(first_expiry);
    loop {
        tokio::time::sleep(delay).await;

        if let Some(wait) = state.window().remaining() {
            debug!(
                wait_secs = wait.as_secs(),
                "token refresh waiting for rate limit window"
            );
            tokio::time::sleep(wait).await;
        }

        delay = match state.refresh().await {
            Ok(expires_in) => refresh_delay(expires_in),
            Err(error) => {
                warn!(
                    error = %error,
                    retry_secs = REFRESH_RETRY_BACKOFF.as_secs(),
                    "Reddit token refresh failed; keeping previous token"
                );
                REFRESH_RETRY_BACKOFF
            }
        };
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use std::collections::VecDeque;

    use serde_json::json;
    use tokio::time::Instant;
    use wiremock::matchers::{header, method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    use super::*;
    use crate::error::FetchErrorKind;
    use crate::reddit::rate_limit::unix_now;

    /// Token source answering from a script; `None` is a failed refresh.
    /// Once the script runs out every refresh yields a one-day token.
    struct ScriptedSource {
        outcomes: std::sync::Mutex<VecDeque<Option<u64>>>,
        calls: std::sync::Mutex<Vec<u64>>,
        started: Instant,
        window: RateLimitWindow,
    }

    impl ScriptedSource {
        fn new(outcomes: impl IntoIterator<Item = Option<u64>>) -> Arc<Self> {
            Arc::new(Self {
                outcomes: std::sync::Mutex::new(outcomes.into_iter().collect()),
                calls: std::sync::Mutex::new(Vec::new()),
                started: Instant::now(),
                window: RateLimitWindow::new(),
            })
        }

        /// Seconds since creation at which each refresh happened.
        fn call_offsets(&self) -> Vec<u64> {
            self.calls.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl TokenSource for ScriptedSource {
        async fn refresh(&self) -> Result<Duration, TokenError> {
            self.calls
                .lock()
                .unwrap()
                .push(self.started.elapsed().as_secs());
            let next = self.outcomes.lock().unwrap().pop_front();
            match next {
                Some(Some(secs)) => Ok(Duration::from_secs(secs)),
                Some(None) => Err(TokenError::Status {
                    url: "https://www.reddit.com/api/v1/access_token".to_string(),
                    status: 500,
                }),
                None => Ok(Duration::from_secs(86_400)),
            }
        }

        fn window(&self) -> &RateLimitWindow {
            &self.window
        }
    }

    fn authority(server: &MockServer) -> TokenAuthority {
        TokenAuthority {
            state: Arc::new(AuthorityState {
                client: Client::new(),
                credentials: RedditCredentials::new("id", "secret"),
                token_url: format!("{}/api/v1/access_token", server.uri()),
                api_base_url: server.uri(),
                auth_header: RwLock::new(String::new()),
                rate_limit: RateLimitWindow::new(),
            }),
            refresh_task: std::sync::Mutex::new(None),
        }
    }

    fn token_body(token: &str) -> serde_json::Value {
        json!({"access_token": token, "token_type": "bearer", "expires_in": 3600, "scope": "*"})
    }

    async fn mount_info_for(server: &MockServer, bearer: &str, id: &str) {
        Mock::given(method("GET"))
            .and(path("/api/info/"))
            .and(query_param("id", format!("t3_{id}")))
            .and(header("authorization", bearer))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(json!({"kind": "Listing", "data": {"children": []}})),
            )
            .expect(1)
            .mount(server)
            .await;
    }

    #[tokio::test(start_paused = true)]
    async fn test_refresh_loop_rotates_one_minute_before_expiry() {
        let source = ScriptedSource::new([Some(600)]);
        let task = tokio::spawn(refresh_loop(Arc::clone(&source), Duration::from_secs(120)));

        tokio::time::sleep(Duration::from_secs(59)).await;
        assert!(source.call_offsets().is_empty());

        tokio::time::sleep(Duration::from_secs(600)).await;
        assert_eq!(source.call_offsets(), vec![60, 600]);
        task.abort();
    }

    #[tokio::test(start_paused = true)]
    async fn test_refresh_loop_retries_after_backoff() {
        let source = ScriptedSource::new([None, Some(86_400)]);
        let task = tokio::spawn(refresh_loop(Arc::clone(&source), Duration::from_secs(120)));

        tokio::time::sleep(Duration::from_secs(170)).await;
        assert_eq!(source.call_offsets(), vec![60]);

        tokio::time::sleep(Duration::from_secs(30)).await;
        assert_eq!(
            source.call_offsets(),
            vec![60, 60 + REFRESH_RETRY_BACKOFF.as_secs()]
        );
        task.abort();
    }

    #[tokio::test(start_paused = true)]
    async fn test_refresh_loop_waits_for_closed_window() {
        let source = ScriptedSource::new([]);
        source.window.close_at(unix_now(), Duration::from_secs(300));
        let task = tokio::spawn(refresh_loop(Arc::clone(&source), Duration::from_secs(120)));

        tokio::time::sleep(Duration::from_secs(300)).await;
        assert!(source.call_offsets().is_empty());

        tokio::time::sleep(Duration::from_secs(100)).await;
        let offsets = source.call_offsets();
        assert_eq!(offsets.len(), 1);
        // Due at 60 s, then held for the rest of the 300 s window.
        assert!((359..=360).contains(&offsets[0]), "refreshed at {offsets:?}");
        task.abort();
    }

    #[tokio::test]
    async fn test_failed_refresh_keeps_previous_token_until_rotation() {
        let server = MockServer::start().await;
        for response in [
            ResponseTemplate::new(200).set_body_json(token_body("old")),
            ResponseTemplate::new(500),
        ] {
            Mock::given(method("POST"))
                .and(path("/api/v1/access_token"))
                .respond_with(response)
                .up_to_n_times(1)
                .mount(&server)
                .await;
        }
        Mock::given(method("POST"))
            .and(path("/api/v1/access_token"))
            .respond_with(ResponseTemplate::new(200).set_body_json(token_body("new")))
            .mount(&server)
            .await;
        mount_info_for(&server, "bearer old", "first").await;
        mount_info_for(&server, "bearer new", "second").await;

        let authority = authority(&server);
        authority.state.refresh().await.unwrap();
        assert_eq!(authority.state.current_header(), "bearer old");

        let failed = authority.state.refresh().await;
        assert!(matches!(failed, Err(TokenError::Status { status: 500, .. })));
        assert_eq!(authority.state.current_header(), "bearer old");
        authority.get_thing(ThingKind::Post, "first").await.unwrap();

        let lifetime = authority.state.refresh().await.unwrap();
        assert_eq!(lifetime, Duration::from_secs(3600));
        assert_eq!(authority.state.current_header(), "bearer new");
        authority.get_thing(ThingKind::Post, "second").await.unwrap();
    }

    #[test]
    fn test_refresh_delay_leaves_one_minute_margin() {
        assert_eq!(
            refresh_delay(Duration::from_secs(86_400)),
            Duration::from_secs(86_340)
        );
    }

    #[test]
    fn test_refresh_delay_short_lifetime_is_floored() {
        assert_eq!(refresh_delay(Duration::from_secs(30)), MIN_REFRESH_DELAY);
        assert_eq!(refresh_delay(Duration::ZERO), MIN_REFRESH_DELAY);
    }

    #[test]
    fn test_thing_kind_prefix() {
        assert_eq!(ThingKind::Post.prefix(), "t3");
        assert_eq!(ThingKind::Comment.prefix(), "t1");
    }

    #[test]
    fn test_token_response_decodes_reddit_payload() {
        let body = r#"{"access_token":"abc","token_type":"bearer","expires_in":86400,"scope":"*"}"#;
        let token: TokenResponse = serde_json::from_str(body).unwrap();
        assert_eq!(token.access_token, "abc");
        assert_eq!(token.expires_in, 86_400);
    }

    #[test]
    fn test_credentials_debug_hides_secret() {
        let credentials = RedditCredentials::new("id-123", "very-secret");
        let rendered = format!("{credentials:?}");
        assert!(rendered.contains("id-123"));
        assert!(!rendered.contains("very-secret"));
    }

    #[test]
    fn test_token_error_conversion_kinds() {
        let limited: FetchError = TokenError::RateLimited { resume_at: 10 }.into();
        assert_eq!(limited.kind(), FetchErrorKind::RateLimited);

        let status: FetchError = TokenError::Status {
            url: "https://api.reddit.com/api/info/".to_string(),
            status: 503,
        }
        .into();
        assert_eq!(status.kind(), FetchErrorKind::Upstream);
        assert!(status.internal_detail().unwrap().contains("503"));
    }
}
