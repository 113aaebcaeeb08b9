//! Extraction of a canonical post or comment identifier from pasted text.
//!
//! Users paste anything: a bare link, a title line followed by a link, a link
//! without scheme, a `redd.it` shortlink, a `v.redd.it` video link or a
//! mobile "share" link (`/r/<sub>/s/<token>`). The last two only reveal the
//! post through an HTTP redirect, which is followed with a `HEAD` request.
//!
//! Canonical path layouts (split on `/`):
//!
//! ```text
//! /<id>                                       -> ["", id]
//! /r/<sub>/comments/<id>/<slug>/              -> segment 4 is the post id
//! /r/<sub>/comments/<id>/<slug>/<comment>/    -> segment 6 is the comment id
//! ```

use async_trait::async_trait;
use reqwest::Client;
use tracing::{debug, instrument, trace};
use url::Url;

use crate::error::FetchError;

/// Maximum number of redirects followed for a single link.
pub const MAX_REDIRECT_DEPTH: usize = 1;

/// Identifier of the post or comment to fetch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PostIdentifier {
    /// Base-36 Reddit id without the `t3_`/`t1_` prefix.
    pub id: String,
    /// True when `id` names a comment.
    pub is_comment: bool,
}

impl PostIdentifier {
    /// Identifier of a post.
    #[must_use]
    pub fn post(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            is_comment: false,
        }
    }

    /// Identifier of a comment.
    #[must_use]
    pub fn comment(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            is_comment: true,
        }
    }
}

/// Follows HTTP redirects and reports the final URL.
#[async_trait]
pub trait RedirectFollower: Send + Sync {
    /// Returns the URL reached after following every redirect of `url`.
    async fn follow(&self, url: &Url) -> Result<Url, FetchError>;
}

/// [`RedirectFollower`] that issues a `HEAD` request with a redirect-following client.
#[derive(Debug, Clone)]
pub struct HeadRedirectFollower {
    client: Client,
}

impl HeadRedirectFollower {
    /// Wraps a client; the client's redirect policy must follow redirects.
    #[must_use]
    pub fn new(client: Client) -> Self {
        Self { client }
    }
}

#[async_trait]
impl RedirectFollower for HeadRedirectFollower {
    #[instrument(skip(self), fields(url = %url))]
    async fn follow(&self, url: &Url) -> Result<Url, FetchError> {
        let response = self
            .client
            .head(url.as_str())
            .send()
            .await
            .map_err(|error| {
                FetchError::upstream_with_message(
                    format!("cannot follow redirect of {url}: {error}"),
                    "Cannot open this link. Please check it and try again.",
                )
            })?;
        let final_url = response.url().clone();
        debug!(final_url = %final_url, "redirect followed");
        Ok(final_url)
    }
}

/// How a single parsed link must be handled.
#[derive(Debug, Clone, PartialEq, Eq)]
enum LinkKind {
    /// Not a Reddit link; try the next line.
    Foreign,
    /// The identifier is known.
    Resolved(PostIdentifier),
    /// The link must be redirect-followed first.
    NeedsRedirect,
    /// A Reddit link whose path cannot be understood.
    Unparsable,
}

/// Resolves free text into a [`PostIdentifier`].
pub struct PostIdentifierResolver {
    redirects: Box<dyn RedirectFollower>,
}

impl std::fmt::Debug for PostIdentifierResolver {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PostIdentifierResolver").finish_non_exhaustive()
    }
}

impl PostIdentifierResolver {
    /// Creates a resolver using the given redirect follower.
    #[must_use]
    pub fn new(redirects: Box<dyn RedirectFollower>) -> Self {
        Self { redirects }
    }

    /// Finds the first Reddit link in `text` and returns its identifier.
    ///
    /// Lines that do not parse as URLs or point elsewhere are skipped. The
    /// first Reddit link decides the outcome.
    ///
    /// # Errors
    ///
    /// - user-input error when no Reddit link is present or its path is not understood
    /// - upstream error when a redirect cannot be followed
    /// - internal error when redirects exceed [`MAX_REDIRECT_DEPTH`]
    #[instrument(skip(self, text), fields(text_len = text.len()))]
    pub async fn resolve(&self, text: &str) -> Result<PostIdentifier, FetchError> {
        for line in text.lines() {
            let Some(url) = parse_line(line) else {
                continue;
            };
            trace!(url = %url, "candidate link");
            if classify_link(&url) != LinkKind::Foreign {
                return self.resolve_url(url, 0).await;
            }
        }

        Err(FetchError::no_reddit_url())
    }

    async fn resolve_url(
        &self,
        mut url: Url,
        mut depth: usize,
    ) -> Result<PostIdentifier, FetchError> {
        loop {
            match classify_link(&url) {
                LinkKind::Resolved(identifier) => {
                    debug!(
                        id = %identifier.id,
                        is_comment = identifier.is_comment,
                        "identifier resolved"
                    );
                    return Ok(identifier);
                }
                LinkKind::NeedsRedirect => {
                    if depth >= MAX_REDIRECT_DEPTH {
                        return Err(FetchError::internal(format!(
                            "redirect depth {depth} exceeded while resolving {url}"
                        )));
                    }
                    url = self.redirects.follow(&url).await?;
                    depth += 1;
                }
                LinkKind::Unparsable => return Err(unparsable_link()),
                LinkKind::Foreign => {
                    return Err(FetchError::user_input(
                        "This link does not lead to a Reddit post. Please send a direct Reddit link.",
                    ));
                }
            }
        }
    }
}

fn unparsable_link() -> FetchError {
    FetchError::user_input(
        "Cannot understand this Reddit link. Please send the link of a post or comment.",
    )
}

/// Parses one input line, adding `https://` when no scheme is present.
fn parse_line(line: &str) -> Option<Url> {
    let line = line.trim();
    if line.is_empty() {
        return None;
    }
    let lower = line.to_ascii_lowercase();
    let candidate = if lower.starts_with("http://") || lower.starts_with("https://") {
        line.to_string()
    } else {
        format!("https://{line}")
    };
    Url::parse(&candidate).ok().filter(|url| url.host_str().is_some())
}

fn classify_link(url: &Url) -> LinkKind {
    let Some(host) = url.host_str() else {
        return LinkKind::Foreign;
    };
    let host = host.to_ascii_lowercase();
    let path = url.path();

    match host.as_str() {
        "redd.it" => {
            let id = path.trim_start_matches('/');
            if id.is_empty() || id.contains('/') {
                LinkKind::Unparsable
            } else {
                LinkKind::Resolved(PostIdentifier::post(id))
            }
        }
        "v.redd.it" => LinkKind::NeedsRedirect,
        "reddit.com" | "www.reddit.com" | "old.reddit.com" => {
            if is_share_path(path) {
                LinkKind::NeedsRedirect
            } else {
                parse_canonical_path(path)
            }
        }
        _ => LinkKind::Foreign,
    }
}

/// Share links have the fixed shape `/r/<sub>/s/<token>` (or `/u/<user>/s/<token>`).
fn is_share_path(path: &str) -> bool {
    let segments: Vec<&str> = path.split('/').collect();
    segments.len() >= 5 && segments[3] == "s" && !segments[4].is_empty()
}

fn parse_canonical_path(path: &str) -> LinkKind {
    let segments: Vec<&str> = path.split('/').collect();
    if segments.len() == 2 {
        return match segments[1] {
            "" => LinkKind::Unparsable,
            id => LinkKind::Resolved(PostIdentifier::post(id)),
        };
    }
    if segments.len() < 5 {
        return LinkKind::Unparsable;
    }
    if segments.len() >= 7 && !segments[6].is_empty() {
        return LinkKind::Resolved(PostIdentifier::comment(segments[6]));
    }
    match segments[4] {
        "" => LinkKind::Unparsable,
        id => LinkKind::Resolved(PostIdentifier::post(id)),
    }
}
