//! Error type returned by every resolution operation.
//!
//! A [`FetchError`] always carries a complete, user-displayable sentence and an
//! optional operator-only detail. An absent detail marks a problem with the
//! user's input that is not worth logging.

use thiserror::Error;

/// Message shown when a post document does not have the expected shape.
pub const GENERIC_SHAPE_MESSAGE: &str =
    "Cannot get data. Maybe this is a deleted post or an invalid URL.";

/// Message shown when an upstream service fails.
pub const GENERIC_UPSTREAM_MESSAGE: &str =
    "Cannot get data from Reddit right now. Please try again later.";

/// Message shown when the Reddit API rate limit has been reached.
pub const RATE_LIMITED_MESSAGE: &str =
    "Reddit is rate limiting this service. Please try again in a few minutes.";

/// Message shown when no Reddit link could be found in the input.
pub const NO_REDDIT_URL_MESSAGE: &str =
    "No Reddit URL was found in your message. Please send a link to a Reddit post or comment.";

/// Message shown when NSFW posts are denied by policy.
pub const NSFW_DENIED_MESSAGE: &str = "This service does not allow NSFW posts.";

/// Message shown for internal faults that should be reported.
pub const INTERNAL_FAULT_MESSAGE: &str =
    "Something went wrong while resolving this link. Please try again or report it.";

/// Broad category of a [`FetchError`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FetchErrorKind {
    /// Malformed or non-Reddit URL, unsupported host, or policy rejection.
    UserInput,
    /// Network failure, non-success status, or undecodable upstream payload.
    Upstream,
    /// The Reddit API rate limit window is active.
    RateLimited,
    /// The post document had an unexpected shape.
    UnexpectedShape,
    /// An internal invariant was violated.
    Internal,
}

/// Error returned by the resolution engine.
///
/// `Display` renders the user-facing message only; the internal detail is
/// exposed separately through [`FetchError::internal_detail`].
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{user_message}")]
pub struct FetchError {
    kind: FetchErrorKind,
    internal_detail: Option<String>,
    user_message: String,
}

impl FetchError {
    fn new(kind: FetchErrorKind, internal_detail: Option<String>, user_message: String) -> Self {
        Self {
            kind,
            internal_detail: internal_detail.filter(|detail| !detail.is_empty()),
            user_message,
        }
    }

    /// Creates a user-input error. These are never logged.
    #[must_use]
    pub fn user_input(user_message: impl Into<String>) -> Self {
        Self::new(FetchErrorKind::UserInput, None, user_message.into())
    }

    /// Creates the error returned when the input contains no Reddit link.
    #[must_use]
    pub fn no_reddit_url() -> Self {
        Self::user_input(NO_REDDIT_URL_MESSAGE)
    }

    /// Creates the fixed NSFW policy rejection.
    #[must_use]
    pub fn nsfw_denied() -> Self {
        Self::user_input(NSFW_DENIED_MESSAGE)
    }

    /// Creates an error for a media host outside the supported list.
    #[must_use]
    pub fn unsupported_host(domain: &str, url: &str) -> Self {
        Self::user_input(format!(
            "Media from {domain} is not supported yet. Here is the original link: {url}"
        ))
    }

    /// Creates an upstream error with the generic user message.
    #[must_use]
    pub fn upstream(detail: impl Into<String>) -> Self {
        Self::upstream_with_message(detail, GENERIC_UPSTREAM_MESSAGE)
    }

    /// Creates an upstream error with a custom user message.
    #[must_use]
    pub fn upstream_with_message(
        detail: impl Into<String>,
        user_message: impl Into<String>,
    ) -> Self {
        Self::new(
            FetchErrorKind::Upstream,
            Some(detail.into()),
            user_message.into(),
        )
    }

    /// Creates a rate-limit error.
    #[must_use]
    pub fn rate_limited(detail: impl Into<String>) -> Self {
        Self::new(
            FetchErrorKind::RateLimited,
            Some(detail.into()),
            RATE_LIMITED_MESSAGE.to_string(),
        )
    }

    /// Creates an unexpected-shape error; the detail is still logged.
    #[must_use]
    pub fn unexpected_shape(detail: impl Into<String>) -> Self {
        Self::new(
            FetchErrorKind::UnexpectedShape,
            Some(detail.into()),
            GENERIC_SHAPE_MESSAGE.to_string(),
        )
    }

    /// Creates an internal-fault error.
    #[must_use]
    pub fn internal(detail: impl Into<String>) -> Self {
        Self::new(
            FetchErrorKind::Internal,
            Some(detail.into()),
            INTERNAL_FAULT_MESSAGE.to_string(),
        )
    }

    /// Returns the error category.
    #[must_use]
    pub fn kind(&self) -> FetchErrorKind {
        self.kind
    }

    /// Returns the operator-only detail, if this error is worth logging.
    #[must_use]
    pub fn internal_detail(&self) -> Option<&str> {
        self.internal_detail.as_deref()
    }

    /// Returns the user-facing sentence.
    #[must_use]
    pub fn user_message(&self) -> &str {
        &self.user_message
    }

    /// Returns true when callers should back off instead of retrying.
    #[must_use]
    pub fn is_rate_limited(&self) -> bool {
        self.kind == FetchErrorKind::RateLimited
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_user_input_has_no_internal_detail() {
        let err = FetchError::no_reddit_url();
        assert_eq!(err.kind(), FetchErrorKind::UserInput);
        assert!(err.internal_detail().is_none());
        assert_eq!(err.to_string(), NO_REDDIT_URL_MESSAGE);
    }

    #[test]
    fn test_empty_detail_is_normalized_to_none() {
        let err = FetchError::upstream("");
        assert!(err.internal_detail().is_none());
        assert_eq!(err.kind(), FetchErrorKind::Upstream);
    }

    #[test]
    fn test_unexpected_shape_keeps_detail_and_generic_message() {
        let err = FetchError::unexpected_shape("missing field `title`");
        assert_eq!(err.internal_detail(), Some("missing field `title`"));
        assert_eq!(err.user_message(), GENERIC_SHAPE_MESSAGE);
    }

    #[test]
    fn test_unsupported_host_names_domain_and_url() {
        let err = FetchError::unsupported_host("youtube.com", "https://youtu.be/x");
        assert!(err.user_message().contains("youtube.com"));
        assert!(err.user_message().contains("https://youtu.be/x"));
        assert!(err.internal_detail().is_none());
    }

    #[test]
    fn test_rate_limited_flag() {
        assert!(FetchError::rate_limited("resume at 100").is_rate_limited());
        assert!(!FetchError::nsfw_denied().is_rate_limited());
    }

    #[test]
    fn test_every_message_is_a_sentence() {
        for err in [
            FetchError::no_reddit_url(),
            FetchError::nsfw_denied(),
            FetchError::upstream("x"),
            FetchError::rate_limited("x"),
            FetchError::unexpected_shape("x"),
            FetchError::internal("x"),
        ] {
            let message = err.user_message();
            assert!(!message.is_empty());
            assert!(message.ends_with('.'), "not a sentence: {message}");
        }
    }
}
