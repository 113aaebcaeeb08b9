//! Reddit API access: authentication, rate limiting, link parsing and the
//! listing document model.

pub mod listing;
pub mod post_id;
pub mod rate_limit;
pub mod token;

pub use post_id::{
    HeadRedirectFollower, MAX_REDIRECT_DEPTH, PostIdentifier, PostIdentifierResolver,
    RedirectFollower,
};
pub use rate_limit::RateLimitWindow;
pub use token::{RedditCredentials, ThingKind, TokenAuthority, TokenError};

/// Reddit OAuth token endpoint.
pub const DEFAULT_TOKEN_URL: &str = "https://www.reddit.com/api/v1/access_token";

/// Reddit API base URL for application-only requests.
pub const DEFAULT_API_BASE_URL: &str = "https://api.reddit.com";
