//! Shared User-Agent strings for Reddit API and third-party media host clients.
//!
//! Reddit requires a unique, descriptive User-Agent of the form
//! `<platform>:<app ID>:<version> (by /u/<username>)` on every API call.

/// Application identifier used in the Reddit User-Agent.
const REDDIT_APP_ID: &str = "Reddit-Downloader-Bot";

/// Default Reddit username advertised in the User-Agent.
pub const DEFAULT_UA_AUTHOR: &str = "reddit-resolver";

/// User-Agent for Reddit OAuth and API requests.
#[must_use]
pub(crate) fn reddit_user_agent(author: &str) -> String {
    let version = env!("CARGO_PKG_VERSION");
    format!("TelegramBot:{REDDIT_APP_ID}:{version} (by /u/{author})")
}

/// User-Agent for media host requests (Streamable, RedGifs, manifests, redirects).
#[must_use]
pub(crate) fn media_host_user_agent() -> String {
    let version = env!("CARGO_PKG_VERSION");
    format!("reddit-resolver/{version}")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_reddit_user_agent_format() {
        let ua = reddit_user_agent("someone");
        assert_eq!(
            ua,
            format!(
                "TelegramBot:Reddit-Downloader-Bot:{} (by /u/someone)",
                env!("CARGO_PKG_VERSION")
            )
        );
    }

    #[test]
    fn test_media_host_user_agent_contains_version() {
        let ua = media_host_user_agent();
        assert!(ua.starts_with("reddit-resolver/"));
        assert!(ua.ends_with(env!("CARGO_PKG_VERSION")));
    }
}
