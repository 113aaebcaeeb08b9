//! Comment classification, including embedded Giphy markup.

use std::sync::LazyLock;

use regex::Regex;

use crate::media::{MediaKind, MediaResult, MediaVariant, ResolvedResult};
use crate::reddit::listing::{CommentData, ShapeError};
use crate::utils::{compile_static_regex, html_unescape};

/// Quality label of the Giphy mp4 rendition.
const GIPHY_QUALITY_LABEL: &str = "gif";

/// Matches `![gif](giphy|<id>)` and `![gif](giphy|<id>|<size>)`.
static GIPHY_RE: LazyLock<Regex> =
    LazyLock::new(|| compile_static_regex(r"!\[gif\]\(giphy\|([A-Za-z0-9]+)(?:\|[A-Za-z0-9_]+)*\)"));

/// Direct mp4 link of a Giphy clip.
#[must_use]
pub fn giphy_link(id: &str) -> String {
    format!("https://i.giphy.com/media/{id}/giphy.mp4")
}

/// Classifies a comment body.
///
/// A body embedding a Giphy clip becomes a GIF whose title is the remaining
/// text; anything else is returned as a plain comment.
///
/// # Errors
///
/// Returns [`ShapeError::Missing`] when the comment has no body.
pub fn classify_comment(comment: &CommentData) -> Result<ResolvedResult, ShapeError> {
    let body = html_unescape(comment.body.as_deref().ok_or(ShapeError::Missing("body"))?);

    let Some(id) = GIPHY_RE
        .captures(&body)
        .and_then(|caps| caps.get(1))
        .map(|m| m.as_str().to_string())
    else {
        return Ok(ResolvedResult::Comment { body });
    };

    let title = GIPHY_RE.replace_all(&body, "").trim().to_string();
    Ok(ResolvedResult::Media(MediaResult {
        variants: vec![MediaVariant::new(giphy_link(&id), GIPHY_QUALITY_LABEL)],
        kind: MediaKind::Gif,
        title,
        thumbnail: None,
        duration_secs: 0,
    }))
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn comment(body: &str) -> CommentData {
        CommentData {
            body: Some(body.to_string()),
        }
    }

    #[test]
    fn test_plain_comment() {
        assert_eq!(
            classify_comment(&comment("just &lt;text&gt;")).unwrap(),
            ResolvedResult::Comment {
                body: "just <text>".to_string()
            }
        );
    }

    #[test]
    fn test_giphy_comment_becomes_gif() {
        let result = classify_comment(&comment("lol ![gif](giphy|3o7TKSjRrfIPjeiVyM|downsized)")).unwrap();
        let ResolvedResult::Media(media) = result else {
            panic!("expected media");
        };
        assert_eq!(media.kind, MediaKind::Gif);
        assert_eq!(media.title, "lol");
        assert_eq!(
            media.variants,
            vec![MediaVariant::new(
                "https://i.giphy.com/media/3o7TKSjRrfIPjeiVyM/giphy.mp4",
                "gif"
            )]
        );
    }

    #[test]
    fn test_giphy_without_size() {
        let result = classify_comment(&comment("![gif](giphy|abc123)")).unwrap();
        let ResolvedResult::Media(media) = result else {
            panic!("expected media");
        };
        assert_eq!(media.title, "");
        assert_eq!(media.variants[0].link, giphy_link("abc123"));
    }

    #[test]
    fn test_missing_body_is_shape_error() {
        assert!(matches!(
            classify_comment(&CommentData::default()),
            Err(ShapeError::Missing("body"))
        ));
    }
}
