//! Gallery (`gallery_data` + `media_metadata`) extraction.

use std::collections::HashMap;

use tracing::debug;

use crate::media::{AlbumItem, MediaKind};
use crate::reddit::listing::{GalleryData, MediaMetadata, ShapeError};
use crate::utils::html_unescape;

/// Resolution buckets of gallery videos, largest first: (long side, short side, label).
const VIDEO_BUCKETS: [(u32, u32, &str); 5] = [
    (1920, 1080, "1080"),
    (1280, 720, "720"),
    (854, 480, "480"),
    (640, 360, "360"),
    (426, 240, "240"),
];

/// Bucket used when the video is smaller than every known one.
const FALLBACK_VIDEO_BUCKET: &str = "96";

/// Builds album items for every valid gallery entry, in gallery order.
///
/// Entries whose metadata is missing, not `valid`, or of an unknown media type
/// are skipped.
///
/// # Errors
///
/// Returns [`ShapeError::Missing`] when a valid entry lacks its link, or when
/// no entry survives.
pub fn extract_gallery(
    gallery: &GalleryData,
    metadata: &HashMap<String, MediaMetadata>,
) -> Result<Vec<AlbumItem>, ShapeError> {
    let mut items = Vec::with_capacity(gallery.items.len());

    for item in &gallery.items {
        let Some(meta) = metadata.get(&item.media_id) else {
            debug!(media_id = %item.media_id, "gallery item has no metadata");
            continue;
        };
        if meta.status.as_deref() != Some("valid") {
            debug!(media_id = %item.media_id, status = ?meta.status, "skipping gallery item");
            continue;
        }

        let source = meta.s.as_ref();
        let (link, kind) = match meta.e.as_deref() {
            Some("Image") => (
                source
                    .and_then(|s| s.u.as_deref())
                    .ok_or(ShapeError::Missing("media_metadata.s.u"))?
                    .to_string(),
                MediaKind::Photo,
            ),
            Some("AnimatedImage") => (
                source
                    .and_then(|s| s.mp4.as_deref().or(s.gif.as_deref()))
                    .ok_or(ShapeError::Missing("media_metadata.s.mp4"))?
                    .to_string(),
                MediaKind::Gif,
            ),
            Some("RedditVideo") => {
                let id = meta.id.as_deref().unwrap_or(&item.media_id);
                let bucket = gallery_video_bucket(meta.x.unwrap_or(0), meta.y.unwrap_or(0));
                (
                    format!("https://v.redd.it/{id}/DASH_{bucket}.mp4"),
                    MediaKind::Video,
                )
            }
            other => {
                debug!(media_id = %item.media_id, media_type = ?other, "unknown gallery media type");
                continue;
            }
        };

        items.push(AlbumItem {
            link: html_unescape(&link),
            caption: caption(item.caption.as_deref(), item.outbound_url.as_deref()),
            kind,
        });
    }

    if items.is_empty() {
        return Err(ShapeError::Missing("valid gallery item"));
    }
    Ok(items)
}

/// Picks the DASH rendition bucket for a gallery video of `width`x`height`.
///
/// Orientation does not matter: the long side is compared to the first
/// threshold and the short side to the second.
#[must_use]
pub fn gallery_video_bucket(width: u32, height: u32) -> &'static str {
    let (long, short) = if width >= height {
        (width, height)
    } else {
        (height, width)
    };
    VIDEO_BUCKETS
        .iter()
        .find(|(min_long, min_short, _)| long >= *min_long && short >= *min_short)
        .map_or(FALLBACK_VIDEO_BUCKET, |&(_, _, label)| label)
}

fn caption(text: Option<&str>, outbound_url: Option<&str>) -> String {
    let mut caption = html_unescape(text.unwrap_or_default());
    if let Some(url) = outbound_url.filter(|url| !url.is_empty()) {
        caption.push('\n');
        caption.push_str(&html_unescape(url));
    }
    caption
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use serde_json::json;

    use super::*;

    fn parse(gallery: serde_json::Value, metadata: serde_json::Value) -> (GalleryData, HashMap<String, MediaMetadata>) {
        (
            serde_json::from_value(gallery).unwrap(),
            serde_json::from_value(metadata).unwrap(),
        )
    }

    #[test]
    fn test_two_item_gallery_in_order() {
        let (gallery, metadata) = parse(
            json!({"items": [
                {"media_id": "b", "caption": "second &amp; last"},
                {"media_id": "a", "outbound_url": "https://example.com"}
            ]}),
            json!({
                "a": {"status": "valid", "e": "Image", "s": {"u": "https://preview.redd.it/a.jpg?width=1&amp;s=x"}},
                "b": {"status": "valid", "e": "AnimatedImage", "s": {"gif": "https://i.redd.it/b.gif", "mp4": "https://preview.redd.it/b.gif?format=mp4"}}
            }),
        );
        let items = extract_gallery(&gallery, &metadata).unwrap();
        assert_eq!(
            items,
            vec![
                AlbumItem {
                    link: "https://preview.redd.it/b.gif?format=mp4".to_string(),
                    caption: "second & last".to_string(),
                    kind: MediaKind::Gif,
                },
                AlbumItem {
                    link: "https://preview.redd.it/a.jpg?width=1&s=x".to_string(),
                    caption: "\nhttps://example.com".to_string(),
                    kind: MediaKind::Photo,
                },
            ]
        );
    }

    #[test]
    fn test_two_image_gallery_unescapes_every_link() {
        let (gallery, metadata) = parse(
            json!({"items": [{"media_id": "first"}, {"media_id": "second"}]}),
            json!({
                "second": {"status": "valid", "e": "Image", "s": {"u": "https://preview.redd.it/second.jpg?width=640&amp;format=pjpg&amp;s=b2"}},
                "first": {"status": "valid", "e": "Image", "s": {"u": "https://preview.redd.it/first.png?width=1080&amp;s=a1"}}
            }),
        );
        let items = extract_gallery(&gallery, &metadata).unwrap();
        let links: Vec<&str> = items.iter().map(|item| item.link.as_str()).collect();
        assert_eq!(
            links,
            vec![
                "https://preview.redd.it/first.png?width=1080&s=a1",
                "https://preview.redd.it/second.jpg?width=640&format=pjpg&s=b2",
            ]
        );
        assert!(items.iter().all(|item| item.kind == MediaKind::Photo));
    }

    #[test]
    fn test_invalid_entries_skipped() {
        let (gallery, metadata) = parse(
            json!({"items": [{"media_id": "a"}, {"media_id": "b"}, {"media_id": "missing"}]}),
            json!({
                "a": {"status": "failed", "e": "Image"},
                "b": {"status": "valid", "e": "Image", "s": {"u": "https://i.redd.it/b.jpg"}}
            }),
        );
        let items = extract_gallery(&gallery, &metadata).unwrap();
        assert_eq!(items.len(), 1);
        assert_eq!(items[0].link, "https://i.redd.it/b.jpg");
    }

    #[test]
    fn test_reddit_video_entry_uses_bucket() {
        let (gallery, metadata) = parse(
            json!({"items": [{"media_id": "v1"}]}),
            json!({"v1": {"status": "valid", "e": "RedditVideo", "id": "v1", "x": 1280, "y": 720}}),
        );
        let items = extract_gallery(&gallery, &metadata).unwrap();
        assert_eq!(items[0].link, "https://v.redd.it/v1/DASH_720.mp4");
        assert_eq!(items[0].kind, MediaKind::Video);
    }

    #[test]
    fn test_empty_gallery_is_shape_error() {
        let (gallery, metadata) = parse(json!({"items": []}), json!({}));
        assert!(matches!(
            extract_gallery(&gallery, &metadata),
            Err(ShapeError::Missing(_))
        ));
    }

    #[test]
    fn test_video_buckets() {
        assert_eq!(gallery_video_bucket(1920, 1080), "1080");
        assert_eq!(gallery_video_bucket(1080, 1920), "1080");
        assert_eq!(gallery_video_bucket(1280, 720), "720");
        assert_eq!(gallery_video_bucket(900, 500), "480");
        assert_eq!(gallery_video_bucket(640, 360), "360");
        assert_eq!(gallery_video_bucket(426, 240), "240");
        assert_eq!(gallery_video_bucket(200, 100), "96");
        assert_eq!(gallery_video_bucket(0, 0), "96");
    }
}
