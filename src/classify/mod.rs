//! Classification of Reddit posts and comments into [`ResolvedResult`]s.
//!
//! Classification is a pure function of the post document. Media that can
//! only be completed over the network (DASH manifests, Streamable pages,
//! RedGifs API) is returned as a [`PendingMedia`] for the
//! [`HostRegistry`](crate::hosts::HostRegistry) to finish.
//!
//! # Dispatch
//!
//! | `post_hint`      | Result                                                   |
//! |------------------|----------------------------------------------------------|
//! | absent / `self`  | album when `gallery_data` + `media_metadata`, else text  |
//! | `image`          | GIF (Imgur rewrite or mp4 preview variants) or photo     |
//! | `link`           | Imgur `.gifv` as GIF, anything else as text              |
//! | `hosted:video`   | pending DASH manifest                                    |
//! | `rich:video`     | per `domain`: gfycat, streamable, redgifs                |
//!
//! The NSFW policy is checked before anything else. Cross-posts are replaced
//! by their first parent after the thumbnail of the outer post is captured.

mod comment;
mod gallery;

pub use comment::{classify_comment, giphy_link};
pub use gallery::{extract_gallery, gallery_video_bucket};

use tracing::{debug, instrument};
use url::Url;

use crate::error::FetchError;
use crate::media::{
    MediaKind, MediaResult, MediaVariant, ORIGINAL_QUALITY_LABEL, ResolvedResult,
};
use crate::reddit::listing::{
    self, CommentData, ImageSource, PostData, PreviewImage, ShapeError,
};
use crate::utils::{canonical_host, html_unescape, url_host};

/// Widest preview rendition used as a thumbnail.
const MAX_THUMBNAIL_WIDTH: u32 = 320;

/// Policy switches applied during classification.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ClassifyPolicy {
    /// Reject posts marked `over_18`.
    pub deny_nsfw: bool,
}

/// Metadata of a media result whose variants are still to be fetched.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MediaMeta {
    pub title: String,
    pub thumbnail: Option<String>,
    pub duration_secs: u64,
    pub kind: MediaKind,
}

impl MediaMeta {
    /// Completes the result with its variants.
    #[must_use]
    pub fn into_result(self, variants: Vec<MediaVariant>) -> MediaResult {
        MediaResult {
            variants,
            kind: self.kind,
            title: self.title,
            thumbnail: self.thumbnail,
            duration_secs: self.duration_secs,
        }
    }
}

/// Media that needs one more network round-trip to be resolved.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PendingMedia {
    /// Reddit-hosted video: fetch and parse the DASH manifest.
    DashManifest { manifest_url: String, meta: MediaMeta },
    /// Streamable video: scrape `og:video` from the page.
    Streamable { page_url: String, meta: MediaMeta },
    /// RedGifs clip: query the RedGifs API.
    RedGifs { gif_id: String, meta: MediaMeta },
}

impl PendingMedia {
    /// Metadata carried along with the pending fetch.
    #[must_use]
    pub fn meta(&self) -> &MediaMeta {
        match self {
            Self::DashManifest { meta, .. }
            | Self::Streamable { meta, .. }
            | Self::RedGifs { meta, .. } => meta,
        }
    }
}

/// Outcome of the pure classification phase.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ClassifyStep {
    /// Fully resolved without network access.
    Done(ResolvedResult),
    /// Needs a media host fetch to complete.
    Fetch(PendingMedia),
}

/// Classifier for raw `api/info` documents.
#[derive(Debug, Clone, Copy, Default)]
pub struct ContentClassifier {
    policy: ClassifyPolicy,
}

impl ContentClassifier {
    /// Creates a classifier with the given policy.
    #[must_use]
    pub fn new(policy: ClassifyPolicy) -> Self {
        Self { policy }
    }

    /// Returns the active policy.
    #[must_use]
    pub fn policy(&self) -> ClassifyPolicy {
        self.policy
    }

    /// Classifies a post listing document.
    ///
    /// # Errors
    ///
    /// Returns an unexpected-shape [`FetchError`] for malformed documents, and
    /// user-input errors for NSFW rejection or unsupported hosts.
    pub fn classify_document(&self, document: serde_json::Value) -> Result<ClassifyStep, FetchError> {
        let post: PostData = listing::first_child(document)?;
        self.classify(&post)
    }

    /// Classifies a comment listing document.
    ///
    /// # Errors
    ///
    /// Returns an unexpected-shape [`FetchError`] for malformed documents.
    pub fn classify_comment_document(
        &self,
        document: serde_json::Value,
    ) -> Result<ResolvedResult, FetchError> {
        let comment: CommentData = listing::first_child(document)?;
        Ok(classify_comment(&comment)?)
    }

    /// Classifies a decoded post.
    ///
    /// # Errors
    ///
    /// See [`ContentClassifier::classify_document`].
    #[instrument(skip(self, root), fields(post_hint = root.post_hint.as_deref().unwrap_or("none")))]
    pub fn classify(&self, root: &PostData) -> Result<ClassifyStep, FetchError> {
        if self.policy.deny_nsfw && root.over_18 {
            debug!("NSFW post rejected by policy");
            return Err(FetchError::nsfw_denied());
        }

        let thumbnail = select_thumbnail(root.first_preview_image());
        let post = root
            .crosspost_parent_list
            .as_ref()
            .and_then(|parents| parents.first())
            .unwrap_or(root);
        let title = html_unescape(post.require_title()?);

        match post.post_hint.as_deref() {
            None | Some("self") => classify_text_or_gallery(post, title),
            Some("image") => classify_image(post, title, thumbnail),
            Some("link") => classify_link(post, title, thumbnail),
            Some("hosted:video") => classify_hosted_video(post, title, thumbnail),
            Some("rich:video") => classify_rich_video(post, title, thumbnail),
            Some(other) => Err(FetchError::unexpected_shape(format!(
                "unknown post_hint `{other}`"
            ))),
        }
    }
}

fn classify_text_or_gallery(post: &PostData, title: String) -> Result<ClassifyStep, FetchError> {
    if let (Some(gallery), Some(metadata)) = (&post.gallery_data, &post.media_metadata) {
        let items = extract_gallery(gallery, metadata)?;
        return Ok(ClassifyStep::Done(ResolvedResult::Album { items }));
    }

    let mut body = clean_selftext(post.selftext.as_deref().unwrap_or_default());
    if body.is_empty()
        && let Some(url) = post.url.as_deref()
        && !is_reddit_permalink(url)
    {
        body = html_unescape(url);
    }
    Ok(ClassifyStep::Done(ResolvedResult::Text { title, body }))
}

fn classify_image(
    post: &PostData,
    title: String,
    thumbnail: Option<String>,
) -> Result<ClassifyStep, FetchError> {
    let url = html_unescape(post.require_url()?);
    let host = host_of(&url);

    if strip_query(&url).to_ascii_lowercase().ends_with("gif") {
        let variants = if host == "i.imgur.com" {
            vec![MediaVariant::new(
                imgur_download_link(&url),
                ORIGINAL_QUALITY_LABEL,
            )]
        } else {
            let image = require_preview_image(post)?;
            let mp4 = image
                .variants
                .mp4
                .as_ref()
                .ok_or(ShapeError::Missing("preview.images[0].variants.mp4"))?;
            preview_variants(&mp4.source, &mp4.resolutions)
        };
        return Ok(done_media(variants, MediaKind::Gif, title, thumbnail, 0));
    }

    let mut variants = Vec::new();
    if host == "i.redd.it" || host == "i.imgur.com" {
        variants.push(MediaVariant::new(url, ORIGINAL_QUALITY_LABEL));
    }
    let image = require_preview_image(post)?;
    variants.extend(preview_variants(&image.source, &image.resolutions));
    Ok(done_media(variants, MediaKind::Photo, title, thumbnail, 0))
}

fn classify_link(
    post: &PostData,
    title: String,
    thumbnail: Option<String>,
) -> Result<ClassifyStep, FetchError> {
    let url = html_unescape(post.require_url()?);
    let host = host_of(&url);

    if host.ends_with("imgur.com") && strip_query(&url).ends_with(".gifv") {
        let link = format!("{}.mp4", strip_query(&url).trim_end_matches(".gifv"));
        let variants = vec![MediaVariant::new(link, ORIGINAL_QUALITY_LABEL)];
        return Ok(done_media(variants, MediaKind::Gif, title, thumbnail, 0));
    }

    Ok(ClassifyStep::Done(ResolvedResult::Text { title, body: url }))
}

fn classify_hosted_video(
    post: &PostData,
    title: String,
    thumbnail: Option<String>,
) -> Result<ClassifyStep, FetchError> {
    let video = post
        .reddit_video()
        .ok_or(ShapeError::Missing("media.reddit_video"))?;
    let dash_url = video
        .dash_url
        .as_deref()
        .ok_or(ShapeError::Missing("reddit_video.dash_url"))?;

    Ok(ClassifyStep::Fetch(PendingMedia::DashManifest {
        manifest_url: html_unescape(dash_url),
        meta: MediaMeta {
            title,
            thumbnail,
            duration_secs: video.duration_secs(),
            kind: if video.is_gif {
                MediaKind::Gif
            } else {
                MediaKind::Video
            },
        },
    }))
}

fn classify_rich_video(
    post: &PostData,
    title: String,
    thumbnail: Option<String>,
) -> Result<ClassifyStep, FetchError> {
    let url = html_unescape(post.require_url()?);
    let domain = canonical_host(post.domain.as_deref().unwrap_or_default());

    match domain.as_str() {
        "gfycat.com" => {
            if let Some(mp4) = post
                .first_preview_image()
                .and_then(|image| image.variants.mp4.as_ref())
            {
                let variants = preview_variants(&mp4.source, &mp4.resolutions);
                return Ok(done_media(variants, MediaKind::Gif, title, thumbnail, 0));
            }
            let preview_video = post
                .preview
                .as_ref()
                .and_then(|preview| preview.reddit_video_preview.as_ref())
                .ok_or(ShapeError::Missing("preview.reddit_video_preview"))?;
            let dash_url = preview_video
                .dash_url
                .as_deref()
                .ok_or(ShapeError::Missing("reddit_video_preview.dash_url"))?;
            Ok(ClassifyStep::Fetch(PendingMedia::DashManifest {
                manifest_url: html_unescape(dash_url),
                meta: MediaMeta {
                    title,
                    thumbnail,
                    duration_secs: preview_video.duration_secs(),
                    kind: if preview_video.is_gif {
                        MediaKind::Gif
                    } else {
                        MediaKind::Video
                    },
                },
            }))
        }
        "streamable.com" => Ok(ClassifyStep::Fetch(PendingMedia::Streamable {
            page_url: url,
            meta: video_meta(title, thumbnail),
        })),
        "redgifs.com" | "v3.redgifs.com" => {
            let gif_id = redgifs_id(&url).ok_or(ShapeError::Missing("redgifs id in url"))?;
            Ok(ClassifyStep::Fetch(PendingMedia::RedGifs {
                gif_id,
                meta: video_meta(title, thumbnail),
            }))
        }
        _ => Err(FetchError::unsupported_host(&domain, &url)),
    }
}

fn video_meta(title: String, thumbnail: Option<String>) -> MediaMeta {
    MediaMeta {
        title,
        thumbnail,
        duration_secs: 0,
        kind: MediaKind::Video,
    }
}

fn done_media(
    variants: Vec<MediaVariant>,
    kind: MediaKind,
    title: String,
    thumbnail: Option<String>,
    duration_secs: u64,
) -> ClassifyStep {
    ClassifyStep::Done(ResolvedResult::Media(MediaResult {
        variants,
        kind,
        title,
        thumbnail,
        duration_secs,
    }))
}

fn require_preview_image(post: &PostData) -> Result<&PreviewImage, ShapeError> {
    post.first_preview_image()
        .ok_or(ShapeError::Missing("preview.images"))
}

/// Source rendition first, then downscaled renditions largest first.
fn preview_variants(source: &ImageSource, resolutions: &[ImageSource]) -> Vec<MediaVariant> {
    std::iter::once(source)
        .chain(resolutions.iter().rev())
        .map(|image| {
            MediaVariant::new(
                html_unescape(&image.url),
                format!("{}x{}", image.width, image.height),
            )
        })
        .collect()
}

/// Picks the widest preview rendition that still fits a thumbnail, else the source.
fn select_thumbnail(image: Option<&PreviewImage>) -> Option<String> {
    let image = image?;
    let chosen = image
        .resolutions
        .iter()
        .filter(|resolution| resolution.width <= MAX_THUMBNAIL_WIDTH)
        .max_by_key(|resolution| resolution.width)
        .unwrap_or(&image.source);
    Some(html_unescape(&chosen.url))
}

/// Removes zero-width-space artifacts Reddit leaves in self posts.
#[must_use]
pub fn clean_selftext(selftext: &str) -> String {
    html_unescape(&selftext.replace("&amp;#x200B;", "").replace("&#x200B;", ""))
        .replace('\u{200b}', "")
}

/// Rewrites `https://i.imgur.com/<name>.gif` to `https://i.imgur.com/download/<name>.gif`.
#[must_use]
pub fn imgur_download_link(url: &str) -> String {
    match url.rsplit_once('/') {
        Some((prefix, name)) => format!("{prefix}/download/{name}"),
        None => url.to_string(),
    }
}

/// Extracts the RedGifs clip id (last path segment, lowercased) from a watch URL.
#[must_use]
pub fn redgifs_id(url: &str) -> Option<String> {
    let parsed = Url::parse(url).ok()?;
    let segment = parsed
        .path_segments()?
        .filter(|segment| !segment.is_empty())
        .next_back()?;
    let id = segment
        .split(['.', '-'])
        .next()
        .unwrap_or(segment)
        .to_ascii_lowercase();
    (!id.is_empty()).then_some(id)
}

fn host_of(url: &str) -> String {
    url_host(url).unwrap_or_default()
}

fn strip_query(url: &str) -> &str {
    url.split(['?', '#']).next().unwrap_or(url)
}

fn is_reddit_permalink(url: &str) -> bool {
    let host = host_of(url);
    host.is_empty() || host.ends_with("reddit.com")
}
