//! Typed model of the `api/info` listing documents.
//!
//! Only the fields the classifier reads are modelled. Every field is optional
//! (or defaulted) so a single deserialization pass accepts the many shapes
//! Reddit produces; missing data is detected later, where it matters.

use std::collections::HashMap;

use serde::Deserialize;
use serde::de::DeserializeOwned;
use thiserror::Error;

use crate::error::FetchError;

/// Shape fault found while reading a Reddit document.
#[derive(Debug, Error)]
pub enum ShapeError {
    /// The document does not deserialize into the expected model.
    #[error("document does not match the expected shape: {0}")]
    Decode(#[from] serde_json::Error),

    /// A field required for this post type is absent.
    #[error("missing `{0}`")]
    Missing(&'static str),

    /// The listing contains no children (deleted or unknown id).
    #[error("listing has no children")]
    EmptyListing,
}

impl From<ShapeError> for FetchError {
    fn from(error: ShapeError) -> Self {
        Self::unexpected_shape(error.to_string())
    }
}

/// Extracts the `data` of the first child of a listing document.
///
/// # Errors
///
/// Returns [`ShapeError`] when the document is not a listing of `T` or has no children.
pub fn first_child<T: DeserializeOwned>(document: serde_json::Value) -> Result<T, ShapeError> {
    let listing: Listing<T> = serde_json::from_value(document)?;
    listing
        .data
        .children
        .into_iter()
        .next()
        .map(|child| child.data)
        .ok_or(ShapeError::EmptyListing)
}

#[derive(Debug, Deserialize)]
struct Listing<T> {
    data: ListingData<T>,
}

#[derive(Debug, Deserialize)]
struct ListingData<T> {
    #[serde(default = "Vec::new")]
    children: Vec<Child<T>>,
}

#[derive(Debug, Deserialize)]
struct Child<T> {
    data: T,
}

/// A link post (`t3`).
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default)]
pub struct PostData {
    pub title: Option<String>,
    pub selftext: Option<String>,
    pub url: Option<String>,
    pub domain: Option<String>,
    pub post_hint: Option<String>,
    pub over_18: bool,
    pub preview: Option<Preview>,
    pub media: Option<Media>,
    pub secure_media: Option<Media>,
    pub gallery_data: Option<GalleryData>,
    pub media_metadata: Option<HashMap<String, MediaMetadata>>,
    pub crosspost_parent_list: Option<Vec<PostData>>,
}

impl PostData {
    /// Returns the required `title`.
    ///
    /// # Errors
    ///
    /// Returns [`ShapeError::Missing`] when absent.
    pub fn require_title(&self) -> Result<&str, ShapeError> {
        self.title.as_deref().ok_or(ShapeError::Missing("title"))
    }

    /// Returns the required `url`.
    ///
    /// # Errors
    ///
    /// Returns [`ShapeError::Missing`] when absent.
    pub fn require_url(&self) -> Result<&str, ShapeError> {
        self.url.as_deref().ok_or(ShapeError::Missing("url"))
    }

    /// First preview image, if any.
    #[must_use]
    pub fn first_preview_image(&self) -> Option<&PreviewImage> {
        self.preview.as_ref().and_then(|preview| preview.images.first())
    }

    /// The hosted `reddit_video` node, from `secure_media` or `media`.
    #[must_use]
    pub fn reddit_video(&self) -> Option<&RedditVideo> {
        self.secure_media
            .as_ref()
            .and_then(|media| media.reddit_video.as_ref())
            .or_else(|| self.media.as_ref().and_then(|media| media.reddit_video.as_ref()))
    }
}

/// `preview` node of a post.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default)]
pub struct Preview {
    pub images: Vec<PreviewImage>,
    pub reddit_video_preview: Option<RedditVideo>,
}

/// One entry of `preview.images`.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct PreviewImage {
    pub source: ImageSource,
    #[serde(default)]
    pub resolutions: Vec<ImageSource>,
    #[serde(default)]
    pub variants: ImageVariants,
}

/// A sized image or video rendition.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct ImageSource {
    pub url: String,
    #[serde(default)]
    pub width: u32,
    #[serde(default)]
    pub height: u32,
}

/// `variants` node of a preview image.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default)]
pub struct ImageVariants {
    pub gif: Option<VariantSet>,
    pub mp4: Option<VariantSet>,
}

/// Renditions of one variant (source + downscaled resolutions).
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct VariantSet {
    pub source: ImageSource,
    #[serde(default)]
    pub resolutions: Vec<ImageSource>,
}

/// `media` / `secure_media` node.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default)]
pub struct Media {
    pub reddit_video: Option<RedditVideo>,
}

/// Reddit-hosted video description.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default)]
pub struct RedditVideo {
    pub dash_url: Option<String>,
    pub fallback_url: Option<String>,
    pub duration: Option<f64>,
    pub is_gif: bool,
}

impl RedditVideo {
    /// Duration in whole seconds, zero when absent or invalid.
    #[must_use]
    #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
    pub fn duration_secs(&self) -> u64 {
        self.duration
            .filter(|value| value.is_finite() && *value > 0.0)
            .map_or(0, |value| value.round() as u64)
    }
}

/// `gallery_data` node.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct GalleryData {
    pub items: Vec<GalleryItem>,
}

/// One entry of `gallery_data.items`.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct GalleryItem {
    pub media_id: String,
    #[serde(default)]
    pub caption: Option<String>,
    #[serde(default)]
    pub outbound_url: Option<String>,
}

/// One entry of `media_metadata`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct MediaMetadata {
    pub status: Option<String>,
    pub e: Option<String>,
    pub id: Option<String>,
    pub s: Option<MetadataSource>,
    pub x: Option<u32>,
    pub y: Option<u32>,
}

/// `s` node of a media metadata entry.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct MetadataSource {
    pub u: Option<String>,
    pub gif: Option<String>,
    pub mp4: Option<String>,
    pub x: Option<u32>,
    pub y: Option<u32>,
}

/// A comment (`t1`).
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct CommentData {
    pub body: Option<String>,
}
