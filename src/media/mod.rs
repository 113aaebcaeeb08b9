//! Resolution results and media variants.
//!
//! A [`ResolvedResult`] is self-contained: it holds every link and label a
//! caller needs, so it can be cached or serialized without any session state.
//!
//! # Quality ladder order
//!
//! The order of [`MediaVariant`]s is significant and preserved:
//! - images and GIF previews: largest first (descending)
//! - DASH videos: ascending by height, with an optional audio-only variant
//!   appended last and labelled [`AUDIO_QUALITY_LABEL`]

pub mod dash;

use serde::Serialize;

/// Label of the trailing audio-only variant of a video ladder.
pub const AUDIO_QUALITY_LABEL: &str = "audio";

/// Label of a variant that points to the untouched upload.
pub const ORIGINAL_QUALITY_LABEL: &str = "Original";

/// One downloadable rendition.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MediaVariant {
    /// Absolute download URL.
    pub link: String,
    /// Human-readable quality label (`720p`, `1920x1080`, `hd`, ...).
    pub quality: String,
}

impl MediaVariant {
    /// Creates a variant.
    #[must_use]
    pub fn new(link: impl Into<String>, quality: impl Into<String>) -> Self {
        Self {
            link: link.into(),
            quality: quality.into(),
        }
    }
}

/// Kind of media a result or album item holds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum MediaKind {
    Photo,
    Gif,
    Video,
}

/// A single media item with its quality ladder.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MediaResult {
    pub variants: Vec<MediaVariant>,
    pub kind: MediaKind,
    pub title: String,
    pub thumbnail: Option<String>,
    pub duration_secs: u64,
}

impl MediaResult {
    /// Index of the audio-only variant, if the video has a separate audio track.
    ///
    /// Only the last variant is inspected: an audio-labelled variant anywhere
    /// else is reported as "no audio". Upload code relies on this index.
    #[must_use]
    pub fn audio_index(&self) -> Option<usize> {
        audio_index(&self.variants)
    }

    /// Returns true when the ladder ends with an audio-only variant.
    #[must_use]
    pub fn has_audio(&self) -> bool {
        self.audio_index().is_some()
    }
}

/// Index of the trailing audio-only variant of `variants`.
#[must_use]
pub fn audio_index(variants: &[MediaVariant]) -> Option<usize> {
    variants
        .last()
        .filter(|variant| variant.quality == AUDIO_QUALITY_LABEL)
        .map(|_| variants.len() - 1)
}

/// One entry of a gallery.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AlbumItem {
    pub link: String,
    pub caption: String,
    pub kind: MediaKind,
}

/// Fully resolved content of a post or comment.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ResolvedResult {
    /// Self post or non-media link.
    Text { title: String, body: String },
    /// Plain comment.
    Comment { body: String },
    /// Image, GIF or video with a quality ladder.
    Media(MediaResult),
    /// Gallery of images, GIFs and videos.
    Album { items: Vec<AlbumItem> },
}
