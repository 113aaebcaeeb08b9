//! MPEG-DASH manifest scanning and quality ladder construction.
//!
//! Reddit manifests are small and flat (`MPD/Period/AdaptationSet/Representation`),
//! so they are scanned with a handful of static regexes instead of a full XML
//! parser. Three dialects are recognised, checked in order for each
//! representation:
//!
//! 1. `AdaptationSet@contentType` is `video` or `audio`
//! 2. `Representation@id` is prefixed `VIDEO-` or `AUDIO-` (older manifests)
//! 3. `mimeType` of the representation or its adaptation set is `video/*` or `audio/*`
//!
//! Representation order inside the document is preserved.

use std::sync::LazyLock;

use regex::Regex;
use thiserror::Error;
use tracing::{debug, trace};

use crate::error::FetchError;
use crate::utils::{compile_static_regex, xml_unescape};

use super::{AUDIO_QUALITY_LABEL, MediaVariant};

static MPD_ROOT_RE: LazyLock<Regex> = LazyLock::new(|| compile_static_regex(r"<MPD\b"));

static ADAPTATION_SET_RE: LazyLock<Regex> = LazyLock::new(|| {
    compile_static_regex(r"(?s)<AdaptationSet\b([^>]*)>(.*?)</AdaptationSet\s*>")
});

static REPRESENTATION_RE: LazyLock<Regex> = LazyLock::new(|| {
    compile_static_regex(r"(?s)<Representation\b([^>]*?)(?:/>|>(.*?)</Representation\s*>)")
});

static BASE_URL_RE: LazyLock<Regex> =
    LazyLock::new(|| compile_static_regex(r"(?s)<BaseURL[^>]*>\s*([^<]*?)\s*</BaseURL\s*>"));

static ATTRIBUTE_RE: LazyLock<Regex> = LazyLock::new(|| {
    compile_static_regex(r#"([A-Za-z_:][-A-Za-z0-9_:.]*)\s*=\s*(?:"([^"]*)"|'([^']*)')"#)
});

static DIGITS_RE: LazyLock<Regex> = LazyLock::new(|| compile_static_regex(r"\d+"));

/// Errors produced while reading a manifest or building its ladder.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DashError {
    /// The document has no `MPD` root element.
    #[error("document is not a DASH manifest")]
    NotManifest,

    /// The manifest lists no video representation.
    #[error("DASH manifest has no video representation")]
    NoVideo,
}

impl From<DashError> for FetchError {
    fn from(error: DashError) -> Self {
        Self::upstream(error.to_string())
    }
}

/// Representations found in a manifest, in document order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AvailableMedia {
    /// Video representation links (BaseURL, or id when no BaseURL is present).
    pub videos: Vec<String>,
    /// Audio representation links.
    pub audios: Vec<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum StreamType {
    Video,
    Audio,
}

impl StreamType {
    fn from_content_type(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "video" => Some(Self::Video),
            "audio" => Some(Self::Audio),
            _ => None,
        }
    }

    fn from_id(value: &str) -> Option<Self> {
        let upper = value.trim().to_ascii_uppercase();
        if upper.starts_with("VIDEO-") {
            Some(Self::Video)
        } else if upper.starts_with("AUDIO-") {
            Some(Self::Audio)
        } else {
            None
        }
    }

    fn from_mime_type(value: &str) -> Option<Self> {
        let lower = value.trim().to_ascii_lowercase();
        if lower.starts_with("video/") {
            Some(Self::Video)
        } else if lower.starts_with("audio/") {
            Some(Self::Audio)
        } else {
            None
        }
    }
}

/// Extracts video and audio representations from a manifest document.
///
/// # Errors
///
/// Returns [`DashError::NotManifest`] when the document has no `MPD` root.
pub fn parse_manifest(xml: &str) -> Result<AvailableMedia, DashError> {
    if !MPD_ROOT_RE.is_match(xml) {
        return Err(DashError::NotManifest);
    }

    let mut media = AvailableMedia::default();
    for set in ADAPTATION_SET_RE.captures_iter(xml) {
        let set_attrs = set.get(1).map_or("", |m| m.as_str());
        let set_body = set.get(2).map_or("", |m| m.as_str());
        let set_content_type =
            attribute(set_attrs, "contentType").and_then(|v| StreamType::from_content_type(&v));
        let set_mime_type =
            attribute(set_attrs, "mimeType").and_then(|v| StreamType::from_mime_type(&v));

        for representation in REPRESENTATION_RE.captures_iter(set_body) {
            let attrs = representation.get(1).map_or("", |m| m.as_str());
            let body = representation.get(2).map_or("", |m| m.as_str());
            let id = attribute(attrs, "id");

            let stream_type = set_content_type
                .or_else(|| id.as_deref().and_then(StreamType::from_id))
                .or_else(|| {
                    attribute(attrs, "mimeType").and_then(|v| StreamType::from_mime_type(&v))
                })
                .or(set_mime_type);

            let link = BASE_URL_RE
                .captures(body)
                .and_then(|caps| caps.get(1))
                .map(|m| xml_unescape(m.as_str()))
                .filter(|value| !value.is_empty())
                .or(id);

            match (stream_type, link) {
                (Some(StreamType::Video), Some(link)) => media.videos.push(link),
                (Some(StreamType::Audio), Some(link)) => media.audios.push(link),
                (stream_type, link) => {
                    trace!(?stream_type, ?link, "skipping unrecognised representation");
                }
            }
        }
    }

    debug!(
        videos = media.videos.len(),
        audios = media.audios.len(),
        "DASH manifest parsed"
    );
    Ok(media)
}

/// Builds the quality ladder of a manifest.
///
/// Videos are sorted ascending by the first run of digits in their file name
/// (names without digits sort first) and labelled `<height>p`. When audio
/// representations exist, the last one in document order is appended with
/// the [`AUDIO_QUALITY_LABEL`] label.
///
/// # Errors
///
/// Returns [`DashError::NoVideo`] when no video representation exists.
pub fn build_quality_ladder(
    base_url: &str,
    media: &AvailableMedia,
) -> Result<Vec<MediaVariant>, DashError> {
    if media.videos.is_empty() {
        return Err(DashError::NoVideo);
    }

    let mut videos: Vec<(Option<u32>, &str)> = media
        .videos
        .iter()
        .map(|link| (leading_height(link), link.as_str()))
        .collect();
    videos.sort_by_key(|(height, _)| *height);

    let mut ladder: Vec<MediaVariant> = videos
        .into_iter()
        .map(|(height, link)| {
            let label = height.map_or_else(|| file_name(link).to_string(), |h| format!("{h}p"));
            MediaVariant::new(join_base(base_url, link), label)
        })
        .collect();

    if let Some(audio) = media.audios.last() {
        ladder.push(MediaVariant::new(
            join_base(base_url, audio),
            AUDIO_QUALITY_LABEL,
        ));
    }
    Ok(ladder)
}

/// Returns the directory of a manifest URL, used as base for representation links.
///
/// `https://v.redd.it/abc/DASHPlaylist.mpd?a=1` becomes `https://v.redd.it/abc/`.
#[must_use]
pub fn manifest_base_url(manifest_url: &str) -> String {
    let without_query = manifest_url
        .split(['?', '#'])
        .next()
        .unwrap_or(manifest_url);
    match without_query.rfind('/') {
        Some(index) => without_query[..=index].to_string(),
        None => format!("{without_query}/"),
    }
}

fn join_base(base_url: &str, link: &str) -> String {
    if link.starts_with("http://") || link.starts_with("https://") {
        link.to_string()
    } else {
        format!("{base_url}{}", link.trim_start_matches('/'))
    }
}

fn file_name(link: &str) -> &str {
    let path = link.split(['?', '#']).next().unwrap_or(link);
    path.rsplit('/').next().unwrap_or(path)
}

/// File name without its extension, so `.mp4` never supplies a height.
fn file_stem(link: &str) -> &str {
    let name = file_name(link);
    name.rsplit_once('.').map_or(name, |(stem, _)| stem)
}

fn leading_height(link: &str) -> Option<u32> {
    DIGITS_RE
        .find(file_stem(link))
        .and_then(|digits| digits.as_str().parse().ok())
}

fn attribute(attrs: &str, name: &str) -> Option<String> {
    ATTRIBUTE_RE.captures_iter(attrs).find_map(|caps| {
        let key = caps.get(1)?.as_str();
        if key != name {
            return None;
        }
        caps.get(2)
            .or_else(|| caps.get(3))
            .map(|value| xml_unescape(value.as_str()))
    })
}
