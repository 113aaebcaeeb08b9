//! Shared helpers: static regex compilation, host normalization, HTML entity
//! decoding and meta tag extraction.

use std::sync::LazyLock;

use regex::Regex;
use url::Url;

/// Compiles a regex at static init; panics on invalid pattern.
pub fn compile_static_regex(pattern: &str) -> Regex {
    Regex::new(pattern).unwrap_or_else(|e| panic!("invalid static regex '{pattern}': {e}"))
}

/// Regex for `<meta property="og:video" content="...">` (either attribute order).
pub static OG_VIDEO_RE: LazyLock<Regex> = LazyLock::new(|| {
    compile_static_regex(
        r#"(?is)<meta\s+[^>]*?(?:(?:name|property)\s*=\s*["']og:video(?::url|:secure_url)?["'][^>]*?content\s*=\s*["']([^"']+)["']|content\s*=\s*["']([^"']+)["'][^>]*?(?:name|property)\s*=\s*["']og:video(?::url|:secure_url)?["'])"#,
    )
});

/// Normalizes a host string: trim, strip leading "www.", trailing '.', and lowercases.
#[must_use]
pub fn canonical_host(host: &str) -> String {
    host.trim()
        .trim_start_matches("www.")
        .trim_end_matches('.')
        .to_ascii_lowercase()
}

/// Returns the canonical host of `url`, or `None` when it does not parse.
#[must_use]
pub fn url_host(url: &str) -> Option<String> {
    Url::parse(url)
        .ok()
        .and_then(|parsed| parsed.host_str().map(canonical_host))
}

/// Returns the first capture group that matched in `html`, trimmed and unescaped.
#[must_use]
pub fn extract_meta_value(html: &str, regex: &Regex) -> Option<String> {
    regex.captures(html).and_then(|caps| {
        caps.iter()
            .skip(1)
            .flatten()
            .next()
            .map(|m| html_unescape(m.as_str().trim()))
    })
}

/// Decodes HTML character references in a single left-to-right pass.
///
/// Named references cover what Reddit emits (`&amp;`, `&lt;`, `&gt;`,
/// `&quot;`, `&apos;`, `&#39;`, `&nbsp;`); numeric references are decoded in
/// decimal and hex form. Decoded text is never re-scanned, so `&amp;lt;`
/// becomes `&lt;`. Unknown or malformed references are kept verbatim.
#[must_use]
pub fn html_unescape(value: &str) -> String {
    let mut out = String::with_capacity(value.len());
    let mut rest = value;

    while let Some(start) = rest.find('&') {
        out.push_str(&rest[..start]);
        let candidate = &rest[start..];
        match candidate
            .find(';')
            .filter(|end| *end <= 12)
            .and_then(|end| decode_reference(&candidate[1..end]).map(|c| (c, end)))
        {
            Some((decoded, end)) => {
                out.push(decoded);
                rest = &candidate[end + 1..];
            }
            None => {
                out.push('&');
                rest = &candidate[1..];
            }
        }
    }
    out.push_str(rest);
    out
}

/// Decodes XML entities; identical rules to [`html_unescape`].
#[must_use]
pub fn xml_unescape(value: &str) -> String {
    html_unescape(value)
}

fn decode_reference(name: &str) -> Option<char> {
    if let Some(numeric) = name.strip_prefix('#') {
        let code = match numeric.strip_prefix(['x', 'X']) {
            Some(hex) => u32::from_str_radix(hex, 16).ok()?,
            None => numeric.parse::<u32>().ok()?,
        };
        return char::from_u32(code);
    }
    match name {
        "amp" => Some('&'),
        "lt" => Some('<'),
        "gt" => Some('>'),
        "quot" => Some('"'),
        "apos" => Some('\''),
        "nbsp" => Some('\u{00a0}'),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_canonical_host_trim_www_and_trailing_dot_lowercase() {
        assert_eq!(canonical_host("  www.Example.COM.  "), "example.com");
        assert_eq!(canonical_host("i.redd.it"), "i.redd.it");
    }

    #[test]
    fn test_url_host() {
        assert_eq!(
            url_host("https://www.streamable.com/abc"),
            Some("streamable.com".to_string())
        );
        assert_eq!(url_host("not a url"), None);
    }

    #[test]
    fn test_html_unescape_common_entities() {
        assert_eq!(html_unescape("a &amp; b"), "a & b");
        assert_eq!(html_unescape("&lt;test&gt;"), "<test>");
        assert_eq!(html_unescape("&quot;q&quot; it&#39;s"), "\"q\" it's");
    }

    #[test]
    fn test_html_unescape_is_single_pass() {
        assert_eq!(html_unescape("&amp;lt;"), "&lt;");
        assert_eq!(html_unescape("&amp;#x200B;"), "&#x200B;");
    }

    #[test]
    fn test_html_unescape_numeric_references() {
        assert_eq!(html_unescape("&#x200B;"), "\u{200b}");
        assert_eq!(html_unescape("&#8212;"), "\u{2014}");
    }

    #[test]
    fn test_html_unescape_keeps_unknown_and_bare_ampersands() {
        assert_eq!(html_unescape("Tom & Jerry"), "Tom & Jerry");
        assert_eq!(html_unescape("&bogus;"), "&bogus;");
        assert_eq!(html_unescape("trailing &"), "trailing &");
    }

    #[test]
    fn test_html_unescape_preview_url() {
        assert_eq!(
            html_unescape("https://preview.redd.it/a.jpg?width=108&amp;crop=smart&amp;s=abc"),
            "https://preview.redd.it/a.jpg?width=108&crop=smart&s=abc"
        );
    }

    #[test]
    fn test_extract_og_video_property_first() {
        let html = r#"<head><meta property="og:video" content="https://cdn.streamable.com/video/mp4/abc.mp4?token=1&amp;x=2"></head>"#;
        assert_eq!(
            extract_meta_value(html, &OG_VIDEO_RE),
            Some("https://cdn.streamable.com/video/mp4/abc.mp4?token=1&x=2".to_string())
        );
    }

    #[test]
    fn test_extract_og_video_content_first() {
        let html = r#"<meta content="https://cdn.example/v.mp4" property="og:video:url" />"#;
        assert_eq!(
            extract_meta_value(html, &OG_VIDEO_RE),
            Some("https://cdn.example/v.mp4".to_string())
        );
    }

    #[test]
    fn test_extract_og_video_missing() {
        assert_eq!(
            extract_meta_value("<meta property=\"og:title\" content=\"x\">", &OG_VIDEO_RE),
            None
        );
    }
}
