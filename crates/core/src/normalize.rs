//! Output normalization: provider success payloads to media descriptors.
//!
//! Providers return output in several shapes. [`OutputShape::classify`]
//! recognizes three of them and [`normalize_output`] turns any recognized
//! shape into an ordered list of [`NormalizedMedia`]:
//!
//! - a single URL string
//! - an array of URL strings (entries may also be `{ "url": ... }` objects)
//! - an object exposing a URL under one of [`URL_KEYS`]
//!
//! Entries that are not URL-like are dropped, never reported as errors, so
//! one malformed entry cannot fail a whole batch.

use serde::{Deserialize, Serialize};
use url::Url;

// ---------------------------------------------------------------------------
// Constants
// ---------------------------------------------------------------------------

/// Object keys searched for URLs, in order.
pub const URL_KEYS: &[&str] = &["url", "uri", "output", "image", "video", "audio", "file"];

/// Nesting depth beyond which object/array payloads are not searched.
pub const MAX_NESTING_DEPTH: usize = 4;

const IMAGE_EXTENSIONS: &[&str] = &[
    "png", "jpg", "jpeg", "gif", "webp", "bmp", "tif", "tiff", "svg", "avif", "heic",
];
const VIDEO_EXTENSIONS: &[&str] = &["mp4", "webm", "mov", "avi", "mkv", "m4v"];
const AUDIO_EXTENSIONS: &[&str] = &["mp3", "wav", "ogg", "flac", "m4a", "aac", "opus"];

// ---------------------------------------------------------------------------
// Types
// ---------------------------------------------------------------------------

/// Kind of media inferred for one output URL.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MediaKind {
    Image,
    Video,
    Audio,
    Unknown,
}

impl MediaKind {
    pub fn as_str(self) -> &'static str {
        match self {
            MediaKind::Image => "image",
            MediaKind::Video => "video",
            MediaKind::Audio => "audio",
            MediaKind::Unknown => "unknown",
        }
    }

    /// Parse the stored string form. Anything unrecognized is `Unknown`.
    pub fn from_name(name: &str) -> Self {
        match name {
            "image" => MediaKind::Image,
            "video" => MediaKind::Video,
            "audio" => MediaKind::Audio,
            _ => MediaKind::Unknown,
        }
    }
}

impl From<String> for MediaKind {
    fn from(name: String) -> Self {
        MediaKind::from_name(&name)
    }
}

/// One normalized output artifact, not yet bound to a stored job row.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct NormalizedMedia {
    /// Zero-based position in the provider's output.
    pub ordinal: i32,
    pub url: String,
    pub kind: MediaKind,
}

/// Recognized shapes of a provider success payload.
#[derive(Debug, Clone, PartialEq)]
pub enum OutputShape<'a> {
    Single(&'a str),
    Many(&'a [serde_json::Value]),
    Object(&'a serde_json::Map<String, serde_json::Value>),
}

/// Why a payload could not be normalized at all.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum NormalizationError {
    #[error("Unrecognized output shape: {0}")]
    UnrecognizedShape(&'static str),
}

impl<'a> OutputShape<'a> {
    /// Classify a raw payload. Numbers, booleans and `null` are not a shape.
    pub fn classify(value: &'a serde_json::Value) -> Result<Self, NormalizationError> {
        match value {
            serde_json::Value::String(s) => Ok(OutputShape::Single(s)),
            serde_json::Value::Array(items) => Ok(OutputShape::Many(items)),
            serde_json::Value::Object(map) => Ok(OutputShape::Object(map)),
            serde_json::Value::Null => Err(NormalizationError::UnrecognizedShape("null")),
            serde_json::Value::Bool(_) => Err(NormalizationError::UnrecognizedShape("boolean")),
            serde_json::Value::Number(_) => Err(NormalizationError::UnrecognizedShape("number")),
        }
    }
}

// ---------------------------------------------------------------------------
// Normalization
// ---------------------------------------------------------------------------

/// Normalize a provider success payload into ordered media descriptors.
///
/// `input` is the original generation input; it is consulted only as the
/// last-resort kind fallback (see [`infer_kind`]). Duplicate URLs are kept
/// once, at their first position.
pub fn normalize_output(
    output: &serde_json::Value,
    input: &serde_json::Value,
) -> Result<Vec<NormalizedMedia>, NormalizationError> {
    let shape = OutputShape::classify(output)?;

    let mut urls = Vec::new();
    collect_shape(&shape, 0, &mut urls);

    let mut media: Vec<NormalizedMedia> = Vec::with_capacity(urls.len());
    for url in urls {
        if media.iter().any(|m| m.url == url) {
            continue;
        }
        let kind = infer_kind(&url, input);
        media.push(NormalizedMedia {
            ordinal: media.len() as i32,
            url,
            kind,
        });
    }
    Ok(media)
}

fn collect_shape(shape: &OutputShape<'_>, depth: usize, out: &mut Vec<String>) {
    match shape {
        OutputShape::Single(s) => {
            if is_url_like(s) {
                out.push(s.trim().to_string());
            }
        }
        OutputShape::Many(items) => {
            for item in items.iter() {
                collect_value(item, depth + 1, out);
            }
        }
        OutputShape::Object(map) => {
            for key in URL_KEYS {
                if let Some(value) = map.get(*key) {
                    collect_value(value, depth + 1, out);
                }
            }
        }
    }
}

fn collect_value(value: &serde_json::Value, depth: usize, out: &mut Vec<String>) {
    if depth > MAX_NESTING_DEPTH {
        return;
    }
    if let Ok(shape) = OutputShape::classify(value) {
        collect_shape(&shape, depth, out);
    }
}

/// Whether a string looks like a fetchable media location.
///
/// Accepts absolute `http`/`https` URLs with a host, and `data:` URIs.
pub fn is_url_like(candidate: &str) -> bool {
    match Url::parse(candidate.trim()) {
        Ok(url) => match url.scheme() {
            "http" | "https" => url.host_str().is_some_and(|h| !h.is_empty()),
            "data" => true,
            _ => false,
        },
        Err(_) => false,
    }
}

// ---------------------------------------------------------------------------
// Kind inference
// ---------------------------------------------------------------------------

/// Infer the media kind of `url`.
///
/// The primary path is the file extension (or the MIME type of a `data:`
/// URI). As a last resort only, an otherwise unknown URL is tagged `image`
/// when the generation input contained a `prompt` field.
pub fn infer_kind(url: &str, input: &serde_json::Value) -> MediaKind {
    let kind = kind_from_url(url);
    if kind == MediaKind::Unknown && input.get("prompt").is_some() {
        return MediaKind::Image;
    }
    kind
}

/// Kind from the URL alone, with no fallback.
pub fn kind_from_url(url: &str) -> MediaKind {
    let Ok(parsed) = Url::parse(url.trim()) else {
        return MediaKind::Unknown;
    };

    if parsed.scheme() == "data" {
        let mime = parsed.path().split([';', ',']).next().unwrap_or_default();
        return kind_from_mime(mime);
    }

    let last_segment = parsed
        .path_segments()
        .and_then(|mut segments| segments.next_back())
        .unwrap_or_default();

    match last_segment.rsplit_once('.') {
        Some((stem, ext)) if !stem.is_empty() => kind_from_extension(ext),
        _ => MediaKind::Unknown,
    }
}

/// Look an extension up in the fixed kind tables (case-insensitive).
pub fn kind_from_extension(ext: &str) -> MediaKind {
    let ext = ext.to_ascii_lowercase();
    if IMAGE_EXTENSIONS.contains(&ext.as_str()) {
        MediaKind::Image
    } else if VIDEO_EXTENSIONS.contains(&ext.as_str()) {
        MediaKind::Video
    } else if AUDIO_EXTENSIONS.contains(&ext.as_str()) {
        MediaKind::Audio
    } else {
        MediaKind::Unknown
    }
}

fn kind_from_mime(mime: &str) -> MediaKind {
    match mime.split('/').next() {
        Some("image") => MediaKind::Image,
        Some("video") => MediaKind::Video,
        Some("audio") => MediaKind::Audio,
        _ => MediaKind::Unknown,
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;
    use serde_json::json;

    fn kinds(media: &[NormalizedMedia]) -> Vec<MediaKind> {
        media.iter().map(|m| m.kind).collect()
    }

    // -- Shapes --------------------------------------------------------------

    #[test]
    fn single_url_yields_one_image() {
        let media = normalize_output(&json!("https://x/a.png"), &json!({})).unwrap();
        assert_eq!(media.len(), 1);
        assert_eq!(media[0].url, "https://x/a.png");
        assert_eq!(media[0].kind, MediaKind::Image);
        assert_eq!(media[0].ordinal, 0);
    }

    #[test]
    fn array_drops_non_urls_and_keeps_order() {
        let output = json!(["https://x/a.png", "not-a-url", "https://x/b.mp4"]);
        let media = normalize_output(&output, &json!({})).unwrap();
        assert_eq!(kinds(&media), vec![MediaKind::Image, MediaKind::Video]);
        assert_eq!(media[1].ordinal, 1);
        assert_eq!(media[1].url, "https://x/b.mp4");
    }

    #[test]
    fn object_with_url_field_yields_audio() {
        let media = normalize_output(&json!({ "url": "https://x/a.wav" }), &json!({})).unwrap();
        assert_eq!(kinds(&media), vec![MediaKind::Audio]);
    }

    #[test]
    fn array_of_url_objects_is_supported() {
        let output = json!([{ "url": "https://x/1.webp" }, { "url": "https://x/2.mov" }, 42]);
        let media = normalize_output(&output, &json!({})).unwrap();
        assert_eq!(kinds(&media), vec![MediaKind::Image, MediaKind::Video]);
    }

    #[test]
    fn object_without_url_fields_yields_nothing() {
        let media = normalize_output(&json!({ "text": "hello" }), &json!({})).unwrap();
        assert!(media.is_empty());
    }

    #[test]
    fn scalar_payloads_are_unrecognized() {
        assert_matches!(
            normalize_output(&json!(12), &json!({})),
            Err(NormalizationError::UnrecognizedShape("number"))
        );
        assert_matches!(
            normalize_output(&serde_json::Value::Null, &json!({})),
            Err(NormalizationError::UnrecognizedShape("null"))
        );
    }

    #[test]
    fn duplicate_urls_are_kept_once() {
        let output = json!(["https://x/a.png", "https://x/a.png"]);
        let media = normalize_output(&output, &json!({})).unwrap();
        assert_eq!(media.len(), 1);
    }

    #[test]
    fn deeply_nested_payloads_stop_at_depth_limit() {
        let output = json!([[[[[["https://x/deep.png"]]]]]]);
        let media = normalize_output(&output, &json!({})).unwrap();
        assert!(media.is_empty());
    }

    // -- Kind inference -------------------------------------------------------

    #[test]
    fn extension_lookup_ignores_query_and_case() {
        assert_eq!(kind_from_url("https://cdn/x/OUT.JPG?sig=abc"), MediaKind::Image);
        assert_eq!(kind_from_url("https://cdn/x/clip.webm#t=1"), MediaKind::Video);
        assert_eq!(kind_from_url("https://cdn/x/voice.flac"), MediaKind::Audio);
    }

    #[test]
    fn extensionless_urls_are_unknown() {
        assert_eq!(kind_from_url("https://cdn/x/download"), MediaKind::Unknown);
        assert_eq!(kind_from_url("https://cdn/x/.hidden"), MediaKind::Unknown);
        assert_eq!(kind_from_url("https://cdn/x/model.safetensors"), MediaKind::Unknown);
    }

    #[test]
    fn data_uris_use_mime_type() {
        assert_eq!(kind_from_url("data:image/png;base64,AAAA"), MediaKind::Image);
        assert_eq!(kind_from_url("data:audio/wav;base64,AAAA"), MediaKind::Audio);
    }

    #[test]
    fn prompt_input_is_last_resort_image_fallback() {
        let input = json!({ "prompt": "a cat" });
        assert_eq!(infer_kind("https://cdn/x/download", &input), MediaKind::Image);
        // The extension still wins when present.
        assert_eq!(infer_kind("https://cdn/x/a.mp3", &input), MediaKind::Audio);
        assert_eq!(infer_kind("https://cdn/x/download", &json!({})), MediaKind::Unknown);
    }

    #[test]
    fn url_like_requires_scheme_and_host() {
        assert!(is_url_like("https://example.com/a.png"));
        assert!(is_url_like("data:image/png;base64,AAAA"));
        assert!(!is_url_like("not-a-url"));
        assert!(!is_url_like("ftp://example.com/a.png"));
        assert!(!is_url_like("/relative/path.png"));
    }

    #[test]
    fn media_kind_names_round_trip() {
        for kind in [MediaKind::Image, MediaKind::Video, MediaKind::Audio, MediaKind::Unknown] {
            assert_eq!(MediaKind::from_name(kind.as_str()), kind);
        }
        assert_eq!(MediaKind::from_name("hologram"), MediaKind::Unknown);
    }
}
