//! Media type registry and JSON-family classification
//!
//! Request bodies and response payloads are labeled with the constants here
//! instead of string literals scattered through call sites. The two
//! classifier functions decide whether a content type belongs to the JSON
//! family, which controls body serialization and patch-endpoint handling:
//! - plain JSON and merge-patch documents serialize the same way
//! - JSON-patch documents are a distinct format and must not be treated as
//!   plain JSON

use std::sync::OnceLock;

use regex::Regex;

/// `application/json`
pub const APPLICATION_JSON: &str = "application/json";
/// `application/json-patch+json` (RFC 6902 patch documents)
pub const APPLICATION_JSON_PATCH: &str = "application/json-patch+json";
/// `application/merge-patch+json` (RFC 7396 merge patches)
pub const APPLICATION_MERGE_PATCH: &str = "application/merge-patch+json";
/// `application/x-www-form-urlencoded`
pub const APPLICATION_FORM_URLENCODED: &str = "application/x-www-form-urlencoded";
/// `application/octet-stream`
pub const APPLICATION_OCTET_STREAM: &str = "application/octet-stream";
/// `application/zip`
pub const APPLICATION_ZIP: &str = "application/zip";
/// `multipart/form-data`
pub const MULTIPART_FORM_DATA: &str = "multipart/form-data";
/// `text/plain`
pub const TEXT_PLAIN: &str = "text/plain";
/// `text/html`
pub const TEXT_HTML: &str = "text/html";
/// `text/csv`
pub const TEXT_CSV: &str = "text/csv";
/// `audio/wav`
pub const AUDIO_WAV: &str = "audio/wav";
/// `audio/ogg`
pub const AUDIO_OGG: &str = "audio/ogg";
/// `audio/flac`
pub const AUDIO_FLAC: &str = "audio/flac";

fn json_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(r"^(?i)application/((json)|(merge-patch\+json))(;.*)?$")
            .expect("Valid media type pattern")
    })
}

fn json_patch_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(r"^(?i)application/json-patch\+json(;.*)?$")
            .expect("Valid media type pattern")
    })
}

/// Returns true when the content type is plain JSON or a merge-patch
/// document, matching case-insensitively and tolerating parameters such as
/// `; charset=utf-8`. JSON-patch documents are deliberately excluded.
pub fn is_json_media_type(media_type: &str) -> bool {
    json_pattern().is_match(media_type.trim())
}

/// Returns true when the content type is a JSON-patch document,
/// case-insensitively and tolerating trailing parameters.
pub fn is_json_patch_media_type(media_type: &str) -> bool {
    json_patch_pattern().is_match(media_type.trim())
}
