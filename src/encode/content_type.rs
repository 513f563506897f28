//! Content-Type helpers: leading-byte sniffing and extension guessing.

use crate::config::{CONTENT_TYPE_FORM_URLENCODED, CONTENT_TYPE_JSON, CONTENT_TYPE_XML};

/// Guesses a body type from its first non-whitespace byte.
///
/// `{` or `[` means JSON, `<` means XML; anything else is unknown.
pub fn sniff(body: &[u8]) -> Option<&'static str> {
    match body.iter().find(|b| !b.is_ascii_whitespace())? {
        b'{' | b'[' => Some(CONTENT_TYPE_JSON),
        b'<' => Some(CONTENT_TYPE_XML),
        _ => None,
    }
}

/// Whether `content_type` is the urlencoded form default.
pub fn is_default(content_type: &str) -> bool {
    content_type
        .trim_start()
        .to_ascii_lowercase()
        .starts_with(CONTENT_TYPE_FORM_URLENCODED)
}

/// Whether a body of this type switches the request to rest mode.
pub fn is_rest_type(content_type: &str) -> bool {
    let lower = content_type.to_ascii_lowercase();
    lower.contains("json") || lower.contains("xml")
}

/// Appends a `charset` parameter to `content_type`.
pub fn with_charset(content_type: &str, charset: &str) -> String {
    format!("{content_type};charset={charset}")
}

/// Guesses a MIME type from a file name's extension.
pub fn guess_from_filename(filename: &str) -> Option<&'static str> {
    let (_, ext) = filename.rsplit_once('.')?;
    let mime = match ext.to_ascii_lowercase().as_str() {
        "txt" | "log" => "text/plain",
        "htm" | "html" => "text/html",
        "css" => "text/css",
        "csv" => "text/csv",
        "js" | "mjs" => "text/javascript",
        "json" => "application/json",
        "xml" => "application/xml",
        "pdf" => "application/pdf",
        "zip" => "application/zip",
        "gz" | "gzip" => "application/gzip",
        "tar" => "application/x-tar",
        "doc" => "application/msword",
        "docx" => "application/vnd.openxmlformats-officedocument.wordprocessingml.document",
        "xls" => "application/vnd.ms-excel",
        "xlsx" => "application/vnd.openxmlformats-officedocument.spreadsheetml.sheet",
        "png" => "image/png",
        "jpg" | "jpeg" => "image/jpeg",
        "gif" => "image/gif",
        "bmp" => "image/bmp",
        "webp" => "image/webp",
        "svg" => "image/svg+xml",
        "ico" => "image/x-icon",
        "mp3" => "audio/mpeg",
        "wav" => "audio/wav",
        "mp4" => "video/mp4",
        "webm" => "video/webm",
        _ => return None,
    };
    Some(mime)
}
