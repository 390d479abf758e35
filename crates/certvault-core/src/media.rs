//! Media-kind detection and name handling for certificate payloads.
//!
//! Detection prefers payload magic bytes over the original filename's
//! extension, because certificates arrive from camera rolls and share
//! sheets where extensions are frequently wrong or missing.

use once_cell::sync::Lazy;
use std::collections::HashSet;

use crate::models::MediaKind;

/// Extensions accepted as image payloads when magic bytes are inconclusive.
static IMAGE_EXTENSIONS: Lazy<HashSet<&'static str>> = Lazy::new(|| {
    [
        "jpg", "jpeg", "png", "gif", "heic", "heif", "webp", "tiff", "tif", "bmp",
    ]
    .into_iter()
    .collect()
});

/// Extensions accepted as audio payloads when magic bytes are inconclusive.
static AUDIO_EXTENSIONS: Lazy<HashSet<&'static str>> =
    Lazy::new(|| ["mp3", "m4a", "wav", "aac", "flac", "ogg"].into_iter().collect());

/// Classify a payload into the decode path its viewer needs.
///
/// Magic bytes win; the extension is a fallback for formats `infer` cannot
/// identify; anything else is treated as a document.
pub fn detect_media_kind(filename: &str, data: &[u8]) -> MediaKind {
    if let Some(kind) = infer::get(data) {
        let mime = kind.mime_type();
        if mime.starts_with("image/") {
            return MediaKind::Image;
        }
        if mime.starts_with("audio/") {
            return MediaKind::Audio;
        }
        return MediaKind::Document;
    }

    if let Some(ext) = filename.rsplit('.').next() {
        if let Some(kind) = kind_from_extension(ext) {
            return kind;
        }
    }

    MediaKind::Document
}

/// Extension-only classification, for callers that have no payload bytes
/// (placeholder construction from a container stem).
pub fn kind_from_extension(ext: &str) -> Option<MediaKind> {
    let ext = ext.to_lowercase();
    if IMAGE_EXTENSIONS.contains(ext.as_str()) {
        return Some(MediaKind::Image);
    }
    if AUDIO_EXTENSIONS.contains(ext.as_str()) {
        return Some(MediaKind::Audio);
    }
    if ext == "pdf" {
        return Some(MediaKind::Document);
    }
    None
}

/// Render an activity name as a folder component.
///
/// Activity names are user-entered and may contain path separators, so
/// separators are replaced rather than split on.
pub fn sanitize_folder_name(name: &str) -> String {
    let sanitized: String = name
        .chars()
        .map(|c| match c {
            '/' | '\\' | '<' | '>' | ':' | '"' | '|' | '?' | '*' | '\0' => '_',
            c if c.is_control() => '_',
            c => c,
        })
        .collect();

    let sanitized = sanitized.trim().trim_matches('.');
    if sanitized.is_empty() {
        return "activity".to_string();
    }

    if sanitized.len() > 100 {
        let mut end = 100;
        while !sanitized.is_char_boundary(end) {
            end -= 1;
        }
        return sanitized[..end].to_string();
    }

    sanitized.to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_detect_png_magic_bytes() {
        let png = [0x89, 0x50, 0x4E, 0x47, 0x0D, 0x0A, 0x1A, 0x0A];
        assert_eq!(detect_media_kind("scan.dat", &png), MediaKind::Image);
    }

    #[test]
    fn test_detect_jpeg_magic_bytes() {
        let jpeg = [0xFF, 0xD8, 0xFF, 0xE0, 0x00, 0x10, 0x4A, 0x46, 0x49, 0x46];
        assert_eq!(detect_media_kind("photo", &jpeg), MediaKind::Image);
    }

    #[test]
    fn test_detect_pdf_magic_bytes() {
        let pdf = b"%PDF-1.4 fake content";
        assert_eq!(detect_media_kind("result.pdf", pdf), MediaKind::Document);
    }

    #[test]
    fn test_detect_mp3_magic_bytes() {
        let mp3 = b"ID3\x04\x00\x00\x00\x00\x00\x00audio frames";
        assert_eq!(detect_media_kind("anthem.bin", mp3), MediaKind::Audio);
    }

    #[test]
    fn test_detect_overrides_wrong_extension() {
        // Claims .pdf but the bytes are a PNG.
        let png = [0x89, 0x50, 0x4E, 0x47, 0x0D, 0x0A, 0x1A, 0x0A];
        assert_eq!(detect_media_kind("cert.pdf", &png), MediaKind::Image);
    }

    #[test]
    fn test_detect_falls_back_to_extension() {
        assert_eq!(detect_media_kind("photo.heic", b""), MediaKind::Image);
        assert_eq!(detect_media_kind("anthem.m4a", b""), MediaKind::Audio);
    }

    #[test]
    fn test_detect_defaults_to_document() {
        assert_eq!(detect_media_kind("mystery.xyz", b"plain text"), MediaKind::Document);
        assert_eq!(detect_media_kind("no-extension", b""), MediaKind::Document);
    }

    #[test]
    fn test_kind_from_extension_case_insensitive() {
        assert_eq!(kind_from_extension("JPG"), Some(MediaKind::Image));
        assert_eq!(kind_from_extension("Mp3"), Some(MediaKind::Audio));
        assert_eq!(kind_from_extension("PDF"), Some(MediaKind::Document));
        assert_eq!(kind_from_extension("docx"), None);
    }

    #[test]
    fn test_sanitize_replaces_separators() {
        assert_eq!(sanitize_folder_name("Half/Full Marathon"), "Half_Full Marathon");
        assert_eq!(sanitize_folder_name("Trail\\Run"), "Trail_Run");
    }

    #[test]
    fn test_sanitize_replaces_dangerous_chars() {
        assert_eq!(sanitize_folder_name("Race: 10K?"), "Race_ 10K_");
    }

    #[test]
    fn test_sanitize_handles_empty() {
        assert_eq!(sanitize_folder_name(""), "activity");
        assert_eq!(sanitize_folder_name("   "), "activity");
        assert_eq!(sanitize_folder_name("..."), "activity");
    }

    #[test]
    fn test_sanitize_truncates_long_names() {
        let long = "a".repeat(300);
        assert_eq!(sanitize_folder_name(&long).len(), 100);
    }

    #[test]
    fn test_sanitize_keeps_unicode() {
        assert_eq!(sanitize_folder_name("Lauf über 10 km"), "Lauf über 10 km");
    }
}
