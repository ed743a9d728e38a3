//! Content-type detection for MIME-prefix rules.
//!
//! Detection is two-phase: a static extension table first, then byte-signature
//! sniffing over the first 512 bytes of the file. Unreadable files yield an
//! empty type, which never satisfies a prefix rule.

use std::fs::File;
use std::io::Read;
use std::path::Path;

/// Number of leading bytes inspected when sniffing.
pub const SNIFF_LEN: usize = 512;

const TEXT_PLAIN: &str = "text/plain; charset=utf-8";
const OCTET_STREAM: &str = "application/octet-stream";

/// Detect the content type of the file at `path`.
///
/// Returns an empty string when the extension is unknown and the file cannot
/// be opened or read.
#[must_use]
pub fn detect_content_type(path: &Path) -> String {
    if let Some(known) = path
        .extension()
        .and_then(|ext| ext.to_str())
        .and_then(content_type_for_extension)
    {
        return known.to_string();
    }

    let Ok(file) = File::open(path) else {
        return String::new();
    };
    let mut head = Vec::with_capacity(SNIFF_LEN);
    match file.take(SNIFF_LEN as u64).read_to_end(&mut head) {
        Ok(_) => sniff(&head).to_string(),
        Err(_) => String::new(),
    }
}

/// Look up a content type by file extension (without the leading dot).
#[must_use]
pub fn content_type_for_extension(ext: &str) -> Option<&'static str> {
    let content_type = match ext.to_ascii_lowercase().as_str() {
        "pdf" => "application/pdf",
        "json" => "application/json",
        "zip" => "application/zip",
        "gz" | "tgz" => "application/gzip",
        "tar" => "application/x-tar",
        "7z" => "application/x-7z-compressed",
        "rar" => "application/vnd.rar",
        "dmg" => "application/x-apple-diskimage",
        "epub" => "application/epub+zip",
        "wasm" => "application/wasm",
        "doc" => "application/msword",
        "docx" => "application/vnd.openxmlformats-officedocument.wordprocessingml.document",
        "xls" => "application/vnd.ms-excel",
        "xlsx" => "application/vnd.openxmlformats-officedocument.spreadsheetml.sheet",
        "ppt" => "application/vnd.ms-powerpoint",
        "pptx" => "application/vnd.openxmlformats-officedocument.presentationml.presentation",
        "png" => "image/png",
        "jpg" | "jpeg" => "image/jpeg",
        "gif" => "image/gif",
        "webp" => "image/webp",
        "svg" => "image/svg+xml",
        "bmp" => "image/bmp",
        "ico" => "image/x-icon",
        "tif" | "tiff" => "image/tiff",
        "heic" => "image/heic",
        "avif" => "image/avif",
        "mp3" => "audio/mpeg",
        "wav" => "audio/wav",
        "flac" => "audio/flac",
        "ogg" => "audio/ogg",
        "m4a" => "audio/mp4",
        "mp4" | "m4v" => "video/mp4",
        "mov" => "video/quicktime",
        "mkv" => "video/x-matroska",
        "webm" => "video/webm",
        "avi" => "video/x-msvideo",
        "txt" => TEXT_PLAIN,
        "csv" => "text/csv; charset=utf-8",
        "md" => "text/markdown; charset=utf-8",
        "html" | "htm" => "text/html; charset=utf-8",
        "css" => "text/css; charset=utf-8",
        "js" | "mjs" => "text/javascript; charset=utf-8",
        "xml" => "text/xml; charset=utf-8",
        _ => return None,
    };
    Some(content_type)
}

/// Classify a byte prefix by its signature.
///
/// Falls back to `text/plain` when the bytes contain no binary control
/// characters and to `application/octet-stream` otherwise.
#[must_use]
pub fn sniff(head: &[u8]) -> &'static str {
    const SIGNATURES: &[(&[u8], &str)] = &[
        (b"%PDF-", "application/pdf"),
        (b"%!PS-Adobe-", "application/postscript"),
        (b"\x89PNG\r\n\x1a\n", "image/png"),
        (b"\xff\xd8\xff", "image/jpeg"),
        (b"GIF87a", "image/gif"),
        (b"GIF89a", "image/gif"),
        (b"BM", "image/bmp"),
        (b"\x00\x00\x01\x00", "image/x-icon"),
        (b"ID3", "audio/mpeg"),
        (b"OggS\x00", "application/ogg"),
        (b"\x1a\x45\xdf\xa3", "video/webm"),
        (b"PK\x03\x04", "application/zip"),
        (b"\x1f\x8b\x08", "application/x-gzip"),
        (b"Rar!\x1a\x07", "application/x-rar-compressed"),
        (b"7z\xbc\xaf\x27\x1c", "application/x-7z-compressed"),
        (b"\x00asm", "application/wasm"),
    ];

    if let Some((_, content_type)) = SIGNATURES
        .iter()
        .find(|(signature, _)| head.starts_with(signature))
    {
        return content_type;
    }
    if let Some(content_type) = sniff_riff(head) {
        return content_type;
    }
    if head.len() >= 12 && &head[4..8] == b"ftyp" {
        return "video/mp4";
    }
    if let Some(content_type) = sniff_markup(head) {
        return content_type;
    }
    if head.iter().any(|&byte| is_binary(byte)) {
        OCTET_STREAM
    } else {
        TEXT_PLAIN
    }
}

fn sniff_riff(head: &[u8]) -> Option<&'static str> {
    if head.len() < 12 || !head.starts_with(b"RIFF") {
        return None;
    }
    match &head[8..12] {
        b"WEBP" => Some("image/webp"),
        b"WAVE" => Some("audio/wave"),
        b"AVI " => Some("video/avi"),
        _ => None,
    }
}

fn sniff_markup(head: &[u8]) -> Option<&'static str> {
    const HTML_TAGS: &[&[u8]] = &[
        b"<!doctype html",
        b"<html",
        b"<head",
        b"<body",
        b"<script",
        b"<title",
        b"<div",
        b"<p",
        b"<!--",
    ];

    let start = head
        .iter()
        .position(|byte| !byte.is_ascii_whitespace())
        .unwrap_or(head.len());
    let trimmed = &head[start..];
    if trimmed.starts_with(b"<?xml") {
        return Some("text/xml; charset=utf-8");
    }
    HTML_TAGS
        .iter()
        .any(|tag| {
            trimmed.len() > tag.len()
                && trimmed[..tag.len()].eq_ignore_ascii_case(tag)
                && matches!(trimmed[tag.len()], b' ' | b'>')
        })
        .then_some("text/html; charset=utf-8")
}

const fn is_binary(byte: u8) -> bool {
    matches!(byte, 0x00..=0x08 | 0x0b | 0x0e..=0x1a | 0x1c..=0x1f)
}
