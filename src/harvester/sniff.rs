//! File type inference for downloaded images
//!
//! The extension comes from, in order:
//! 1. the binary signature of the first [`SNIFF_LEN`] bytes of the body
//! 2. the declared `Content-Type` header
//! 3. the generic [`FALLBACK_EXTENSION`]
//!
//! Filenames are derived from the URL alone so the same URL always maps to
//! the same file across runs.

use sha2::{Digest, Sha256};

/// Number of leading body bytes inspected for a signature
pub const SNIFF_LEN: usize = 2048;

/// Extension used when neither the body nor the headers identify an image
pub const FALLBACK_EXTENSION: &str = "dat";

/// Leading-byte signatures checked against the start of the body
const PREFIX_SIGNATURES: &[(&[u8], &str)] = &[
    (b"\x89PNG\r\n\x1a\n", "image/png"),
    (b"\xff\xd8\xff", "image/jpeg"),
    (b"GIF87a", "image/gif"),
    (b"GIF89a", "image/gif"),
    (b"BM", "image/bmp"),
    (b"\x00\x00\x01\x00", "image/vnd.microsoft.icon"),
    (b"II*\x00", "image/tiff"),
    (b"MM\x00*", "image/tiff"),
    (b"\xff\x0a", "image/jxl"),
    (b"\x00\x00\x00\x0cJXL \x0d\x0a\x87\x0a", "image/jxl"),
];

/// Identifies an image MIME type from the leading bytes of a body
///
/// Only the first [`SNIFF_LEN`] bytes are considered. Returns None when no
/// known image signature matches.
pub fn sniff_image_mime(body: &[u8]) -> Option<&'static str> {
    let head = &body[..body.len().min(SNIFF_LEN)];

    if let Some(mime) = PREFIX_SIGNATURES
        .iter()
        .find(|(signature, _)| head.starts_with(signature))
        .map(|(_, mime)| *mime)
    {
        return Some(mime);
    }

    // RIFF container: "RIFF" <size:4> "WEBP"
    if head.len() >= 12 && &head[..4] == b"RIFF" && &head[8..12] == b"WEBP" {
        return Some("image/webp");
    }

    // ISO base media: <size:4> "ftyp" <brand:4>
    if head.len() >= 12 && &head[4..8] == b"ftyp" {
        match &head[8..12] {
            b"avif" | b"avis" => return Some("image/avif"),
            b"heic" | b"heix" | b"heim" | b"heis" => return Some("image/heic"),
            b"mif1" | b"msf1" => return Some("image/heif"),
            _ => {}
        }
    }

    if looks_like_svg(head) {
        return Some("image/svg+xml");
    }

    None
}

/// Textual check for an SVG document at the start of the body
fn looks_like_svg(head: &[u8]) -> bool {
    let text = String::from_utf8_lossy(head);
    let text = text.trim_start_matches('\u{feff}').trim_start();

    if !text.starts_with('<') {
        return false;
    }

    let lowered = text.to_ascii_lowercase();
    if lowered.starts_with("<svg") {
        return true;
    }

    // XML prolog, comments or doctype may precede the root element
    (lowered.starts_with("<?xml") || lowered.starts_with("<!--") || lowered.starts_with("<!doctype svg"))
        && lowered.contains("<svg")
}

/// Derives a file extension from an `image/*` MIME type
///
/// Parameters are dropped and any `+suffix` qualifier is stripped, so
/// `image/svg+xml` becomes `svg`. Non-image types yield None.
pub fn extension_from_mime(mime: &str) -> Option<String> {
    let essence = mime.split(';').next()?.trim().to_ascii_lowercase();
    let (kind, subtype) = essence.split_once('/')?;

    if kind != "image" {
        return None;
    }

    let extension = subtype.split('+').next()?.trim();
    if extension.is_empty() {
        return None;
    }

    Some(extension.to_string())
}

/// Infers the extension for a downloaded body
///
/// The sniffed signature wins over the declared content type; when neither
/// identifies an image, [`FALLBACK_EXTENSION`] is returned.
///
/// # Example
///
/// ```
/// use page_harvest::harvester::infer_extension;
///
/// let png = b"\x89PNG\r\n\x1a\n rest of file";
/// assert_eq!(infer_extension(png, Some("image/jpeg")), "png");
/// assert_eq!(infer_extension(b"plain", Some("image/gif")), "gif");
/// assert_eq!(infer_extension(b"plain", Some("text/html")), "dat");
/// ```
pub fn infer_extension(body: &[u8], content_type: Option<&str>) -> String {
    sniff_image_mime(body)
        .and_then(extension_from_mime)
        .or_else(|| content_type.and_then(extension_from_mime))
        .unwrap_or_else(|| FALLBACK_EXTENSION.to_string())
}

/// Builds the on-disk filename for a URL: `<sha256(url) hex>.<extension>`
pub fn filename_for(url: &str, extension: &str) -> String {
    let digest = Sha256::digest(url.as_bytes());
    format!("{}.{}", hex::encode(digest), extension)
}
