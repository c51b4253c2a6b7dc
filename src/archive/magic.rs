//! Image type detection from leading bytes

use tracing::warn;

const SIGNATURES: &[(&[u8], &str)] = &[
    (b"\x89PNG\r\n\x1a\n", "png"),
    (b"\xff\xd8\xff", "jpg"),
    (b"GIF89a", "gif"),
    (b"GIF87a", "gif"),
    (b"II*\x00", "tiff"),
    (b"MM\x00*", "tiff"),
    (b"BM", "bmp"),
];

/// Extension for a known image signature
pub fn infer_extension(data: &[u8]) -> Option<&'static str> {
    if data.len() >= 12 && &data[..4] == b"RIFF" && &data[8..12] == b"WEBP" {
        return Some("webp");
    }

    SIGNATURES
        .iter()
        .find(|(signature, _)| data.starts_with(signature))
        .map(|(_, extension)| *extension)
}

/// MIME type for a known image signature
pub fn mime_type(data: &[u8]) -> Option<&'static str> {
    let mime = match infer_extension(data)? {
        "png" => "image/png",
        "jpg" => "image/jpeg",
        "gif" => "image/gif",
        "webp" => "image/webp",
        "tiff" => "image/tiff",
        "bmp" => "image/bmp",
        _ => return None,
    };
    Some(mime)
}

/// Like [`infer_extension`] but never fails: unknown data gets `fallback`
pub fn extension_or(data: &[u8], fallback: &str) -> String {
    match infer_extension(data) {
        Some(extension) => extension.to_string(),
        None => {
            let head: Vec<u8> = data.iter().take(8).copied().collect();
            warn!(?head, fallback, "Unrecognised page format");
            fallback.to_string()
        }
    }
}
