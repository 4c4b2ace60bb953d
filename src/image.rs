//! Base64 data-URL helpers for flip images.

use crate::error::FlipError;
use base64::{engine::general_purpose::STANDARD as BASE64, Engine as _};

/// Decodes the payload of a `data:<mime>;base64,<payload>` URL into raw bytes.
///
/// The media-type prefix is discarded; only the bytes travel in flip payloads.
pub fn decode_data_url(src: &str) -> Result<Vec<u8>, FlipError> {
    let (header, payload) = src
        .split_once(',')
        .ok_or_else(|| FlipError::InvalidDataUrl("missing ',' separator".into()))?;
    if !header.starts_with("data:") || !header.ends_with(";base64") {
        return Err(FlipError::InvalidDataUrl(format!(
            "unsupported header: {header}"
        )));
    }
    BASE64
        .decode(payload.trim())
        .map_err(|err| FlipError::InvalidDataUrl(err.to_string()))
}

/// Wraps raw bytes into a base64 data URL with the given media type.
pub fn encode_data_url(mime: &str, bytes: &[u8]) -> String {
    format!("data:{mime};base64,{}", BASE64.encode(bytes))
}

/// Guesses an image media type from its magic bytes, defaulting to PNG.
pub fn sniff_mime(bytes: &[u8]) -> &'static str {
    if bytes.starts_with(&[0xFF, 0xD8, 0xFF]) {
        "image/jpeg"
    } else if bytes.starts_with(b"GIF8") {
        "image/gif"
    } else if bytes.len() >= 12 && &bytes[0..4] == b"RIFF" && &bytes[8..12] == b"WEBP" {
        "image/webp"
    } else {
        "image/png"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn strips_media_type_prefix() {
        let url = encode_data_url("image/jpeg", &[1, 2, 3, 250]);
        assert!(url.starts_with("data:image/jpeg;base64,"));
        assert_eq!(decode_data_url(&url).unwrap(), vec![1, 2, 3, 250]);
    }

    #[test]
    fn rejects_malformed_urls() {
        assert!(decode_data_url("not a url").is_err());
        assert!(decode_data_url("data:image/png,plain").is_err());
        assert!(decode_data_url("data:image/png;base64,@@@").is_err());
    }

    #[test]
    fn sniffs_common_formats() {
        assert_eq!(sniff_mime(&[0xFF, 0xD8, 0xFF, 0xE0]), "image/jpeg");
        assert_eq!(sniff_mime(b"GIF89a"), "image/gif");
        assert_eq!(sniff_mime(b"\x89PNG\r\n"), "image/png");
    }
}
