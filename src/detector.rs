//! Format detection from leading magic bytes.

use crate::types::ImageFormat;

/// Number of leading bytes which are enough to recognize every supported format.
pub const MAGIC_LEN: usize = 16;

pub const PNG_SIGNATURE: &[u8; 8] = b"\x89PNG\r\n\x1a\n";

/// Identifies the image format from the first bytes of a file.
///
/// Fewer than [`MAGIC_LEN`] bytes are accepted; signatures which do not fit into the given
/// prefix are simply not matched. Rules are checked in a fixed order and the first match wins.
pub fn detect(magic: &[u8]) -> Option<ImageFormat> {
    if magic.starts_with(b"\xff\xd8\xff") {
        return Some(ImageFormat::Jpeg);
    }

    if magic.starts_with(PNG_SIGNATURE) {
        return Some(ImageFormat::Png);
    }

    if magic.len() >= 6 && &magic[..4] == b"GIF8" && (magic[4] == b'7' || magic[4] == b'9')
        && magic[5] == b'a' {
        return Some(ImageFormat::Gif);
    }

    if magic.len() >= 12 && &magic[..4] == b"RIFF" && &magic[8..12] == b"WEBP" {
        return Some(ImageFormat::Webp);
    }

    if magic.starts_with(b"BM") {
        return Some(ImageFormat::Bmp);
    }

    None
}

#[cfg(test)]
mod tests {
    use crate::types::ImageFormat;

    use super::detect;

    #[test]
    fn test_known_signatures() {
        assert_eq!(detect(b"\xff\xd8\xff\xe0"), Some(ImageFormat::Jpeg));
        assert_eq!(detect(b"\x89PNG\r\n\x1a\n"), Some(ImageFormat::Png));
        assert_eq!(detect(b"GIF87a"), Some(ImageFormat::Gif));
        assert_eq!(detect(b"GIF89a\x01\x00"), Some(ImageFormat::Gif));
        assert_eq!(detect(b"RIFF\0\0\0\0WEBPVP8 "), Some(ImageFormat::Webp));
        assert_eq!(detect(b"BM\0\0"), Some(ImageFormat::Bmp));
    }

    #[test]
    fn test_unknown_signatures() {
        assert_eq!(detect(b""), None);
        assert_eq!(detect(b"\0\0\0\0"), None);
        assert_eq!(detect(b"\xff\xd8"), None);
        assert_eq!(detect(b"\x89PNG\r\n\x1a"), None);
        assert_eq!(detect(b"GIF88a"), None);
        assert_eq!(detect(b"GIF89b"), None);
        assert_eq!(detect(b"RIFF\0\0\0\0WAVE"), None);
        assert_eq!(detect(b"RIFF\0\0\0\0WEB"), None);
        assert_eq!(detect(b"\0\0\0\x0cjP  \r\n\x87\n"), None);
    }

    #[test]
    fn test_first_match_wins() {
        // a truncated GIF header is not mistaken for anything else
        assert_eq!(detect(b"GIF89"), None);
        assert_eq!(detect(b"BMP!"), Some(ImageFormat::Bmp));
    }
}
