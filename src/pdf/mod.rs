pub mod dct;
pub mod dictionary;
pub mod flate;
pub mod scan;

/// JPEGのSOIマーカー。
pub const JPEG_SOI: [u8; 2] = [0xFF, 0xD8];

/// JPEGのEOIマーカー。
pub const JPEG_EOI: [u8; 2] = [0xFF, 0xD9];

/// `haystack` 中で最初に `needle` が現れる位置を返す。
pub(crate) fn find_bytes(haystack: &[u8], needle: &[u8]) -> Option<usize> {
    if needle.is_empty() {
        return Some(0);
    }
    haystack.windows(needle.len()).position(|w| w == needle)
}
