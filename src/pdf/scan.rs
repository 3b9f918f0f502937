// PDF構造を無視したJPEGバイト列の直接走査（最終手段）

use tracing::debug;

use super::JPEG_EOI;
use crate::config::ExtractionLimits;

/// 文書全体から `FF D8 FF` ... `FF D9` で囲まれた最大の範囲を返す。
///
/// `FF D8` だけでは偶然の一致が多いため、次のマーカーの先頭 `FF` まで要求する。
/// 一致したEOIの直後から走査を再開するので、1つのJPEG内部の偽の開始位置は再走査しない。
/// `min_jpeg_bytes` 未満の範囲はサムネイルやアイコンとみなして無視する。
/// `max_jpeg_bytes` を超える範囲も候補にしない。
pub fn scan_jpeg_markers<'a>(data: &'a [u8], limits: &ExtractionLimits) -> Option<&'a [u8]> {
    let mut best: Option<(usize, usize)> = None;

    let mut i = 0;
    while i + 2 < data.len() {
        if data[i..i + 3] != [0xFF, 0xD8, 0xFF] {
            i += 1;
            continue;
        }

        let start = i;
        // SOIと次のマーカー（最低4バイト）の後からEOIを探す
        let mut j = start + 4;
        while j + 1 < data.len() {
            if data[j..j + 2] == JPEG_EOI {
                let end = j + 2;
                let len = end - start;
                if len <= limits.max_jpeg_bytes && len > best.map_or(0, |(s, e)| e - s) {
                    best = Some((start, end));
                }
                break;
            }
            j += 1;
        }
        i = j + 1;
    }

    match best {
        Some((start, end)) if end - start >= limits.min_jpeg_bytes => Some(&data[start..end]),
        _ => {
            debug!("no JPEG found via binary scan");
            None
        }
    }
}
