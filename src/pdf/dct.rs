// DCTDecode画像XObject: JPEGストリームをそのまま切り出す

use tracing::{debug, trace};

use super::JPEG_SOI;
use super::dictionary::{StreamDictionary, image_dictionaries};
use crate::config::ExtractionLimits;

/// 文書全体からDCTDecodeストリームを探し、宣言長が最大のJPEGバイト列を返す。
///
/// `/Length` はインライン整数である必要がある（間接参照は解決しない）。
/// 返すバイト列は文書の部分スライスで、再エンコードは行わない。
pub fn extract_dct_stream<'a>(data: &'a [u8], limits: &ExtractionLimits) -> Option<&'a [u8]> {
    let mut best: Option<&'a [u8]> = None;

    for dict in image_dictionaries(data, limits.dictionary_window) {
        let Some(jpeg) = read_candidate(data, &dict, limits) else {
            continue;
        };
        if jpeg.len() > best.map_or(0, <[u8]>::len) {
            best = Some(jpeg);
        }
    }

    if best.is_none() {
        debug!("no DCTDecode stream found");
    }
    best
}

fn read_candidate<'a>(
    data: &'a [u8],
    dict: &StreamDictionary<'_>,
    limits: &ExtractionLimits,
) -> Option<&'a [u8]> {
    // `/DCT` は インライン画像で使われる DCTDecode の省略形
    if !dict.contains(b"DCT") {
        return None;
    }

    let Some(length) = dict.inline_integer(b"/Length") else {
        trace!(offset = dict.offset, "DCTDecode Length missing or indirect");
        return None;
    };
    let length = usize::try_from(length).ok()?;
    if length < limits.min_jpeg_bytes || length > limits.max_jpeg_bytes {
        trace!(offset = dict.offset, length, "DCTDecode Length out of range");
        return None;
    }

    let end = dict.stream_start.checked_add(length)?;
    let Some(jpeg) = data.get(dict.stream_start..end) else {
        trace!(offset = dict.offset, length, "DCTDecode stream runs past end of document");
        return None;
    };

    if !jpeg.starts_with(&JPEG_SOI) {
        trace!(offset = dict.offset, "DCTDecode stream lacks JPEG SOI marker");
        return None;
    }
    Some(jpeg)
}
