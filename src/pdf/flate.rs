// FlateDecode画像XObject: zlib展開 -> raw pixel (DeviceGray / DeviceRGB, 8bit)

use std::io::Read;

use flate2::read::{DeflateDecoder, ZlibDecoder};
use tracing::{debug, trace};

use super::dictionary::{StreamDictionary, image_dictionaries};
use super::find_bytes;
use crate::config::ExtractionLimits;
use crate::png::ColorType;

/// ストリーム終端の検索に使うマーカー。
const END_STREAM_MARKER: &[u8] = b"\nendstream";

/// 展開済みのFlateDecode画像。
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FlateImage {
    pub width: u32,
    pub height: u32,
    pub color: ColorType,
    /// 行優先のraw pixel。長さは常に `width * height * channels`。
    pub pixels: Vec<u8>,
}

impl FlateImage {
    pub fn pixel_count(&self) -> u64 {
        u64::from(self.width) * u64::from(self.height)
    }
}

/// 展開前に辞書から読み取れる候補情報。
#[derive(Debug, Clone, Copy)]
struct Candidate {
    width: u32,
    height: u32,
    color: ColorType,
}

impl Candidate {
    fn pixel_count(&self) -> u64 {
        u64::from(self.width) * u64::from(self.height)
    }

    fn expected_len(&self) -> usize {
        self.pixel_count() as usize * self.color.channels()
    }
}

/// 文書全体からFlateDecode画像を探し、ピクセル数が最大のものを返す。
///
/// 候補ごとの失敗（色空間・寸法・BitsPerComponentの不一致、展開失敗、
/// 展開後サイズの不一致）はすべて読み飛ばし、走査は中断しない。
pub fn extract_flate_image(data: &[u8], limits: &ExtractionLimits) -> Option<FlateImage> {
    let mut best: Option<FlateImage> = None;
    let mut terminators = EndStreamCursor::new(data);

    for dict in image_dictionaries(data, limits.dictionary_window) {
        let Some(candidate) = read_candidate(&dict, limits) else {
            continue;
        };

        // 同じかそれより小さい候補は展開しても勝てない
        let best_pixels = best.as_ref().map_or(0, FlateImage::pixel_count);
        if candidate.pixel_count() <= best_pixels {
            continue;
        }

        let Some(end) = terminators.next_from(dict.stream_start) else {
            trace!(offset = dict.offset, "FlateDecode stream has no endstream");
            continue;
        };
        let compressed = &data[dict.stream_start..end];

        let expected = candidate.expected_len();
        let Some(pixels) = inflate_bounded(compressed, expected) else {
            trace!(offset = dict.offset, "FlateDecode stream failed to inflate");
            continue;
        };
        if pixels.len() != expected {
            trace!(
                offset = dict.offset,
                expected,
                actual = pixels.len(),
                "FlateDecode pixel buffer size mismatch"
            );
            continue;
        }

        best = Some(FlateImage {
            width: candidate.width,
            height: candidate.height,
            color: candidate.color,
            pixels,
        });
    }

    if best.is_none() {
        debug!("no FlateDecode image found");
    }
    best
}

/// `\nendstream` の位置を文書の先頭から順に覚えておくカーソル。
///
/// 問い合わせ位置は単調増加なので、直前に見つけた終端がまだ前方にあれば再利用する。
/// 文書の各バイトは高々1回しか検索されない。
struct EndStreamCursor<'a> {
    data: &'a [u8],
    found: Option<usize>,
    exhausted: bool,
}

impl<'a> EndStreamCursor<'a> {
    fn new(data: &'a [u8]) -> Self {
        Self {
            data,
            found: None,
            exhausted: false,
        }
    }

    /// `start` 以降で最初に現れる `\nendstream` の絶対位置。
    fn next_from(&mut self, start: usize) -> Option<usize> {
        if let Some(pos) = self.found
            && pos >= start
        {
            return Some(pos);
        }
        // 一度見つからなければ、それより後ろにも存在しない
        if self.exhausted {
            return None;
        }

        let from = self.found.map_or(start, |pos| start.max(pos + 1));
        match self.data.get(from..).and_then(|rest| find_bytes(rest, END_STREAM_MARKER)) {
            Some(rel) => {
                self.found = Some(from + rel);
                self.found
            }
            None => {
                self.exhausted = true;
                self.found = None;
                None
            }
        }
    }
}

/// 辞書の前提条件を検査し、展開対象となる候補を返す。
fn read_candidate(dict: &StreamDictionary<'_>, limits: &ExtractionLimits) -> Option<Candidate> {
    if !dict.contains(b"FlateDecode") {
        return None;
    }

    // パレット・ICCプロファイル付きの色空間は基底がDeviceGray/RGBでも対象外
    if dict.contains(b"/Indexed") || dict.contains(b"/ICCBased") {
        trace!(offset = dict.offset, "indexed or ICC-based color space");
        return None;
    }

    let color = if dict.contains(b"DeviceGray") {
        ColorType::Gray
    } else if dict.contains(b"DeviceRGB") {
        ColorType::Rgb
    } else {
        trace!(offset = dict.offset, "unsupported color space");
        return None;
    };

    let (Some(width), Some(height)) = (
        dict.inline_integer(b"/Width"),
        dict.inline_integer(b"/Height"),
    ) else {
        trace!(offset = dict.offset, "Width/Height not inline integers");
        return None;
    };

    let min = u64::from(limits.min_dimension);
    if width < min || height < min {
        trace!(offset = dict.offset, width, height, "image too small");
        return None;
    }
    match width.checked_mul(height) {
        Some(area) if area <= limits.max_pixel_area => {}
        _ => {
            trace!(offset = dict.offset, width, height, "image exceeds pixel area ceiling");
            return None;
        }
    }

    if let Some(bpc) = dict.integer(b"/BitsPerComponent")
        && bpc != 8
    {
        trace!(offset = dict.offset, bpc, "unsupported BitsPerComponent");
        return None;
    }

    Some(Candidate {
        width: u32::try_from(width).ok()?,
        height: u32::try_from(height).ok()?,
        color,
    })
}

/// zlib形式で展開し、失敗したらヘッダなしdeflateで再試行する。
///
/// 出力は `expected + 1` バイトで打ち切るので、宣言サイズを超えるストリームでも
/// 確保量は上限を超えない。
fn inflate_bounded(compressed: &[u8], expected: usize) -> Option<Vec<u8>> {
    match read_bounded(ZlibDecoder::new(compressed), expected) {
        Ok(pixels) => Some(pixels),
        Err(_) => read_bounded(DeflateDecoder::new(compressed), expected).ok(),
    }
}

fn read_bounded<R: Read>(decoder: R, expected: usize) -> std::io::Result<Vec<u8>> {
    let mut out = Vec::with_capacity(expected);
    decoder.take(expected as u64 + 1).read_to_end(&mut out)?;
    Ok(out)
}
