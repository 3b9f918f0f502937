// 8bit Gray/RGB raw pixel -> PNG (IHDR + 単一IDAT + IEND)

use std::io::Write;

use flate2::Compression;
use flate2::write::ZlibEncoder;

use super::crc::chunk_crc;
use crate::error::PhotoError;

/// PNGシグネチャ。
pub const PNG_SIGNATURE: [u8; 8] = [0x89, b'P', b'N', b'G', 0x0D, 0x0A, 0x1A, 0x0A];

/// 行フィルタ種別 0 (None)。
const FILTER_NONE: u8 = 0;

/// 出力するビット深度（8bit固定）。
const BIT_DEPTH: u8 = 8;

/// 対応する色種別。PDFの DeviceGray / DeviceRGB に対応する。
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ColorType {
    Gray,
    Rgb,
}

impl ColorType {
    /// 1ピクセルあたりのチャンネル数。
    pub fn channels(self) -> usize {
        match self {
            ColorType::Gray => 1,
            ColorType::Rgb => 3,
        }
    }

    /// IHDRに書き込む色種別コード。
    pub fn png_code(self) -> u8 {
        match self {
            ColorType::Gray => 0,
            ColorType::Rgb => 2,
        }
    }
}

/// 行優先のraw pixelデータをPNGファイルのバイト列に変換する。
///
/// 各行の先頭にフィルタ種別0のバイトを付け、zlibで圧縮して1つのIDATに格納する。
/// `pixels` の長さが `width * height * channels` と一致しない場合は
/// 破損したPNGを出力せずにエラーを返す。
///
/// # Arguments
/// * `width`  - 画像幅（ピクセル）
/// * `height` - 画像高さ（ピクセル）
/// * `color`  - 色種別
/// * `pixels` - 行優先のピクセルデータ（パディングなし）
pub fn encode_png(
    width: u32,
    height: u32,
    color: ColorType,
    pixels: &[u8],
) -> crate::error::Result<Vec<u8>> {
    if width == 0 || height == 0 {
        return Err(PhotoError::png_encode(format!(
            "Image dimensions must be non-zero, got {width}x{height}"
        )));
    }

    let row_len = (width as usize)
        .checked_mul(color.channels())
        .ok_or_else(|| PhotoError::png_encode(format!("Row size overflow for width {width}")))?;
    let expected_len = row_len.checked_mul(height as usize).ok_or_else(|| {
        PhotoError::png_encode(format!(
            "Overflow computing buffer size for {width}x{height} image"
        ))
    })?;

    if pixels.len() != expected_len {
        return Err(PhotoError::png_encode(format!(
            "Pixel data size mismatch: expected {} bytes, got {}",
            expected_len,
            pixels.len()
        )));
    }

    let idat = compress_scanlines(pixels, row_len)?;

    let mut ihdr = [0u8; 13];
    ihdr[0..4].copy_from_slice(&width.to_be_bytes());
    ihdr[4..8].copy_from_slice(&height.to_be_bytes());
    ihdr[8] = BIT_DEPTH;
    ihdr[9] = color.png_code();
    // [10..13]: 圧縮方式0, フィルタ方式0, インターレースなし

    let mut out = Vec::with_capacity(PNG_SIGNATURE.len() + 12 * 3 + ihdr.len() + idat.len());
    out.extend_from_slice(&PNG_SIGNATURE);
    write_chunk(&mut out, b"IHDR", &ihdr);
    write_chunk(&mut out, b"IDAT", &idat);
    write_chunk(&mut out, b"IEND", &[]);
    Ok(out)
}

/// 各行にフィルタバイトを付けながらzlib圧縮する。
fn compress_scanlines(pixels: &[u8], row_len: usize) -> crate::error::Result<Vec<u8>> {
    let mut encoder = ZlibEncoder::new(Vec::new(), Compression::default());
    let compress_err =
        |e: std::io::Error| PhotoError::png_encode(format!("IDAT compression error: {e}"));
    for row in pixels.chunks_exact(row_len) {
        encoder.write_all(&[FILTER_NONE]).map_err(compress_err)?;
        encoder.write_all(row).map_err(compress_err)?;
    }
    encoder.finish().map_err(compress_err)
}

/// チャンクを `length | type | payload | crc` の形式で書き込む。
fn write_chunk(out: &mut Vec<u8>, chunk_type: &[u8; 4], payload: &[u8]) {
    out.extend_from_slice(&(payload.len() as u32).to_be_bytes());
    out.extend_from_slice(chunk_type);
    out.extend_from_slice(payload);
    out.extend_from_slice(&chunk_crc(chunk_type, payload).to_be_bytes());
}
