pub mod settings;

use serde::Deserialize;
use settings::Settings;
use std::path::Path;

/// 写真として扱う画像の最小幅・最小高さ（ピクセル）。これ未満はアイコンや装飾とみなす。
pub const MIN_IMAGE_DIMENSION: u32 = 50;

/// FlateDecode画像の最大ピクセル数。展開前にこの上限で候補を除外する。
pub const MAX_PIXEL_AREA: u64 = 8_000_000;

/// JPEG候補の最小バイト長。これ未満はサムネイルやロゴとみなす。
pub const MIN_JPEG_BYTES: usize = 2048;

/// DCTDecodeストリームの最大バイト長 (20 MiB)。
pub const MAX_JPEG_BYTES: usize = 20 * 1024 * 1024;

/// `<<` から対応する `>>` を探す先読み窓のバイト数。
pub const DICTIONARY_WINDOW: usize = 4096;

/// 各抽出戦略に渡す閾値の組。
///
/// グローバル状態は持たず、呼び出しごとに値として渡す。
/// `settings.yaml` では省略した項目がデフォルト値になる。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct ExtractionLimits {
    pub min_dimension: u32,
    pub max_pixel_area: u64,
    pub min_jpeg_bytes: usize,
    pub max_jpeg_bytes: usize,
    pub dictionary_window: usize,
}

impl Default for ExtractionLimits {
    fn default() -> Self {
        ExtractionLimits {
            min_dimension: MIN_IMAGE_DIMENSION,
            max_pixel_area: MAX_PIXEL_AREA,
            min_jpeg_bytes: MIN_JPEG_BYTES,
            max_jpeg_bytes: MAX_JPEG_BYTES,
            dictionary_window: DICTIONARY_WINDOW,
        }
    }
}

/// 入力ファイルのパスからsettings.yamlを自動検出して読み込む。
///
/// 入力ファイルと同じディレクトリに `settings.yaml` が存在すれば読み込み、
/// 存在しなければデフォルト設定を返す。
pub fn load_settings_for_input(input_path: &Path) -> crate::error::Result<Settings> {
    let dir = input_path
        .parent()
        .ok_or_else(|| crate::error::PhotoError::config("Cannot determine input file directory"))?;

    let settings_path = dir.join("settings.yaml");

    if settings_path.exists() {
        Settings::from_file(&settings_path)
    } else {
        Ok(Settings::default())
    }
}
