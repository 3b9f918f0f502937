// 抽出戦略の順次実行と、結果の data URL / JSON ペイロード表現

use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use serde::Serialize;
use tracing::{info, warn};

use crate::config::ExtractionLimits;
use crate::pdf::dct::extract_dct_stream;
use crate::pdf::flate::extract_flate_image;
use crate::pdf::scan::scan_jpeg_markers;
use crate::png::encode_png;

pub const MIME_PNG: &str = "image/png";
pub const MIME_JPEG: &str = "image/jpeg";

/// 写真がどの経路で見つかったか。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum PhotoSource {
    /// FlateDecode画像を展開してPNGに変換した。
    Flate,
    /// DCTDecodeストリームをそのまま取り出した。
    Dct,
    /// JPEGマーカーの直接走査で見つけた。
    BinaryScan,
    /// DOCXパッケージに埋め込まれた最初の画像。
    Docx,
}

/// 抽出された写真。
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExtractedPhoto {
    pub mime_type: String,
    pub data: Vec<u8>,
    pub source: PhotoSource,
}

/// 呼び出し側へ返す `{ mimeType, data }` 形式のペイロード。
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PhotoPayload {
    pub mime_type: String,
    /// base64エンコード済みの画像データ。
    pub data: String,
}

impl ExtractedPhoto {
    pub fn new(mime_type: impl Into<String>, data: Vec<u8>, source: PhotoSource) -> Self {
        Self {
            mime_type: mime_type.into(),
            data,
            source,
        }
    }

    pub fn base64(&self) -> String {
        STANDARD.encode(&self.data)
    }

    /// `data:<mime>;base64,<payload>` 形式の文字列を返す。
    pub fn to_data_url(&self) -> String {
        format!("data:{};base64,{}", self.mime_type, self.base64())
    }

    pub fn payload(&self) -> PhotoPayload {
        PhotoPayload {
            mime_type: self.mime_type.clone(),
            data: self.base64(),
        }
    }

    /// 出力ファイルに使う拡張子。未知のMIMEタイプは `bin`。
    pub fn file_extension(&self) -> &str {
        match self.mime_type.as_str() {
            MIME_PNG => "png",
            MIME_JPEG => "jpg",
            other => mime_guess::get_mime_extensions_str(other)
                .and_then(|exts| exts.first().copied())
                .unwrap_or("bin"),
        }
    }
}

/// PDF抽出の戦略。構造への依存が強い順に並ぶ。
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Strategy {
    Flate,
    Dct,
    BinaryScan,
}

impl Strategy {
    /// 実行順。
    pub const ORDER: [Strategy; 3] = [Strategy::Flate, Strategy::Dct, Strategy::BinaryScan];
}

/// PDFから埋め込み写真を取り出す。
///
/// 状態を持たない純粋関数の集まりで、アップロードごとに独立して呼び出せる。
#[derive(Debug, Clone, Copy, Default)]
pub struct PhotoExtractor {
    limits: ExtractionLimits,
}

impl PhotoExtractor {
    pub fn new(limits: ExtractionLimits) -> Self {
        Self { limits }
    }

    /// 戦略を順に試し、最初に見つかった写真を返す。見つからなければ `None`。
    ///
    /// 各戦略は1回だけ実行され、後戻りはしない。
    pub fn extract_pdf(&self, data: &[u8]) -> Option<ExtractedPhoto> {
        let found = Strategy::ORDER
            .iter()
            .find_map(|&strategy| self.run_strategy(strategy, data));

        match &found {
            Some(photo) => info!(
                source = ?photo.source,
                mime = %photo.mime_type,
                bytes = photo.data.len(),
                "PDF photo extracted"
            ),
            None => info!("PDF: no embedded photo found"),
        }
        found
    }

    /// 1つの戦略を実行する。
    pub fn run_strategy(&self, strategy: Strategy, data: &[u8]) -> Option<ExtractedPhoto> {
        match strategy {
            Strategy::Flate => {
                let image = extract_flate_image(data, &self.limits)?;
                match encode_png(image.width, image.height, image.color, &image.pixels) {
                    Ok(png) => {
                        info!(
                            width = image.width,
                            height = image.height,
                            pixels = image.pixel_count(),
                            "FlateDecode image converted to PNG"
                        );
                        Some(ExtractedPhoto::new(MIME_PNG, png, PhotoSource::Flate))
                    }
                    Err(e) => {
                        warn!("FlateDecode image could not be encoded: {e}");
                        None
                    }
                }
            }
            Strategy::Dct => extract_dct_stream(data, &self.limits)
                .map(|jpeg| ExtractedPhoto::new(MIME_JPEG, jpeg.to_vec(), PhotoSource::Dct)),
            Strategy::BinaryScan => scan_jpeg_markers(data, &self.limits).map(|jpeg| {
                ExtractedPhoto::new(MIME_JPEG, jpeg.to_vec(), PhotoSource::BinaryScan)
            }),
        }
    }
}

/// 既定の閾値でPDFから写真を取り出す。
pub fn extract_pdf_photo(data: &[u8]) -> Option<ExtractedPhoto> {
    PhotoExtractor::default().extract_pdf(data)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_data_url_format() {
        let photo = ExtractedPhoto::new(MIME_JPEG, vec![0xFF, 0xD8, 0xFF], PhotoSource::Dct);
        assert_eq!(photo.to_data_url(), "data:image/jpeg;base64,/9j/");
    }

    #[test]
    fn test_payload_serializes_camel_case() {
        let photo = ExtractedPhoto::new(MIME_PNG, b"abc".to_vec(), PhotoSource::Flate);
        let json = serde_json::to_string(&photo.payload()).expect("serialize");
        assert_eq!(json, r#"{"mimeType":"image/png","data":"YWJj"}"#);
    }

    #[test]
    fn test_file_extension() {
        let png = ExtractedPhoto::new(MIME_PNG, vec![], PhotoSource::Flate);
        let jpeg = ExtractedPhoto::new(MIME_JPEG, vec![], PhotoSource::Dct);
        let unknown = ExtractedPhoto::new("application/x-unknown-thing", vec![], PhotoSource::Docx);
        assert_eq!(png.file_extension(), "png");
        assert_eq!(jpeg.file_extension(), "jpg");
        assert_eq!(unknown.file_extension(), "bin");
    }

    #[test]
    fn test_empty_document_not_found() {
        assert!(extract_pdf_photo(b"").is_none());
        assert!(extract_pdf_photo(b"%PDF-1.4\n%%EOF\n").is_none());
    }
}
