// アップロード文書の種別判定と、種別ごとの写真抽出への振り分け

use std::path::Path;

use tracing::debug;

use crate::config::ExtractionLimits;
use crate::docx::{DocxPackage, first_embedded_image};
use crate::photo::{ExtractedPhoto, PhotoExtractor};

pub const PDF_MIME: &str = "application/pdf";
pub const DOCX_MIME: &str =
    "application/vnd.openxmlformats-officedocument.wordprocessingml.document";
pub const MSWORD_MIME: &str = "application/msword";

/// 写真抽出に対応する文書の種別。
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DocumentKind {
    Pdf,
    /// Wordprocessing パッケージ（`application/msword` も同じ経路で扱う）。
    Docx,
}

impl DocumentKind {
    /// MIMEタイプから種別を判定する。パラメータ（`; charset=...`）と大文字小文字は無視する。
    pub fn from_mime(mime: &str) -> Option<Self> {
        let essence = mime.split(';').next().unwrap_or("").trim();
        if essence.eq_ignore_ascii_case(PDF_MIME) {
            Some(DocumentKind::Pdf)
        } else if essence.eq_ignore_ascii_case(DOCX_MIME) || essence.eq_ignore_ascii_case(MSWORD_MIME)
        {
            Some(DocumentKind::Docx)
        } else {
            None
        }
    }

    /// ファイル拡張子から種別を推定する。
    pub fn from_path(path: &Path) -> Option<Self> {
        mime_guess::from_path(path)
            .iter()
            .find_map(|mime| Self::from_mime(mime.essence_str()))
    }

    pub fn mime_type(self) -> &'static str {
        match self {
            DocumentKind::Pdf => PDF_MIME,
            DocumentKind::Docx => DOCX_MIME,
        }
    }
}

/// 宣言されたMIMEタイプに応じて文書から写真を取り出す。
///
/// 写真が無いことは正常な結果で `Ok(None)` を返す。対応外のMIMEタイプも `Ok(None)`。
/// エラーになるのはDOCXパッケージとして読めない場合など、呼び出し側の入力不備のみ。
pub fn extract_photo(
    data: &[u8],
    mime: &str,
    limits: &ExtractionLimits,
) -> crate::error::Result<Option<ExtractedPhoto>> {
    match DocumentKind::from_mime(mime) {
        Some(kind) => extract_photo_as(data, kind, limits),
        None => {
            debug!(mime, "unsupported document type for photo extraction");
            Ok(None)
        }
    }
}

/// 種別が確定している文書から写真を取り出す。
pub fn extract_photo_as(
    data: &[u8],
    kind: DocumentKind,
    limits: &ExtractionLimits,
) -> crate::error::Result<Option<ExtractedPhoto>> {
    match kind {
        DocumentKind::Pdf => Ok(PhotoExtractor::new(*limits).extract_pdf(data)),
        DocumentKind::Docx => first_embedded_image(&DocxPackage::new(limits), data),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_mime() {
        assert_eq!(DocumentKind::from_mime("application/pdf"), Some(DocumentKind::Pdf));
        assert_eq!(
            DocumentKind::from_mime("Application/PDF; qs=0.9"),
            Some(DocumentKind::Pdf)
        );
        assert_eq!(DocumentKind::from_mime(DOCX_MIME), Some(DocumentKind::Docx));
        assert_eq!(DocumentKind::from_mime(MSWORD_MIME), Some(DocumentKind::Docx));
        assert_eq!(DocumentKind::from_mime("text/plain"), None);
    }

    #[test]
    fn test_from_path() {
        assert_eq!(
            DocumentKind::from_path(Path::new("cv.pdf")),
            Some(DocumentKind::Pdf)
        );
        assert_eq!(
            DocumentKind::from_path(Path::new("dir/resume.DOCX")),
            Some(DocumentKind::Docx)
        );
        assert_eq!(DocumentKind::from_path(Path::new("notes.txt")), None);
        assert_eq!(DocumentKind::from_path(Path::new("no_extension")), None);
    }

    #[test]
    fn test_unsupported_mime_is_not_an_error() {
        let result = extract_photo(b"hello", "text/plain", &ExtractionLimits::default());
        assert!(matches!(result, Ok(None)));
    }
}
