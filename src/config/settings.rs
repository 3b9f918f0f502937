use std::path::Path;

use serde::Deserialize;

use super::ExtractionLimits;
use crate::error::PhotoError;

/// 先読み窓の下限。`<</Subtype/Image>>` 程度の辞書が収まる長さ。
const MIN_DICTIONARY_WINDOW: usize = 16;

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct Settings {
    /// 閾値はトップレベルのキーとして書く（`min_dimension: 80` など）。
    #[serde(flatten)]
    pub limits: ExtractionLimits,
}

impl Settings {
    pub fn from_yaml(yaml: &str) -> crate::error::Result<Self> {
        let settings: Settings = serde_yml::from_str(yaml).map_err(|e| {
            PhotoError::config(format!("Failed to parse settings YAML: {e}"))
        })?;
        settings.validate()?;
        Ok(settings)
    }

    pub fn from_file(path: &Path) -> crate::error::Result<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::from_yaml(&content)
    }

    /// 値の整合性を検証する。
    pub fn validate(&self) -> crate::error::Result<()> {
        let limits = &self.limits;
        if limits.min_dimension == 0 {
            return Err(PhotoError::config("min_dimension must be at least 1"));
        }

        let min_area = u64::from(limits.min_dimension) * u64::from(limits.min_dimension);
        if limits.max_pixel_area < min_area {
            return Err(PhotoError::config(format!(
                "max_pixel_area ({}) is smaller than min_dimension squared ({min_area})",
                limits.max_pixel_area
            )));
        }

        if limits.min_jpeg_bytes > limits.max_jpeg_bytes {
            return Err(PhotoError::config(format!(
                "min_jpeg_bytes ({}) > max_jpeg_bytes ({})",
                limits.min_jpeg_bytes, limits.max_jpeg_bytes
            )));
        }

        if limits.dictionary_window < MIN_DICTIONARY_WINDOW {
            return Err(PhotoError::config(format!(
                "dictionary_window must be at least {MIN_DICTIONARY_WINDOW}, got {}",
                limits.dictionary_window
            )));
        }

        Ok(())
    }
}
