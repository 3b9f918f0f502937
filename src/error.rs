use thiserror::Error;

#[derive(Debug, Error)]
pub enum PhotoError {
    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("PNG encode error: {0}")]
    PngEncodeError(String),

    #[error("DOCX error: {0}")]
    DocxError(String),

    #[error("Unsupported document: {0}")]
    UnsupportedDocumentError(String),

    #[error("Output error: {0}")]
    OutputError(String),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),
}

/// Generates factory methods for [`PhotoError`] variants that wrap a `String`.
macro_rules! error_constructors {
    ($(
        $(#[doc = $doc:expr])*
        $method:ident => $variant:ident
    ),* $(,)?) => {
        impl PhotoError {
            $(
                $(#[doc = $doc])*
                pub fn $method(msg: impl Into<String>) -> Self {
                    Self::$variant(msg.into())
                }
            )*
        }
    };
}

error_constructors! {
    /// Create a configuration error.
    config => ConfigError,
    /// Create a PNG encode error.
    png_encode => PngEncodeError,
    /// Create a DOCX error.
    docx => DocxError,
    /// Create an unsupported document error.
    unsupported_document => UnsupportedDocumentError,
    /// Create an output error.
    output => OutputError,
}

impl From<serde_yml::Error> for PhotoError {
    fn from(e: serde_yml::Error) -> Self {
        Self::ConfigError(e.to_string())
    }
}

impl From<serde_json::Error> for PhotoError {
    fn from(e: serde_json::Error) -> Self {
        Self::OutputError(e.to_string())
    }
}

impl From<zip::result::ZipError> for PhotoError {
    fn from(e: zip::result::ZipError) -> Self {
        Self::DocxError(e.to_string())
    }
}

impl From<quick_xml::Error> for PhotoError {
    fn from(e: quick_xml::Error) -> Self {
        Self::DocxError(e.to_string())
    }
}

pub type Result<T> = std::result::Result<T, PhotoError>;
