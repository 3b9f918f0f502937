pub mod config;
pub mod document;
pub mod docx;
pub mod error;
pub mod pdf;
pub mod photo;
pub mod pipeline;
pub mod png;

pub use config::ExtractionLimits;
pub use document::{DocumentKind, extract_photo};
pub use error::{PhotoError, Result};
pub use photo::{ExtractedPhoto, PhotoExtractor, PhotoPayload, PhotoSource, extract_pdf_photo};
