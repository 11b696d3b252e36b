//! Error types for slide deck generation.

use thiserror::Error;

/// Result type alias using our Error type.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that abort a generation run.
///
/// Recoverable problems (a shape with no geometry, an unreadable image) are
/// reported as [`crate::Skipped`] records instead.
#[derive(Error, Debug)]
pub enum Error {
    /// Failed to open, read or write a file.
    #[error("Failed to read file: {0}")]
    IoError(#[from] std::io::Error),

    /// The file format is not supported or could not be detected.
    #[error("Unsupported or unrecognized file format: {0}")]
    UnsupportedFormat(String),

    /// Failed to interpret the PPTX package structure.
    #[error("PPTX parsing error: {0}")]
    PptxParseError(String),

    /// Failed to interpret the DOCX outline document.
    #[error("DOCX parsing error: {0}")]
    DocxParseError(String),

    /// The template presentation cannot be used for generation.
    #[error("Template error: {0}")]
    TemplateError(String),

    /// A relationship could not be created or resolved.
    #[error("Relationship error: {0}")]
    RelationshipError(String),

    /// An image could not be probed or embedded.
    #[error("Image error: {0}")]
    ImageError(String),

    /// Invalid or corrupted file.
    #[error("Invalid or corrupted file: {0}")]
    CorruptedFile(String),

    /// ZIP archive error.
    #[error("ZIP error: {0}")]
    ZipError(String),

    /// XML parsing or writing error.
    #[error("XML parsing error: {0}")]
    XmlError(String),
}
