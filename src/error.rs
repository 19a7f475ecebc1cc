//! Custom error types and result handling for mangapress operations.
//!
//! All operations return a [`Result<T>`] which is a type alias for `std::result::Result<T, Error>`.
//!
//! Errors come in two tiers. Archive-level errors ([`Error::Structure`], [`Error::EmptyInput`],
//! [`Error::ArchiveWrite`]) abort the rebuild of one book. Per-item errors
//! ([`Error::ReferenceUnresolvable`]) are recovered inside the extractor by skipping the
//! offending spine item and never reach the caller of a rebuild.
use std::path::PathBuf;

/// Type alias for Results with mangapress errors.
pub type Result<T> = std::result::Result<T, Error>;

/// Comprehensive error type for all mangapress operations.
#[derive(thiserror::Error, Debug)]
pub enum Error {
    /// I/O errors from the standard library
    #[error(transparent)]
    Io(#[from] std::io::Error),
    /// ZIP archive read errors
    #[error(transparent)]
    Zip(#[from] zip::result::ZipError),
    /// Strict XML parsing errors (container document, package document)
    #[error(transparent)]
    Xml(#[from] quick_xml::Error),
    /// JSON configuration errors
    #[error(transparent)]
    Json(#[from] serde_json::Error),
    /// Async task join errors
    #[error(transparent)]
    Join(#[from] tokio::task::JoinError),
    #[error(transparent)]
    RebuilderBuilder(#[from] crate::rebuilder::RebuilderBuilderError),
    /// Neither a rootfile pointer nor any package document could be found.
    #[error("Archive structure error: {0}")]
    Structure(String),
    /// Both the spine walk and the natural-order fallback yielded zero images.
    #[error("No images could be extracted from the archive")]
    EmptyInput,
    /// A single content document or image reference could not be located or read.
    #[error("Unresolvable reference '{reference}': {reason}")]
    ReferenceUnresolvable { reference: String, reason: String },
    /// Output serialization failed.
    #[error("Failed to write output archive: {0}")]
    ArchiveWrite(String),
    /// Error for invalid file or directory paths
    #[error("The given path '{0:?}' is invalid: {1}")]
    InvalidPath(PathBuf, String),
    /// Error for unsupported operations or configuration values
    #[error("Unsupported: {0}")]
    Unsupported(String),
    /// Error for resources that couldn't be found
    #[error("Not found: {0}")]
    NotFound(String),
    /// A storage backend operation failed
    #[error("Storage error: {0}")]
    Storage(String),
    /// The external conversion tool failed or produced no result
    #[error("Conversion failed: {0}")]
    Conversion(String),
    /// Other errors that don't fit into specific categories
    #[error("Other error: {0}")]
    Other(String),
}

impl Error {
    /// Builds a [`Error::ReferenceUnresolvable`] for `reference`.
    pub fn unresolvable(reference: impl Into<String>, reason: impl Into<String>) -> Self {
        Error::ReferenceUnresolvable {
            reference: reference.into(),
            reason: reason.into(),
        }
    }

    /// Returns `true` for errors that only affect a single spine item.
    pub fn is_per_item(&self) -> bool {
        matches!(self, Error::ReferenceUnresolvable { .. })
    }
}

// Basic From<String> conversion for convenience
impl From<String> for Error {
    fn from(error: String) -> Self {
        Error::Other(error)
    }
}

impl From<&str> for Error {
    fn from(error: &str) -> Self {
        Error::Other(error.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_only_unresolvable_references_are_per_item() {
        assert!(Error::unresolvable("Text/p1.xhtml", "missing").is_per_item());
        assert!(!Error::EmptyInput.is_per_item());
        assert!(!Error::Structure("no package".into()).is_per_item());
        assert!(!Error::from("boom").is_per_item());
    }

    #[test]
    fn test_error_messages() {
        assert_eq!(
            Error::unresolvable("Images/1.jpg", "not in archive").to_string(),
            "Unresolvable reference 'Images/1.jpg': not in archive"
        );
        assert_eq!(Error::from("boom").to_string(), "Other error: boom");
    }
}
