//! Error types for the document assembly engine

use thiserror::Error;

/// Result type alias for assembly operations
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur while assembling documents
#[derive(Error, Debug)]
pub enum Error {
    /// Network or auth failure after exhausting retries and fallback
    #[error("failed to fetch asset {url}: {reason}")]
    AssetFetch { url: String, reason: String },

    /// Bytes that are not a recognized image or PDF format
    #[error("failed to decode asset: {0}")]
    AssetDecode(String),

    /// No layout registered for the requested form type. This is a
    /// programmer error (a missing catalog entry), not a data problem,
    /// and is allowed to propagate to the caller.
    #[error("no layout registered for form type '{0}'")]
    LayoutNotFound(String),

    /// Unknown form type key in external input
    #[error("unknown form type '{0}'")]
    UnknownFormType(String),

    /// Failure while building or merging PDF structures
    #[error("pdf error: {0}")]
    Pdf(String),

    /// Missing or malformed field in a form record
    #[error("invalid record: {0}")]
    InvalidRecord(String),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<lopdf::Error> for Error {
    fn from(err: lopdf::Error) -> Self {
        Error::Pdf(err.to_string())
    }
}
