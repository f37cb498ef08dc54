use thiserror::Error;

/// The common error type used by this crate
#[derive(Error, Debug, PartialEq)]
pub enum LanternImageError {
    /// A request parameter did not match its IIIF grammar
    #[error("Invalid attribute: {0}")]
    InvalidAttribute(String),

    /// An identifier was empty or not safe to use as a URL path segment
    #[error("Invalid identifier: {0}")]
    InvalidIdentifier(String),

    /// The render capability failed to produce output
    #[error("Pipeline operation failed: {0}")]
    Pipeline(String),

    /// An error occurred while reading source bytes
    #[error("I/O error: {0}")]
    Io(String),
}
