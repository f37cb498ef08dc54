use lantern_image::LanternImageError;
use lantern_resolver::LanternResolverError;
use thiserror::Error;

/// Errors that can occur while serving image requests
#[derive(Error, Debug)]
pub enum LanternServerError {
    /// Error that occurs when configuration is missing or inconsistent
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// Error that occurs when a resolver fails to locate a source image
    #[error("Failed to resolve source image: {0}")]
    Resolver(String),

    /// Error that occurs when rendering or describing an image fails
    #[error("Failed to process image: {0}")]
    Image(String),

    /// Error that occurs when an HTTP response cannot be built
    #[error("Failed to build HTTP response: {0}")]
    Http(String),

    /// Error that occurs when serializing a document fails
    #[error("Failed to serialize document: {0}")]
    Serialization(String),

    /// Error that occurs during network or file I/O
    #[error("I/O error: {0}")]
    Io(String),
}

impl From<LanternResolverError> for LanternServerError {
    fn from(error: LanternResolverError) -> Self {
        LanternServerError::Resolver(format!("{error}"))
    }
}

impl From<LanternImageError> for LanternServerError {
    fn from(error: LanternImageError) -> Self {
        LanternServerError::Image(format!("{error}"))
    }
}

impl From<hyper::http::Error> for LanternServerError {
    fn from(error: hyper::http::Error) -> Self {
        LanternServerError::Http(format!("{error}"))
    }
}

impl From<serde_json::Error> for LanternServerError {
    fn from(error: serde_json::Error) -> Self {
        LanternServerError::Serialization(format!("{error}"))
    }
}

impl From<std::io::Error> for LanternServerError {
    fn from(error: std::io::Error) -> Self {
        LanternServerError::Io(format!("{error}"))
    }
}
