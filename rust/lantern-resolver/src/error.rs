use thiserror::Error;

use crate::ObjectStoreError;

/// The common error type used by this crate
#[derive(Error, Debug)]
pub enum LanternResolverError {
    /// A resolver was constructed with unusable settings
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// A resolved path would escape its configured root
    #[error("Containment violation: {0}")]
    Containment(String),

    /// A local filesystem operation failed
    #[error("I/O error: {0}")]
    Io(String),

    /// A remote object store operation failed
    #[error("Remote store error: {0}")]
    Remote(String),
}

impl From<ObjectStoreError> for LanternResolverError {
    fn from(error: ObjectStoreError) -> Self {
        LanternResolverError::Remote(format!("{error}"))
    }
}
