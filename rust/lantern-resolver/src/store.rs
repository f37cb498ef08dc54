//! Read access to remote object stores.

use bytes::Bytes;
use futures_util::stream::BoxStream;
use thiserror::Error;
use url::Url;

mod http;
mod s3;

pub use http::*;
pub use s3::*;

/// A streaming object payload.
pub type ObjectBody = BoxStream<'static, Result<Bytes, ObjectStoreError>>;

/// Errors that can occur when reading from an object store
#[derive(Error, Debug)]
pub enum ObjectStoreError {
    /// Error that occurs when connection to the store fails
    #[error("Failed to connect to object store: {0}")]
    ConnectionFailed(String),

    /// Error that occurs when a store operation fails
    #[error("Failed to perform object store operation: {0}")]
    OperationFailed(String),

    /// Error that occurs when a store request fails
    #[error("Object store request failed: {0}")]
    RequestFailed(String),

    /// Error that occurs when a locator cannot address this store
    #[error("Unusable object locator: {0}")]
    InvalidLocator(String),

    /// Error that occurs when request signing fails
    #[error("Failed to authorize object store request: {0}")]
    Authorization(String),
}

impl From<reqwest::Error> for ObjectStoreError {
    fn from(error: reqwest::Error) -> Self {
        if error.is_connect() {
            ObjectStoreError::ConnectionFailed(error.to_string())
        } else if error.is_request() {
            ObjectStoreError::OperationFailed(error.to_string())
        } else {
            ObjectStoreError::RequestFailed(error.to_string())
        }
    }
}

/// Read-only access to objects addressed by locator.
///
/// Implementations return `Ok(None)` when the object does not exist, and
/// reserve errors for transport and authorization failures.
#[async_trait::async_trait]
pub trait ObjectStore: Clone + Send + Sync + 'static {
    /// Opens the object at `locator` as a byte stream, or `None` when no
    /// such object exists.
    async fn get(&self, locator: &Url) -> Result<Option<ObjectBody>, ObjectStoreError>;
}
