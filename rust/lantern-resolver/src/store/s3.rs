//! S3-compatible object access addressed by `s3://bucket/key` locators.

mod access;

pub use access::*;

use chrono::Utc;
use url::Url;

use crate::{HttpObjectStore, ObjectBody, ObjectStore, ObjectStoreError};

/// Settings for an [`S3ObjectStore`].
#[derive(Clone)]
pub struct S3Config {
    /// Base URL of the S3-compatible service
    pub endpoint: Url,
    /// Region name used when signing requests (e.g., "us-east-1", "auto")
    pub region: String,
    /// How requests to the service are authorized
    pub access: Access,
}

/// An [`ObjectStore`] for S3-compatible services.
///
/// Locators take the `s3://bucket/key` form and are addressed path-style
/// under the configured endpoint. With [`Access::Credentials`] every GET
/// is presigned using [query string authentication]; with
/// [`Access::Public`] objects are fetched directly.
///
/// [query string authentication]: https://docs.aws.amazon.com/AmazonS3/latest/API/sigv4-query-string-auth.html
#[derive(Clone)]
pub struct S3ObjectStore {
    config: S3Config,
    transport: HttpObjectStore,
}

impl S3ObjectStore {
    /// Creates a store for the service described by `config`.
    pub fn new(config: S3Config) -> Self {
        Self {
            config,
            transport: HttpObjectStore::new(),
        }
    }

    /// Translates an `s3://bucket/key` locator into the HTTP URL of the
    /// object under the configured endpoint.
    fn object_url(&self, locator: &Url) -> Result<Url, ObjectStoreError> {
        let bucket = locator.host_str().ok_or_else(|| {
            ObjectStoreError::InvalidLocator(format!("Locator '{locator}' names no bucket"))
        })?;
        let key = locator.path().trim_start_matches('/');

        if key.is_empty() {
            return Err(ObjectStoreError::InvalidLocator(format!(
                "Locator '{locator}' names no object key"
            )));
        }

        let mut endpoint = self.config.endpoint.clone();
        if !endpoint.path().ends_with('/') {
            endpoint.set_path(&format!("{}/", endpoint.path()));
        }

        endpoint
            .join(&format!("{bucket}/{key}"))
            .map_err(|error| ObjectStoreError::InvalidLocator(format!("{error}")))
    }
}

#[async_trait::async_trait]
impl ObjectStore for S3ObjectStore {
    async fn get(&self, locator: &Url) -> Result<Option<ObjectBody>, ObjectStoreError> {
        if locator.scheme() != "s3" {
            return Err(ObjectStoreError::InvalidLocator(format!(
                "Scheme '{}' is not supported by the S3 store",
                locator.scheme()
            )));
        }

        let object_url = self.object_url(locator)?;
        let object_url =
            self.config
                .access
                .authorize(object_url, &self.config.region, Utc::now())?;

        self.transport.fetch(object_url).await
    }
}
