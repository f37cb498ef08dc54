use futures_util::StreamExt;
use url::Url;

use crate::{ObjectBody, ObjectStore, ObjectStoreError};

/// An [`ObjectStore`] over plain HTTP(S) GET.
///
/// Locators are fetched as-is; any server that answers GET with the
/// object bytes (or 404) works. Response bodies are streamed, not
/// buffered.
#[derive(Clone, Default)]
pub struct HttpObjectStore {
    client: reqwest::Client,
}

impl HttpObjectStore {
    /// Creates a store with a fresh HTTP client.
    pub fn new() -> Self {
        Self::default()
    }

    pub(crate) async fn fetch(
        &self,
        locator: Url,
    ) -> Result<Option<ObjectBody>, ObjectStoreError> {
        let response = self.client.get(locator).send().await?;

        match response.status() {
            status if status.is_success() => {
                let body = response
                    .bytes_stream()
                    .map(|chunk| chunk.map_err(ObjectStoreError::from))
                    .boxed();
                Ok(Some(body))
            }
            reqwest::StatusCode::NOT_FOUND => Ok(None),
            status => Err(ObjectStoreError::OperationFailed(format!(
                "Failed to get object. Status: {status}"
            ))),
        }
    }
}

#[async_trait::async_trait]
impl ObjectStore for HttpObjectStore {
    async fn get(&self, locator: &Url) -> Result<Option<ObjectBody>, ObjectStoreError> {
        match locator.scheme() {
            "http" | "https" => self.fetch(locator.clone()).await,
            scheme => Err(ObjectStoreError::InvalidLocator(format!(
                "Scheme '{scheme}' is not supported by the HTTP store"
            ))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::LocalObjectServer;
    use futures_util::TryStreamExt;

    #[tokio::test]
    async fn it_streams_an_object_over_http() -> anyhow::Result<()> {
        let server = LocalObjectServer::start(&[("folio.jpg", b"folio bytes")]).await?;
        let store = HttpObjectStore::new();

        let locator = Url::parse(&format!("{}/folio.jpg", server.endpoint))?;
        let body = store.get(&locator).await?.expect("present object");

        let chunks: Vec<_> = body.try_collect().await?;
        let bytes: Vec<u8> = chunks.concat();
        assert_eq!(bytes, b"folio bytes");

        server.stop();
        Ok(())
    }

    #[tokio::test]
    async fn it_maps_missing_objects_to_none() -> anyhow::Result<()> {
        let server = LocalObjectServer::start(&[]).await?;
        let store = HttpObjectStore::new();

        let locator = Url::parse(&format!("{}/absent.jpg", server.endpoint))?;
        assert!(store.get(&locator).await?.is_none());

        server.stop();
        Ok(())
    }

    #[tokio::test]
    async fn it_rejects_non_http_locators() -> anyhow::Result<()> {
        let store = HttpObjectStore::new();
        let locator = Url::parse("s3://bucket/folio.jpg")?;

        let result = store.get(&locator).await;
        assert!(matches!(result, Err(ObjectStoreError::InvalidLocator(_))));

        Ok(())
    }
}
