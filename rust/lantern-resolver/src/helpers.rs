//! In-memory HTTP object server for tests (native-only).

use std::{collections::HashMap, sync::Arc};

use bytes::Bytes;
use http_body_util::Full;
use hyper::{Request, Response, StatusCode, body::Incoming, server::conn::http1, service::service_fn};
use hyper_util::rt::TokioIo;
use tokio::{net::TcpListener, sync::RwLock};

/// A running local object server instance.
///
/// Serves a fixed set of objects by request path and counts how often
/// each path is requested, so tests can assert on cache behavior. Query
/// strings are ignored, which lets presigned URLs resolve like plain
/// ones.
pub struct LocalObjectServer {
    /// The endpoint URL where the server is listening
    pub endpoint: String,
    hits: Arc<RwLock<HashMap<String, usize>>>,
    shutdown_tx: tokio::sync::oneshot::Sender<()>,
}

impl LocalObjectServer {
    /// Start a local object server holding `objects` as path/payload
    /// pairs.
    ///
    /// Returns a handle that can be used to get the endpoint URL, read
    /// hit counts, and stop the server.
    pub async fn start(objects: &[(&str, &[u8])]) -> anyhow::Result<Self> {
        let objects: Arc<HashMap<String, Bytes>> = Arc::new(
            objects
                .iter()
                .map(|(name, bytes)| (name.to_string(), Bytes::copy_from_slice(bytes)))
                .collect(),
        );
        let hits: Arc<RwLock<HashMap<String, usize>>> = Arc::new(RwLock::new(HashMap::new()));

        let listener = TcpListener::bind("127.0.0.1:0").await?;
        let addr = listener.local_addr()?;
        let endpoint = format!("http://{}", addr);

        let (shutdown_tx, mut shutdown_rx) = tokio::sync::oneshot::channel::<()>();

        let served_objects = Arc::clone(&objects);
        let served_hits = Arc::clone(&hits);

        tokio::spawn(async move {
            loop {
                tokio::select! {
                    _ = &mut shutdown_rx => break,
                    result = listener.accept() => {
                        if let Ok((stream, _)) = result {
                            let objects = Arc::clone(&served_objects);
                            let hits = Arc::clone(&served_hits);
                            tokio::spawn(async move {
                                let service = service_fn(move |request: Request<Incoming>| {
                                    let objects = Arc::clone(&objects);
                                    let hits = Arc::clone(&hits);
                                    async move {
                                        serve_object(&objects, &hits, request).await
                                    }
                                });
                                let _ = http1::Builder::new()
                                    .serve_connection(TokioIo::new(stream), service)
                                    .await;
                            });
                        }
                    }
                }
            }
        });

        Ok(Self {
            endpoint,
            hits,
            shutdown_tx,
        })
    }

    /// The number of times the object at `name` has been requested.
    pub async fn hits(&self, name: &str) -> usize {
        self.hits.read().await.get(name).copied().unwrap_or(0)
    }

    /// Stop the server.
    pub fn stop(self) {
        let _ = self.shutdown_tx.send(());
    }
}

async fn serve_object(
    objects: &HashMap<String, Bytes>,
    hits: &RwLock<HashMap<String, usize>>,
    request: Request<Incoming>,
) -> Result<Response<Full<Bytes>>, hyper::http::Error> {
    let name = request.uri().path().trim_start_matches('/').to_string();
    *hits.write().await.entry(name.clone()).or_insert(0) += 1;

    match objects.get(&name) {
        Some(bytes) => Ok(Response::new(Full::new(bytes.clone()))),
        None => Response::builder()
            .status(StatusCode::NOT_FOUND)
            .body(Full::new(Bytes::new())),
    }
}
