//! The HTTP accept loop.

use std::net::SocketAddr;

use hyper::{server::conn::http1, service::service_fn};
use hyper_util::rt::TokioIo;
use tokio::{net::TcpListener, sync::oneshot};

use crate::{ImageService, LanternServerError};

/// A running image server.
///
/// Dropping the handle leaves the accept loop running until the process
/// exits; call [`ImageServer::stop`] for an orderly shutdown.
pub struct ImageServer {
    /// The address the server is listening on
    pub address: SocketAddr,

    shutdown_tx: oneshot::Sender<()>,
}

impl ImageServer {
    /// Binds `address` and serves `service` until stopped.
    ///
    /// Binding port 0 picks a free port; the handle reports the address
    /// actually bound.
    pub async fn start(
        address: SocketAddr,
        service: ImageService,
    ) -> Result<Self, LanternServerError> {
        let listener = TcpListener::bind(address).await?;
        let address = listener.local_addr()?;
        let (shutdown_tx, mut shutdown_rx) = oneshot::channel();

        tokio::spawn(async move {
            loop {
                tokio::select! {
                    _ = &mut shutdown_rx => break,
                    accepted = listener.accept() => {
                        let Ok((stream, _)) = accepted else {
                            continue;
                        };
                        let service = service.clone();

                        tokio::spawn(async move {
                            let served = http1::Builder::new()
                                .serve_connection(
                                    TokioIo::new(stream),
                                    service_fn(move |request| {
                                        let service = service.clone();
                                        async move {
                                            Ok::<_, std::convert::Infallible>(
                                                service.respond(request).await,
                                            )
                                        }
                                    }),
                                )
                                .await;

                            if let Err(error) = served {
                                tracing::debug!("connection ended with error: {error}");
                            }
                        });
                    }
                }
            }
        });

        tracing::info!("image server listening on http://{address}");

        Ok(Self {
            address,
            shutdown_tx,
        })
    }

    /// Stops accepting connections. Connections already being served
    /// run to completion.
    pub fn stop(self) {
        let _ = self.shutdown_tx.send(());
    }
}
