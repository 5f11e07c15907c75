//! HTTP front for a [`Registry`].
//!
//! [`MockServer`] binds a listener, serves every connection with hyper's
//! HTTP/1 implementation and hands each buffered request to
//! [`Registry::dispatch`]. Dropping the server stops the accept loop.

use crate::error::{RegistryError, Result};
use crate::registry::Registry;
use crate::request::RecordedRequest;
use bytes::Bytes;
use http_body_util::Full;
use hyper::body::Incoming;
use hyper::server::conn::http1;
use hyper::service::service_fn;
use hyper::{Request, Response, StatusCode};
use hyper_util::rt::TokioIo;
use std::convert::Infallible;
use std::net::{Ipv4Addr, SocketAddr};
use tokio::net::TcpListener;
use tokio::sync::broadcast;
use tokio::task::{JoinError, JoinHandle};
use tracing::{debug, error, info, warn};

/// A running HTTP server answering from a registry.
#[derive(Debug)]
pub struct MockServer {
    addr: SocketAddr,
    registry: Registry,
    shutdown_tx: broadcast::Sender<()>,
    handle: Option<JoinHandle<()>>,
}

impl MockServer {
    /// Serve `registry` on an ephemeral loopback port.
    pub async fn start(registry: Registry) -> Result<Self> {
        Self::start_on(registry, SocketAddr::from((Ipv4Addr::LOCALHOST, 0))).await
    }

    /// Serve `registry` on `addr`. Port 0 asks the OS for a free port.
    pub async fn start_on(registry: Registry, addr: SocketAddr) -> Result<Self> {
        let listener = TcpListener::bind(addr)
            .await
            .map_err(|e| RegistryError::Bind(addr, e))?;
        let addr = listener
            .local_addr()
            .map_err(|e| RegistryError::Bind(addr, e))?;
        info!("Mock server listening on {}", addr);

        let (shutdown_tx, _) = broadcast::channel(1);
        let mut shutdown_rx = shutdown_tx.subscribe();
        let serving = registry.clone();

        let handle = tokio::spawn(async move {
            loop {
                tokio::select! {
                    result = listener.accept() => {
                        match result {
                            Ok((stream, peer)) => {
                                let registry = serving.clone();
                                tokio::spawn(async move {
                                    let io = TokioIo::new(stream);
                                    let service = service_fn(move |req| {
                                        let registry = registry.clone();
                                        async move { handle_request(req, registry).await }
                                    });
                                    if let Err(e) = http1::Builder::new()
                                        .serve_connection(io, service)
                                        .await
                                    {
                                        debug!("Connection error from {}: {}", peer, e);
                                    }
                                });
                            }
                            Err(e) => {
                                error!("Accept error on {}: {}", addr, e);
                            }
                        }
                    }
                    _ = shutdown_rx.recv() => {
                        info!("Mock server on {} shutting down", addr);
                        break;
                    }
                }
            }
        });

        Ok(Self {
            addr,
            registry,
            shutdown_tx,
            handle: Some(handle),
        })
    }

    pub fn addr(&self) -> SocketAddr {
        self.addr
    }

    /// Base URI, e.g. `http://127.0.0.1:49152`.
    pub fn uri(&self) -> String {
        format!("http://{}", self.addr)
    }

    /// Absolute URL for `path` on this server.
    pub fn url(&self, path: &str) -> String {
        if path.starts_with('/') {
            format!("{}{}", self.uri(), path)
        } else {
            format!("{}/{}", self.uri(), path)
        }
    }

    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    /// Stop accepting connections and wait for the accept loop to exit.
    pub async fn shutdown(mut self) {
        let _ = self.shutdown_tx.send(());
        if let Some(handle) = self.handle.take() {
            if let Err(e) = handle.await {
                warn!("Mock server task ended abnormally: {}", e);
            }
        }
    }
}

impl Drop for MockServer {
    fn drop(&mut self) {
        let _ = self.shutdown_tx.send(());
        if let Some(handle) = self.handle.take() {
            handle.abort();
        }
    }
}

async fn handle_request(
    req: Request<Incoming>,
    registry: Registry,
) -> std::result::Result<Response<Full<Bytes>>, Infallible> {
    let (recorded, _) = match RecordedRequest::buffer(req).await {
        Ok(buffered) => buffered,
        Err(e) => {
            warn!("Failed to read request body: {}", e);
            return Ok(bad_request(e.to_string()));
        }
    };

    let line = format!("{} {}", recorded.method, recorded.url());
    let dispatching = registry.clone();
    // Custom responses run user code, keep it off the reactor threads.
    let task = tokio::task::spawn_blocking(move || dispatching.dispatch(&recorded));
    let response = match task.await {
        Ok(response) => response,
        Err(e) => {
            error!("Dispatch of {} failed: {}", line, e);
            registry.report_failure(format_args!(
                "responding to {} failed: {}",
                line,
                panic_message(e)
            ));
            internal_error()
        }
    };
    Ok(response)
}

fn panic_message(err: JoinError) -> String {
    match err.try_into_panic() {
        Ok(payload) => payload
            .downcast_ref::<String>()
            .cloned()
            .or_else(|| payload.downcast_ref::<&str>().map(|s| s.to_string()))
            .unwrap_or_else(|| "response handler panicked".to_string()),
        Err(err) => err.to_string(),
    }
}

fn bad_request(message: String) -> Response<Full<Bytes>> {
    Response::builder()
        .status(StatusCode::BAD_REQUEST)
        .body(Full::new(Bytes::from(message)))
        .unwrap_or_else(|_| {
            let mut response = Response::new(Full::new(Bytes::from("Bad Request")));
            *response.status_mut() = StatusCode::BAD_REQUEST;
            response
        })
}

fn internal_error() -> Response<Full<Bytes>> {
    let mut response = Response::new(Full::new(Bytes::from("Internal Server Error")));
    *response.status_mut() = StatusCode::INTERNAL_SERVER_ERROR;
    response
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sink::RecordingSink;
    use std::sync::Arc;

    #[tokio::test]
    async fn test_url_joins_paths() {
        let server = MockServer::start(Registry::new(Arc::new(RecordingSink::new())))
            .await
            .unwrap();
        let base = server.uri();
        assert!(base.starts_with("http://127.0.0.1:"));
        assert_eq!(server.url("/users"), format!("{base}/users"));
        assert_eq!(server.url("users"), format!("{base}/users"));
        assert_ne!(server.addr().port(), 0);
        server.shutdown().await;
    }

    #[tokio::test]
    async fn test_bind_failure_is_reported() {
        let first = MockServer::start(Registry::new(Arc::new(RecordingSink::new())))
            .await
            .unwrap();
        let result =
            MockServer::start_on(Registry::new(Arc::new(RecordingSink::new())), first.addr())
                .await;
        assert!(matches!(result, Err(RegistryError::Bind(_, _))));
    }
}
