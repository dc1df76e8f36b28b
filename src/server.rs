//! HTTP server and graceful shutdown.
//!
//! The server is a thin transport: it turns each hyper request into a
//! [`Request`], hands it to [`Router::dispatch`], and writes back whatever
//! single response the pipeline produced. Two failures are answered here
//! because they happen before a [`Request`] exists:
//!
//! - an HTTP method outside the supported set gets `405`,
//! - a request body that cannot be read gets `400`.
//!
//! # Graceful shutdown
//!
//! On SIGTERM or Ctrl-C the server stops accepting connections, lets every
//! in-flight connection finish, then returns from [`Server::serve`].

use std::convert::Infallible;
use std::net::SocketAddr;
use std::sync::Arc;

use bytes::Bytes;
use http_body_util::{BodyExt, Full};
use hyper::service::service_fn;
use hyper_util::rt::{TokioExecutor, TokioIo};
use hyper_util::server::conn::auto::Builder as ConnBuilder;
use tokio::net::TcpListener;
use tracing::{debug, error, info};

use crate::config::RouterConfig;
use crate::error::{ApiError, Error, codes};
use crate::method::Method;
use crate::request::Request;
use crate::router::Router;

/// The HTTP server.
pub struct Server {
    addr: SocketAddr,
}

impl Server {
    /// Configures the server to bind to `addr` when [`serve`](Server::serve)
    /// is called.
    ///
    /// ```rust,no_run
    /// use crudroute::Server;
    /// let server = Server::bind("0.0.0.0:8080")?;
    /// # Ok::<(), crudroute::Error>(())
    /// ```
    pub fn bind(addr: &str) -> Result<Self, Error> {
        let addr = addr.parse().map_err(|source| Error::InvalidAddress {
            addr: addr.to_owned(),
            source,
        })?;
        Ok(Self { addr })
    }

    /// Binds to the configured `bind_address`.
    pub fn from_config(config: &RouterConfig) -> Result<Self, Error> {
        Self::bind(&config.bind_address)
    }

    pub fn addr(&self) -> SocketAddr {
        self.addr
    }

    /// Starts accepting connections and dispatching them through `router`.
    ///
    /// Returns only after a full graceful shutdown.
    pub async fn serve(self, router: Router) -> Result<(), Error> {
        let listener = TcpListener::bind(self.addr).await?;
        let router = Arc::new(router);

        router.registry().log_routes();
        info!(addr = %self.addr, routes = router.registry().route_count(), "crudroute listening");

        let mut tasks = tokio::task::JoinSet::new();

        let shutdown = shutdown_signal();
        tokio::pin!(shutdown);

        loop {
            tokio::select! {
                // Shutdown is checked first so a signal stops accepting at once.
                biased;

                () = &mut shutdown => {
                    info!(in_flight = tasks.len(), "shutdown signal received, draining connections");
                    break;
                }

                res = listener.accept() => {
                    let (stream, remote_addr) = match res {
                        Ok(v) => v,
                        Err(e) => {
                            error!("accept error: {e}");
                            continue;
                        }
                    };

                    let router = Arc::clone(&router);
                    let io = TokioIo::new(stream);

                    tasks.spawn(async move {
                        let svc = service_fn(move |req| {
                            let router = Arc::clone(&router);
                            async move { Ok::<_, Infallible>(dispatch(&router, req).await) }
                        });

                        if let Err(e) = ConnBuilder::new(TokioExecutor::new())
                            .serve_connection(io, svc)
                            .await
                        {
                            error!(peer = %remote_addr, "connection error: {e}");
                        }
                    });
                }

                Some(_) = tasks.join_next(), if !tasks.is_empty() => {}
            }
        }

        while tasks.join_next().await.is_some() {}

        info!("crudroute stopped");
        Ok(())
    }
}

// ── Request conversion ────────────────────────────────────────────────────────

async fn dispatch(
    router: &Router,
    req: hyper::Request<hyper::body::Incoming>,
) -> http::Response<Full<Bytes>> {
    match into_request(req).await {
        Ok(request) => router.dispatch(request).await.into_http(),
        Err(e) => {
            e.log();
            e.into_response().into_http()
        }
    }
}

async fn into_request(req: hyper::Request<hyper::body::Incoming>) -> Result<Request, ApiError> {
    let (parts, body) = req.into_parts();

    let method = Method::try_from(&parts.method).map_err(|_| {
        debug!(method = %parts.method, "unsupported method");
        ApiError::new(405u16, codes::METHOD_NOT_ALLOWED, "405 Method Not Allowed")
    })?;

    let target = parts
        .uri
        .path_and_query()
        .map_or_else(|| parts.uri.path(), |pq| pq.as_str());

    let body = body
        .collect()
        .await
        .map_err(|e| ApiError::bad_request(codes::BAD_REQUEST, format!("reading request body: {e}")))?
        .to_bytes();

    let mut request = Request::new(method, target).with_body(body);
    for (name, value) in &parts.headers {
        match value.to_str() {
            Ok(value) => request = request.with_header(name.as_str(), value),
            Err(_) => debug!(header = %name, "dropping non-ASCII header value"),
        }
    }
    Ok(request)
}

// ── Shutdown signal ───────────────────────────────────────────────────────────

/// Resolves on the first SIGTERM or SIGINT (Ctrl-C only on Windows).
///
/// A signal handler that cannot be installed is logged and never fires.
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!("failed to install Ctrl-C handler: {e}");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let sigterm = async {
        use tokio::signal::unix::{SignalKind, signal};
        match signal(SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
            }
            Err(e) => {
                error!("failed to install SIGTERM handler: {e}");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let sigterm = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c   => {}
        () = sigterm  => {}
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bind_rejects_malformed_addresses() {
        let err = Server::bind("not-an-address").err().unwrap();
        assert!(matches!(err, Error::InvalidAddress { .. }));
        assert!(err.to_string().contains("not-an-address"));
    }

    #[test]
    fn bind_from_config() {
        let config = RouterConfig { bind_address: "127.0.0.1:4000".to_owned(), ..RouterConfig::default() };
        assert_eq!(Server::from_config(&config).unwrap().addr().port(), 4000);
    }
}
