//! [`HttpServer`]: binds the assembled app and serves it until stopped.

use std::{io, net::SocketAddr, time::Duration};

use async_trait::async_trait;
use thiserror::Error;
use tokio::{net::TcpListener, task::JoinHandle};
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use crate::assembly::BindAddress;
use crate::lifecycle::Server;

/// Errors produced while starting or stopping the HTTP server.
#[derive(Debug, Error)]
pub enum ServerError {
    #[error("failed to bind {address}: {source}")]
    Bind {
        address: String,
        #[source]
        source: io::Error,
    },

    #[error("server terminated with an error: {0}")]
    Serve(#[source] io::Error),

    #[error("server task failed: {0}")]
    Join(String),

    #[error("server is not running")]
    NotRunning,

    #[error("server was already started")]
    AlreadyStarted,
}

struct Running {
    token: CancellationToken,
    task: JoinHandle<io::Result<()>>,
}

/// HTTP/1.1 + HTTP/2 server for one axum app.
///
/// No socket is opened until [`Server::start`].
pub struct HttpServer {
    address: BindAddress,
    app: Option<axum::Router>,
    shutdown_grace: Duration,
    local_addr: Option<SocketAddr>,
    running: Option<Running>,
}

impl HttpServer {
    pub fn new(address: BindAddress, app: axum::Router, shutdown_grace: Duration) -> Self {
        Self {
            address,
            app: Some(app),
            shutdown_grace,
            local_addr: None,
            running: None,
        }
    }

    pub fn address(&self) -> &BindAddress {
        &self.address
    }

    /// Address the listener is bound to, once started.
    pub fn local_addr(&self) -> Option<SocketAddr> {
        self.local_addr
    }
}

#[async_trait]
impl Server for HttpServer {
    async fn start(&mut self) -> Result<(), ServerError> {
        let app = self.app.take().ok_or(ServerError::AlreadyStarted)?;

        let port = self.address.port;
        let listener = match TcpListener::bind((self.address.host.as_str(), port)).await {
            Ok(listener) => listener,
            Err(e) if self.address.is_unspecified_v6() && e.kind() != io::ErrorKind::AddrInUse => {
                warn!(error = %e, "IPv6 unavailable, listening on IPv4 only");
                TcpListener::bind(("0.0.0.0", port))
                    .await
                    .map_err(|source| ServerError::Bind {
                        address: format!("0.0.0.0:{port}"),
                        source,
                    })?
            }
            Err(source) => {
                return Err(ServerError::Bind {
                    address: self.address.to_string(),
                    source,
                })
            }
        };
        let local_addr = listener.local_addr().map_err(|source| ServerError::Bind {
            address: self.address.to_string(),
            source,
        })?;

        let token = CancellationToken::new();
        let stopped = token.clone();
        let task = tokio::spawn(async move {
            axum::serve(listener, app)
                .with_graceful_shutdown(async move { stopped.cancelled().await })
                .await
        });

        info!(addr = %local_addr, "listening");
        self.local_addr = Some(local_addr);
        self.running = Some(Running { token, task });
        Ok(())
    }

    async fn stop(&mut self) -> Result<(), ServerError> {
        let Running { token, mut task } = self.running.take().ok_or(ServerError::NotRunning)?;
        token.cancel();

        match tokio::time::timeout(self.shutdown_grace, &mut task).await {
            Ok(Ok(Ok(()))) => {
                info!("server stopped");
                Ok(())
            }
            Ok(Ok(Err(e))) => Err(ServerError::Serve(e)),
            Ok(Err(e)) => Err(ServerError::Join(e.to_string())),
            Err(_) => {
                warn!(
                    grace_secs = self.shutdown_grace.as_secs(),
                    "in-flight requests abandoned after grace period"
                );
                task.abort();
                Ok(())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn server(addr: &str) -> HttpServer {
        HttpServer::new(
            addr.parse().unwrap(),
            axum::Router::new().fallback(|| async { "ok" }),
            Duration::from_secs(1),
        )
    }

    #[tokio::test]
    async fn start_then_stop() {
        let mut srv = server("127.0.0.1:0");
        assert!(srv.local_addr().is_none());
        srv.start().await.unwrap();

        let addr = srv.local_addr().unwrap();
        assert_ne!(addr.port(), 0);
        tokio::net::TcpStream::connect(addr).await.unwrap();

        srv.stop().await.unwrap();
    }

    #[tokio::test]
    async fn empty_host_accepts_ipv4_clients() {
        let mut srv = server(":0");
        srv.start().await.unwrap();

        let port = srv.local_addr().unwrap().port();
        tokio::net::TcpStream::connect(("127.0.0.1", port))
            .await
            .unwrap();

        srv.stop().await.unwrap();
    }

    #[tokio::test]
    async fn address_in_use_fails_to_start() {
        let taken = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        let port = taken.local_addr().unwrap().port();

        let mut srv = server(&format!("127.0.0.1:{port}"));
        let err = srv.start().await.unwrap_err();
        assert!(matches!(err, ServerError::Bind { .. }));
    }

    #[tokio::test]
    async fn stop_before_start_is_an_error() {
        let mut srv = server("127.0.0.1:0");
        assert!(matches!(srv.stop().await, Err(ServerError::NotRunning)));
    }

    #[tokio::test]
    async fn second_start_is_rejected() {
        let mut srv = server("127.0.0.1:0");
        srv.start().await.unwrap();
        assert!(matches!(srv.start().await, Err(ServerError::AlreadyStarted)));
        srv.stop().await.unwrap();
    }
}
