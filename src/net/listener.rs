//! TCP listener and accept loop.
//!
//! # Responsibilities
//! - Bind to the configured address, with optional TLS
//! - Accept incoming connections, bounded by `max_connections`
//! - Hand each connection to its handler pair
//! - On shutdown: stop accepting, then wait for handlers to drain
//!
//! The runtime offers a selectable accept, so shutdown is a `select!`
//! against the broadcast channel rather than a polling deadline loop.

use std::net::SocketAddr;
use std::path::Path;
use std::sync::Arc;

use tokio::net::{TcpListener, TcpStream};
use tokio::sync::Semaphore;
use tokio_rustls::TlsAcceptor;
use tracing::{debug, error, info, warn};

use crate::config::ListenerConfig;
use crate::lifecycle::Shutdown;
use crate::net::connection::{self, ConnectionContext, ConnectionTracker};
use crate::net::tls::{load_tls_acceptor, TlsError};

/// Error type for listener operations.
#[derive(Debug)]
pub enum ListenerError {
    /// Failed to bind to the address, or to load TLS material. Fatal.
    Bind(std::io::Error),
    /// TLS material could not be loaded. Fatal.
    Tls(TlsError),
    /// Failed to accept a connection. Logged; the loop continues.
    Accept(std::io::Error),
}

impl std::fmt::Display for ListenerError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ListenerError::Bind(e) => write!(f, "Failed to bind: {}", e),
            ListenerError::Tls(e) => write!(f, "Failed to set up TLS: {}", e),
            ListenerError::Accept(e) => write!(f, "Failed to accept: {}", e),
        }
    }
}

impl std::error::Error for ListenerError {}

/// A bounded TCP listener that limits concurrent connections.
///
/// Uses a semaphore to enforce `max_connections`. When the limit is reached,
/// new connections wait in the accept queue until a slot frees up.
pub struct Listener {
    inner: TcpListener,
    connection_limit: Arc<Semaphore>,
    tls: Option<TlsAcceptor>,
}

impl Listener {
    /// Bind to the configured address, loading TLS material when configured.
    pub async fn bind(config: &ListenerConfig) -> Result<Self, ListenerError> {
        let addr: SocketAddr = config.bind_address.parse().map_err(|e| {
            ListenerError::Bind(std::io::Error::new(std::io::ErrorKind::InvalidInput, e))
        })?;

        let tls = match &config.tls {
            Some(tls_config) => Some(
                load_tls_acceptor(
                    Path::new(&tls_config.cert_path),
                    Path::new(&tls_config.key_path),
                )
                .map_err(ListenerError::Tls)?,
            ),
            None => None,
        };

        let listener = TcpListener::bind(addr).await.map_err(ListenerError::Bind)?;
        let local_addr = listener.local_addr().map_err(ListenerError::Bind)?;

        info!(
            address = %local_addr,
            max_connections = config.max_connections,
            tls = tls.is_some(),
            "Listener bound"
        );

        Ok(Self {
            inner: listener,
            connection_limit: Arc::new(Semaphore::new(config.max_connections)),
            tls,
        })
    }

    /// Get the local address this listener is bound to.
    pub fn local_addr(&self) -> Result<SocketAddr, std::io::Error> {
        self.inner.local_addr()
    }

    /// Get current available connection slots.
    pub fn available_permits(&self) -> usize {
        self.connection_limit.available_permits()
    }

    /// Run the accept loop until shutdown, then drain.
    ///
    /// Accept errors are logged and the loop continues; only the shutdown
    /// broadcast ends it. On shutdown the socket is closed first, so no new
    /// peers get in while live handlers finish at their own pace.
    pub async fn run(self, ctx: ConnectionContext, shutdown: Arc<Shutdown>) {
        let tracker = ConnectionTracker::new();
        let mut shutdown_rx = shutdown.subscribe();

        // The flag check covers a trigger that raced ahead of the
        // subscription above; the select covers everything after it.
        while !shutdown.is_triggered() {
            tokio::select! {
                _ = shutdown_rx.recv() => break,
                res = self.accept() => {
                    let (stream, peer, permit) = match res {
                        Ok(accepted) => accepted,
                        Err(e) => {
                            error!(error = %e, "Failed to accept connection");
                            continue;
                        }
                    };
                    debug!(
                        peer = %peer,
                        available_permits = self.connection_limit.available_permits(),
                        "Connection accepted"
                    );

                    let guard = tracker.track();
                    let ctx = ctx.clone();
                    let tls = self.tls.clone();
                    let conn_shutdown = Arc::clone(&shutdown);
                    tokio::spawn(async move {
                        // Held for the connection's lifetime; dropping it
                        // frees the slot even if the handler panics.
                        let _permit = permit;
                        match tls {
                            Some(acceptor) => match acceptor.accept(stream).await {
                                Ok(tls_stream) => {
                                    connection::handle(tls_stream, peer, ctx, conn_shutdown, guard)
                                        .await
                                }
                                Err(e) => {
                                    warn!(peer = %peer, error = %e, "TLS handshake failed");
                                    drop(guard);
                                }
                            },
                            None => connection::handle(stream, peer, ctx, conn_shutdown, guard).await,
                        }
                    });
                }
            }
        }

        // Close the listen socket before draining so no new peer sneaks in.
        drop(self.inner);
        info!(active = tracker.active_count(), "Listener draining connections");
        tracker.wait_for_drain().await;
        info!("Listener stopped");
    }

    /// Accept a new connection, respecting the connection limit.
    async fn accept(
        &self,
    ) -> Result<(TcpStream, SocketAddr, tokio::sync::OwnedSemaphorePermit), ListenerError> {
        // Acquire the permit first (backpressure), then accept.
        let permit = self
            .connection_limit
            .clone()
            .acquire_owned()
            .await
            .expect("Semaphore closed unexpectedly");

        let (stream, addr) = self.inner.accept().await.map_err(ListenerError::Accept)?;
        Ok((stream, addr, permit))
    }
}
