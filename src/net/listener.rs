//! TLS listener whose server configuration can be replaced at runtime.
//!
//! # Responsibilities
//! - Accept raw TCP connections
//! - Bind each connection to the configuration current at accept time
//! - Let a concurrent writer install a new configuration at any moment
//!
//! # Design Decisions
//! - The slot is an `ArcSwap`: `accept()` copies the `Arc` out and holds no
//!   guard while handshaking, so a swap never waits on in-flight handshakes
//! - A connection keeps its configuration for its whole lifetime; swaps only
//!   affect connections accepted afterwards

use std::io;
use std::net::SocketAddr;
use std::sync::Arc;

use arc_swap::ArcSwap;
use rustls::ServerConfig;
use tokio::net::{TcpListener, TcpStream};
use tokio_rustls::server::TlsStream;
use tokio_rustls::TlsAcceptor;

/// A TCP listener that wraps accepted connections in server-side TLS.
pub struct HotSwapTlsListener {
    inner: TcpListener,
    config: ArcSwap<ServerConfig>,
}

impl HotSwapTlsListener {
    pub fn new(inner: TcpListener, config: Arc<ServerConfig>) -> Self {
        Self {
            inner,
            config: ArcSwap::new(config),
        }
    }

    /// Wait for the next connection and bind it to the current configuration.
    ///
    /// Errors from the underlying listener are returned unchanged; they end
    /// this call only, not the listener.
    pub async fn accept(&self) -> io::Result<TlsHandshake> {
        let (stream, peer_addr) = self.inner.accept().await?;
        let config = self.config.load_full();

        tracing::trace!(peer_addr = %peer_addr, "Connection accepted");

        Ok(TlsHandshake {
            stream,
            peer_addr,
            config,
        })
    }

    /// Install a new configuration for connections accepted from now on.
    pub fn set_config(&self, config: Arc<ServerConfig>) {
        self.config.store(config);
        tracing::info!("TLS configuration replaced");
    }

    /// Configuration new connections are currently bound to.
    pub fn config(&self) -> Arc<ServerConfig> {
        self.config.load_full()
    }

    pub fn local_addr(&self) -> io::Result<SocketAddr> {
        self.inner.local_addr()
    }
}

impl std::fmt::Debug for HotSwapTlsListener {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HotSwapTlsListener")
            .field("local_addr", &self.inner.local_addr().ok())
            .finish_non_exhaustive()
    }
}

/// An accepted connection bound to one TLS configuration, not yet handshaken.
pub struct TlsHandshake {
    stream: TcpStream,
    peer_addr: SocketAddr,
    config: Arc<ServerConfig>,
}

impl TlsHandshake {
    pub fn peer_addr(&self) -> SocketAddr {
        self.peer_addr
    }

    /// The configuration this connection is served under.
    pub fn config(&self) -> &Arc<ServerConfig> {
        &self.config
    }

    /// Run the server handshake.
    pub async fn finish(self) -> io::Result<TlsStream<TcpStream>> {
        TlsAcceptor::from(self.config).accept(self.stream).await
    }
}

impl std::fmt::Debug for TlsHandshake {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TlsHandshake")
            .field("peer_addr", &self.peer_addr)
            .finish_non_exhaustive()
    }
}
