// SPDX-License-Identifier: AGPL-3.0-or-later

//! Component G: per-transport acceptors (§4.G). Each accepts connections
//! (or, for UDP, datagrams) on one configured transport, constructs a
//! Session per connection, and registers it with the shared registry.

use std::sync::Arc;

use anyhow::{Context, Result};
use tokio::net::{TcpListener, UdpSocket, UnixListener};
use tokio_util::sync::CancellationToken;

use crate::{
    session::{self, SessionConfig, registry::SessionRegistry},
    wire::HEADER_LEN,
};

/// Where a stream/datagram acceptor listens.
pub enum ListenTransport {
    Unix(String),
    Tcp(std::net::SocketAddr),
    Udp(std::net::SocketAddr),
}

/// Drives the accept loop for one transport until `cancel` fires. Spawns
/// one session task per accepted connection (or per UDP datagram).
pub async fn run(
    transport: ListenTransport,
    registry: Arc<SessionRegistry>,
    session_config: Arc<dyn Fn() -> SessionConfig + Send + Sync>,
    cancel: CancellationToken,
) -> Result<()> {
    match transport {
        ListenTransport::Unix(path) => {
            let _ = std::fs::remove_file(&path);
            let listener = UnixListener::bind(&path)
                .with_context(|| format!("binding unix listen socket {path}"))?;
            let result = accept_stream_loop(listener, registry, session_config, cancel).await;
            let _ = std::fs::remove_file(&path);
            result
        },
        ListenTransport::Tcp(addr) => {
            let listener =
                TcpListener::bind(addr).await.with_context(|| format!("binding tcp socket {addr}"))?;
            accept_stream_loop(listener, registry, session_config, cancel).await
        },
        ListenTransport::Udp(addr) => {
            let socket =
                UdpSocket::bind(addr).await.with_context(|| format!("binding udp socket {addr}"))?;
            run_udp_loop(socket, session_config, cancel).await
        },
    }
}

trait StreamAcceptor {
    type Io: tokio::io::AsyncRead + tokio::io::AsyncWrite + Unpin + Send + 'static;
    async fn accept_one(&self) -> std::io::Result<Self::Io>;
}

impl StreamAcceptor for UnixListener {
    type Io = tokio::net::UnixStream;
    async fn accept_one(&self) -> std::io::Result<Self::Io> {
        self.accept().await.map(|(s, _)| s)
    }
}

impl StreamAcceptor for TcpListener {
    type Io = tokio::net::TcpStream;
    async fn accept_one(&self) -> std::io::Result<Self::Io> {
        self.accept().await.map(|(s, _)| s)
    }
}

async fn accept_stream_loop<L: StreamAcceptor>(
    listener: L,
    registry: Arc<SessionRegistry>,
    session_config: Arc<dyn Fn() -> SessionConfig + Send + Sync>,
    cancel: CancellationToken,
) -> Result<()> {
    loop {
        tokio::select! {
            _ = cancel.cancelled() => return Ok(()),
            accepted = listener.accept_one() => {
                let stream = match accepted {
                    Ok(stream) => stream,
                    Err(err) => {
                        tracing::warn!(%err, "accept failed");
                        continue;
                    }
                };

                let handle = registry.register();
                let config = session_config();
                let counters = Arc::clone(&config.task_ctx.counters);
                counters.client_connected();
                let registry = Arc::clone(&registry);
                let id = handle.id;
                tokio::spawn(async move {
                    session::run_stream_session(stream, config, handle).await;
                    registry.deregister(id);
                    counters.client_disconnected();
                });
            }
        }
    }
}

async fn run_udp_loop(
    socket: UdpSocket,
    session_config: Arc<dyn Fn() -> SessionConfig + Send + Sync>,
    cancel: CancellationToken,
) -> Result<()> {
    let mut buf = vec![0u8; HEADER_LEN + crate::wire::DEFAULT_MAX_BODY as usize];
    loop {
        tokio::select! {
            _ = cancel.cancelled() => return Ok(()),
            received = socket.recv_from(&mut buf) => {
                let (len, _peer) = match received {
                    Ok(pair) => pair,
                    Err(err) => {
                        tracing::warn!(%err, "udp recv failed");
                        continue;
                    }
                };

                let datagram = buf[..len].to_vec();
                let config = session_config();
                tokio::spawn(async move {
                    if let Err(err) = session::run_udp_datagram(&datagram, &config).await {
                        tracing::debug!(%err, "dropping malformed udp datagram");
                    }
                });
            }
        }
    }
}
