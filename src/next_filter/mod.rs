// SPDX-License-Identifier: AGPL-3.0-or-later

//! Component D: the next-filter connector (§4.D). Owns a single outbound
//! connection to one downstream filter and drains an unbounded FIFO queue
//! onto it, reconnecting with exponential backoff on failure. Runs as a
//! single dedicated async task — the "dedicated single-threaded
//! cooperative loop" the contract describes.

use std::{collections::VecDeque, time::Duration};

use anyhow::{Context, Result};
use tokio::{
    io::AsyncWriteExt,
    net::{TcpStream, UdpSocket, UnixStream},
    sync::{Mutex, Notify},
};
use tokio_util::sync::CancellationToken;

use crate::cfg::enums::Endpoint;

/// Reconnect backoff cap (§4.D design default).
pub const MAX_BACKOFF: Duration = Duration::from_secs(30);
const INITIAL_BACKOFF: Duration = Duration::from_millis(250);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ConnectorState {
    Disconnected,
    Ready,
}

enum Transport {
    Unix(UnixStream),
    Tcp(TcpStream),
    Udp(UdpSocket),
}

impl Transport {
    async fn connect(endpoint: &Endpoint) -> Result<Self> {
        match endpoint {
            Endpoint::None => anyhow::bail!("next-filter connector has no endpoint configured"),
            Endpoint::Unix(path) => Ok(Self::Unix(
                UnixStream::connect(path)
                    .await
                    .with_context(|| format!("connecting to next filter at {path}"))?,
            )),
            Endpoint::Tcp(addr) => Ok(Self::Tcp(
                TcpStream::connect(addr)
                    .await
                    .with_context(|| format!("connecting to next filter at {addr}"))?,
            )),
            Endpoint::Udp(addr) => {
                let socket = UdpSocket::bind("0.0.0.0:0").await.context("binding udp socket")?;
                socket.connect(addr).await.with_context(|| format!("connecting udp to {addr}"))?;
                Ok(Self::Udp(socket))
            },
        }
    }

    /// Writes the full frame, retrying partial writes until complete.
    async fn write_all(&mut self, frame: &[u8]) -> Result<()> {
        match self {
            Self::Unix(stream) => stream.write_all(frame).await.map_err(Into::into),
            Self::Tcp(stream) => stream.write_all(frame).await.map_err(Into::into),
            Self::Udp(socket) => socket.send(frame).await.map(|_| ()).map_err(Into::into),
        }
    }
}

/// The connector's public face: enqueue frames, read its current state.
pub struct NextFilterConnector {
    endpoint: Endpoint,
    queue: Mutex<VecDeque<Vec<u8>>>,
    notify: Notify,
    cancel: CancellationToken,
}

impl NextFilterConnector {
    pub fn new(endpoint: Endpoint, cancel: CancellationToken) -> Self {
        Self { endpoint, queue: Mutex::new(VecDeque::new()), notify: Notify::new(), cancel }
    }

    /// Enqueues `frame_bytes` and returns immediately; the connector task
    /// performs the actual I/O (§4.D send contract).
    pub async fn send(&self, frame_bytes: Vec<u8>) {
        self.queue.lock().await.push_back(frame_bytes);
        self.notify.notify_one();
    }

    pub fn is_configured(&self) -> bool {
        !self.endpoint.is_none()
    }

    /// Drains the queue onto the configured endpoint until cancelled.
    /// Intended to be spawned once as its own task.
    pub async fn run(&self) {
        if !self.is_configured() {
            return;
        }

        let mut state = ConnectorState::Disconnected;
        let mut transport: Option<Transport> = None;
        let mut backoff = INITIAL_BACKOFF;

        loop {
            if self.cancel.is_cancelled() {
                self.drain_on_shutdown().await;
                return;
            }

            match state {
                ConnectorState::Disconnected => {
                    tokio::select! {
                        _ = self.cancel.cancelled() => {
                            self.drain_on_shutdown().await;
                            return;
                        }
                        connected = Transport::connect(&self.endpoint) => {
                            match connected {
                                Ok(t) => {
                                    transport = Some(t);
                                    state = ConnectorState::Ready;
                                    backoff = INITIAL_BACKOFF;
                                }
                                Err(err) => {
                                    tracing::warn!(%err, backoff_ms = backoff.as_millis() as u64, "next filter unreachable, backing off");
                                    tokio::time::sleep(backoff).await;
                                    backoff = (backoff * 2).min(MAX_BACKOFF);
                                }
                            }
                        }
                    }
                },
                ConnectorState::Ready => {
                    let next_frame = {
                        let queue = self.queue.lock().await;
                        queue.front().cloned()
                    };

                    let Some(frame) = next_frame else {
                        tokio::select! {
                            _ = self.cancel.cancelled() => {
                                self.drain_on_shutdown().await;
                                return;
                            }
                            _ = self.notify.notified() => {}
                        }
                        continue;
                    };

                    let conn = transport.as_mut().expect("Ready state always has a transport");
                    match conn.write_all(&frame).await {
                        Ok(()) => {
                            let mut queue = self.queue.lock().await;
                            queue.pop_front();
                        },
                        Err(err) => {
                            tracing::error!(%err, "next filter write failed, reconnecting");
                            transport = None;
                            state = ConnectorState::Disconnected;
                        },
                    }
                },
            }
        }
    }

    async fn drain_on_shutdown(&self) {
        let dropped = self.queue.lock().await.len();
        if dropped > 0 {
            tracing::warn!(dropped, "next filter connector stopping with undelivered frames");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn unconfigured_connector_run_returns_immediately() {
        let connector = NextFilterConnector::new(Endpoint::None, CancellationToken::new());
        connector.run().await;
    }

    #[tokio::test]
    async fn send_enqueues_without_blocking() {
        let connector = NextFilterConnector::new(Endpoint::None, CancellationToken::new());
        connector.send(vec![1, 2, 3]).await;
        assert_eq!(connector.queue.lock().await.len(), 1);
    }

    #[tokio::test]
    async fn cancellation_drains_without_panicking() {
        let cancel = CancellationToken::new();
        let connector = NextFilterConnector::new(
            Endpoint::Tcp("127.0.0.1:1".parse().expect("valid socket addr")),
            cancel.clone(),
        );
        connector.send(vec![9]).await;
        cancel.cancel();
        connector.run().await;
    }
}
