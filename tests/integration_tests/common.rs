use std::{net::SocketAddr, sync::Arc, time::Duration};

use darwin_filter_runtime::{
    acceptor::{self, ListenTransport},
    alert::AlertManager,
    cache::SharedCache,
    cfg::enums::{Endpoint, OutputType},
    classifier::{Classifier, EchoClassifier},
    counters::Counters,
    next_filter::NextFilterConnector,
    pool::TaskPool,
    session::{SessionConfig, registry::SessionRegistry},
    task::TaskContext,
    wire::{self, FrameType, HEADER_LEN, HeaderView, ResponseMode, TailView},
};
use tokio::{
    io::{AsyncReadExt, AsyncWriteExt},
    net::{TcpListener, TcpStream},
};
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

/// Arbitrary non-zero filter code used by every test's classifier.
pub const FILTER_CODE: u32 = 0x2a;

/// One filter instance wired up with its own registry, counters, and task
/// pool, listening on an ephemeral TCP port. Mirrors the pieces
/// `runtime::Runtime::start` assembles, minus the process-level concerns
/// (PID file, signal handlers) integration tests have no business touching.
pub struct Harness {
    pub addr: SocketAddr,
    pub counters: Arc<Counters>,
    pub registry: Arc<SessionRegistry>,
    cancel: CancellationToken,
    acceptor_handle: tokio::task::JoinHandle<anyhow::Result<()>>,
}

impl Harness {
    pub async fn start(threshold: u8, output_type: OutputType, next_filter_endpoint: Endpoint) -> Self {
        let addr = reserve_ephemeral_port().await;

        let counters = Arc::new(Counters::new());
        let cache = Arc::new(SharedCache::new(64));
        let alert_manager = Arc::new(AlertManager::disabled("test-filter"));
        let classifier: Arc<dyn Classifier> = Arc::new(EchoClassifier::new(FILTER_CODE));
        let task_ctx = Arc::new(TaskContext {
            classifier,
            cache,
            alert_manager,
            counters: Arc::clone(&counters),
            threshold,
        });
        let task_pool = Arc::new(TaskPool::new(2));
        let cancel = CancellationToken::new();

        let next_filter = if next_filter_endpoint.is_none() {
            None
        } else {
            Some(Arc::new(NextFilterConnector::new(next_filter_endpoint, cancel.clone())))
        };
        if let Some(connector) = next_filter.clone() {
            tokio::spawn(async move { connector.run().await });
        }

        let registry = Arc::new(SessionRegistry::new());

        let session_config = {
            let task_ctx = Arc::clone(&task_ctx);
            let task_pool = Arc::clone(&task_pool);
            let next_filter = next_filter.clone();
            Arc::new(move || SessionConfig {
                task_ctx: Arc::clone(&task_ctx),
                task_pool: Arc::clone(&task_pool),
                next_filter: next_filter.clone(),
                output_type,
            })
        };

        let acceptor_handle = tokio::spawn(acceptor::run(
            ListenTransport::Tcp(addr),
            Arc::clone(&registry),
            session_config,
            cancel.clone(),
        ));

        // Give the acceptor a moment to finish its bind() before the first
        // test connection is attempted.
        tokio::time::sleep(Duration::from_millis(30)).await;

        Self { addr, counters, registry, cancel, acceptor_handle }
    }

    pub async fn connect(&self) -> TcpStream {
        TcpStream::connect(self.addr).await.expect("connecting to harness filter")
    }

    /// Cancels every live session and the acceptor loop, then waits for the
    /// acceptor task to return.
    pub async fn shutdown(self) {
        self.registry.terminate_all();
        self.cancel.cancel();
        let _ = self.acceptor_handle.await;
    }
}

/// Binds an ephemeral port, reads back the address the OS assigned, then
/// releases it. The harness re-binds the same address a moment later; good
/// enough for a single-process test run, same tradeoff the teacher's own
/// `tests/config.yaml`-driven fixed ports make for a live test target.
async fn reserve_ephemeral_port() -> SocketAddr {
    let listener = TcpListener::bind("127.0.0.1:0").await.expect("binding ephemeral tcp port");
    listener.local_addr().expect("reading ephemeral port")
}

pub fn build_request(response_mode: ResponseMode, event_id: Uuid, body: &[u8]) -> Vec<u8> {
    wire::emit_frame(FrameType::Filter, response_mode, FILTER_CODE, event_id, &[0], body)
}

pub async fn send_frame(stream: &mut TcpStream, frame: &[u8]) {
    stream.write_all(frame).await.expect("writing request frame");
}

/// Reads one complete frame (header plus tail) off `stream`.
pub async fn read_frame(stream: &mut TcpStream) -> (HeaderView, TailView) {
    let mut header_buf = [0u8; HEADER_LEN];
    stream.read_exact(&mut header_buf).await.expect("reading reply header");
    let header = wire::parse_header(&header_buf).expect("parsing reply header");

    let mut tail_buf = vec![0u8; header.tail_len()];
    if !tail_buf.is_empty() {
        stream.read_exact(&mut tail_buf).await.expect("reading reply tail");
    }
    let tail = wire::parse_tail(&header, &tail_buf).expect("parsing reply tail");
    (header, tail)
}
