use std::time::Duration;

use darwin_filter_runtime::{cfg::enums::{Endpoint, OutputType}, wire::ResponseMode};
use tokio::{io::AsyncReadExt, net::TcpStream};
use uuid::Uuid;

use crate::integration_tests::common::{Harness, build_request, read_frame, send_frame};

/// Shutdown must finish promptly with an in-flight session open, and the
/// listening port must be gone afterwards (§4.J shutdown sequence).
#[tokio::test]
async fn shutdown_terminates_live_sessions_and_closes_the_listener() {
    let harness = Harness::start(50, OutputType::Raw, Endpoint::None).await;
    let addr = harness.addr;

    let mut stream = harness.connect().await;
    let request = build_request(ResponseMode::ClientOnly, Uuid::new_v4(), br#"["good"]"#);
    send_frame(&mut stream, &request).await;
    let (_, tail) = read_frame(&mut stream).await;
    assert_eq!(tail.certitudes, vec![0]);

    // Shutdown must complete even with the session still open and idle,
    // waiting on its next header read.
    tokio::time::timeout(Duration::from_secs(5), harness.shutdown())
        .await
        .expect("shutdown completed before timeout");

    // The now-terminated session closes the connection from its side.
    let mut buf = [0u8; 1];
    let read_result = tokio::time::timeout(Duration::from_secs(5), stream.read(&mut buf))
        .await
        .expect("reading after shutdown did not hang");
    assert_eq!(read_result.expect("read after shutdown does not error"), 0, "connection should be closed (EOF)");

    // The listener itself is gone: a fresh connection attempt fails.
    let reconnect = TcpStream::connect(addr).await;
    assert!(reconnect.is_err(), "no listener should remain after shutdown");
}
