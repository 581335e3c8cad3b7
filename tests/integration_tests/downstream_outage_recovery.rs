use std::time::Duration;

use darwin_filter_runtime::{cfg::enums::{Endpoint, OutputType}, wire::ResponseMode};
use tokio::net::TcpListener;
use uuid::Uuid;

use crate::integration_tests::common::{Harness, build_request, read_frame, send_frame};

/// The classification path must not stall just because the next filter is
/// unreachable: the client still gets its reply immediately, and once the
/// downstream comes back up the connector delivers the frame it queued
/// while disconnected (§4.D at-least-once delivery).
#[tokio::test]
async fn client_reply_is_unaffected_by_downstream_outage_and_later_delivered() {
    let downstream_addr = {
        let listener = TcpListener::bind("127.0.0.1:0").await.expect("binding probe listener");
        listener.local_addr().expect("reading probe addr")
        // listener drops here, so nothing is listening at this address yet.
    };

    let harness = Harness::start(50, OutputType::Raw, Endpoint::Tcp(downstream_addr)).await;
    let mut stream = harness.connect().await;

    let body = br#"["bad-one"]"#;
    let request = build_request(ResponseMode::Both, Uuid::new_v4(), body);
    send_frame(&mut stream, &request).await;

    // The client reply arrives even though nothing is listening downstream.
    let (_, tail) = read_frame(&mut stream).await;
    assert_eq!(tail.certitudes, vec![100]);

    // Give the connector a couple of failed connect attempts before the
    // downstream comes up, to exercise its backoff-and-retry loop.
    tokio::time::sleep(Duration::from_millis(600)).await;

    let downstream_listener =
        TcpListener::bind(downstream_addr).await.expect("binding downstream on the probed port");
    let (mut downstream_stream, _) =
        tokio::time::timeout(Duration::from_secs(10), downstream_listener.accept())
            .await
            .expect("connector reconnected before timeout")
            .expect("accepting reconnected downstream");

    let (_, downstream_tail) = read_frame(&mut downstream_stream).await;
    assert_eq!(downstream_tail.certitudes, vec![100]);
    assert_eq!(downstream_tail.body, body);

    harness.shutdown().await;
}
