use std::sync::Arc;

use darwin_filter_runtime::{cfg::enums::{Endpoint, OutputType}, monitor, wire::ResponseMode};
use tokio::io::AsyncReadExt;
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

use crate::integration_tests::common::{Harness, build_request, read_frame, send_frame};

const CONNECTIONS: usize = 32;
const FRAMES_PER_CONNECTION: usize = 100;

/// 32 concurrent connections each send 100 frames while the monitor socket
/// is queried concurrently; the monitor must keep returning a well-formed
/// status document and the counters it reports must add up once the load
/// finishes (§4.H, §8 "monitor during load").
#[tokio::test]
async fn monitor_reports_consistent_totals_after_concurrent_load() {
    let harness = Harness::start(50, OutputType::Raw, Endpoint::None).await;

    let monitor_dir = tempfile::tempdir().expect("creating monitor socket tempdir");
    let monitor_path = monitor_dir.path().join("monitor.sock");
    let monitor_path_str = monitor_path.to_string_lossy().to_string();
    let monitor_cancel = CancellationToken::new();
    let monitor_handle = tokio::spawn({
        let counters = Arc::clone(&harness.counters);
        let cancel = monitor_cancel.clone();
        let path = monitor_path_str.clone();
        async move { monitor::run(&path, counters, cancel).await }
    });
    // give the monitor a moment to bind before anything queries it
    tokio::time::sleep(std::time::Duration::from_millis(30)).await;

    let mut clients = Vec::with_capacity(CONNECTIONS);
    for _ in 0..CONNECTIONS {
        let mut stream = harness.connect().await;
        let body = br#"["bad-item","good-item"]"#;
        clients.push(tokio::spawn(async move {
            for _ in 0..FRAMES_PER_CONNECTION {
                let request = build_request(ResponseMode::ClientOnly, Uuid::new_v4(), body);
                send_frame(&mut stream, &request).await;
                let (_, tail) = read_frame(&mut stream).await;
                assert_eq!(tail.certitudes, vec![100, 0]);
            }
        }));
    }

    // Query the monitor a few times while load is still in flight; it must
    // never block the classification path or itself hang.
    for _ in 0..5 {
        let body = query_monitor(&monitor_path_str).await;
        assert!(body.contains("\"filter_status\""));
        tokio::time::sleep(std::time::Duration::from_millis(5)).await;
    }

    for client in clients {
        client.await.expect("client task completed without panicking");
    }

    let final_reply = query_monitor(&monitor_path_str).await;
    let expected_received = (CONNECTIONS * FRAMES_PER_CONNECTION * 2) as u64;
    let expected_matches = (CONNECTIONS * FRAMES_PER_CONNECTION) as u64;
    assert!(final_reply.contains(&format!("\"received\":{expected_received}")));
    assert!(final_reply.contains(&format!("\"match_count\":{expected_matches}")));

    monitor_cancel.cancel();
    let _ = monitor_handle.await;
    harness.shutdown().await;
}

async fn query_monitor(path: &str) -> String {
    let mut stream = tokio::net::UnixStream::connect(path).await.expect("connecting to monitor socket");
    let mut buf = Vec::new();
    stream.read_to_end(&mut buf).await.expect("reading monitor reply");
    String::from_utf8(buf).expect("monitor reply is utf8")
}
