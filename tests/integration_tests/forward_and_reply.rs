use darwin_filter_runtime::{cfg::enums::{Endpoint, OutputType}, wire::ResponseMode};
use tokio::net::TcpListener;
use uuid::Uuid;

use crate::integration_tests::common::{Harness, build_request, read_frame, send_frame};

/// A request in `Both` response mode should both reply to the client with
/// certitudes and forward the (raw) body on to the configured next filter.
#[tokio::test]
async fn both_mode_replies_to_client_and_forwards_downstream() {
    let downstream_listener =
        TcpListener::bind("127.0.0.1:0").await.expect("binding mock downstream listener");
    let downstream_addr = downstream_listener.local_addr().expect("reading downstream addr");

    let downstream_task = tokio::spawn(async move {
        let (mut stream, _) = downstream_listener.accept().await.expect("accepting downstream connection");
        read_frame(&mut stream).await
    });

    let harness = Harness::start(50, OutputType::Raw, Endpoint::Tcp(downstream_addr)).await;
    let mut stream = harness.connect().await;

    let body = br#"["bad-one","good"]"#;
    let request = build_request(ResponseMode::Both, Uuid::new_v4(), body);
    send_frame(&mut stream, &request).await;

    let (header, tail) = read_frame(&mut stream).await;
    assert_eq!(tail.certitudes, vec![100, 0]);
    assert!(tail.body.is_empty(), "client replies never carry a body");
    assert_eq!(header.response_mode, ResponseMode::Both);

    let (downstream_header, downstream_tail) =
        tokio::time::timeout(std::time::Duration::from_secs(5), downstream_task)
            .await
            .expect("downstream frame arrived before timeout")
            .expect("downstream task completed");
    assert_eq!(downstream_tail.certitudes, vec![100, 0]);
    assert_eq!(downstream_tail.body, body);
    assert_eq!(downstream_header.filter_code, harness_filter_code());

    harness.shutdown().await;
}

fn harness_filter_code() -> u32 {
    crate::integration_tests::common::FILTER_CODE
}
