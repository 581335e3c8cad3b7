use darwin_filter_runtime::{cfg::enums::{Endpoint, OutputType}, wire::ResponseMode};
use uuid::Uuid;

use crate::integration_tests::common::{Harness, build_request, read_frame, send_frame};

/// Two requests carrying the same entry should both reach the client with
/// the same certitude, the second time served from cache rather than a
/// fresh classification.
#[tokio::test]
async fn repeated_entry_is_served_from_cache_on_second_request() {
    let harness = Harness::start(50, OutputType::Raw, Endpoint::None).await;
    let mut stream = harness.connect().await;

    let body = br#"["bad-one"]"#;
    let first = build_request(ResponseMode::ClientOnly, Uuid::new_v4(), body);
    send_frame(&mut stream, &first).await;
    let (header, tail) = read_frame(&mut stream).await;
    assert_eq!(header.certitude_count, 1);
    assert_eq!(tail.certitudes, vec![100]);

    let second = build_request(ResponseMode::ClientOnly, Uuid::new_v4(), body);
    send_frame(&mut stream, &second).await;
    let (_, tail) = read_frame(&mut stream).await;
    assert_eq!(tail.certitudes, vec![100]);

    // Both requests crossed the threshold, so each counted as a match
    // regardless of whether the verdict came from cache.
    assert_eq!(harness.counters.match_count(), 2);
    assert_eq!(harness.counters.received(), 2);

    harness.shutdown().await;
}
