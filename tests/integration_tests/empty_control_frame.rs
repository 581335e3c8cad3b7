use darwin_filter_runtime::{cfg::enums::{Endpoint, OutputType}, wire::ResponseMode};
use uuid::Uuid;

use crate::integration_tests::common::{Harness, build_request, read_frame, send_frame};

/// A frame with an empty body is not a parse error: it is the
/// empty-entries control frame, and the reply carries the classifier's
/// default certitude with no entries having been counted.
#[tokio::test]
async fn empty_body_yields_default_certitude_and_no_counted_entries() {
    let harness = Harness::start(50, OutputType::Raw, Endpoint::None).await;
    let mut stream = harness.connect().await;

    let request = build_request(ResponseMode::ClientOnly, Uuid::new_v4(), &[]);
    send_frame(&mut stream, &request).await;

    let (header, tail) = read_frame(&mut stream).await;
    assert_eq!(header.body_size, 0);
    assert_eq!(header.certitude_count, 1);
    assert_eq!(tail.certitudes, vec![0]);
    assert!(tail.body.is_empty());

    assert_eq!(harness.counters.received(), 0);
    assert_eq!(harness.counters.match_count(), 0);

    harness.shutdown().await;
}
