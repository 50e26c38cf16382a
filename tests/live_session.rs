//! Live browser smoke test. Launches a local Chromium, warms up the session,
//! and checks one real product page end to end.

use std::sync::Arc;

use stockwatch_rs::{
    check_item, ChallengeResolver, CookieStore, DebugCapture, ItemSpec, Priority,
    SessionController,
};

#[tokio::test]
#[ignore = "Requires a local Chromium install and network access"]
async fn checks_a_real_product_page() {
    let dir = tempfile::tempdir().expect("tempdir");
    let resolver = Arc::new(ChallengeResolver::new());
    let cookies = CookieStore::new(dir.path().join("cookies.json"));
    let debug = DebugCapture::new(dir.path().join("debug"));

    let mut session = SessionController::new(
        "amazon.ca".to_string(),
        cookies,
        Arc::clone(&resolver),
    );
    session.start().await.expect("browser starts");
    assert!(session.fingerprint().is_some());

    let item = ItemSpec {
        id: "B08N5WRWNW".to_string(),
        label: "Echo Dot".to_string(),
        priority: Priority::Normal,
    };
    let outcome = check_item(&session, &resolver, &debug, &item, "amazon.ca").await;

    println!(
        "availability={} title={:?} price={:?} error={:?}",
        outcome.availability, outcome.title, outcome.price, outcome.error
    );
    // A live page must resolve one way or the other, or explain why not.
    assert!(outcome.availability != stockwatch_rs::Availability::Unknown || outcome.error.is_some());

    session.stop().await;
}
