//! End-to-end transition behavior over canned page snapshots: detection
//! feeding the state store and the alert/rotation/escalation policies,
//! exactly as the poll loop wires them, minus the browser.

use stockwatch_rs::scheduler::{should_alert, should_escalate, should_rotate};
use stockwatch_rs::stock;
use stockwatch_rs::{Availability, ChallengeResolver, Priority, StateManager};

const IN_STOCK_PAGE: &str = r#"<html><body>
    <span id="productTitle">Widget Deluxe 3000</span>
    <span class="a-price-whole">54.</span><span class="a-price-fraction">99</span>
    <input id="add-to-cart-button" value="Add to Cart">
    <div id="merchant-info">Ships from and sold by Amazon.ca</div>
</body></html>"#;

const OUT_OF_STOCK_PAGE: &str = r#"<html><body>
    <span id="productTitle">Widget Deluxe 3000</span>
    <div id="availability"><span>Currently unavailable.</span></div>
</body></html>"#;

const CHALLENGE_PAGE: &str = r#"<html><body>
    <h4>Enter the characters you see below</h4>
    <form method="get" action="/errors/validateCaptcha">
        <button type="submit" class="a-button-text">Continue shopping</button>
    </form>
</body></html>"#;

#[test]
fn restock_edge_alerts_exactly_once() {
    let dir = tempfile::tempdir().expect("tempdir");
    let mut state = StateManager::load(dir.path().join("state.json"));
    let pages = [
        OUT_OF_STOCK_PAGE,
        OUT_OF_STOCK_PAGE,
        IN_STOCK_PAGE,
        IN_STOCK_PAGE,
        IN_STOCK_PAGE,
    ];

    let mut alerts = 0;
    for page in pages {
        let info = stock::inspect(page);
        let previous = state.snapshot("B000A").in_stock;
        state.record_success("B000A", info.availability, Priority::High);
        if should_alert(previous, info.availability) {
            alerts += 1;
            state.record_alert("B000A");
        }
    }

    assert_eq!(alerts, 1);
    assert!(state.snapshot("B000A").last_alert.is_some());
}

#[test]
fn restock_state_survives_a_restart_without_realerting() {
    let dir = tempfile::tempdir().expect("tempdir");
    let path = dir.path().join("state.json");

    {
        let mut state = StateManager::load(&path);
        let info = stock::inspect(IN_STOCK_PAGE);
        let previous = state.snapshot("B000A").in_stock;
        state.record_success("B000A", info.availability, Priority::Normal);
        assert!(should_alert(previous, info.availability));
    }

    // Fresh process, same file: the item is already known in stock.
    let mut state = StateManager::load(&path);
    let info = stock::inspect(IN_STOCK_PAGE);
    let previous = state.snapshot("B000A").in_stock;
    state.record_success("B000A", info.availability, Priority::Normal);
    assert!(!should_alert(previous, info.availability));
}

#[test]
fn challenge_pages_are_recognized_before_parsing() {
    let resolver = ChallengeResolver::new();
    assert!(resolver.detect(CHALLENGE_PAGE));
    assert!(!resolver.detect(IN_STOCK_PAGE));
    assert!(!resolver.detect(OUT_OF_STOCK_PAGE));

    // A challenge page carries no purchase controls or stock phrases.
    assert_eq!(
        stock::inspect(CHALLENGE_PAGE).availability,
        Availability::Unknown
    );
}

#[test]
fn error_streak_crosses_escalation_then_keeps_rotating() {
    let dir = tempfile::tempdir().expect("tempdir");
    let mut state = StateManager::load(dir.path().join("state.json"));

    let mut fired = Vec::new();
    for _ in 0..12 {
        let count = state.record_error("B000A");
        if should_escalate(count) {
            fired.push(format!("escalate@{count}"));
        }
        if should_rotate(count) {
            fired.push(format!("rotate@{count}"));
        }
    }
    assert_eq!(
        fired,
        ["rotate@3", "escalate@5", "rotate@6", "rotate@9", "rotate@12"]
    );

    // A success clears the streak; the next failure starts from one.
    state.record_success("B000A", Availability::OutOfStock, Priority::Normal);
    assert_eq!(state.record_error("B000A"), 1);
}

#[test]
fn undetermined_pages_do_not_disturb_known_state() {
    let dir = tempfile::tempdir().expect("tempdir");
    let mut state = StateManager::load(dir.path().join("state.json"));

    state.record_success("B000A", Availability::InStock, Priority::Normal);

    // A blank or mangled page resolves to unknown and is treated as an
    // error by the orchestrator, so the stored availability is untouched.
    let info = stock::inspect("<html><body><p>oops</p></body></html>");
    assert_eq!(info.availability, Availability::Unknown);
    state.record_error("B000A");

    assert_eq!(state.snapshot("B000A").in_stock, Availability::InStock);
}
