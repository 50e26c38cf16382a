//! Per-item check orchestration.
//!
//! One call drives the whole flow for one product page: navigate, gate on
//! the HTTP status, wait for content, intercept challenges (at most three
//! in a row), then parse. Every failure is terminal for this check only and
//! never leaks to sibling items.

use std::time::Duration;

use async_trait::async_trait;
use chromiumoxide::Page;
use tracing::{info, warn};

use crate::challenges::ChallengeResolver;
use crate::config::ItemSpec;
use crate::debug::DebugCapture;
use crate::session::{pause_range, SessionController, SessionError};
use crate::stock::{self, Availability};

const CONTENT_MARKER: &str = "#productTitle";
const CONTENT_WAIT: Duration = Duration::from_secs(15);
const MAX_CHALLENGE_ENCOUNTERS: u32 = 3;

const ERR_RATE_LIMITED: &str = "challenge or rate limited (HTTP 503)";
const ERR_LOAD_TIMEOUT: &str = "page load timeout";
const ERR_PERSISTENT_CHALLENGE: &str = "persistent challenge after 3 attempts";
const ERR_UNDETERMINED: &str = "could not determine stock status (page structure may have changed)";

/// Result of checking one item once.
#[derive(Debug, Clone)]
pub struct CheckOutcome {
    pub id: String,
    pub url: String,
    pub availability: Availability,
    pub title: Option<String>,
    pub price: Option<String>,
    pub sold_by: Option<String>,
    pub error: Option<String>,
}

impl CheckOutcome {
    fn new(id: &str, url: &str) -> Self {
        Self {
            id: id.to_string(),
            url: url.to_string(),
            availability: Availability::Unknown,
            title: None,
            price: None,
            sold_by: None,
            error: None,
        }
    }

    /// A check is successful when it produced a determinable availability.
    pub fn ok(&self) -> bool {
        self.error.is_none()
    }
}

/// Navigate to the item's product page and determine stock status.
///
/// Challenge interstitials are dismissed transparently; the outcome always
/// comes back, carrying the error when the check could not complete.
pub async fn check_item(
    session: &SessionController,
    resolver: &ChallengeResolver,
    debug: &DebugCapture,
    item: &ItemSpec,
    domain: &str,
) -> CheckOutcome {
    let url = format!("https://www.{}/dp/{}", domain, item.id);
    let mut outcome = CheckOutcome::new(&item.id, &url);

    match run_check(session, resolver, debug, &mut outcome).await {
        Ok(()) => outcome,
        Err(err) => {
            outcome.error = Some(classify_error(&err));
            if let Ok(page) = session.page() {
                let message = outcome.error.clone().unwrap_or_default();
                debug.capture(page, &item.id, &message).await;
            }
            outcome
        }
    }
}

async fn run_check(
    session: &SessionController,
    resolver: &ChallengeResolver,
    debug: &DebugCapture,
    outcome: &mut CheckOutcome,
) -> Result<(), SessionError> {
    let status = session.navigate(&outcome.url).await?;
    let page = session.page()?;

    match status {
        Some(503) => {
            outcome.error = Some(ERR_RATE_LIMITED.to_string());
            debug.capture(page, &outcome.id, ERR_RATE_LIMITED).await;
            return Ok(());
        }
        Some(code) if code != 200 => {
            let message = format!("HTTP {code}");
            outcome.error = Some(message.clone());
            debug.capture(page, &outcome.id, &message).await;
            return Ok(());
        }
        // No main-document response surfaced; fall through to the content.
        _ => {}
    }

    wait_for_element(page, CONTENT_MARKER, CONTENT_WAIT).await;
    pause_range(0.5, 1.0).await;

    let url = outcome.url.clone();
    let id = outcome.id.clone();
    let mut gate = LiveChallengeGate {
        session,
        resolver,
        url: &url,
        id: &id,
    };
    if let Some(error) = intercept_challenges(&mut gate).await? {
        debug.capture(session.page()?, &outcome.id, &error).await;
        outcome.error = Some(error);
        return Ok(());
    }

    let page = session.page()?;
    let html = page.content().await?;
    let info = stock::inspect(&html);
    outcome.availability = info.availability;
    outcome.title = info.title;
    outcome.price = info.price;
    outcome.sold_by = info.sold_by;

    if outcome.availability == Availability::Unknown {
        outcome.error = Some(ERR_UNDETERMINED.to_string());
        debug.capture(page, &outcome.id, ERR_UNDETERMINED).await;
    }
    Ok(())
}

/// One challenge encounter on the current page: detect (and attempt to
/// dismiss), then reload for another look.
#[async_trait]
trait ChallengeGate {
    /// True when the current page was a challenge.
    async fn challenged(&mut self) -> Result<bool, SessionError>;
    /// Re-navigate to the item before the next look. `encounter` counts
    /// the challenges seen so far on this URL.
    async fn reload(&mut self, encounter: u32) -> Result<(), SessionError>;
}

struct LiveChallengeGate<'a> {
    session: &'a SessionController,
    resolver: &'a ChallengeResolver,
    url: &'a str,
    id: &'a str,
}

#[async_trait]
impl ChallengeGate for LiveChallengeGate<'_> {
    async fn challenged(&mut self) -> Result<bool, SessionError> {
        let page = self.session.page()?;
        Ok(self.resolver.resolve_if_challenge(page).await)
    }

    async fn reload(&mut self, encounter: u32) -> Result<(), SessionError> {
        if encounter == 1 {
            info!(id = %self.id, "re-navigating after challenge");
            pause_range(1.0, 3.0).await;
        } else {
            warn!(id = %self.id, "second consecutive challenge");
            pause_range(2.0, 4.0).await;
        }
        self.session.navigate(self.url).await?;
        pause_range(1.0, 2.0).await;
        Ok(())
    }
}

/// Detect-and-dismiss loop, at most three encounters on one URL.
///
/// Returns the terminal error when the third look still sees a challenge.
async fn intercept_challenges<G>(gate: &mut G) -> Result<Option<String>, SessionError>
where
    G: ChallengeGate + Send,
{
    for encounter in 1..=MAX_CHALLENGE_ENCOUNTERS {
        if !gate.challenged().await? {
            return Ok(None);
        }
        if encounter == MAX_CHALLENGE_ENCOUNTERS {
            return Ok(Some(ERR_PERSISTENT_CHALLENGE.to_string()));
        }
        gate.reload(encounter).await?;
    }
    Ok(None)
}

/// Poll for an element; absence is tolerated, the page may still be
/// parseable (a challenge page, for one).
async fn wait_for_element(page: &Page, selector: &str, timeout: Duration) {
    let deadline = tokio::time::Instant::now() + timeout;
    loop {
        if page.find_element(selector).await.is_ok() {
            return;
        }
        if tokio::time::Instant::now() >= deadline {
            return;
        }
        tokio::time::sleep(Duration::from_millis(250)).await;
    }
}

fn classify_error(err: &SessionError) -> String {
    if matches!(err, SessionError::NavigationTimeout(_))
        || err.to_string().to_lowercase().contains("timeout")
    {
        ERR_LOAD_TIMEOUT.to_string()
    } else {
        err.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Plays back a fixed detection sequence and records every reload.
    struct CannedGate {
        detections: Vec<bool>,
        looks: u32,
        reloads: Vec<u32>,
    }

    impl CannedGate {
        fn new(detections: &[bool]) -> Self {
            Self {
                detections: detections.to_vec(),
                looks: 0,
                reloads: Vec::new(),
            }
        }
    }

    #[async_trait]
    impl ChallengeGate for CannedGate {
        async fn challenged(&mut self) -> Result<bool, SessionError> {
            let detected = self.detections[self.looks as usize];
            self.looks += 1;
            Ok(detected)
        }

        async fn reload(&mut self, encounter: u32) -> Result<(), SessionError> {
            self.reloads.push(encounter);
            Ok(())
        }
    }

    #[tokio::test]
    async fn clean_page_skips_the_challenge_loop() {
        let mut gate = CannedGate::new(&[false]);
        let error = intercept_challenges(&mut gate).await.expect("no cdp error");
        assert_eq!(error, None);
        assert_eq!(gate.looks, 1);
        assert!(gate.reloads.is_empty());
    }

    #[tokio::test]
    async fn challenge_cleared_on_a_later_look_is_not_terminal() {
        let mut gate = CannedGate::new(&[true, true, false]);
        let error = intercept_challenges(&mut gate).await.expect("no cdp error");
        assert_eq!(error, None);
        assert_eq!(gate.looks, 3);
        assert_eq!(gate.reloads, [1, 2]);
    }

    #[tokio::test]
    async fn persistent_challenge_is_terminal_after_three_detections() {
        // A challenge on every look must stop at three, never a fourth.
        let mut gate = CannedGate::new(&[true, true, true, true, true]);
        let error = intercept_challenges(&mut gate).await.expect("no cdp error");
        assert_eq!(error.as_deref(), Some(ERR_PERSISTENT_CHALLENGE));
        assert_eq!(gate.looks, 3);
        assert_eq!(gate.reloads, [1, 2]);
    }

    #[test]
    fn outcome_without_error_is_ok() {
        let mut outcome = CheckOutcome::new("B000A", "https://www.amazon.ca/dp/B000A");
        assert!(outcome.ok());
        outcome.error = Some("HTTP 404".to_string());
        assert!(!outcome.ok());
    }

    #[test]
    fn timeouts_are_normalized() {
        let err = SessionError::NavigationTimeout(Duration::from_secs(30));
        assert_eq!(classify_error(&err), ERR_LOAD_TIMEOUT);

        let err = SessionError::Launch("connection Timeout while talking to chrome".to_string());
        assert_eq!(classify_error(&err), ERR_LOAD_TIMEOUT);
    }

    #[test]
    fn other_errors_keep_their_message() {
        let err = SessionError::Launch("chrome exited early".to_string());
        assert_eq!(classify_error(&err), "browser launch failed: chrome exited early");
    }
}
