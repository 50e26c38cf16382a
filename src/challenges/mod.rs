//! Challenge interception.
//!
//! Each submodule implements one strategy for an interstitial the storefront
//! uses to block automated traffic. The resolver tries strategies in fixed
//! order, most common first.

pub mod puzzle;
pub mod soft;

use async_trait::async_trait;
use chromiumoxide::Page;
use tracing::{debug, warn};

pub use puzzle::PuzzleChallengeStrategy;
pub use soft::SoftChallengeStrategy;

/// One way of recognizing and dismissing a challenge interstitial.
///
/// Detection is a pure function over the page HTML so it can run (and be
/// tested) without a live browser; solving gets the page.
#[async_trait]
pub trait ChallengeStrategy: Send + Sync {
    fn name(&self) -> &'static str;

    /// Does this strategy recognize a challenge in the given markup?
    fn detect(&self, html: &str) -> bool;

    /// Attempt to dismiss the challenge. Returns true on apparent success.
    async fn solve(&self, page: &Page) -> bool;
}

/// Fixed-order strategy registry.
pub struct ChallengeResolver {
    strategies: Vec<Box<dyn ChallengeStrategy>>,
}

impl ChallengeResolver {
    pub fn new() -> Self {
        Self {
            strategies: vec![
                Box::new(SoftChallengeStrategy),
                Box::new(PuzzleChallengeStrategy),
            ],
        }
    }

    /// True if any strategy recognizes a challenge in the markup.
    pub fn detect(&self, html: &str) -> bool {
        self.strategies.iter().any(|s| s.detect(html))
    }

    /// Checks the current page for a challenge and attempts to dismiss it.
    ///
    /// Returns true whenever a challenge was *detected*, solved or not.
    /// Callers re-inspect the page themselves, so "we hit a challenge" is
    /// the useful signal; an unsolved one just stays detected next time.
    pub async fn resolve_if_challenge(&self, page: &Page) -> bool {
        let html = match page.content().await {
            Ok(html) => html,
            Err(err) => {
                debug!(error = %err, "could not snapshot page for challenge detection");
                return false;
            }
        };
        for strategy in &self.strategies {
            if strategy.detect(&html) {
                let solved = strategy.solve(page).await;
                if !solved {
                    warn!(strategy = strategy.name(), "challenge detected but not dismissed");
                }
                return true;
            }
        }
        false
    }
}

impl Default for ChallengeResolver {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn resolver_detects_via_any_strategy() {
        let resolver = ChallengeResolver::new();
        let challenge = r#"<html><body>
            <form action="/errors/validateCaptcha" method="get"></form>
        </body></html>"#;
        assert!(resolver.detect(challenge));
        assert!(!resolver.detect("<html><body><p>product page</p></body></html>"));
    }

    #[test]
    fn soft_strategy_is_tried_first() {
        let resolver = ChallengeResolver::new();
        assert_eq!(resolver.strategies[0].name(), "soft");
        assert_eq!(resolver.strategies[1].name(), "puzzle");
    }
}
