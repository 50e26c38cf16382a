//! Image puzzle challenge. Solving one needs an external captcha service;
//! until that integration exists this strategy recognizes nothing and never
//! solves, keeping the registry slot and the wiring in place.

use async_trait::async_trait;
use chromiumoxide::Page;
use tracing::warn;

use super::ChallengeStrategy;

pub struct PuzzleChallengeStrategy;

#[async_trait]
impl ChallengeStrategy for PuzzleChallengeStrategy {
    fn name(&self) -> &'static str {
        "puzzle"
    }

    fn detect(&self, _html: &str) -> bool {
        false
    }

    async fn solve(&self, _page: &Page) -> bool {
        warn!("image puzzle challenge detected but no solving service is configured");
        false
    }
}
