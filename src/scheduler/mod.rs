//! The poll loop and its transition policies.
//!
//! Policies are free functions over plain values so every threshold is unit
//! testable; the scheduler itself just wires them to the session, the state
//! store, and the notifiers.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use rand::Rng;
use tracing::{error, info, warn};

use crate::challenges::ChallengeResolver;
use crate::checker::{check_item, CheckOutcome};
use crate::config::{Config, ItemSpec, Paths};
use crate::debug::DebugCapture;
use crate::notify::{self, Notifier};
use crate::session::{pause_range, SessionController};
use crate::state::StateManager;
use crate::stock::Availability;

/// Restock alert fires on the edge into in-stock; `Unknown` and the very
/// first observation both count as "was not in stock".
pub fn should_alert(previous: Availability, current: Availability) -> bool {
    current == Availability::InStock && previous != Availability::InStock
}

/// Rotate the browser context at every third consecutive error.
pub fn should_rotate(error_count: u32) -> bool {
    error_count >= 3 && error_count % 3 == 0
}

/// Escalation notice exactly at the fifth consecutive error, never again
/// for the same streak.
pub fn should_escalate(error_count: u32) -> bool {
    error_count == 5
}

/// Sleep between cycles: the priority tier's window plus ±15s jitter,
/// floored at a 10s safety minimum.
pub fn cycle_interval(config: &Config) -> Duration {
    let (base_min, base_max) = if config.has_high_priority() {
        (
            config.poll_high_priority_min_seconds,
            config.poll_high_priority_max_seconds,
        )
    } else {
        (
            config.poll_interval_min_seconds,
            config.poll_interval_max_seconds,
        )
    };

    // Validation rejects reversed windows at load time, but a config built
    // by hand may still carry one; sample over the ordered pair.
    let lo = base_min.min(base_max) as f64;
    let hi = base_min.max(base_max) as f64;

    let mut rng = rand::thread_rng();
    let jitter = rng.gen_range(-15.0..15.0);
    let interval = rng.gen_range(lo..=hi) + jitter;
    Duration::from_secs_f64(interval.max(10.0))
}

/// Sequential poll loop. One session, one page, one item at a time.
pub struct PollScheduler {
    config: Config,
    config_path: PathBuf,
    state: StateManager,
    session: SessionController,
    resolver: Arc<ChallengeResolver>,
    notifiers: Vec<Box<dyn Notifier>>,
    debug: DebugCapture,
    cycle: u64,
}

impl PollScheduler {
    pub fn new(
        config: Config,
        paths: &Paths,
        state: StateManager,
        session: SessionController,
        resolver: Arc<ChallengeResolver>,
        notifiers: Vec<Box<dyn Notifier>>,
    ) -> Self {
        Self {
            config,
            config_path: paths.config.clone(),
            state,
            session,
            resolver,
            notifiers,
            debug: DebugCapture::new(&paths.debug_dir),
            cycle: 0,
        }
    }

    /// Runs until interrupted, then tears the session down.
    pub async fn run(&mut self) {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => {
                info!("shutdown signal received");
            }
            _ = self.poll_forever() => {}
        }
        self.session.stop().await;
    }

    async fn poll_forever(&mut self) {
        loop {
            self.cycle += 1;
            self.reload_config();

            if self.cycle % self.config.warmup_every_n_cycles.max(1) == 0 {
                self.session.warmup().await;
                self.session.save_session().await;
            }

            let items = self.config.sorted_items();
            info!(cycle = self.cycle, items = items.len(), "cycle start");

            for item in &items {
                let outcome = check_item(
                    &self.session,
                    &self.resolver,
                    &self.debug,
                    item,
                    &self.config.amazon_domain,
                )
                .await;
                self.apply_outcome(item, &outcome).await;

                self.session.human_jitter().await;
                pause_range(2.0, 6.0).await;
            }

            self.session.save_session().await;

            let sleep_time = cycle_interval(&self.config);
            info!(seconds = sleep_time.as_secs(), "sleeping until next cycle");
            tokio::time::sleep(sleep_time).await;
        }
    }

    /// Hot reload; a broken file keeps the previous config for this cycle.
    fn reload_config(&mut self) {
        match Config::load(&self.config_path) {
            Ok(config) => {
                // Credentials may have changed with it.
                self.notifiers = notify::build_notifiers(&config);
                self.config = config;
            }
            Err(err) => error!(error = %err, "config reload failed, keeping previous"),
        }
    }

    async fn apply_outcome(&mut self, item: &ItemSpec, outcome: &CheckOutcome) {
        let previous = self.state.snapshot(&item.id).in_stock;

        if !outcome.ok() {
            let error = outcome.error.as_deref().unwrap_or("unknown error");
            warn!(id = %item.id, label = %item.label, error, "check failed");
            let error_count = self.state.record_error(&item.id);

            if should_escalate(error_count) {
                notify::notify_error(&self.notifiers, item, error, error_count).await;
            }
            if should_rotate(error_count) {
                if let Err(err) = self.session.rotate_context().await {
                    warn!(error = %err, "context rotation failed");
                }
            }
            return;
        }

        self.state
            .record_success(&item.id, outcome.availability, item.priority);

        if outcome.availability == Availability::InStock {
            info!(id = %item.id, label = %item.label, "IN STOCK");
            if should_alert(previous, outcome.availability) {
                notify::notify_restock(&self.notifiers, item, outcome).await;
                self.state.record_alert(&item.id);
            }
        } else {
            info!(id = %item.id, label = %item.label, "out of stock");
        }
    }
}
