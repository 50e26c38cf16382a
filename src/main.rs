//! Monitor entry point: load config, launch the browser, run the poll loop.

use std::sync::Arc;

use tracing::{error, info};
use tracing_subscriber::EnvFilter;

use stockwatch_rs::{
    build_notifiers, notify, ChallengeResolver, Config, CookieStore, Paths, PollScheduler,
    SessionController, StateManager,
};

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let paths = Paths::from_env();
    info!(version = stockwatch_rs::VERSION, "stockwatch starting");

    let config = match Config::load(&paths.config) {
        Ok(config) => config,
        Err(err) => {
            error!(error = %err, path = %paths.config.display(), "cannot load config");
            std::process::exit(1);
        }
    };

    let state = StateManager::load(&paths.state);
    let cookies = CookieStore::new(&paths.cookies);
    let resolver = Arc::new(ChallengeResolver::new());
    let mut session = SessionController::new(
        config.amazon_domain.clone(),
        cookies,
        Arc::clone(&resolver),
    );

    if let Err(err) = session.start().await {
        error!(error = %err, "browser launch failed");
        std::process::exit(1);
    }

    let items = config.sorted_items();
    info!(
        items = items.len(),
        domain = %config.amazon_domain,
        "monitoring started"
    );
    let notifiers = build_notifiers(&config);
    notify::notify_startup(&notifiers, &items, &config.amazon_domain).await;

    let mut scheduler =
        PollScheduler::new(config, &paths, state, session, resolver, notifiers);
    scheduler.run().await;

    info!("shutdown complete");
}
