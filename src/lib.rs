//! # stockwatch-rs
//!
//! Headless-browser stock availability monitor. Drives a real Chromium over
//! the DevTools protocol with anti-detection fingerprinting, dismisses
//! anti-bot interstitials, detects tri-state stock status from rendered
//! product pages, and pushes restock alerts the moment an item flips from
//! not-in-stock to in-stock.
//!
//! ## Example
//!
//! ```no_run
//! use std::sync::Arc;
//! use stockwatch_rs::{ChallengeResolver, CookieStore, SessionController};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let resolver = Arc::new(ChallengeResolver::new());
//!     let cookies = CookieStore::new("cookies.json");
//!     let mut session = SessionController::new("amazon.ca".into(), cookies, resolver);
//!     session.start().await?;
//!     let status = session.navigate("https://www.amazon.ca/dp/B000EXAMPLE").await?;
//!     println!("status: {status:?}");
//!     session.stop().await;
//!     Ok(())
//! }
//! ```

pub mod challenges;
pub mod checker;
pub mod config;
pub mod debug;
pub mod notify;
pub mod scheduler;
pub mod session;
pub mod state;
pub mod stock;

pub use crate::challenges::{ChallengeResolver, ChallengeStrategy};
pub use crate::checker::{check_item, CheckOutcome};
pub use crate::config::{Config, ConfigError, ItemSpec, Paths, Priority};
pub use crate::debug::DebugCapture;
pub use crate::notify::{build_notifiers, Notifier, NotifyError};
pub use crate::scheduler::PollScheduler;
pub use crate::session::{SessionController, SessionError, SessionFingerprint};
pub use crate::state::{CookieStore, ItemState, StateManager};
pub use crate::stock::{Availability, StockInfo};

/// Crate version, exposed for startup logging.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
