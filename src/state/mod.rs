//! Durable state: per-item transition records and browser cookies.
//!
//! Both stores are plain JSON files flushed synchronously after every
//! mutation, so the monitor survives restarts without re-alerting on stock
//! it already knew about.

use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};

use chromiumoxide::cdp::browser_protocol::network::CookieParam;
use chromiumoxide::Page;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, error, info, warn};

use crate::config::Priority;
use crate::stock::Availability;

/// One durable record per watched item.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ItemState {
    #[serde(default)]
    pub in_stock: Availability,
    #[serde(default)]
    pub consecutive_errors: u32,
    #[serde(default)]
    pub priority: Priority,
    #[serde(default)]
    pub last_checked: Option<DateTime<Utc>>,
    #[serde(default)]
    pub last_alert: Option<DateTime<Utc>>,
}

/// Owns the item-state file. Single writer; every mutation flushes.
#[derive(Debug)]
pub struct StateManager {
    path: PathBuf,
    items: HashMap<String, ItemState>,
}

impl StateManager {
    /// Loads existing records. A missing or unreadable file starts empty
    /// rather than aborting the monitor.
    pub fn load(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let mut items = HashMap::new();
        if path.exists() {
            match fs::read_to_string(&path) {
                Ok(raw) => match serde_json::from_str::<HashMap<String, ItemState>>(&raw) {
                    Ok(parsed) => {
                        info!(count = parsed.len(), "loaded item state");
                        items = parsed;
                    }
                    Err(err) => warn!(error = %err, "failed to parse state file, starting fresh"),
                },
                Err(err) => warn!(error = %err, "failed to read state file, starting fresh"),
            }
        }
        Self { path, items }
    }

    fn flush(&self) {
        let serialized = match serde_json::to_string_pretty(&self.items) {
            Ok(s) => s,
            Err(err) => {
                error!(error = %err, "failed to serialize state");
                return;
            }
        };
        if let Err(err) = fs::write(&self.path, serialized) {
            error!(error = %err, path = %self.path.display(), "failed to write state");
        }
    }

    /// Copy of the record as it stands, defaulting for unseen identifiers.
    /// Callers use this to capture the pre-check value for edge detection.
    pub fn snapshot(&self, id: &str) -> ItemState {
        self.items.get(id).cloned().unwrap_or_default()
    }

    /// Successful check: error streak resets, availability and priority are
    /// refreshed. Returns the updated record.
    pub fn record_success(
        &mut self,
        id: &str,
        availability: Availability,
        priority: Priority,
    ) -> ItemState {
        let entry = self.items.entry(id.to_string()).or_default();
        entry.consecutive_errors = 0;
        entry.in_stock = availability;
        entry.priority = priority;
        entry.last_checked = Some(Utc::now());
        let updated = entry.clone();
        self.flush();
        updated
    }

    /// Failed check: streak grows. Returns the new count.
    pub fn record_error(&mut self, id: &str) -> u32 {
        let entry = self.items.entry(id.to_string()).or_default();
        entry.consecutive_errors += 1;
        let count = entry.consecutive_errors;
        self.flush();
        count
    }

    pub fn record_alert(&mut self, id: &str) {
        let entry = self.items.entry(id.to_string()).or_default();
        entry.last_alert = Some(Utc::now());
        self.flush();
    }
}

/// Saves and restores the browser's cookie jar wholesale.
///
/// Cookies are serialized exactly as the DevTools protocol reports them and
/// fed back as set-cookie parameters; the two schemas overlap on every field
/// that matters and extra fields are ignored on the way back in.
#[derive(Debug, Clone)]
pub struct CookieStore {
    path: PathBuf,
}

impl CookieStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Best-effort: a failed save costs continuity, not correctness.
    pub async fn save(&self, page: &Page) {
        let cookies = match page.get_cookies().await {
            Ok(cookies) => cookies,
            Err(err) => {
                warn!(error = %err, "failed to read cookies from browser");
                return;
            }
        };
        match serde_json::to_string_pretty(&cookies) {
            Ok(serialized) => {
                if let Err(err) = fs::write(&self.path, serialized) {
                    warn!(error = %err, "failed to write cookie file");
                } else {
                    debug!(count = cookies.len(), "saved cookies");
                }
            }
            Err(err) => warn!(error = %err, "failed to serialize cookies"),
        }
    }

    pub async fn restore(&self, page: &Page) {
        if !self.path.exists() {
            return;
        }
        let raw = match fs::read_to_string(&self.path) {
            Ok(raw) => raw,
            Err(err) => {
                warn!(error = %err, "failed to read cookie file");
                return;
            }
        };
        let cookies: Vec<CookieParam> = match serde_json::from_str(&raw) {
            Ok(cookies) => cookies,
            Err(err) => {
                warn!(error = %err, "failed to parse cookie file");
                return;
            }
        };
        let count = cookies.len();
        match page.set_cookies(cookies).await {
            Ok(_) => info!(count, "restored cookies from disk"),
            Err(err) => warn!(error = %err, "failed to restore cookies"),
        }
    }
}
