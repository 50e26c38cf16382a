//! Browser session control.
//!
//! Owns the Chromium process and the single page everything else drives.
//! Encapsulates the DevTools protocol details so the rest of the crate never
//! touches raw CDP commands.

pub mod fingerprint;
pub mod stealth;

use std::sync::Arc;
use std::time::Duration;

use chromiumoxide::browser::{Browser, BrowserConfig};
use chromiumoxide::cdp::browser_protocol::emulation::{
    MediaFeature, SetDeviceMetricsOverrideParams, SetEmulatedMediaParams,
    SetLocaleOverrideParams, SetTimezoneOverrideParams,
};
use chromiumoxide::cdp::browser_protocol::input::{
    DispatchMouseEventParams, DispatchMouseEventType, MouseButton,
};
use chromiumoxide::cdp::browser_protocol::network::{
    EnableParams, Headers, SetExtraHttpHeadersParams, SetUserAgentOverrideParams,
};
use chromiumoxide::cdp::browser_protocol::page::AddScriptToEvaluateOnNewDocumentParams;
use chromiumoxide::Page;
use futures::StreamExt;
use rand::Rng;
use thiserror::Error;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::challenges::ChallengeResolver;
use crate::state::CookieStore;

pub use fingerprint::SessionFingerprint;

const NAV_TIMEOUT: Duration = Duration::from_secs(30);
const ROTATION_COOLDOWN_SECS: (f64, f64) = (30.0, 60.0);

#[derive(Debug, Error)]
pub enum SessionError {
    #[error("browser launch failed: {0}")]
    Launch(String),
    #[error("browser configuration invalid: {0}")]
    Config(String),
    #[error("devtools command failed: {0}")]
    Cdp(#[from] chromiumoxide::error::CdpError),
    #[error("page load timeout after {0:?}")]
    NavigationTimeout(Duration),
    #[error("session not started")]
    NotStarted,
}

/// Randomized sleep, uniform over `[min_secs, max_secs)`.
pub(crate) async fn pause_range(min_secs: f64, max_secs: f64) {
    let secs = rand::thread_rng().gen_range(min_secs..max_secs);
    tokio::time::sleep(Duration::from_secs_f64(secs)).await;
}

/// Launches Chromium, applies the fingerprint and stealth patches, and hands
/// out the one page the whole monitor drives. Rotation swaps the page and
/// fingerprint for fresh ones after a cooldown, carrying cookies across.
pub struct SessionController {
    domain: String,
    cookies: CookieStore,
    resolver: Arc<ChallengeResolver>,
    browser: Option<Browser>,
    handler_task: Option<JoinHandle<()>>,
    page: Option<Page>,
    fingerprint: Option<SessionFingerprint>,
}

impl SessionController {
    pub fn new(domain: String, cookies: CookieStore, resolver: Arc<ChallengeResolver>) -> Self {
        Self {
            domain,
            cookies,
            resolver,
            browser: None,
            handler_task: None,
            page: None,
            fingerprint: None,
        }
    }

    /// Launch the browser, build the first context, warm it up.
    pub async fn start(&mut self) -> Result<(), SessionError> {
        info!("launching chromium (headless)");
        let config = BrowserConfig::builder()
            .no_sandbox()
            .window_size(1920, 1080)
            .arg("--disable-blink-features=AutomationControlled")
            .arg("--disable-dev-shm-usage")
            .arg("--disable-infobars")
            .arg("--disable-extensions")
            .build()
            .map_err(SessionError::Config)?;

        let (browser, mut handler) = Browser::launch(config)
            .await
            .map_err(|err| SessionError::Launch(err.to_string()))?;
        // The handler stream must be drained for the whole browser lifetime.
        let handler_task = tokio::spawn(async move {
            while let Some(_event) = handler.next().await {}
        });

        self.browser = Some(browser);
        self.handler_task = Some(handler_task);

        self.create_context().await?;
        self.warmup().await;
        self.save_session().await;
        Ok(())
    }

    pub fn page(&self) -> Result<&Page, SessionError> {
        self.page.as_ref().ok_or(SessionError::NotStarted)
    }

    pub fn fingerprint(&self) -> Option<&SessionFingerprint> {
        self.fingerprint.as_ref()
    }

    /// New page with a fresh fingerprint, stealth patches, and restored
    /// cookies.
    async fn create_context(&mut self) -> Result<(), SessionError> {
        let browser = self.browser.as_ref().ok_or(SessionError::NotStarted)?;
        let fp = SessionFingerprint::random();

        let page = browser.new_page("about:blank").await?;
        page.execute(EnableParams::default()).await?;

        page.execute(
            SetUserAgentOverrideParams::builder()
                .user_agent(&fp.user_agent)
                .accept_language(fingerprint::ACCEPT_LANGUAGE)
                .platform(&fp.platform)
                .build()
                .map_err(SessionError::Config)?,
        )
        .await?;

        page.execute(
            SetDeviceMetricsOverrideParams::builder()
                .width(fp.viewport.0 as i64)
                .height(fp.viewport.1 as i64)
                .device_scale_factor(1.0)
                .mobile(false)
                .build()
                .map_err(SessionError::Config)?,
        )
        .await?;

        page.execute(SetTimezoneOverrideParams {
            timezone_id: fp.timezone.clone(),
        })
        .await?;
        page.execute(SetLocaleOverrideParams::builder().locale(&fp.locale).build())
            .await?;
        page.execute(SetEmulatedMediaParams {
            media: None,
            features: Some(vec![MediaFeature {
                name: "prefers-color-scheme".to_string(),
                value: "light".to_string(),
            }]),
        })
        .await?;

        let headers = Headers::new(serde_json::json!({
            "Accept-Language": fingerprint::ACCEPT_LANGUAGE,
            "DNT": "1",
            "Upgrade-Insecure-Requests": "1",
        }));
        page.execute(
            SetExtraHttpHeadersParams::builder()
                .headers(headers)
                .build()
                .map_err(SessionError::Config)?,
        )
        .await?;

        page.execute(AddScriptToEvaluateOnNewDocumentParams::new(
            stealth::STEALTH_JS,
        ))
        .await?;

        self.cookies.restore(&page).await;

        info!(
            user_agent = %fp.user_agent,
            width = fp.viewport.0,
            height = fp.viewport.1,
            "new browser context"
        );
        self.fingerprint = Some(fp);
        self.page = Some(page);
        Ok(())
    }

    /// Discard the current context and build a fresh one after a cooldown.
    /// Used when the site starts blocking the current session.
    pub async fn rotate_context(&mut self) -> Result<(), SessionError> {
        info!("rotating browser context");
        self.save_session().await;

        if let Some(page) = self.page.take() {
            if let Err(err) = page.close().await {
                warn!(error = %err, "failed to close page during rotation");
            }
        }

        let cooldown = {
            let (min, max) = ROTATION_COOLDOWN_SECS;
            rand::thread_rng().gen_range(min..max)
        };
        info!(seconds = cooldown as u64, "cooling down before new context");
        tokio::time::sleep(Duration::from_secs_f64(cooldown)).await;

        self.create_context().await?;
        self.warmup().await;
        self.save_session().await;
        Ok(())
    }

    /// Browse the storefront homepage with some human-looking input so the
    /// session has history before real checks begin. Every step is
    /// best-effort.
    pub async fn warmup(&self) {
        let Some(page) = self.page.as_ref() else {
            return;
        };
        info!(domain = %self.domain, "warming up session");

        let url = format!("https://www.{}/", self.domain);
        if let Err(err) = self.navigate(&url).await {
            warn!(error = %err, "warmup navigation failed (non-fatal)");
            return;
        }
        pause_range(1.5, 3.0).await;

        if self.resolver.resolve_if_challenge(page).await {
            info!("handled challenge during warmup");
            pause_range(1.0, 2.0).await;
        }

        let (x, y) = {
            let mut rng = rand::thread_rng();
            (rng.gen_range(100..800) as f64, rng.gen_range(200..600) as f64)
        };
        if let Err(err) = move_pointer(page, x, y).await {
            debug!(error = %err, "warmup pointer move failed");
        }
        pause_range(0.5, 1.5).await;

        let delta = rand::thread_rng().gen_range(200..500) as f64;
        if let Err(err) = scroll_wheel(page, delta).await {
            debug!(error = %err, "warmup scroll failed");
        }
        pause_range(1.0, 2.0).await;
        info!("warmup complete");
    }

    /// Navigate the page and report the main document's HTTP status, when
    /// the protocol surfaced one.
    pub async fn navigate(&self, url: &str) -> Result<Option<u16>, SessionError> {
        let page = self.page()?;
        let request = tokio::time::timeout(NAV_TIMEOUT, async {
            page.goto(url).await?;
            page.wait_for_navigation_response().await
        })
        .await
        .map_err(|_| SessionError::NavigationTimeout(NAV_TIMEOUT))??;

        Ok(request.and_then(|req| req.response.as_ref().map(|resp| resp.status as u16)))
    }

    /// Small random pointer or scroll movement between checks.
    pub async fn human_jitter(&self) {
        let Some(page) = self.page.as_ref() else {
            return;
        };
        let (roll, x, y, delta) = {
            let mut rng = rand::thread_rng();
            (
                rng.gen::<f64>(),
                rng.gen_range(50..900) as f64,
                rng.gen_range(100..700) as f64,
                rng.gen_range(-200..400) as f64,
            )
        };
        let result = if roll < 0.3 {
            move_pointer(page, x, y).await
        } else if roll < 0.5 {
            scroll_wheel(page, delta).await
        } else {
            Ok(())
        };
        if let Err(err) = result {
            debug!(error = %err, "jitter input failed");
        }
    }

    /// Persist the cookie jar.
    pub async fn save_session(&self) {
        if let Some(page) = self.page.as_ref() {
            self.cookies.save(page).await;
        }
    }

    /// Orderly teardown; every step independently non-fatal.
    pub async fn stop(&mut self) {
        self.save_session().await;
        if let Some(page) = self.page.take() {
            if let Err(err) = page.close().await {
                warn!(error = %err, "error closing page during shutdown");
            }
        }
        if let Some(mut browser) = self.browser.take() {
            if let Err(err) = browser.close().await {
                warn!(error = %err, "error closing browser during shutdown");
            }
            if let Err(err) = browser.wait().await {
                debug!(error = %err, "browser process wait failed");
            }
        }
        if let Some(task) = self.handler_task.take() {
            task.abort();
        }
        self.fingerprint = None;
    }
}

async fn move_pointer(page: &Page, x: f64, y: f64) -> Result<(), SessionError> {
    let event = DispatchMouseEventParams::builder()
        .r#type(DispatchMouseEventType::MouseMoved)
        .x(x)
        .y(y)
        .build()
        .map_err(SessionError::Config)?;
    page.execute(event).await?;
    Ok(())
}

async fn scroll_wheel(page: &Page, delta_y: f64) -> Result<(), SessionError> {
    let event = DispatchMouseEventParams::builder()
        .r#type(DispatchMouseEventType::MouseWheel)
        .x(500.0)
        .y(400.0)
        .button(MouseButton::None)
        .delta_x(0.0)
        .delta_y(delta_y)
        .build()
        .map_err(SessionError::Config)?;
    page.execute(event).await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn page_access_before_start_is_an_error() {
        let controller = SessionController::new(
            "amazon.ca".to_string(),
            CookieStore::new("/tmp/does-not-matter.json"),
            Arc::new(ChallengeResolver::new()),
        );
        assert!(matches!(controller.page(), Err(SessionError::NotStarted)));
        assert!(controller.fingerprint().is_none());
    }

    #[tokio::test]
    async fn pause_range_sleeps_within_bounds() {
        let started = tokio::time::Instant::now();
        pause_range(0.01, 0.02).await;
        let elapsed = started.elapsed();
        assert!(elapsed >= Duration::from_millis(10));
        assert!(elapsed < Duration::from_millis(500));
    }
}
