//! Per-context fingerprint pools.
//!
//! Every fresh context draws a viewport and user agent at random; locale and
//! timezone stay pinned so the session looks like one consistent shopper.

use rand::seq::SliceRandom;

pub const VIEWPORTS: [(u32, u32); 5] = [
    (1920, 1080),
    (1536, 864),
    (1440, 900),
    (1366, 768),
    (2560, 1440),
];

pub const USER_AGENTS: [&str; 6] = [
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/125.0.0.0 Safari/537.36",
    "Mozilla/5.0 (Macintosh; Intel Mac OS X 14_5) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/125.0.0.0 Safari/537.36",
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64; rv:126.0) Gecko/20100101 Firefox/126.0",
    "Mozilla/5.0 (X11; Linux x86_64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/125.0.0.0 Safari/537.36",
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/124.0.0.0 Safari/537.36 Edg/124.0.0.0",
    "Mozilla/5.0 (Macintosh; Intel Mac OS X 14.5; rv:126.0) Gecko/20100101 Firefox/126.0",
];

pub const LOCALE: &str = "en-US";
pub const TIMEZONE: &str = "America/Toronto";
pub const ACCEPT_LANGUAGE: &str = "en-US,en;q=0.9";

/// The signals one browser context presents to the site.
#[derive(Debug, Clone)]
pub struct SessionFingerprint {
    pub viewport: (u32, u32),
    pub user_agent: String,
    pub platform: String,
    pub locale: String,
    pub timezone: String,
}

impl SessionFingerprint {
    pub fn random() -> Self {
        let mut rng = rand::thread_rng();
        let viewport = *VIEWPORTS.choose(&mut rng).unwrap_or(&(1920, 1080));
        let user_agent = USER_AGENTS
            .choose(&mut rng)
            .copied()
            .unwrap_or(USER_AGENTS[0])
            .to_string();
        let platform = platform_for(&user_agent);
        Self {
            viewport,
            user_agent,
            platform,
            locale: LOCALE.to_string(),
            timezone: TIMEZONE.to_string(),
        }
    }
}

/// `navigator.platform` value matching the OS claimed by the user agent.
fn platform_for(user_agent: &str) -> String {
    if user_agent.contains("Windows") {
        "Win32"
    } else if user_agent.contains("Macintosh") {
        "MacIntel"
    } else {
        "Linux x86_64"
    }
    .to_string()
}
