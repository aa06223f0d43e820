use anyhow::{Context, anyhow};
use async_trait::async_trait;
use headless_chrome::{Browser, LaunchOptions, Tab};
use serde::{Deserialize, Serialize};
use std::ffi::OsStr;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};
use url::Url;

use crate::config::ConfigError;
use crate::http::run_blocking;
use crate::{AssistantError, Result};

const SETTLE_POLL_INTERVAL: Duration = Duration::from_millis(100);

/// Configuration for the product search session
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct BrowserConfig {
    /// Catalog page hosting the search box
    pub landing_url: String,
    /// CSS selector of the search input
    pub search_selector: String,
    /// Whether to run the browser in headless mode
    pub headless: bool,
    /// Timeout for page navigation in seconds
    pub navigation_timeout_seconds: u64,
    /// How long to wait for the search to leave the landing page
    pub settle_timeout_ms: u64,
    /// Pause after capturing the result URL, before the session closes
    pub release_delay_ms: u64,
    pub window_width: u32,
    pub window_height: u32,
    /// Additional Chrome arguments
    pub chrome_args: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub user_agent: Option<String>,
}

impl Default for BrowserConfig {
    #[inline]
    fn default() -> Self {
        Self {
            landing_url: "https://www.partselect.com/Dishwasher-Parts.htm".to_string(),
            search_selector: "input.js-headerNavSearch".to_string(),
            headless: true,
            navigation_timeout_seconds: 30,
            settle_timeout_ms: 5000,
            release_delay_ms: 2000,
            window_width: 1280,
            window_height: 720,
            chrome_args: vec![
                "--no-sandbox".to_string(),
                "--disable-dev-shm-usage".to_string(),
                "--disable-gpu".to_string(),
                "--disable-extensions".to_string(),
            ],
            user_agent: None,
        }
    }
}

impl BrowserConfig {
    /// Validate the browser configuration
    #[inline]
    pub fn validate(&self) -> std::result::Result<(), ConfigError> {
        crate::crawler::validate_url(&self.landing_url)
            .map_err(|_| ConfigError::InvalidUrl(self.landing_url.clone()))?;

        if self.search_selector.trim().is_empty() {
            return Err(ConfigError::EmptyField("search_selector"));
        }

        if self.navigation_timeout_seconds == 0 || self.navigation_timeout_seconds > 300 {
            return Err(ConfigError::InvalidBrowserTimeout(
                self.navigation_timeout_seconds,
            ));
        }

        if !(100..=60_000).contains(&self.settle_timeout_ms) {
            return Err(ConfigError::InvalidSettleTimeout(self.settle_timeout_ms));
        }

        if !(100..=4000).contains(&self.window_width) || !(100..=4000).contains(&self.window_height)
        {
            return Err(ConfigError::InvalidWindowDimensions(
                self.window_width,
                self.window_height,
            ));
        }

        Ok(())
    }

    /// Set the navigation timeout
    #[inline]
    pub fn set_navigation_timeout(&mut self, timeout_seconds: u64) -> std::result::Result<(), ConfigError> {
        if timeout_seconds == 0 || timeout_seconds > 300 {
            return Err(ConfigError::InvalidBrowserTimeout(timeout_seconds));
        }
        self.navigation_timeout_seconds = timeout_seconds;
        Ok(())
    }

    /// Set the settle timeout
    #[inline]
    pub fn set_settle_timeout(&mut self, timeout_ms: u64) -> std::result::Result<(), ConfigError> {
        if !(100..=60_000).contains(&timeout_ms) {
            return Err(ConfigError::InvalidSettleTimeout(timeout_ms));
        }
        self.settle_timeout_ms = timeout_ms;
        Ok(())
    }

    #[inline]
    pub fn navigation_timeout(&self) -> Duration {
        Duration::from_secs(self.navigation_timeout_seconds)
    }
}

/// Resolves a keyword to the product page the site's search lands on
#[async_trait]
pub trait PageLocator: Send + Sync {
    async fn locate(&self, keyword: &str) -> Result<Url>;
}

/// A launched browser and its tab, closed when dropped
struct BrowserSession {
    _browser: Browser,
    tab: Arc<Tab>,
}

impl BrowserSession {
    fn launch(config: &BrowserConfig) -> anyhow::Result<Self> {
        let args: Vec<&OsStr> = config.chrome_args.iter().map(OsStr::new).collect();
        let launch_options = LaunchOptions {
            headless: config.headless,
            window_size: Some((config.window_width, config.window_height)),
            args,
            idle_browser_timeout: config.navigation_timeout() * 2,
            ..Default::default()
        };

        let browser =
            Browser::new(launch_options).with_context(|| "Failed to launch browser instance")?;
        let tab = browser
            .new_tab()
            .with_context(|| "Failed to create new browser tab")?;
        tab.set_default_timeout(config.navigation_timeout());

        if let Some(user_agent) = &config.user_agent {
            tab.set_user_agent(user_agent, None, None)
                .with_context(|| "Failed to set user agent")?;
        }

        debug!("Browser session launched");
        Ok(Self {
            _browser: browser,
            tab,
        })
    }
}

impl Drop for BrowserSession {
    #[inline]
    fn drop(&mut self) {
        if let Err(e) = self.tab.close(true) {
            warn!("Failed to close browser tab: {}", e);
        }
        debug!("Browser session released");
    }
}

/// Whether the tab has moved off the landing page
fn has_left(current: &str, landing: &str) -> bool {
    let normalize = |raw: &str| raw.split('#').next().unwrap_or(raw).trim_end_matches('/').to_string();
    !current.is_empty() && current != "about:blank" && normalize(current) != normalize(landing)
}

/// Parse the URL the search landed on, rejecting non-web pages
fn resolved_url(raw: &str) -> anyhow::Result<Url> {
    crate::crawler::validate_url(raw).with_context(|| format!("Search landed on an unusable page: {}", raw))
}

/// Page locator driving a real Chrome session per lookup
#[derive(Debug, Clone)]
pub struct ChromeLocator {
    config: BrowserConfig,
}

impl ChromeLocator {
    #[inline]
    pub fn new(config: BrowserConfig) -> Self {
        Self { config }
    }

    fn locate_blocking(config: &BrowserConfig, keyword: &str) -> anyhow::Result<Url> {
        let session = BrowserSession::launch(config)?;
        let tab = &session.tab;

        debug!("Navigating to landing page: {}", config.landing_url);
        tab.navigate_to(&config.landing_url)
            .with_context(|| format!("Failed to navigate to {}", config.landing_url))?;
        tab.wait_until_navigated()
            .with_context(|| format!("Navigation to {} did not complete", config.landing_url))?;

        let landing = tab.get_url();
        let input = tab
            .wait_for_element(&config.search_selector)
            .with_context(|| format!("Search input '{}' not found", config.search_selector))?;
        input
            .click()
            .with_context(|| "Failed to focus search input")?;
        tab.type_str(keyword)
            .with_context(|| "Failed to type search keyword")?;
        tab.press_key("Enter")
            .with_context(|| "Failed to submit search")?;

        let settle_timeout = Duration::from_millis(config.settle_timeout_ms);
        let deadline = Instant::now() + settle_timeout;
        while !has_left(&tab.get_url(), &landing) {
            if Instant::now() >= deadline {
                return Err(anyhow!(
                    "Search for '{}' did not leave the landing page within {:?}",
                    keyword,
                    settle_timeout
                ));
            }
            std::thread::sleep(SETTLE_POLL_INTERVAL);
        }

        tab.wait_until_navigated()
            .with_context(|| "Search result navigation did not complete")?;
        let url = resolved_url(&tab.get_url())?;

        std::thread::sleep(Duration::from_millis(config.release_delay_ms));
        Ok(url)
    }
}

impl Default for ChromeLocator {
    #[inline]
    fn default() -> Self {
        Self::new(BrowserConfig::default())
    }
}

#[async_trait]
impl PageLocator for ChromeLocator {
    async fn locate(&self, keyword: &str) -> Result<Url> {
        let start_time = Instant::now();
        let config = self.config.clone();
        let keyword_owned = keyword.to_string();

        let url = run_blocking(move || Self::locate_blocking(&config, &keyword_owned))
            .await
            .map_err(|e| AssistantError::BrowserAutomation(format!("{:#}", e)))?;

        info!(
            "Located '{}' at {} (took {:?})",
            keyword,
            url,
            start_time.elapsed()
        );
        Ok(url)
    }
}

#[cfg(test)]
mod tests;
