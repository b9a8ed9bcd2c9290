//! Shared headless Chromium session for the DOM sources.

use crate::config::BrowserSettings;
use crate::domain::ports::{BrowserSession, PageHandle};
use crate::utils::error::{Result, ScoutError};
use async_trait::async_trait;
use chromiumoxide::browser::{Browser, BrowserConfig};
use chromiumoxide::cdp::browser_protocol::network::SetUserAgentOverrideParams;
use chromiumoxide::page::Page;
use futures::StreamExt;
use std::time::Duration;
use tokio::sync::{Mutex, OnceCell};

const POLL_INTERVAL: Duration = Duration::from_millis(250);

fn browser_error(context: &str, e: impl std::fmt::Display) -> ScoutError {
    ScoutError::BrowserError {
        message: format!("{}: {}", context, e),
    }
}

/// Launches Chromium on first use and hands out one tab per fetch. Runs
/// that only hit API sources never start a browser.
pub struct ChromiumBrowser {
    settings: BrowserSettings,
    browser: OnceCell<Mutex<Browser>>,
}

impl ChromiumBrowser {
    pub fn new(settings: BrowserSettings) -> Self {
        Self {
            settings,
            browser: OnceCell::new(),
        }
    }

    async fn launch(&self) -> Result<Mutex<Browser>> {
        let mut builder = BrowserConfig::builder();
        if let Some(path) = &self.settings.chrome_path {
            builder = builder.chrome_executable(path);
        }
        if !self.settings.headless.unwrap_or(true) {
            builder = builder.with_head();
        }

        let config = builder
            .arg("--disable-gpu")
            .arg("--no-sandbox")
            .arg("--disable-dev-shm-usage")
            .arg("--disable-extensions")
            .build()
            .map_err(|e| browser_error("failed to build browser config", e))?;

        let (browser, mut handler) = Browser::launch(config)
            .await
            .map_err(|e| browser_error("failed to launch Chromium", e))?;

        tokio::spawn(async move {
            while let Some(event) = handler.next().await {
                if let Err(e) = event {
                    tracing::trace!("Browser handler event error: {}", e);
                }
            }
        });

        tracing::info!("🌐 Headless browser started");
        Ok(Mutex::new(browser))
    }

    async fn browser(&self) -> Result<&Mutex<Browser>> {
        self.browser.get_or_try_init(|| self.launch()).await
    }

    /// Closes the browser process if it was ever started.
    pub async fn shutdown(&self) -> Result<()> {
        let Some(browser) = self.browser.get() else {
            return Ok(());
        };
        let mut browser = browser.lock().await;
        browser
            .close()
            .await
            .map_err(|e| browser_error("failed to close browser", e))?;
        browser
            .wait()
            .await
            .map_err(|e| browser_error("failed to wait for browser exit", e))?;
        tracing::info!("Headless browser stopped");
        Ok(())
    }
}

#[async_trait]
impl BrowserSession for ChromiumBrowser {
    async fn open_page(&self, user_agent: &str) -> Result<Box<dyn PageHandle>> {
        let page = self
            .browser()
            .await?
            .lock()
            .await
            .new_page("about:blank")
            .await
            .map_err(|e| browser_error("failed to open tab", e))?;

        page.execute(SetUserAgentOverrideParams::new(user_agent))
            .await
            .map_err(|e| browser_error("failed to set user agent", e))?;

        Ok(Box::new(ChromiumPage { page }))
    }
}

pub struct ChromiumPage {
    page: Page,
}

#[async_trait]
impl PageHandle for ChromiumPage {
    async fn navigate(&mut self, url: &str) -> Result<()> {
        self.page
            .goto(url)
            .await
            .map_err(|e| browser_error("navigation failed", e))?;
        Ok(())
    }

    async fn wait_for_selector(&self, selector: &str, timeout: Duration) -> Result<bool> {
        let deadline = tokio::time::Instant::now() + timeout;
        loop {
            if self.page.find_element(selector).await.is_ok() {
                return Ok(true);
            }
            if tokio::time::Instant::now() >= deadline {
                return Ok(false);
            }
            tokio::time::sleep(POLL_INTERVAL).await;
        }
    }

    async fn title(&self) -> Result<String> {
        let title = self
            .page
            .get_title()
            .await
            .map_err(|e| browser_error("failed to read title", e))?;
        Ok(title.unwrap_or_default())
    }

    async fn content(&self) -> Result<String> {
        self.page
            .content()
            .await
            .map_err(|e| browser_error("failed to read page content", e))
    }

    async fn close(self: Box<Self>) -> Result<()> {
        self.page
            .close()
            .await
            .map_err(|e| browser_error("failed to close tab", e))
    }
}
