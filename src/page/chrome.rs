//! chromiumoxide-backed implementation of [`PageDriver`].

use std::time::Duration;

use async_trait::async_trait;
use chromiumoxide::browser::{Browser, BrowserConfigBuilder};
use chromiumoxide::page::Page;
use futures_util::StreamExt;
use tokio::task::JoinHandle;
use tracing::{debug, warn};

use crate::config::{PAGE_LOAD_TIMEOUT_SECS, WAIT_POLL_INTERVAL_MS};
use crate::error::{Result, ScrapeError};
use crate::page::{PageDriver, ScrollPolicy};

/// Owns the browser process and its CDP event handler task.
///
/// Launch failure is the one structural error of a run: no category walk is
/// attempted without a session.
pub struct BrowserSession {
    browser: Browser,
    handler: JoinHandle<()>,
}

impl BrowserSession {
    pub async fn launch(headless: bool) -> Result<Self> {
        let mut builder = BrowserConfigBuilder::default()
            .window_size(1280, 1024)
            .request_timeout(Duration::from_secs(PAGE_LOAD_TIMEOUT_SECS))
            .arg("--no-sandbox")
            .arg("--disable-setuid-sandbox")
            .arg("--disable-dev-shm-usage")
            // Trim resources listings don't need. Images stay enabled since
            // the extractor reads each card's `img src`.
            .arg("--disable-remote-fonts")
            .arg("--autoplay-policy=user-gesture-required")
            .arg("--mute-audio");
        if !headless {
            builder = builder.with_head();
        }
        let config = builder.build().map_err(ScrapeError::Session)?;

        let (browser, mut handler) = Browser::launch(config).await?;
        let handler_task = tokio::spawn(async move {
            while let Some(event) = handler.next().await {
                if let Err(e) = event {
                    debug!("Browser event handler error: {e:?}");
                }
            }
        });

        Ok(Self { browser, handler: handler_task })
    }

    pub async fn new_page(&self) -> Result<ChromePage> {
        let page = self.browser.new_page("about:blank").await?;
        Ok(ChromePage { page })
    }

    pub async fn close(mut self) {
        if let Err(e) = self.browser.close().await {
            warn!("Error closing browser: {e}");
        }
        self.handler.abort();
    }
}

/// A single live tab. One page is reused across a whole platform run,
/// one listing at a time, per the serialized worker model.
pub struct ChromePage {
    page: Page,
}

#[async_trait]
impl PageDriver for ChromePage {
    async fn navigate(&self, url: &str) -> Result<()> {
        let timeout = Duration::from_secs(PAGE_LOAD_TIMEOUT_SECS);
        let nav = tokio::time::timeout(timeout, async {
            self.page.goto(url).await?;
            self.page.wait_for_navigation().await?;
            Ok::<(), chromiumoxide::error::CdpError>(())
        })
        .await;

        match nav {
            Ok(Ok(())) => Ok(()),
            Ok(Err(e)) => Err(e.into()),
            Err(_) => Err(ScrapeError::Timeout {
                what: url.to_string(),
                timeout_ms: timeout.as_millis() as u64,
            }),
        }
    }

    async fn wait_for_selector(&self, css: &str, timeout: Duration) -> Result<()> {
        let deadline = tokio::time::Instant::now() + timeout;
        loop {
            if self.page.find_element(css).await.is_ok() {
                return Ok(());
            }
            if tokio::time::Instant::now() >= deadline {
                return Err(ScrapeError::Timeout {
                    what: css.to_string(),
                    timeout_ms: timeout.as_millis() as u64,
                });
            }
            tokio::time::sleep(Duration::from_millis(WAIT_POLL_INTERVAL_MS)).await;
        }
    }

    async fn selector_exists(&self, css: &str) -> Result<bool> {
        Ok(self.page.find_element(css).await.is_ok())
    }

    async fn scroll(&self, policy: ScrollPolicy) -> Result<()> {
        let expr = match policy {
            ScrollPolicy::ViewportStep => "window.scrollBy(0, window.innerHeight)",
            ScrollPolicy::ToBottom => "window.scrollTo(0, document.body.scrollHeight)",
        };
        self.page.evaluate(expr).await?;
        Ok(())
    }

    async fn html(&self) -> Result<String> {
        Ok(self.page.content().await?)
    }
}
