//! Narrow capability interface over a live browser page.
//!
//! The convergence driver only ever sees this trait, so the whole scroll
//! loop is unit-testable against a scripted fake without a browser.

pub mod chrome;

use std::time::Duration;

use async_trait::async_trait;

use crate::error::Result;

pub use chrome::{BrowserSession, ChromePage};

/// How a cycle advances the viewport. Platform-specific: Blinkit's grid
/// loads on incremental scrolls, Zepto and D-Mart only append when the
/// viewport hits document end.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScrollPolicy {
    /// Advance by one viewport height per cycle.
    ViewportStep,
    /// Jump to the current document end each cycle.
    ToBottom,
}

#[async_trait]
pub trait PageDriver: Send + Sync {
    /// Navigates to `url` and waits for the load to settle. Bounded by the
    /// page-load timeout; expiry surfaces as a `Timeout` error.
    async fn navigate(&self, url: &str) -> Result<()>;

    /// Waits until `css` matches at least one element, polling up to
    /// `timeout`.
    async fn wait_for_selector(&self, css: &str, timeout: Duration) -> Result<()>;

    /// One-shot existence check, no waiting.
    async fn selector_exists(&self, css: &str) -> Result<bool>;

    /// Advances the viewport according to `policy`.
    async fn scroll(&self, policy: ScrollPolicy) -> Result<()>;

    /// Returns the document's current outer HTML.
    async fn html(&self) -> Result<String>;
}
