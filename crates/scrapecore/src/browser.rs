//! Browser automation seam.
//!
//! The engine only ever talks to these traits; a concrete driver (WebDriver,
//! a test double, ...) is injected through a [`BrowserLauncher`].

use crate::BrowserError;
use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;

#[async_trait]
pub trait BrowserLauncher: Send + Sync {
    async fn launch(&self) -> Result<Arc<dyn Browser>, BrowserError>;
}

#[async_trait]
pub trait Browser: Send + Sync {
    /// Open a new page (tab) in this browser.
    async fn new_page(&self) -> Result<Arc<dyn Page>, BrowserError>;

    /// Pages currently open.
    async fn pages(&self) -> Result<Vec<Arc<dyn Page>>, BrowserError>;

    async fn close(&self) -> Result<(), BrowserError>;
}

#[async_trait]
pub trait Page: Send + Sync {
    async fn goto(&self, url: &str) -> Result<(), BrowserError>;

    /// Full HTML source of the current document.
    async fn content(&self) -> Result<String, BrowserError>;

    /// Type `text` into the first element matching `selector`.
    async fn type_into(&self, selector: &str, text: &str) -> Result<(), BrowserError>;

    async fn wait_for_selector(&self, selector: &str, timeout: Duration) -> Result<(), BrowserError>;

    /// Read `attribute` from every element matching `selector`, skipping
    /// empty values. `textContent` and `innerHTML` are treated as properties.
    async fn extract_all(&self, selector: &str, attribute: &str) -> Result<Vec<String>, BrowserError>;

    /// Evaluate a script body in the page and return its JSON result.
    async fn evaluate(&self, script: &str) -> Result<serde_json::Value, BrowserError>;

    async fn close(&self) -> Result<(), BrowserError>;

    fn is_closed(&self) -> bool;
}
