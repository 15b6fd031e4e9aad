//! WebDriver backed browser automation.
//!
//! Every page of a browser shares the session's single window: a workflow
//! drives one page at a time.

use crate::NodesConfig;
use async_trait::async_trait;
use scrapecore::{Browser, BrowserError, BrowserLauncher, Page};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use thirtyfour::prelude::ElementQueryable;
use thirtyfour::{By, ChromiumLikeCapabilities, DesiredCapabilities, WebDriver};
use tokio::sync::Mutex;

/// Polling interval of `wait_for_selector`.
const POLL_INTERVAL: Duration = Duration::from_millis(100);

fn driver_error(e: impl std::fmt::Display) -> BrowserError {
    BrowserError::Driver(e.to_string())
}

/// Starts a Chrome session on a WebDriver server.
pub struct WebDriverLauncher {
    url: String,
    headless: bool,
}

impl WebDriverLauncher {
    pub fn new(url: impl Into<String>, headless: bool) -> Self {
        Self {
            url: url.into(),
            headless,
        }
    }

    pub fn from_config(config: &NodesConfig) -> Self {
        Self::new(config.webdriver_url.clone(), config.headless)
    }
}

#[async_trait]
impl BrowserLauncher for WebDriverLauncher {
    async fn launch(&self) -> Result<Arc<dyn Browser>, BrowserError> {
        let mut caps = DesiredCapabilities::chrome();
        if self.headless {
            caps.set_headless().map_err(|e| BrowserError::Launch(e.to_string()))?;
        }
        let driver = WebDriver::new(self.url.clone(), caps)
            .await
            .map_err(|e| BrowserError::Launch(e.to_string()))?;
        tracing::info!(url = %self.url, headless = self.headless, "WebDriver session started");
        Ok(Arc::new(WebDriverBrowser::new(driver)))
    }
}

/// Session handle shared by a browser and its pages.
struct Session {
    driver: Mutex<Option<WebDriver>>,
}

impl Session {
    async fn driver(&self) -> Result<WebDriver, BrowserError> {
        self.driver.lock().await.clone().ok_or(BrowserError::Closed)
    }
}

pub struct WebDriverBrowser {
    session: Arc<Session>,
    pages: Mutex<Vec<Arc<WebDriverPage>>>,
}

impl WebDriverBrowser {
    pub fn new(driver: WebDriver) -> Self {
        Self {
            session: Arc::new(Session {
                driver: Mutex::new(Some(driver)),
            }),
            pages: Mutex::new(Vec::new()),
        }
    }
}

#[async_trait]
impl Browser for WebDriverBrowser {
    async fn new_page(&self) -> Result<Arc<dyn Page>, BrowserError> {
        self.session.driver().await?;
        let page = Arc::new(WebDriverPage {
            session: self.session.clone(),
            closed: AtomicBool::new(false),
        });
        self.pages.lock().await.push(page.clone());
        Ok(page)
    }

    async fn pages(&self) -> Result<Vec<Arc<dyn Page>>, BrowserError> {
        Ok(self
            .pages
            .lock()
            .await
            .iter()
            .filter(|p| !p.is_closed())
            .map(|p| p.clone() as Arc<dyn Page>)
            .collect())
    }

    async fn close(&self) -> Result<(), BrowserError> {
        for page in self.pages.lock().await.iter() {
            page.closed.store(true, Ordering::SeqCst);
        }
        let Some(driver) = self.session.driver.lock().await.take() else {
            return Ok(());
        };
        driver.quit().await.map_err(driver_error)?;
        tracing::info!("WebDriver session closed");
        Ok(())
    }
}

pub struct WebDriverPage {
    session: Arc<Session>,
    closed: AtomicBool,
}

impl WebDriverPage {
    async fn driver(&self) -> Result<WebDriver, BrowserError> {
        if self.is_closed() {
            return Err(BrowserError::Closed);
        }
        self.session.driver().await
    }
}

#[async_trait]
impl Page for WebDriverPage {
    async fn goto(&self, url: &str) -> Result<(), BrowserError> {
        let driver = self.driver().await?;
        driver
            .goto(url)
            .await
            .map_err(|e| BrowserError::Navigation {
                url: url.to_string(),
                reason: e.to_string(),
            })
    }

    async fn content(&self) -> Result<String, BrowserError> {
        let driver = self.driver().await?;
        driver.source().await.map_err(driver_error)
    }

    async fn type_into(&self, selector: &str, text: &str) -> Result<(), BrowserError> {
        let driver = self.driver().await?;
        let element = driver
            .find(By::Css(selector))
            .await
            .map_err(|_| BrowserError::ElementNotFound(selector.to_string()))?;
        element.send_keys(text).await.map_err(driver_error)
    }

    async fn wait_for_selector(&self, selector: &str, timeout: Duration) -> Result<(), BrowserError> {
        let driver = self.driver().await?;
        let found = driver
            .query(By::Css(selector))
            .wait(timeout, POLL_INTERVAL)
            .exists()
            .await
            .map_err(driver_error)?;
        if found {
            Ok(())
        } else {
            Err(BrowserError::ElementNotFound(selector.to_string()))
        }
    }

    async fn extract_all(&self, selector: &str, attribute: &str) -> Result<Vec<String>, BrowserError> {
        let driver = self.driver().await?;
        let elements = driver
            .find_all(By::Css(selector))
            .await
            .map_err(driver_error)?;

        let mut values = Vec::with_capacity(elements.len());
        for element in elements {
            let value = match attribute {
                "textContent" => element.text().await.map_err(driver_error)?.trim().to_string(),
                "innerHTML" => element.inner_html().await.map_err(driver_error)?,
                name => element
                    .attr(name)
                    .await
                    .map_err(driver_error)?
                    .unwrap_or_default(),
            };
            if !value.is_empty() {
                values.push(value);
            }
        }
        Ok(values)
    }

    async fn evaluate(&self, script: &str) -> Result<serde_json::Value, BrowserError> {
        let driver = self.driver().await?;
        let ret = driver
            .execute(script, Vec::new())
            .await
            .map_err(|e| BrowserError::Script(e.to_string()))?;
        Ok(ret.json().clone())
    }

    async fn close(&self) -> Result<(), BrowserError> {
        self.closed.store(true, Ordering::SeqCst);
        Ok(())
    }

    fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }
}
