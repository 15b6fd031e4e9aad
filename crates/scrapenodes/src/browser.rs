use async_trait::async_trait;
use scrapecore::{
    names, BrowserLauncher, ExecutionContext, Executor, ExecutorError, Page, TaskType, TaskValue,
};
use std::sync::Arc;

/// Page of the run, or an error logged on the phase.
fn require_page(ctx: &mut ExecutionContext<'_>) -> Option<Arc<dyn Page>> {
    let page = ctx.page();
    if page.is_none() {
        ctx.log().error("No browser page available");
    }
    page
}

/// Launch a browser and open the start URL
pub struct LaunchBrowserExecutor {
    launcher: Arc<dyn BrowserLauncher>,
}

impl LaunchBrowserExecutor {
    pub fn new(launcher: Arc<dyn BrowserLauncher>) -> Self {
        Self { launcher }
    }
}

#[async_trait]
impl Executor for LaunchBrowserExecutor {
    fn task_type(&self) -> TaskType {
        TaskType::LaunchBrowser
    }

    async fn execute(&self, ctx: &mut ExecutionContext<'_>) -> Result<bool, ExecutorError> {
        let Some(url) = ctx.require_str(names::WEBSITE_URL) else {
            return Ok(false);
        };

        let browser = self.launcher.launch().await?;
        ctx.set_browser(Some(browser.clone()));
        ctx.log().info("Browser started successfully");

        let page = browser.new_page().await?;
        ctx.set_page(Some(page.clone()));
        page.goto(&url).await?;
        ctx.log().info(format!("Opened page at: {}", url));

        ctx.set_output(names::WEB_PAGE, TaskValue::BrowserHandle);
        Ok(true)
    }
}

pub struct NavigateUrlExecutor;

#[async_trait]
impl Executor for NavigateUrlExecutor {
    fn task_type(&self) -> TaskType {
        TaskType::NavigateUrl
    }

    async fn execute(&self, ctx: &mut ExecutionContext<'_>) -> Result<bool, ExecutorError> {
        let Some(url) = ctx.require_str(names::URL) else {
            return Ok(false);
        };
        let Some(page) = require_page(ctx) else {
            return Ok(false);
        };

        page.goto(&url).await?;
        ctx.log().info(format!("visited {}", url));
        ctx.set_output(names::WEB_PAGE, TaskValue::BrowserHandle);
        Ok(true)
    }
}

pub struct PageToHtmlExecutor;

#[async_trait]
impl Executor for PageToHtmlExecutor {
    fn task_type(&self) -> TaskType {
        TaskType::PageToHtml
    }

    async fn execute(&self, ctx: &mut ExecutionContext<'_>) -> Result<bool, ExecutorError> {
        let Some(page) = require_page(ctx) else {
            return Ok(false);
        };

        let html = page.content().await?;
        ctx.set_output(names::HTML, html);
        ctx.set_output(names::WEB_PAGE, TaskValue::BrowserHandle);
        Ok(true)
    }
}

pub struct FillInputExecutor;

#[async_trait]
impl Executor for FillInputExecutor {
    fn task_type(&self) -> TaskType {
        TaskType::FillInput
    }

    async fn execute(&self, ctx: &mut ExecutionContext<'_>) -> Result<bool, ExecutorError> {
        let Some(selector) = ctx.require_str(names::SELECTOR) else {
            return Ok(false);
        };
        let Some(value) = ctx.require_str(names::VALUE) else {
            return Ok(false);
        };
        let Some(page) = require_page(ctx) else {
            return Ok(false);
        };

        page.type_into(&selector, &value).await?;
        ctx.set_output(names::WEB_PAGE, TaskValue::BrowserHandle);
        Ok(true)
    }
}

/// Close every open page and the browser.
///
/// Never fails the phase; the outcome is reported on Closure Status.
pub struct CloseBrowserExecutor;

#[async_trait]
impl Executor for CloseBrowserExecutor {
    fn task_type(&self) -> TaskType {
        TaskType::CloseBrowser
    }

    async fn execute(&self, ctx: &mut ExecutionContext<'_>) -> Result<bool, ExecutorError> {
        let Some(browser) = ctx.browser() else {
            ctx.log().info("No browser instance found to close");
            ctx.set_output(names::CLOSURE_STATUS, "no_browser_found");
            return Ok(true);
        };

        let closed = async {
            for page in browser.pages().await? {
                if !page.is_closed() {
                    page.close().await?;
                }
            }
            browser.close().await
        }
        .await;

        match closed {
            Ok(()) => {
                ctx.set_browser(None);
                ctx.set_page(None);
                ctx.log().info("Browser closed successfully");
                ctx.set_output(names::CLOSURE_STATUS, "success");
            }
            Err(e) => {
                tracing::warn!(node_id = ctx.node_id(), error = %e, "Failed to close browser");
                ctx.log().error(format!("Error closing browser: {}", e));
                ctx.set_output(names::CLOSURE_STATUS, format!("failed: {}", e));
            }
        }
        Ok(true)
    }
}
