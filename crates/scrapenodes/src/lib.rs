//! Standard executor library
//!
//! One executor per task type of the standard catalog, plus a WebDriver
//! backed [`BrowserLauncher`](scrapecore::BrowserLauncher).

mod browser;
mod config;
mod csv;
mod extract;
mod javascript;
mod pagination;
mod webdriver;

pub use browser::{
    CloseBrowserExecutor, FillInputExecutor, LaunchBrowserExecutor, NavigateUrlExecutor,
    PageToHtmlExecutor,
};
pub use config::NodesConfig;
pub use csv::CsvExportExecutor;
pub use extract::{ExtractMultipleExecutor, ExtractTextExecutor};
pub use javascript::CustomJavascriptExecutor;
pub use pagination::PaginationExecutor;
pub use webdriver::{WebDriverBrowser, WebDriverLauncher};

use scrapecore::BrowserLauncher;
use scraperuntime::ExecutorRegistry;
use std::sync::Arc;

/// Register every standard executor with a registry
pub fn register_all(
    registry: &mut ExecutorRegistry,
    launcher: Arc<dyn BrowserLauncher>,
    config: &NodesConfig,
) {
    registry.register(Arc::new(LaunchBrowserExecutor::new(launcher)));
    registry.register(Arc::new(NavigateUrlExecutor));
    registry.register(Arc::new(PageToHtmlExecutor));
    registry.register(Arc::new(FillInputExecutor));
    registry.register(Arc::new(ExtractTextExecutor));
    registry.register(Arc::new(ExtractMultipleExecutor));
    registry.register(Arc::new(PaginationExecutor::new(config)));
    registry.register(Arc::new(CsvExportExecutor::new(config)));
    registry.register(Arc::new(CustomJavascriptExecutor::new(config)));
    registry.register(Arc::new(CloseBrowserExecutor));
}
