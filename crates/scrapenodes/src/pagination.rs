use crate::NodesConfig;
use async_trait::async_trait;
use scrapecore::{names, ExecutionContext, Executor, ExecutorError, Page, TaskType, TaskValue};
use serde::Serialize;
use std::time::Duration;

/// Largest `end - start` a single node may scrape.
const MAX_PAGE_SPAN: i64 = 50;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
enum PageStatus {
    Success,
    Failed,
}

#[derive(Debug, Serialize)]
struct PageResult {
    page: i64,
    url: String,
    status: PageStatus,
    results: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct PaginationReport {
    total_pages: i64,
    successful_pages: u32,
    failed_pages: u32,
    results: Vec<PageResult>,
}

impl PaginationReport {
    fn record(&mut self, result: PageResult) {
        match result.status {
            PageStatus::Success => self.successful_pages += 1,
            PageStatus::Failed => self.failed_pages += 1,
        }
        self.results.push(result);
    }
}

struct PageRange {
    start: i64,
    end: i64,
}

fn page_range(start: &str, end: &str) -> Result<PageRange, &'static str> {
    let (Ok(start), Ok(end)) = (start.trim().parse::<i64>(), end.trim().parse::<i64>()) else {
        return Err("Start Page and End Page must be valid numbers");
    };
    if start > end {
        return Err("Start Page cannot be greater than End Page");
    }
    match end.checked_sub(start) {
        Some(span) if span <= MAX_PAGE_SPAN => Ok(PageRange { start, end }),
        _ => Err("Page range too large. Maximum 50 pages allowed"),
    }
}

/// Visit a numbered range of pages and collect one attribute per match
pub struct PaginationExecutor {
    wait_timeout: Duration,
    delay: Duration,
}

impl PaginationExecutor {
    pub fn new(config: &NodesConfig) -> Self {
        Self {
            wait_timeout: config.page_wait_timeout,
            delay: config.page_delay,
        }
    }

    async fn scrape_page(
        &self,
        page: &dyn Page,
        ctx: &mut ExecutionContext<'_>,
        number: i64,
        url: String,
        selector: &str,
        attribute: &str,
    ) -> PageResult {
        ctx.log().info(format!("Visiting page {}: {}", number, url));

        let failed = |url: String, error: String| PageResult {
            page: number,
            url,
            status: PageStatus::Failed,
            results: Vec::new(),
            error: Some(error),
        };

        if let Err(e) = page.goto(&url).await {
            ctx.log().error(format!("Failed to process page {}: {}", number, e));
            return failed(url, e.to_string());
        }

        if page.wait_for_selector(selector, self.wait_timeout).await.is_err() {
            ctx.log().info(format!(
                "Selector \"{}\" not found on page {}",
                selector, number
            ));
            return failed(url, format!("Selector not found: {}", selector));
        }

        match page.extract_all(selector, attribute).await {
            Ok(results) => {
                ctx.log().info(format!(
                    "Page {}: Extracted {} elements",
                    number,
                    results.len()
                ));
                tokio::time::sleep(self.delay).await;
                PageResult {
                    page: number,
                    url,
                    status: PageStatus::Success,
                    results,
                    error: None,
                }
            }
            Err(e) => {
                ctx.log().error(format!("Failed to process page {}: {}", number, e));
                failed(url, e.to_string())
            }
        }
    }
}

#[async_trait]
impl Executor for PaginationExecutor {
    fn task_type(&self) -> TaskType {
        TaskType::Pagination
    }

    async fn execute(&self, ctx: &mut ExecutionContext<'_>) -> Result<bool, ExecutorError> {
        let inputs = [
            names::BASE_URL,
            names::PAGINATION_SIGN,
            names::START_PAGE,
            names::END_PAGE,
            names::ELEMENT_SELECTOR,
            names::ATTRIBUTE,
        ]
        .map(|name| ctx.input_str(name).map(str::to_string));
        let [Some(base_url), Some(sign), Some(start), Some(end), Some(selector), Some(attribute)] =
            inputs
        else {
            ctx.log().error("Missing required inputs");
            return Ok(false);
        };

        let range = match page_range(&start, &end) {
            Ok(range) => range,
            Err(message) => {
                ctx.log().error(message);
                return Ok(false);
            }
        };

        let Some(page) = ctx.page() else {
            ctx.log().error("No browser page available");
            return Ok(false);
        };

        let mut report = PaginationReport {
            total_pages: range.end - range.start + 1,
            successful_pages: 0,
            failed_pages: 0,
            results: Vec::new(),
        };

        ctx.log().info(format!(
            "Starting pagination scraping from page {} to {}",
            range.start, range.end
        ));
        for number in range.start..=range.end {
            let url = format!("{}{}{}", base_url, sign, number);
            let result = self
                .scrape_page(page.as_ref(), ctx, number, url, &selector, &attribute)
                .await;
            report.record(result);
        }

        ctx.set_output(names::SCRAPED_DATA, serde_json::to_string_pretty(&report)?);
        ctx.set_output(names::WEB_PAGE, TaskValue::BrowserHandle);
        ctx.log().info(format!(
            "Pagination complete. Success: {}, Failed: {}",
            report.successful_pages, report.failed_pages
        ));
        tracing::debug!(
            node_id = ctx.node_id(),
            successful = report.successful_pages,
            failed = report.failed_pages,
            "Pagination finished"
        );

        Ok(report.successful_pages > 0)
    }
}
