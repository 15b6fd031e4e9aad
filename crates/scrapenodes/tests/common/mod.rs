#![allow(dead_code)]

use async_trait::async_trait;
use scrapecore::{
    Browser, BrowserError, BrowserLauncher, ExecutionContext, ExecutionEnvironment, Executor,
    LogCollector, LogLevel, Page, TaskValue,
};
use scrapenodes::NodesConfig;
use std::collections::HashSet;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

pub const NODE: &str = "node-1";

/// Page double with scripted content and recorded interactions.
#[derive(Default)]
pub struct ScriptedPage {
    pub html: String,
    /// URLs on which `wait_for_selector` fails.
    pub missing_on: HashSet<String>,
    pub extracted: Vec<String>,
    pub evaluate_result: serde_json::Value,
    pub evaluate_delay: Option<Duration>,
    pub fail_close: bool,
    pub visited: Mutex<Vec<String>>,
    pub typed: Mutex<Vec<(String, String)>>,
    pub scripts: Mutex<Vec<String>>,
    pub closed: AtomicBool,
}

impl ScriptedPage {
    pub fn visited(&self) -> Vec<String> {
        self.visited.lock().unwrap().clone()
    }

    pub fn is_closed_flag(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }

    fn current_url(&self) -> Option<String> {
        self.visited.lock().unwrap().last().cloned()
    }
}

#[async_trait]
impl Page for ScriptedPage {
    async fn goto(&self, url: &str) -> Result<(), BrowserError> {
        self.visited.lock().unwrap().push(url.to_string());
        Ok(())
    }

    async fn content(&self) -> Result<String, BrowserError> {
        Ok(self.html.clone())
    }

    async fn type_into(&self, selector: &str, text: &str) -> Result<(), BrowserError> {
        self.typed
            .lock()
            .unwrap()
            .push((selector.to_string(), text.to_string()));
        Ok(())
    }

    async fn wait_for_selector(&self, selector: &str, _timeout: Duration) -> Result<(), BrowserError> {
        match self.current_url() {
            Some(url) if self.missing_on.contains(&url) => {
                Err(BrowserError::ElementNotFound(selector.to_string()))
            }
            _ => Ok(()),
        }
    }

    async fn extract_all(&self, _selector: &str, _attribute: &str) -> Result<Vec<String>, BrowserError> {
        Ok(self.extracted.clone())
    }

    async fn evaluate(&self, script: &str) -> Result<serde_json::Value, BrowserError> {
        self.scripts.lock().unwrap().push(script.to_string());
        if let Some(delay) = self.evaluate_delay {
            tokio::time::sleep(delay).await;
        }
        Ok(self.evaluate_result.clone())
    }

    async fn close(&self) -> Result<(), BrowserError> {
        if self.fail_close {
            return Err(BrowserError::Driver("tab crashed".to_string()));
        }
        self.closed.store(true, Ordering::SeqCst);
        Ok(())
    }

    fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }
}

/// Browser double owning a single scripted page.
pub struct ScriptedBrowser {
    pub page: Arc<ScriptedPage>,
    pub closed: AtomicBool,
}

impl ScriptedBrowser {
    pub fn new(page: ScriptedPage) -> Self {
        Self {
            page: Arc::new(page),
            closed: AtomicBool::new(false),
        }
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Browser for ScriptedBrowser {
    async fn new_page(&self) -> Result<Arc<dyn Page>, BrowserError> {
        Ok(self.page.clone())
    }

    async fn pages(&self) -> Result<Vec<Arc<dyn Page>>, BrowserError> {
        Ok(vec![self.page.clone() as Arc<dyn Page>])
    }

    async fn close(&self) -> Result<(), BrowserError> {
        self.closed.store(true, Ordering::SeqCst);
        Ok(())
    }
}

pub struct ScriptedLauncher {
    pub browser: Arc<ScriptedBrowser>,
    pub launches: Mutex<u32>,
}

#[async_trait]
impl BrowserLauncher for ScriptedLauncher {
    async fn launch(&self) -> Result<Arc<dyn Browser>, BrowserError> {
        *self.launches.lock().unwrap() += 1;
        Ok(self.browser.clone())
    }
}

/// Outcome of invoking one executor in isolation.
pub struct Invocation {
    pub succeeded: bool,
    pub environment: ExecutionEnvironment,
    pub log: LogCollector,
}

impl Invocation {
    pub fn output(&self, name: &str) -> Option<&TaskValue> {
        self.environment.get_output(NODE, name)
    }

    pub fn output_str(&self, name: &str) -> &str {
        self.output(name)
            .and_then(TaskValue::as_str)
            .unwrap_or_else(|| panic!("output {} is not a string", name))
    }

    pub fn messages(&self) -> Vec<String> {
        self.log
            .entries()
            .iter()
            .map(|e| e.message.clone())
            .collect()
    }

    pub fn errors(&self) -> Vec<String> {
        self.log
            .entries()
            .iter()
            .filter(|e| e.level == LogLevel::Error)
            .map(|e| e.message.clone())
            .collect()
    }
}

/// Environment for [`NODE`] with the given inputs and, optionally, a
/// browser already open on `browser.page`.
pub fn environment(
    inputs: &[(&str, TaskValue)],
    browser: Option<Arc<ScriptedBrowser>>,
) -> ExecutionEnvironment {
    let mut environment = ExecutionEnvironment::new();
    environment.prepare_node(NODE);
    for (name, value) in inputs {
        environment.set_input(NODE, *name, value.clone());
    }
    if let Some(browser) = browser {
        environment.set_page(Some(browser.page.clone()));
        environment.set_browser(Some(browser));
    }
    environment
}

pub async fn invoke(executor: &dyn Executor, mut environment: ExecutionEnvironment) -> Invocation {
    let mut log = LogCollector::new();
    let succeeded = {
        let mut ctx = ExecutionContext::new(NODE, &mut environment, &mut log);
        executor
            .execute(&mut ctx)
            .await
            .expect("executor returned an error")
    };
    Invocation {
        succeeded,
        environment,
        log,
    }
}

pub fn text(value: &str) -> TaskValue {
    TaskValue::from(value)
}

pub fn config() -> NodesConfig {
    NodesConfig {
        page_delay: Duration::ZERO,
        ..NodesConfig::default()
    }
}
