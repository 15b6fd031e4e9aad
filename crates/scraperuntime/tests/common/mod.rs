#![allow(dead_code)]

use async_trait::async_trait;
use scrapecore::{
    names, Browser, BrowserError, ExecutionContext, ExecutionId, Executor, ExecutorError,
    FlowDefinition, GraphNode, Page, TaskCatalog, TaskType, TaskValue, WorkflowRecord,
};
use scraperuntime::{ExecutorRegistry, RuntimeConfig, ScrapeRuntime, TriggerRequest};
use scrapestore::{MemoryStore, RunStore};
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::Notify;

pub const USER: &str = "user-1";

/// One recorded executor invocation.
#[derive(Debug, Clone)]
pub struct Call {
    pub node_id: String,
    pub inputs: HashMap<String, Option<TaskValue>>,
}

pub type Calls = Arc<Mutex<Vec<Call>>>;

pub fn recorder() -> Calls {
    Arc::new(Mutex::new(Vec::new()))
}

pub fn called_nodes(calls: &Calls) -> Vec<String> {
    calls.lock().unwrap().iter().map(|c| c.node_id.clone()).collect()
}

#[derive(Clone, Copy)]
pub enum Behavior {
    Succeed,
    Fail,
    Error,
    Panic,
}

/// Executor double that records what it saw and behaves as scripted.
pub struct FakeExecutor {
    task_type: TaskType,
    behavior: Behavior,
    watched: Vec<String>,
    outputs: Vec<(String, TaskValue)>,
    calls: Calls,
}

impl FakeExecutor {
    pub fn new(task_type: TaskType, calls: &Calls) -> Self {
        Self {
            task_type,
            behavior: Behavior::Succeed,
            watched: Vec::new(),
            outputs: Vec::new(),
            calls: calls.clone(),
        }
    }

    pub fn behave(mut self, behavior: Behavior) -> Self {
        self.behavior = behavior;
        self
    }

    pub fn watch(mut self, input: &str) -> Self {
        self.watched.push(input.to_string());
        self
    }

    pub fn output(mut self, name: &str, value: impl Into<TaskValue>) -> Self {
        self.outputs.push((name.to_string(), value.into()));
        self
    }

    pub fn into_arc(self) -> Arc<dyn Executor> {
        Arc::new(self)
    }
}

#[async_trait]
impl Executor for FakeExecutor {
    fn task_type(&self) -> TaskType {
        self.task_type
    }

    async fn execute(&self, ctx: &mut ExecutionContext<'_>) -> Result<bool, ExecutorError> {
        let inputs = self
            .watched
            .iter()
            .map(|name| (name.clone(), ctx.get_input(name).cloned()))
            .collect();
        self.calls.lock().unwrap().push(Call {
            node_id: ctx.node_id().to_string(),
            inputs,
        });
        for (name, value) in &self.outputs {
            ctx.set_output(name.clone(), value.clone());
        }

        match self.behavior {
            Behavior::Succeed => {
                ctx.log().info("done");
                Ok(true)
            }
            Behavior::Fail => {
                ctx.log().error("simulated failure");
                Ok(false)
            }
            Behavior::Error => Err(ExecutorError::Failed("boom".to_string())),
            Behavior::Panic => panic!("executor exploded"),
        }
    }
}

/// Blocks inside its phase until released.
pub struct GateExecutor {
    task_type: TaskType,
    pub entered: Arc<Notify>,
    pub release: Arc<Notify>,
}

impl GateExecutor {
    pub fn new(task_type: TaskType) -> Self {
        Self {
            task_type,
            entered: Arc::new(Notify::new()),
            release: Arc::new(Notify::new()),
        }
    }
}

#[async_trait]
impl Executor for GateExecutor {
    fn task_type(&self) -> TaskType {
        self.task_type
    }

    async fn execute(&self, _ctx: &mut ExecutionContext<'_>) -> Result<bool, ExecutorError> {
        self.entered.notify_one();
        self.release.notified().await;
        Ok(true)
    }
}

#[derive(Default)]
pub struct FakeBrowser {
    pub closed: AtomicBool,
}

#[async_trait]
impl Browser for FakeBrowser {
    async fn new_page(&self) -> Result<Arc<dyn Page>, BrowserError> {
        Ok(Arc::new(FakePage::default()))
    }

    async fn pages(&self) -> Result<Vec<Arc<dyn Page>>, BrowserError> {
        Ok(Vec::new())
    }

    async fn close(&self) -> Result<(), BrowserError> {
        self.closed.store(true, Ordering::SeqCst);
        Ok(())
    }
}

#[derive(Default)]
pub struct FakePage {
    closed: AtomicBool,
}

#[async_trait]
impl Page for FakePage {
    async fn goto(&self, _url: &str) -> Result<(), BrowserError> {
        Ok(())
    }

    async fn content(&self) -> Result<String, BrowserError> {
        Ok("<html></html>".to_string())
    }

    async fn type_into(&self, _selector: &str, _text: &str) -> Result<(), BrowserError> {
        Ok(())
    }

    async fn wait_for_selector(&self, _selector: &str, _timeout: Duration) -> Result<(), BrowserError> {
        Ok(())
    }

    async fn extract_all(&self, _selector: &str, _attribute: &str) -> Result<Vec<String>, BrowserError> {
        Ok(Vec::new())
    }

    async fn evaluate(&self, _script: &str) -> Result<serde_json::Value, BrowserError> {
        Ok(serde_json::Value::Null)
    }

    async fn close(&self) -> Result<(), BrowserError> {
        self.closed.store(true, Ordering::SeqCst);
        Ok(())
    }

    fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }
}

/// Launch double that hands the shared fake browser to the run.
pub struct OpenBrowser {
    pub browser: Arc<FakeBrowser>,
}

#[async_trait]
impl Executor for OpenBrowser {
    fn task_type(&self) -> TaskType {
        TaskType::LaunchBrowser
    }

    async fn execute(&self, ctx: &mut ExecutionContext<'_>) -> Result<bool, ExecutorError> {
        let page = self.browser.new_page().await?;
        ctx.set_browser(Some(self.browser.clone()));
        ctx.set_page(Some(page));
        Ok(true)
    }
}

/// A succeeding executor for every task type, then `overrides` on top.
pub fn registry(calls: &Calls, overrides: Vec<Arc<dyn Executor>>) -> ExecutorRegistry {
    let mut registry = ExecutorRegistry::new();
    for task_type in TaskType::ALL {
        registry.register(FakeExecutor::new(task_type, calls).into_arc());
    }
    for executor in overrides {
        registry.register(executor);
    }
    registry
}

pub struct Harness {
    pub runtime: ScrapeRuntime,
    pub store: Arc<MemoryStore>,
    pub workflow: WorkflowRecord,
}

impl Harness {
    pub fn request(&self, flow: &FlowDefinition) -> TriggerRequest {
        TriggerRequest {
            workflow_id: self.workflow.id,
            user_id: USER.to_string(),
            definition: serde_json::to_string(flow).unwrap(),
        }
    }

    /// Poll until the execution reaches a terminal status.
    pub async fn wait_until_finished(&self, execution_id: ExecutionId) {
        for _ in 0..500 {
            let execution = self.store.get_execution(execution_id).await.unwrap();
            if execution.status.is_terminal() {
                return;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        panic!("execution {} did not finish", execution_id);
    }
}

pub async fn harness(registry: ExecutorRegistry) -> Harness {
    harness_with(registry, RuntimeConfig::default()).await
}

pub async fn harness_with(registry: ExecutorRegistry, config: RuntimeConfig) -> Harness {
    let store = Arc::new(MemoryStore::new());
    let runtime = ScrapeRuntime::new(
        Arc::new(TaskCatalog::standard()),
        Arc::new(registry),
        store.clone(),
        config,
    );
    let workflow = runtime
        .create_workflow(USER, "scrape", serde_json::to_string(&scenario_a()).unwrap())
        .await
        .unwrap();
    Harness {
        runtime,
        store,
        workflow,
    }
}

/// `launch -> navigate -> html -> close`, every required input present.
pub fn scenario_a() -> FlowDefinition {
    let mut flow = FlowDefinition::default();
    flow.add_node(
        GraphNode::new("launch", TaskType::LaunchBrowser)
            .with_input(names::WEBSITE_URL, "https://example.com"),
    );
    flow.add_node(
        GraphNode::new("navigate", TaskType::NavigateUrl)
            .with_input(names::URL, "https://example.com/list"),
    );
    flow.add_node(GraphNode::new("html", TaskType::PageToHtml));
    flow.add_node(GraphNode::new("close", TaskType::CloseBrowser));
    flow.connect("launch", names::WEB_PAGE, "navigate", names::WEB_PAGE);
    flow.connect("navigate", names::WEB_PAGE, "html", names::WEB_PAGE);
    flow.connect("html", names::WEB_PAGE, "close", names::WEB_PAGE);
    flow
}

pub fn phase_ids(flow: &scraperuntime::ExecutionPlan) -> Vec<Vec<String>> {
    flow.phases
        .iter()
        .map(|p| p.nodes.iter().map(|n| n.id.clone()).collect())
        .collect()
}
