use crate::{
    Browser, ExecutionEnvironment, ExecutorError, LogCollector, Page, TaskType, TaskValue,
};
use async_trait::async_trait;
use std::sync::Arc;

/// Core trait that every task implementation provides.
#[async_trait]
pub trait Executor: Send + Sync {
    fn task_type(&self) -> TaskType;

    /// Perform the task's side effects.
    ///
    /// `Ok(false)` is an expected failure the executor already logged;
    /// `Err` is an unexpected one and is logged by the caller.
    async fn execute(&self, ctx: &mut ExecutionContext<'_>) -> Result<bool, ExecutorError>;
}

/// Execution context lent to one executor invocation.
///
/// Inputs and outputs are scoped to `node_id`; the browser and page are the
/// run's shared handles.
pub struct ExecutionContext<'a> {
    node_id: &'a str,
    environment: &'a mut ExecutionEnvironment,
    log: &'a mut LogCollector,
}

impl<'a> ExecutionContext<'a> {
    pub fn new(
        node_id: &'a str,
        environment: &'a mut ExecutionEnvironment,
        log: &'a mut LogCollector,
    ) -> Self {
        Self {
            node_id,
            environment,
            log,
        }
    }

    pub fn node_id(&self) -> &str {
        self.node_id
    }

    pub fn get_input(&self, name: &str) -> Option<&TaskValue> {
        self.environment.get_input(self.node_id, name)
    }

    /// Get a non-empty string input.
    pub fn input_str(&self, name: &str) -> Option<&str> {
        self.get_input(name)
            .and_then(TaskValue::as_str)
            .filter(|s| !s.is_empty())
    }

    /// Get a string input or log an error naming it.
    pub fn require_str(&mut self, name: &str) -> Option<String> {
        match self.input_str(name) {
            Some(value) => Some(value.to_string()),
            None => {
                self.log.error(format!("input->{} is not defined", name));
                None
            }
        }
    }

    pub fn set_output(&mut self, name: impl Into<String>, value: impl Into<TaskValue>) {
        self.environment.set_output(self.node_id, name, value.into());
    }

    pub fn browser(&self) -> Option<Arc<dyn Browser>> {
        self.environment.browser()
    }

    pub fn set_browser(&mut self, browser: Option<Arc<dyn Browser>>) {
        self.environment.set_browser(browser);
    }

    pub fn page(&self) -> Option<Arc<dyn Page>> {
        self.environment.page()
    }

    pub fn set_page(&mut self, page: Option<Arc<dyn Page>>) {
        self.environment.set_page(page);
    }

    pub fn log(&mut self) -> &mut LogCollector {
        &mut *self.log
    }
}
