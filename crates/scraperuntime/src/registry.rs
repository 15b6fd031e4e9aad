use scrapecore::{Executor, TaskType};
use std::collections::HashMap;
use std::sync::Arc;

/// Maps each task type to the executor that performs it.
///
/// Built once at start-up and shared read-only with the run loop.
pub struct ExecutorRegistry {
    executors: HashMap<TaskType, Arc<dyn Executor>>,
}

impl ExecutorRegistry {
    pub fn new() -> Self {
        Self {
            executors: HashMap::new(),
        }
    }

    /// Register an executor, replacing any previous one for its task type.
    pub fn register(&mut self, executor: Arc<dyn Executor>) {
        let task_type = executor.task_type();
        tracing::info!("Registering executor: {}", task_type);
        self.executors.insert(task_type, executor);
    }

    pub fn get(&self, task_type: TaskType) -> Option<Arc<dyn Executor>> {
        self.executors.get(&task_type).cloned()
    }
}

impl Default for ExecutorRegistry {
    fn default() -> Self {
        Self::new()
    }
}
