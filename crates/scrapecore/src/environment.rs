use crate::{Browser, Page, TaskValue};
use std::collections::HashMap;
use std::sync::Arc;

/// Inputs and outputs recorded for one node during a run.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct NodeIo {
    pub inputs: HashMap<String, TaskValue>,
    pub outputs: HashMap<String, TaskValue>,
}

/// Mutable state of a single workflow run.
///
/// Owned by the run loop and lent to one executor at a time; the browser and
/// page are therefore never shared between concurrently running nodes.
#[derive(Default)]
pub struct ExecutionEnvironment {
    nodes: HashMap<String, NodeIo>,
    browser: Option<Arc<dyn Browser>>,
    page: Option<Arc<dyn Page>>,
}

impl ExecutionEnvironment {
    pub fn new() -> Self {
        Self::default()
    }

    /// Reset the record for `node_id` before it runs.
    pub fn prepare_node(&mut self, node_id: &str) -> &mut NodeIo {
        let io = self.nodes.entry(node_id.to_string()).or_default();
        *io = NodeIo::default();
        io
    }

    pub fn node(&self, node_id: &str) -> Option<&NodeIo> {
        self.nodes.get(node_id)
    }

    pub fn get_input(&self, node_id: &str, name: &str) -> Option<&TaskValue> {
        self.nodes.get(node_id)?.inputs.get(name)
    }

    pub fn set_input(&mut self, node_id: &str, name: impl Into<String>, value: TaskValue) {
        self.nodes
            .entry(node_id.to_string())
            .or_default()
            .inputs
            .insert(name.into(), value);
    }

    pub fn get_output(&self, node_id: &str, name: &str) -> Option<&TaskValue> {
        self.nodes.get(node_id)?.outputs.get(name)
    }

    pub fn set_output(&mut self, node_id: &str, name: impl Into<String>, value: TaskValue) {
        self.nodes
            .entry(node_id.to_string())
            .or_default()
            .outputs
            .insert(name.into(), value);
    }

    pub fn browser(&self) -> Option<Arc<dyn Browser>> {
        self.browser.clone()
    }

    pub fn set_browser(&mut self, browser: Option<Arc<dyn Browser>>) {
        self.browser = browser;
    }

    pub fn page(&self) -> Option<Arc<dyn Page>> {
        self.page.clone()
    }

    pub fn set_page(&mut self, page: Option<Arc<dyn Page>>) {
        self.page = page;
    }

    /// Hand back the shared handles, leaving the environment without any.
    pub fn take_handles(&mut self) -> (Option<Arc<dyn Browser>>, Option<Arc<dyn Page>>) {
        (self.browser.take(), self.page.take())
    }
}
