use crate::{TaskDefinition, TaskType, TaskValue};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Serialized workflow graph as produced by the editor.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct FlowDefinition {
    pub nodes: Vec<GraphNode>,
    #[serde(default)]
    pub edges: Vec<GraphEdge>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub viewport: Option<serde_json::Value>,
}

impl FlowDefinition {
    pub fn parse(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }

    pub fn add_node(&mut self, node: GraphNode) -> String {
        let id = node.id.clone();
        self.nodes.push(node);
        id
    }

    pub fn connect(
        &mut self,
        source: impl Into<String>,
        source_handle: impl Into<String>,
        target: impl Into<String>,
        target_handle: impl Into<String>,
    ) {
        self.edges.push(GraphEdge {
            source: source.into(),
            source_handle: source_handle.into(),
            target: target.into(),
            target_handle: target_handle.into(),
        });
    }

    /// The edge feeding `input` on `node_id`, if any.
    pub fn incoming_edge(&self, node_id: &str, input: &str) -> Option<&GraphEdge> {
        self.edges
            .iter()
            .find(|e| e.target == node_id && e.target_handle == input)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GraphNode {
    pub id: String,
    pub data: NodeData,
    /// Editor-only fields (position, size, ...) kept for the phase snapshot.
    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NodeData {
    #[serde(rename = "type")]
    pub task_type: TaskType,
    #[serde(default)]
    pub inputs: HashMap<String, serde_json::Value>,
}

impl GraphNode {
    pub fn new(id: impl Into<String>, task_type: TaskType) -> Self {
        Self {
            id: id.into(),
            data: NodeData {
                task_type,
                inputs: HashMap::new(),
            },
            extra: serde_json::Map::new(),
        }
    }

    /// A node with its literal inputs seeded from the catalog defaults.
    pub fn from_task(id: impl Into<String>, definition: &TaskDefinition) -> Self {
        let mut node = Self::new(id, definition.task_type);
        for param in &definition.inputs {
            if let Some(default) = &param.default {
                node.data.inputs.insert(param.name.clone(), default.clone());
            }
        }
        node
    }

    pub fn with_input(mut self, name: impl Into<String>, value: impl Into<serde_json::Value>) -> Self {
        self.data.inputs.insert(name.into(), value.into());
        self
    }

    pub fn task_type(&self) -> TaskType {
        self.data.task_type
    }

    /// Literal value supplied in the editor, when it counts as provided.
    pub fn literal(&self, name: &str) -> Option<TaskValue> {
        self.data
            .inputs
            .get(name)
            .and_then(TaskValue::from_json)
            .filter(TaskValue::is_provided)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GraphEdge {
    pub source: String,
    pub source_handle: String,
    pub target: String,
    pub target_handle: String,
}
