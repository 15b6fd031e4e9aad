use petgraph::graph::{DiGraph, NodeIndex};
use petgraph::Direction;
use scrapecore::{FlowDefinition, GraphNode, PlanningError, TaskCatalog, TaskDefinition};
use serde::Serialize;
use std::collections::{HashMap, HashSet};

/// A batch of nodes whose inputs are satisfied by earlier phases.
#[derive(Debug, Clone, Serialize)]
pub struct Phase {
    /// 1-based phase number.
    pub number: u32,
    pub nodes: Vec<GraphNode>,
}

/// Ordered, dependency-respecting plan compiled from a workflow graph.
#[derive(Debug, Clone, Serialize)]
pub struct ExecutionPlan {
    pub phases: Vec<Phase>,
}

impl ExecutionPlan {
    pub fn node_count(&self) -> usize {
        self.phases.iter().map(|p| p.nodes.len()).sum()
    }

    /// Nodes with their phase number, in execution order.
    pub fn nodes(&self) -> impl Iterator<Item = (u32, &GraphNode)> {
        self.phases
            .iter()
            .flat_map(|p| p.nodes.iter().map(move |n| (p.number, n)))
    }

    /// Phase number a node was assigned to.
    pub fn phase_of(&self, node_id: &str) -> Option<u32> {
        self.nodes()
            .find(|(_, n)| n.id == node_id)
            .map(|(number, _)| number)
    }
}

/// Readiness of one node against the set of nodes planned so far.
#[derive(Default)]
struct Readiness {
    /// Required inputs with neither a literal nor an incoming edge.
    missing: Vec<String>,
    /// Inputs wired from a node that is not planned yet.
    waiting: Vec<String>,
}

impl Readiness {
    fn is_ready(&self) -> bool {
        self.missing.is_empty() && self.waiting.is_empty()
    }
}

fn readiness(
    node: &GraphNode,
    definition: &TaskDefinition,
    flow: &FlowDefinition,
    planned: &HashSet<&str>,
) -> Readiness {
    let mut result = Readiness::default();
    for param in &definition.inputs {
        if node.literal(&param.name).is_some() {
            continue;
        }
        match flow.incoming_edge(&node.id, &param.name) {
            Some(edge) if planned.contains(edge.source.as_str()) => {}
            Some(_) => result.waiting.push(param.name.clone()),
            None if param.required => result.missing.push(param.name.clone()),
            None => {}
        }
    }
    result
}

/// Compile a workflow graph into phases.
///
/// The first entry-point node in input order forms phase 1. Each following
/// phase holds, in input order, every node whose inputs are all supplied by
/// a literal or by an edge from a node planned in an earlier phase.
pub fn plan(catalog: &TaskCatalog, flow: &FlowDefinition) -> Result<ExecutionPlan, PlanningError> {
    let mut graph: DiGraph<usize, ()> = DiGraph::new();
    let mut index_of: HashMap<&str, NodeIndex> = HashMap::new();
    let mut definitions = Vec::with_capacity(flow.nodes.len());

    for (position, node) in flow.nodes.iter().enumerate() {
        let definition = catalog
            .get(node.task_type())
            .ok_or_else(|| PlanningError::UnknownTaskType {
                node_id: node.id.clone(),
                task_type: node.task_type(),
            })?;
        if index_of
            .insert(node.id.as_str(), graph.add_node(position))
            .is_some()
        {
            return Err(PlanningError::DuplicateNode(node.id.clone()));
        }
        definitions.push(definition);
    }

    for edge in &flow.edges {
        let source = *index_of
            .get(edge.source.as_str())
            .ok_or_else(|| PlanningError::UnknownNode(edge.source.clone()))?;
        let target = *index_of
            .get(edge.target.as_str())
            .ok_or_else(|| PlanningError::UnknownNode(edge.target.clone()))?;
        graph.add_edge(source, target, ());
    }

    let entry = flow
        .nodes
        .iter()
        .position(|n| catalog.is_entry_point(n.task_type()))
        .ok_or(PlanningError::NoEntryPoint)?;

    let entry_node = &flow.nodes[entry];
    // Phase 1 has no earlier phase, so any edge into the entry point is
    // unsatisfiable, even one shadowed by a literal.
    let entry_readiness = readiness(entry_node, definitions[entry], flow, &HashSet::new());
    let mut inputs = entry_readiness.missing;
    for edge in flow.edges.iter().filter(|e| e.target == entry_node.id) {
        if !inputs.contains(&edge.target_handle) {
            inputs.push(edge.target_handle.clone());
        }
    }
    if !inputs.is_empty() {
        return Err(PlanningError::UnsatisfiableInputs {
            node_id: entry_node.id.clone(),
            inputs,
        });
    }

    let mut planned: HashSet<&str> = HashSet::from([entry_node.id.as_str()]);
    let mut phases = vec![Phase {
        number: 1,
        nodes: vec![entry_node.clone()],
    }];

    while planned.len() < flow.nodes.len() {
        let number = phases.len() as u32 + 1;
        // Each round plans at least one node, so this bound is only hit
        // when planning is stuck.
        if number as usize > flow.nodes.len() {
            return Err(stuck(flow, &planned));
        }

        let earlier = planned.clone();
        let mut current = Vec::new();

        for (position, node) in flow.nodes.iter().enumerate() {
            if earlier.contains(node.id.as_str()) {
                continue;
            }

            let state = readiness(node, definitions[position], flow, &earlier);
            if state.is_ready() {
                current.push(node.clone());
                planned.insert(node.id.as_str());
                continue;
            }

            if state.missing.is_empty() {
                continue;
            }

            let predecessors_planned = graph
                .neighbors_directed(index_of[node.id.as_str()], Direction::Incoming)
                .all(|pred| earlier.contains(flow.nodes[graph[pred]].id.as_str()));
            if predecessors_planned {
                return Err(PlanningError::UnsatisfiableInputs {
                    node_id: node.id.clone(),
                    inputs: state.missing,
                });
            }
        }

        if current.is_empty() {
            return Err(stuck(flow, &planned));
        }

        tracing::debug!(phase = number, nodes = current.len(), "Planned phase");
        phases.push(Phase {
            number,
            nodes: current,
        });
    }

    Ok(ExecutionPlan { phases })
}

fn stuck(flow: &FlowDefinition, planned: &HashSet<&str>) -> PlanningError {
    PlanningError::Stuck {
        node_ids: flow
            .nodes
            .iter()
            .filter(|n| !planned.contains(n.id.as_str()))
            .map(|n| n.id.clone())
            .collect(),
    }
}
