use std::collections::VecDeque;

use serde::Serialize;

use util::{HashSet, IdVec};

use crate::{ArtifactRef, Error, NodeId, NodeInput, SlotIdx, StepKind};

/// One processing step in the execution graph.
#[derive(Debug, Clone, Serialize)]
pub struct Node {
    /// Unique name of this node within its graph.
    pub name: String,
    pub kind: StepKind,
    /// (parameter name, value) pairs, in declaration order.
    pub inputs: Vec<(String, NodeInput)>,
    /// Output slot names; an `ArtifactRef`'s slot indexes into this list.
    pub outputs: Vec<String>,
}

impl Node {
    /// Iterate through the upstream artifacts this node reads.
    pub fn dependencies(&self) -> impl Iterator<Item = ArtifactRef> + '_ {
        self.inputs.iter().filter_map(|(_, v)| v.artifact())
    }
}

/// Static description of a DAG for one subject.
///
/// Nodes can only reference artifacts of nodes that were added before them,
/// so insertion order is already a valid execution order.
/// Only the [`crate::Registrar`] adds nodes.
#[derive(Debug, Default)]
pub struct Graph {
    nodes: IdVec<NodeId, Node>,
    names: HashSet<String>,
}

impl Graph {
    /// Add a node, returning refs for each of its output slots in order.
    pub(crate) fn add_node(&mut self, node: Node) -> Result<(NodeId, Vec<ArtifactRef>), Error> {
        if self.names.contains(&node.name) {
            return Err(Error::DuplicateNode(node.name));
        }
        if u32::try_from(node.outputs.len()).is_err() {
            return Err(Error::TooManyOutputs(node.name, node.outputs.len()));
        }
        let id = self.nodes.next_id();
        for dep in node.dependencies() {
            // refs are only handed out by this graph, so anything at or past `id` is foreign:
            if dep.node() >= id {
                return Err(Error::DanglingArtifact(dep));
            }
        }
        let outputs = (0..node.outputs.len())
            .map(|slot| ArtifactRef::new(id, SlotIdx::from(slot)))
            .collect();
        self.names.insert(node.name.clone());
        self.nodes.push(node);
        Ok((id, outputs))
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Get the node with the given id.
    #[inline]
    pub fn node(&self, id: NodeId) -> Option<&Node> {
        self.nodes.get(id)
    }

    /// Iterate through (id, node) pairs in construction order.
    pub fn nodes(&self) -> impl Iterator<Item = (NodeId, &Node)> + '_ {
        self.nodes.enumerate()
    }

    /// Find a node by name.
    pub fn find(&self, name: &str) -> Option<(NodeId, &Node)> {
        self.nodes().find(|(_, n)| n.name == name)
    }

    /// All (producer, consumer) dependency edges, one per consuming input.
    pub fn edges(&self) -> Vec<(NodeId, NodeId)> {
        let mut edges = Vec::with_capacity(self.nodes.len() * 2);
        for (id, node) in self.nodes() {
            for dep in node.dependencies() {
                edges.push((dep.node(), id));
            }
        }
        edges
    }

    /// Group nodes into stages: every node's inputs are produced in an earlier stage,
    /// so all nodes within one stage may run in parallel.
    /// Stages are ordered, and nodes within a stage keep construction order.
    pub fn stages(&self) -> Vec<Vec<NodeId>> {
        let len = self.nodes.len();
        let mut indegree = vec![0usize; len];
        let mut downstream: Vec<Vec<usize>> = vec![Vec::new(); len];
        for (from, to) in self.edges() {
            let (from, to) = (usize::from(from), usize::from(to));
            indegree[to] += 1;
            downstream[from].push(to);
        }

        let mut stages = Vec::new();
        let mut ready: VecDeque<usize> = (0..len).filter(|i| indegree[*i] == 0).collect();
        while !ready.is_empty() {
            let mut stage: Vec<usize> = ready.drain(..).collect();
            stage.sort_unstable();
            for &i in &stage {
                for &j in &downstream[i] {
                    indegree[j] -= 1;
                    if indegree[j] == 0 {
                        ready.push_back(j);
                    }
                }
            }
            stages.push(stage.into_iter().map(NodeId::from).collect());
        }
        stages
    }

    /// Deterministic topological order: stage by stage.
    pub fn execution_order(&self) -> Vec<NodeId> {
        self.stages().into_iter().flatten().collect()
    }

    /// Serializable description of this graph for an external executor.
    pub fn description(&self) -> GraphDescription<'_> {
        let mut nodes = Vec::with_capacity(self.nodes.len());
        for (stage, ids) in self.stages().into_iter().enumerate() {
            for id in ids {
                if let Some(node) = self.node(id) {
                    nodes.push(NodeDescription { id, stage, node });
                }
            }
        }
        GraphDescription { nodes }
    }
}

#[derive(Debug, Serialize)]
pub struct NodeDescription<'a> {
    pub id: NodeId,
    pub stage: usize,
    #[serde(flatten)]
    pub node: &'a Node,
}

/// Nodes in execution order, each tagged with its parallel stage.
#[derive(Debug, Serialize)]
pub struct GraphDescription<'a> {
    pub nodes: Vec<NodeDescription<'a>>,
}
