//! Pipeline graph runtime representation.

use std::collections::HashMap;

use cellflow_core::{DataTable, DataTypeRegistry, Error, ProgressInfo};
use petgraph::Direction;
use petgraph::algo::{is_cyclic_directed, toposort};
use petgraph::graph::{DiGraph, NodeIndex};
use petgraph::visit::EdgeRef;

use super::edge::Connection;
use crate::TRACING_TARGET_GRAPH;
use crate::engine::{ExecutionDriver, NodeInputs, NodeRun};
use crate::error::{RuntimeError, RuntimeResult};
use crate::node::{Node, NodeId};

/// A pipeline of nodes connected slot to slot.
///
/// Internally uses petgraph's `DiGraph`; edges run from producer to consumer.
#[derive(Debug, Clone, Default)]
pub struct Pipeline {
    graph: DiGraph<Node, Connection>,
    node_indices: HashMap<NodeId, NodeIndex>,
}

impl Pipeline {
    /// Creates an empty pipeline.
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the number of nodes.
    pub fn node_count(&self) -> usize {
        self.graph.node_count()
    }

    /// Returns the number of connections.
    pub fn edge_count(&self) -> usize {
        self.graph.edge_count()
    }

    /// Returns whether the pipeline has no nodes.
    pub fn is_empty(&self) -> bool {
        self.graph.node_count() == 0
    }

    /// Adds a node and returns its ID.
    pub fn add_node(&mut self, node: Node) -> RuntimeResult<NodeId> {
        node.validate()?;
        let id = node.id();
        if self.node_indices.contains_key(&id) {
            return Err(RuntimeError::InvalidDefinition(format!(
                "node {id} is already part of the pipeline"
            )));
        }

        let index = self.graph.add_node(node);
        self.node_indices.insert(id, index);
        Ok(id)
    }

    /// Returns a node by ID.
    pub fn get_node(&self, id: NodeId) -> Option<&Node> {
        let index = self.node_indices.get(&id)?;
        self.graph.node_weight(*index)
    }

    /// Returns an iterator over all nodes in insertion order.
    pub fn nodes(&self) -> impl Iterator<Item = &Node> {
        self.graph.node_weights()
    }

    /// Connects output slot `from_slot` of `from` to input slot `to_slot` of `to`.
    pub fn connect(
        &mut self,
        from: NodeId,
        from_slot: &str,
        to: NodeId,
        to_slot: &str,
    ) -> RuntimeResult<()> {
        let from_index = self.index(from)?;
        let to_index = self.index(to)?;
        self.graph[from_index].output(from_slot)?;
        self.graph[to_index].input(to_slot)?;

        self.graph
            .add_edge(from_index, to_index, Connection::new(from_slot, to_slot));
        Ok(())
    }

    /// Validates the graph structure and slot types.
    ///
    /// Checks that:
    /// - The graph is acyclic
    /// - Every connection joins types that can convert at runtime
    pub fn validate(&self, registry: &DataTypeRegistry) -> RuntimeResult<()> {
        if is_cyclic_directed(&self.graph) {
            return Err(cycle_detected());
        }

        for edge in self.graph.edge_references() {
            let connection = edge.weight();
            let from = self.graph[edge.source()].output(&connection.from_slot)?;
            let to = self.graph[edge.target()].input(&connection.to_slot)?;

            // A general output type may still carry rows of a convertible subtype.
            let compatible = registry.is_convertible(from.data_type(), to.data_type())
                || registry.is_trivially_convertible(to.data_type(), from.data_type());
            if !compatible {
                return Err(Error::NoConversionPath {
                    from: from.data_type().clone(),
                    to: to.data_type().clone(),
                }
                .into());
            }
        }

        Ok(())
    }

    /// Returns node IDs in topological order.
    pub fn topological_order(&self) -> RuntimeResult<Vec<NodeId>> {
        Ok(self
            .sorted()?
            .into_iter()
            .map(|index| self.graph[index].id())
            .collect())
    }

    /// Runs every node in topological order.
    ///
    /// Each node receives the output tables of its upstream connections; a
    /// failed node aborts the run.
    pub async fn run(
        &self,
        driver: &ExecutionDriver,
        progress: &ProgressInfo,
    ) -> RuntimeResult<PipelineRun> {
        self.validate(driver.registry())?;
        let order = self.sorted()?;
        let total = order.len();

        tracing::info!(
            target: TRACING_TARGET_GRAPH,
            run_id = %driver.run_id(),
            nodes = total,
            edges = self.graph.edge_count(),
            "Running pipeline"
        );

        let mut runs: HashMap<NodeIndex, NodeRun> = HashMap::with_capacity(total);
        for (position, index) in order.iter().copied().enumerate() {
            if progress.is_cancelled() {
                tracing::info!(target: TRACING_TARGET_GRAPH, completed = position, "Pipeline cancelled");
                return Err(RuntimeError::Cancelled);
            }

            let node = &self.graph[index];
            let inputs = self.gather(index, &runs);

            tracing::debug!(
                target: TRACING_TARGET_GRAPH,
                node_id = %node.id(),
                node = node.name(),
                position,
                "Running node"
            );
            let run = driver
                .run_node(node, &inputs, &progress.resolve_item("Node", position, total))
                .await?;
            runs.insert(index, run);
        }

        let mut result = PipelineRun::default();
        for index in order {
            let id = self.graph[index].id();
            if let Some(run) = runs.remove(&index) {
                result.order.push(id);
                result.runs.insert(id, run);
            }
        }
        Ok(result)
    }

    /// Collects upstream output tables in connection order.
    fn gather(&self, index: NodeIndex, runs: &HashMap<NodeIndex, NodeRun>) -> NodeInputs {
        let mut edges: Vec<_> = self.graph.edges_directed(index, Direction::Incoming).collect();
        edges.sort_by_key(|edge| edge.id());

        let mut inputs = NodeInputs::new();
        for edge in edges {
            let connection = edge.weight();
            let table = runs
                .get(&edge.source())
                .and_then(|run| run.output(&connection.from_slot));
            if let Some(table) = table {
                inputs.push(connection.to_slot.clone(), table.clone());
            }
        }
        inputs
    }

    fn sorted(&self) -> RuntimeResult<Vec<NodeIndex>> {
        toposort(&self.graph, None).map_err(|_| cycle_detected())
    }

    fn index(&self, id: NodeId) -> RuntimeResult<NodeIndex> {
        self.node_indices.get(&id).copied().ok_or_else(|| {
            RuntimeError::InvalidDefinition(format!("node {id} does not exist"))
        })
    }
}

fn cycle_detected() -> RuntimeError {
    RuntimeError::InvalidDefinition("cycle detected in pipeline graph".into())
}

/// Outputs of every node of a pipeline run.
#[derive(Debug, Default)]
pub struct PipelineRun {
    order: Vec<NodeId>,
    runs: HashMap<NodeId, NodeRun>,
}

impl PipelineRun {
    /// Returns node IDs in the order they ran.
    pub fn order(&self) -> &[NodeId] {
        &self.order
    }

    /// Returns the run of a node.
    pub fn node(&self, id: NodeId) -> Option<&NodeRun> {
        self.runs.get(&id)
    }

    /// Returns an output table of a node.
    pub fn output(&self, id: NodeId, slot: &str) -> Option<&DataTable> {
        self.runs.get(&id)?.output(slot)
    }

    /// Returns the number of nodes that ran.
    pub fn len(&self) -> usize {
        self.runs.len()
    }

    /// Returns whether no node ran.
    pub fn is_empty(&self) -> bool {
        self.runs.is_empty()
    }
}
