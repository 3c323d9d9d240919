use std::collections::HashMap;

use omnicore_domain::{Pointer, ResourceType};
use petgraph::algo::is_cyclic_directed;
use petgraph::graph::{DiGraph, NodeIndex};
use serde::{Deserialize, Serialize};

use crate::error::GraphError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NodeKind {
    Resource,
    Controller,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EdgeKind {
    /// A resource owns (is the finalizer-ordering parent of) another resource.
    Owns,
    /// A controller reads a resource type as a `Primary` or `Mapped` input.
    Watches,
    /// A controller writes a resource type as an `Exclusive` or `Shared` output.
    Writes,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GraphNode {
    pub id: String,
    pub kind: NodeKind,
    pub label: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GraphEdge {
    pub from: String,
    pub to: String,
    pub kind: EdgeKind,
}

/// A renderable snapshot of the controller/resource dependency graph, served
/// by the `DependencyGraph` RPC. This is presentation and debugging
/// tooling — it is never used to gate a reconcile or a write, only to help an
/// operator understand what feeds what.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DependencyGraph {
    pub nodes: Vec<GraphNode>,
    pub edges: Vec<GraphEdge>,
    /// True if the edge set (restricted to controller->resource-type
    /// dependencies) contains a cycle. Surfaced for diagnostics; a cyclic
    /// graph is not rejected, since resource-level ownership can legitimately
    /// have no single topological order until instance data is known.
    pub cyclic: bool,
    /// Populated only when `cyclic` is false.
    pub topo_order: Option<Vec<String>>,
}

#[derive(Debug, Default)]
pub struct DependencyGraphBuilder {
    nodes: Vec<GraphNode>,
    edges: Vec<GraphEdge>,
    seen: HashMap<String, ()>,
}

impl DependencyGraphBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_resource_node(&mut self, pointer: &Pointer) -> Result<&mut Self, GraphError> {
        let id = format!("resource:{pointer}");
        self.add_node(id, NodeKind::Resource, pointer.to_string())
    }

    pub fn add_controller_node(&mut self, name: impl Into<String>) -> Result<&mut Self, GraphError> {
        let name = name.into();
        let id = format!("controller:{name}");
        self.add_node(id, NodeKind::Controller, name)
    }

    /// A resource *type* node, used for controller-to-resource-type graphs
    /// (e.g. "which controllers watch or write `MachineRequest`") where no
    /// single instance is being described.
    pub fn add_resource_type_node(&mut self, resource_type: &ResourceType) -> Result<&mut Self, GraphError> {
        let id = format!("resource-type:{resource_type}");
        self.add_node(id, NodeKind::Resource, resource_type.to_string())
    }

    /// Id of a resource-type node as produced by `add_resource_type_node`,
    /// for building edges without re-inserting the node.
    pub fn resource_type_node_id(resource_type: &ResourceType) -> String {
        format!("resource-type:{resource_type}")
    }

    /// Id of a controller node as produced by `add_controller_node`, for
    /// building edges without re-inserting the node.
    pub fn controller_node_id(name: &str) -> String {
        format!("controller:{name}")
    }

    fn add_node(&mut self, id: String, kind: NodeKind, label: String) -> Result<&mut Self, GraphError> {
        if self.seen.contains_key(&id) {
            return Err(GraphError::DuplicateNode(id));
        }
        self.seen.insert(id.clone(), ());
        self.nodes.push(GraphNode { id, kind, label });
        Ok(self)
    }

    pub fn add_edge(
        &mut self,
        from: impl Into<String>,
        to: impl Into<String>,
        kind: EdgeKind,
    ) -> Result<&mut Self, GraphError> {
        let from = from.into();
        let to = to.into();
        if !self.seen.contains_key(&from) {
            return Err(GraphError::UnknownNode(from));
        }
        if !self.seen.contains_key(&to) {
            return Err(GraphError::UnknownNode(to));
        }
        self.edges.push(GraphEdge { from, to, kind });
        Ok(self)
    }

    pub fn build(self) -> DependencyGraph {
        let mut graph: DiGraph<&str, ()> = DiGraph::new();
        let node_map: HashMap<&str, NodeIndex> = self
            .nodes
            .iter()
            .map(|n| (n.id.as_str(), graph.add_node(n.id.as_str())))
            .collect();

        for e in &self.edges {
            let from = node_map[e.from.as_str()];
            let to = node_map[e.to.as_str()];
            graph.add_edge(from, to, ());
        }

        let cyclic = is_cyclic_directed(&graph);
        let topo_order = if cyclic {
            None
        } else {
            petgraph::algo::toposort(&graph, None)
                .ok()
                .map(|order| order.iter().map(|idx| graph[*idx].to_string()).collect())
        };

        DependencyGraph {
            nodes: self.nodes,
            edges: self.edges,
            cyclic,
            topo_order,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use omnicore_domain::Pointer;

    #[test]
    fn builds_acyclic_graph_with_topo_order() {
        let mut b = DependencyGraphBuilder::new();
        b.add_controller_node("cluster-controller").unwrap();
        b.add_resource_node(&Pointer::new("Cluster", "default", "c1")).unwrap();
        b.add_edge("controller:cluster-controller", "resource:Cluster/default/c1", EdgeKind::Writes)
            .unwrap();

        let graph = b.build();
        assert!(!graph.cyclic);
        let order = graph.topo_order.unwrap();
        let pos_ctrl = order.iter().position(|n| n == "controller:cluster-controller").unwrap();
        let pos_res = order
            .iter()
            .position(|n| n == "resource:Cluster/default/c1")
            .unwrap();
        assert!(pos_ctrl < pos_res);
    }

    #[test]
    fn detects_cycle() {
        let mut b = DependencyGraphBuilder::new();
        b.add_controller_node("a").unwrap();
        b.add_controller_node("b").unwrap();
        b.add_edge("controller:a", "controller:b", EdgeKind::Watches).unwrap();
        b.add_edge("controller:b", "controller:a", EdgeKind::Watches).unwrap();

        let graph = b.build();
        assert!(graph.cyclic);
        assert!(graph.topo_order.is_none());
    }

    #[test]
    fn duplicate_node_rejected() {
        let mut b = DependencyGraphBuilder::new();
        b.add_controller_node("a").unwrap();
        let err = b.add_controller_node("a").unwrap_err();
        assert!(matches!(err, GraphError::DuplicateNode(_)));
    }

    #[test]
    fn edge_to_unknown_node_rejected() {
        let mut b = DependencyGraphBuilder::new();
        b.add_controller_node("a").unwrap();
        let err = b.add_edge("controller:a", "controller:missing", EdgeKind::Watches).unwrap_err();
        assert!(matches!(err, GraphError::UnknownNode(_)));
    }
}
