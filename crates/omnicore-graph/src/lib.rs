mod error;
mod graph;

pub use error::GraphError;
pub use graph::{
    DependencyGraph, DependencyGraphBuilder, EdgeKind, GraphEdge, GraphNode, NodeKind,
};
