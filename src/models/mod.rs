//! Domain models: ingested entities, the reconciled dataset, and the graph
//! handed to the renderer.

mod dataset;
mod entity;
mod graph;
pub mod upstream;

pub use dataset::{DataOrigin, Dataset, Placeholder, ReconciliationReport};
pub use entity::{fallback_name, EntityId, GrantRecord, RawEntity, RelationRecord};
pub use graph::{
    Direction, EdgeType, Graph, GraphCounts, GraphEdge, GraphMeta, GraphMode, GraphNode,
    GraphRequest, NodeKind,
};
