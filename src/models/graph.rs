//! Graph models handed to the rendering boundary.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::entity::{EntityId, RawEntity};
use crate::error::AppError;

/// Which relationship category is projected into edges.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GraphMode {
    /// Stack and integration links (`built_on`, `library`).
    #[default]
    StackIntegration,
    /// Affiliation and contributing-team links.
    Affiliation,
    /// Funding grants, giver to receiver.
    FundingReceived,
}

impl GraphMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            GraphMode::StackIntegration => "stack_integration",
            GraphMode::Affiliation => "affiliation",
            GraphMode::FundingReceived => "funding_received",
        }
    }
}

impl fmt::Display for GraphMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for GraphMode {
    type Err = AppError;

    /// Accepts the canonical names and the legacy `affiliations` / `funding`.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "stack_integration" => Ok(GraphMode::StackIntegration),
            "affiliation" | "affiliations" => Ok(GraphMode::Affiliation),
            "funding_received" | "funding" => Ok(GraphMode::FundingReceived),
            other => Err(AppError::InvalidMode(other.to_string())),
        }
    }
}

/// Kind of entity behind a node. Ids are namespaced by kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NodeKind {
    Project,
}

impl NodeKind {
    pub fn prefix(&self) -> &'static str {
        match self {
            NodeKind::Project => "project",
        }
    }

    /// Namespaced node id, e.g. `project:42`.
    pub fn node_id(&self, id: &EntityId) -> String {
        format!("{}:{}", self.prefix(), id)
    }
}

/// Closed set of edge types.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EdgeType {
    BuiltOn,
    Library,
    Affiliated,
    Contributor,
    Grant,
}

impl EdgeType {
    pub fn as_str(&self) -> &'static str {
        match self {
            EdgeType::BuiltOn => "built_on",
            EdgeType::Library => "library",
            EdgeType::Affiliated => "affiliated",
            EdgeType::Contributor => "contributor",
            EdgeType::Grant => "grant",
        }
    }
}

impl fmt::Display for EdgeType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Direction of a funding edge; structural edges carry none.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Direction {
    Out,
}

/// Public projection of an entity.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GraphNode {
    /// Kind-prefixed id.
    pub id: String,
    pub kind: NodeKind,
    pub label: String,
    /// Composite score, drives visual sizing.
    pub cp: f64,
    pub tags: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub category: Option<String>,
}

impl GraphNode {
    pub fn from_entity(entity: &RawEntity) -> Self {
        Self {
            id: NodeKind::Project.node_id(&entity.id),
            kind: NodeKind::Project,
            label: entity.name.clone(),
            cp: entity.score,
            tags: entity.categories.clone(),
            category: entity.primary_category().map(str::to_string),
        }
    }
}

/// A typed, weighted relationship between two node ids.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GraphEdge {
    pub source: String,
    pub target: String,
    #[serde(rename = "type")]
    pub edge_type: EdgeType,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub direction: Option<Direction>,
    pub weight: f64,
}

impl GraphEdge {
    /// Structural edge with weight 1 and no direction.
    pub fn structural(source: String, target: String, edge_type: EdgeType) -> Self {
        Self {
            source,
            target,
            edge_type,
            direction: None,
            weight: 1.0,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct GraphCounts {
    pub nodes: usize,
    pub links: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GraphMeta {
    pub mode: GraphMode,
    pub generated_at: DateTime<Utc>,
    /// Category filter that was applied.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub category: Option<String>,
    /// Edge limit as requested; the default ceiling applies when absent.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub limit: Option<usize>,
    pub counts: GraphCounts,
}

/// The unit handed to the renderer.
///
/// Every edge's `source` and `target` is the id of a node in `nodes`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Graph {
    pub meta: GraphMeta,
    pub nodes: Vec<GraphNode>,
    #[serde(rename = "links")]
    pub edges: Vec<GraphEdge>,
}

/// Parameters of a graph request.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct GraphRequest {
    #[serde(default)]
    pub mode: GraphMode,
    #[serde(default)]
    pub category: Option<String>,
    #[serde(default)]
    pub limit: Option<usize>,
}

impl GraphRequest {
    pub fn new(mode: GraphMode) -> Self {
        Self {
            mode,
            ..Default::default()
        }
    }

    pub fn with_category(mut self, category: impl Into<String>) -> Self {
        self.category = Some(category.into());
        self
    }

    pub fn with_limit(mut self, limit: usize) -> Self {
        self.limit = Some(limit);
        self
    }

    /// Category filter, treating an empty string as no filter.
    pub fn category_filter(&self) -> Option<&str> {
        self.category.as_deref().filter(|c| !c.is_empty())
    }
}
