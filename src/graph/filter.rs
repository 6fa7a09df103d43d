//! Category filtering of entities and their edges.

use std::collections::HashSet;

use crate::config::CategoryScope;
use crate::models::{GraphEdge, NodeKind, RawEntity};

/// Entities and edges that survived filtering.
#[derive(Debug)]
pub struct Filtered<'a> {
    pub entities: Vec<&'a RawEntity>,
    pub edges: Vec<GraphEdge>,
}

/// Applies an optional category filter.
///
/// With [`CategoryScope::Endpoints`] an entity is kept when it matches the
/// category or is an endpoint of any projected edge. With
/// [`CategoryScope::Anchored`] an edge survives only if one of its endpoints
/// matches, and the endpoints of surviving edges are kept. In both scopes an
/// endpoint of a retained edge is never dropped.
pub fn filter_by_category<'a>(
    entities: &'a [RawEntity],
    edges: Vec<GraphEdge>,
    category: Option<&str>,
    scope: CategoryScope,
) -> Filtered<'a> {
    let Some(category) = category else {
        return Filtered {
            entities: entities.iter().collect(),
            edges,
        };
    };

    let matching: HashSet<String> = entities
        .iter()
        .filter(|e| e.has_category(category))
        .map(|e| NodeKind::Project.node_id(&e.id))
        .collect();

    let edges: Vec<GraphEdge> = match scope {
        CategoryScope::Endpoints => edges,
        CategoryScope::Anchored => edges
            .into_iter()
            .filter(|e| matching.contains(&e.source) || matching.contains(&e.target))
            .collect(),
    };

    let mut keep = matching;
    for edge in &edges {
        keep.insert(edge.source.clone());
        keep.insert(edge.target.clone());
    }

    let entities: Vec<&RawEntity> = entities
        .iter()
        .filter(|e| keep.contains(&NodeKind::Project.node_id(&e.id)))
        .collect();

    // Edge re-filter against the surviving entity set.
    let present: HashSet<String> = entities
        .iter()
        .map(|e| NodeKind::Project.node_id(&e.id))
        .collect();
    let edges = edges
        .into_iter()
        .filter(|e| present.contains(&e.source) && present.contains(&e.target))
        .collect();

    Filtered { entities, edges }
}
