//! Graph construction over a reconciled dataset.
//!
//! A request runs four pure stages:
//!
//! - [`project`] - relationship records of the requested mode become edges
//! - [`filter_by_category`] - optional category filter plus edge re-filter
//! - [`downsample`] - degree-bounded cap on the edge count
//! - assembly - nodes in listing order, dangling edges removed
//!
//! Nothing here mutates the dataset, so graphs can be built concurrently
//! from the same cached snapshot.

mod downsample;
mod filter;
mod projection;

use std::collections::HashSet;

use chrono::Utc;

pub use downsample::{downsample, node_quota};
pub use filter::{filter_by_category, Filtered};
pub use projection::{funding_weight, project, MAX_FUNDING_WEIGHT};

use crate::config::GraphConfig;
use crate::models::{Dataset, Graph, GraphCounts, GraphMeta, GraphNode, GraphRequest};

/// Builds the graph for a request.
///
/// Always returns a structurally valid graph: every edge endpoint is a node.
pub fn build_graph(dataset: &Dataset, request: &GraphRequest, config: &GraphConfig) -> Graph {
    let category = request.category_filter();
    let limit = request.limit.unwrap_or(config.default_limit);

    let edges = project(dataset, request.mode);
    let projected = edges.len();

    let Filtered { entities, edges } =
        filter_by_category(dataset.entities(), edges, category, config.category_scope);
    let edges = downsample(edges, entities.len(), limit);

    let nodes: Vec<GraphNode> = entities.into_iter().map(GraphNode::from_entity).collect();
    let ids: HashSet<&str> = nodes.iter().map(|n| n.id.as_str()).collect();
    let edges: Vec<_> = edges
        .into_iter()
        .filter(|e| ids.contains(e.source.as_str()) && ids.contains(e.target.as_str()))
        .collect();

    tracing::debug!(
        mode = %request.mode,
        category = ?category,
        projected,
        nodes = nodes.len(),
        links = edges.len(),
        "Built graph"
    );

    Graph {
        meta: GraphMeta {
            mode: request.mode,
            generated_at: Utc::now(),
            category: category.map(str::to_string),
            limit: request.limit,
            counts: GraphCounts {
                nodes: nodes.len(),
                links: edges.len(),
            },
        },
        nodes,
        edges,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::CategoryScope;
    use crate::models::{
        DataOrigin, EdgeType, GrantRecord, GraphMode, RawEntity, RelationRecord,
    };
    use crate::services::reconcile::reconcile;

    fn entity(id: &str, name: &str) -> RawEntity {
        RawEntity::placeholder(id.into(), name.to_string())
    }

    fn assert_no_dangling(graph: &Graph) {
        let ids: HashSet<&str> = graph.nodes.iter().map(|n| n.id.as_str()).collect();
        for edge in &graph.edges {
            assert!(ids.contains(edge.source.as_str()), "dangling {}", edge.source);
            assert!(ids.contains(edge.target.as_str()), "dangling {}", edge.target);
        }
    }

    #[test]
    fn test_two_node_stack_graph() {
        let mut a = entity("1", "A");
        a.stack.push(RelationRecord {
            target: Some("2".into()),
            subtype: Some("built_on".to_string()),
            target_name: None,
        });
        let dataset = reconcile(vec![a, entity("2", "B")], DataOrigin::Live);

        let graph = build_graph(
            &dataset,
            &GraphRequest::new(GraphMode::StackIntegration),
            &GraphConfig::default(),
        );
        assert_eq!(graph.nodes.len(), 2);
        assert_eq!(graph.edges.len(), 1);
        assert_eq!(graph.edges[0].edge_type, EdgeType::BuiltOn);
        assert_eq!(graph.edges[0].weight, 1.0);
        assert_eq!(graph.meta.counts, GraphCounts { nodes: 2, links: 1 });
        assert_eq!(graph.meta.limit, None);
    }

    #[test]
    fn test_funding_graph_with_placeholder_giver() {
        let mut a = entity("1", "A");
        a.grants.push(GrantRecord {
            donators: vec!["3".into()],
            donator_names: vec![Some("Giver".to_string())],
            amount: Some(1000.0),
            ..Default::default()
        });
        let dataset = reconcile(vec![a], DataOrigin::Live);
        assert_eq!(dataset.get(&"3".into()).unwrap().name, "Giver");

        let graph = build_graph(
            &dataset,
            &GraphRequest::new(GraphMode::FundingReceived),
            &GraphConfig::default(),
        );
        assert_eq!(graph.edges.len(), 1);
        let edge = &graph.edges[0];
        assert_eq!(edge.source, "project:3");
        assert_eq!(edge.target, "project:1");
        assert!((edge.weight - 7.91).abs() < 0.01);
        assert_no_dangling(&graph);
    }

    #[test]
    fn test_limit_and_category_recorded_in_meta() {
        let mut a = entity("1", "A");
        a.categories.push("DeFi".to_string());
        let dataset = reconcile(vec![a, entity("2", "B")], DataOrigin::Live);

        let request = GraphRequest::new(GraphMode::Affiliation)
            .with_category("DeFi")
            .with_limit(5);
        let graph = build_graph(&dataset, &request, &GraphConfig::default());

        assert_eq!(graph.meta.category.as_deref(), Some("DeFi"));
        assert_eq!(graph.meta.limit, Some(5));
        assert_eq!(graph.nodes.len(), 1);
        assert_eq!(graph.nodes[0].category.as_deref(), Some("DeFi"));
    }

    #[test]
    fn test_downsampled_graph_bounds() {
        let mut entities: Vec<RawEntity> = (0..50).map(|i| entity(&i.to_string(), "N")).collect();
        for i in 0..1000usize {
            let source = i % 50;
            let target = (source + 1 + i / 50) % 50;
            entities[source].stack.push(RelationRecord {
                target: Some(target.to_string().as_str().into()),
                subtype: None,
                target_name: None,
            });
        }
        let dataset = reconcile(entities, DataOrigin::Live);

        let request = GraphRequest::new(GraphMode::StackIntegration).with_limit(800);
        let graph = build_graph(&dataset, &request, &GraphConfig::default());

        assert!(graph.edges.len() <= 800);
        let mut degree = std::collections::HashMap::new();
        for e in &graph.edges {
            *degree.entry(&e.source).or_insert(0) += 1;
            *degree.entry(&e.target).or_insert(0) += 1;
        }
        assert!(degree.values().all(|&d| d <= 16));
        assert_no_dangling(&graph);
    }

    #[test]
    fn test_category_filter_keeps_edge_endpoints() {
        let mut a = entity("1", "A");
        a.categories.push("DeFi".to_string());
        a.stack.push(RelationRecord {
            target: Some("2".into()),
            ..Default::default()
        });
        let dataset = reconcile(vec![a, entity("2", "B"), entity("3", "C")], DataOrigin::Live);

        for scope in [CategoryScope::Endpoints, CategoryScope::Anchored] {
            let config = GraphConfig {
                category_scope: scope,
                ..Default::default()
            };
            let request = GraphRequest::new(GraphMode::StackIntegration).with_category("DeFi");
            let graph = build_graph(&dataset, &request, &config);
            assert_eq!(graph.nodes.len(), 2, "{scope:?}");
            assert_eq!(graph.edges.len(), 1);
            assert_no_dangling(&graph);
        }
    }

    #[test]
    fn test_empty_dataset_yields_valid_graph() {
        let graph = build_graph(
            &Dataset::empty(),
            &GraphRequest::new(GraphMode::FundingReceived).with_category("DeFi"),
            &GraphConfig::default(),
        );
        assert!(graph.nodes.is_empty());
        assert!(graph.edges.is_empty());
        assert_eq!(graph.meta.counts, GraphCounts { nodes: 0, links: 0 });
    }

    #[test]
    fn test_build_is_idempotent() {
        let mut a = entity("1", "A");
        a.affiliations.push(RelationRecord {
            target: Some("2".into()),
            ..Default::default()
        });
        let dataset = reconcile(vec![a], DataOrigin::Live);
        let request = GraphRequest::new(GraphMode::Affiliation);

        let first = build_graph(&dataset, &request, &GraphConfig::default());
        let second = build_graph(&dataset, &request, &GraphConfig::default());
        assert_eq!(first.nodes, second.nodes);
        assert_eq!(first.edges, second.edges);
    }
}
