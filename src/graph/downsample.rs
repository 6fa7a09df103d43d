//! Degree-bounded edge downsampling.
//!
//! Each node nominates its highest-weight edges up to a per-node quota of
//! `ceil(limit / nodes)`. Nominated edges are then admitted heaviest first
//! while both endpoints are under quota and the global limit is not reached.
//! Low-degree nodes therefore keep their edges even when a hub could fill
//! the whole budget alone.

use std::cmp::Ordering;
use std::collections::{HashMap, HashSet};

use crate::models::GraphEdge;

/// Per-node retention quota.
pub fn node_quota(limit: usize, node_count: usize) -> usize {
    limit.div_ceil(node_count.max(1))
}

/// Caps `edges` at `limit`, preserving the original order of kept edges.
pub fn downsample(edges: Vec<GraphEdge>, node_count: usize, limit: usize) -> Vec<GraphEdge> {
    if edges.len() <= limit {
        return edges;
    }
    if limit == 0 {
        return Vec::new();
    }

    let quota = node_quota(limit, node_count);
    let by_weight = |a: &usize, b: &usize| {
        edges[*b]
            .weight
            .partial_cmp(&edges[*a].weight)
            .unwrap_or(Ordering::Equal)
            .then(a.cmp(b))
    };

    let mut groups: HashMap<&str, Vec<usize>> = HashMap::new();
    for (idx, edge) in edges.iter().enumerate() {
        groups.entry(edge.source.as_str()).or_default().push(idx);
        if edge.target != edge.source {
            groups.entry(edge.target.as_str()).or_default().push(idx);
        }
    }

    let mut nominated: HashSet<usize> = HashSet::new();
    for group in groups.values_mut() {
        group.sort_by(by_weight);
        nominated.extend(group.iter().take(quota).copied());
    }

    let mut candidates: Vec<usize> = nominated.into_iter().collect();
    candidates.sort_by(by_weight);

    let mut degree: HashMap<&str, usize> = HashMap::new();
    let mut admitted: Vec<usize> = Vec::with_capacity(limit);
    for idx in candidates {
        if admitted.len() >= limit {
            break;
        }
        let edge = &edges[idx];
        let source = degree.get(edge.source.as_str()).copied().unwrap_or(0);
        let target = degree.get(edge.target.as_str()).copied().unwrap_or(0);
        if source >= quota || target >= quota {
            continue;
        }
        *degree.entry(edge.source.as_str()).or_default() += 1;
        if edge.target != edge.source {
            *degree.entry(edge.target.as_str()).or_default() += 1;
        }
        admitted.push(idx);
    }

    tracing::debug!(
        before = edges.len(),
        after = admitted.len(),
        limit,
        quota,
        "Downsampled edges"
    );

    let admitted: HashSet<usize> = admitted.into_iter().collect();
    edges
        .into_iter()
        .enumerate()
        .filter(|(idx, _)| admitted.contains(idx))
        .map(|(_, edge)| edge)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::EdgeType;

    fn edge(source: usize, target: usize, weight: f64) -> GraphEdge {
        GraphEdge {
            weight,
            ..GraphEdge::structural(
                format!("project:{source}"),
                format!("project:{target}"),
                EdgeType::Grant,
            )
        }
    }

    fn degrees(edges: &[GraphEdge]) -> HashMap<String, usize> {
        let mut degree = HashMap::new();
        for e in edges {
            *degree.entry(e.source.clone()).or_insert(0) += 1;
            *degree.entry(e.target.clone()).or_insert(0) += 1;
        }
        degree
    }

    #[test]
    fn test_within_budget_unchanged() {
        let edges = vec![edge(1, 2, 1.0), edge(2, 3, 5.0)];
        assert_eq!(downsample(edges.clone(), 3, 2), edges);
    }

    #[test]
    fn test_zero_limit() {
        assert!(downsample(vec![edge(1, 2, 1.0)], 2, 0).is_empty());
    }

    #[test]
    fn test_thousand_edges_over_fifty_nodes() {
        let mut edges = Vec::new();
        for i in 0..1000usize {
            let source = i % 50;
            let target = (i * 7 + 1 + i / 50) % 50;
            let target = if target == source { (target + 1) % 50 } else { target };
            edges.push(edge(source, target, (i % 13) as f64 + 1.0));
        }

        let kept = downsample(edges, 50, 800);
        assert!(kept.len() <= 800);
        assert!(!kept.is_empty());
        for (node, count) in degrees(&kept) {
            assert!(count <= 16, "{node} kept {count} edges");
        }
    }

    #[test]
    fn test_hub_does_not_starve_leaves() {
        // Hub 0 has heavy edges to 1..=10; leaves 11 and 12 share a light edge.
        let mut edges: Vec<GraphEdge> = (1..=10).map(|n| edge(0, n, 9.0)).collect();
        edges.push(edge(11, 12, 1.0));

        let kept = downsample(edges, 13, 6);
        assert!(kept.len() <= 6);
        assert!(kept.iter().any(|e| e.source == "project:11"));
        let hub = kept.iter().filter(|e| e.source == "project:0").count();
        assert!(hub <= node_quota(6, 13));
    }

    #[test]
    fn test_heavier_edges_preferred_and_order_kept() {
        let edges = vec![edge(5, 6, 4.0), edge(1, 2, 1.0), edge(3, 4, 8.0)];
        let kept = downsample(edges, 6, 2);
        let weights: Vec<f64> = kept.iter().map(|e| e.weight).collect();
        assert_eq!(weights, vec![4.0, 8.0]);
    }
}
