//! Projection of reconciled relationships into typed edges.

use crate::models::{
    Dataset, Direction, EdgeType, EntityId, GraphEdge, GraphMode, NodeKind, RawEntity,
    RelationRecord,
};

/// Upper bound of a funding edge weight.
pub const MAX_FUNDING_WEIGHT: f64 = 10.0;

/// Subtypes that classify a stack record as a library dependency.
const LIBRARY_SUBTYPES: &[&str] = &["library", "uses", "dependency"];

/// Saturating logarithmic weight of a grant amount, in `[1, 10]`.
///
/// Missing, non-finite and negative amounts count as zero.
pub fn funding_weight(amount: Option<f64>) -> f64 {
    let amount = amount.filter(|a| a.is_finite()).unwrap_or(0.0).max(0.0);
    ((1.0 + amount).ln() + 1.0).min(MAX_FUNDING_WEIGHT)
}

fn stack_edge_type(record: &RelationRecord) -> EdgeType {
    let is_library = record
        .subtype
        .as_deref()
        .map(|s| {
            let s = s.trim();
            LIBRARY_SUBTYPES.iter().any(|t| s.eq_ignore_ascii_case(t))
        })
        .unwrap_or(false);
    if is_library {
        EdgeType::Library
    } else {
        EdgeType::BuiltOn
    }
}

/// Collects edges while dropping unresolvable ones. Repeated relations are
/// kept: each record or grant is its own edge.
struct EdgeSink<'a> {
    dataset: &'a Dataset,
    edges: Vec<GraphEdge>,
    unresolved: usize,
}

impl<'a> EdgeSink<'a> {
    fn new(dataset: &'a Dataset) -> Self {
        Self {
            dataset,
            edges: Vec::new(),
            unresolved: 0,
        }
    }

    fn resolves(&mut self, id: Option<&EntityId>) -> Option<String> {
        match id {
            Some(id) if self.dataset.contains(id) => Some(NodeKind::Project.node_id(id)),
            _ => {
                self.unresolved += 1;
                None
            }
        }
    }

    fn push(&mut self, edge: GraphEdge) {
        self.edges.push(edge);
    }

    fn relations(
        &mut self,
        entity: &RawEntity,
        records: &[RelationRecord],
        classify: fn(&RelationRecord) -> EdgeType,
    ) {
        let source = NodeKind::Project.node_id(&entity.id);
        for record in records {
            if let Some(target) = self.resolves(record.target.as_ref()) {
                self.push(GraphEdge::structural(source.clone(), target, classify(record)));
            }
        }
    }

    fn grants(&mut self, receiver: &RawEntity) {
        let target = NodeKind::Project.node_id(&receiver.id);
        for grant in &receiver.grants {
            let weight = funding_weight(grant.amount);
            for giver in &grant.donators {
                if giver == &receiver.id {
                    continue;
                }
                if let Some(source) = self.resolves(Some(giver)) {
                    self.push(GraphEdge {
                        source,
                        target: target.clone(),
                        edge_type: EdgeType::Grant,
                        direction: Some(Direction::Out),
                        weight,
                    });
                }
            }
        }
    }
}

/// Builds the raw edge list for a mode, in entity listing order.
pub fn project(dataset: &Dataset, mode: GraphMode) -> Vec<GraphEdge> {
    let mut sink = EdgeSink::new(dataset);

    for entity in dataset.entities() {
        match mode {
            GraphMode::StackIntegration => sink.relations(entity, &entity.stack, stack_edge_type),
            GraphMode::Affiliation => {
                sink.relations(entity, &entity.affiliations, |_| EdgeType::Affiliated);
                sink.relations(entity, &entity.contributors, |_| EdgeType::Contributor);
            }
            GraphMode::FundingReceived => sink.grants(entity),
        }
    }

    if sink.unresolved > 0 {
        tracing::debug!(
            mode = %mode,
            unresolved = sink.unresolved,
            "Dropped relationship records with unresolvable targets"
        );
    }

    sink.edges
}
