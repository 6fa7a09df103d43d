//! Reconciled dataset held by the snapshot cache.

use std::collections::HashMap;

use serde::Serialize;

use super::entity::{EntityId, RawEntity};

/// Where a dataset came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum DataOrigin {
    /// Fetched from the upstream data source.
    Live,
    /// Loaded from the static fallback dataset.
    Fallback,
    /// Neither source was available.
    Empty,
}

/// A synthesized entity for an id referenced but not listed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Placeholder {
    pub id: EntityId,
    pub name: String,
}

/// What reconciliation changed.
#[derive(Debug, Clone, Default, Serialize)]
pub struct ReconciliationReport {
    /// Entities in the primary listing after deduplication.
    pub listed: usize,
    /// Repeated ids dropped from the primary listing.
    pub duplicates_dropped: usize,
    /// Placeholders appended, in creation order.
    pub placeholders: Vec<Placeholder>,
}

/// Entity set in which every relationship target and grant giver resolves
/// to an entity.
#[derive(Debug, Clone)]
pub struct Dataset {
    entities: Vec<RawEntity>,
    index: HashMap<EntityId, usize>,
    pub report: ReconciliationReport,
    pub origin: DataOrigin,
}

impl Dataset {
    /// Wraps an already reconciled entity list. Ids must be unique.
    pub fn new(entities: Vec<RawEntity>, report: ReconciliationReport, origin: DataOrigin) -> Self {
        let index = entities
            .iter()
            .enumerate()
            .map(|(idx, e)| (e.id.clone(), idx))
            .collect();
        Self {
            entities,
            index,
            report,
            origin,
        }
    }

    pub fn empty() -> Self {
        Self::new(Vec::new(), ReconciliationReport::default(), DataOrigin::Empty)
    }

    /// Entities in listing order, placeholders last.
    pub fn entities(&self) -> &[RawEntity] {
        &self.entities
    }

    pub fn get(&self, id: &EntityId) -> Option<&RawEntity> {
        self.index.get(id).map(|&idx| &self.entities[idx])
    }

    pub fn contains(&self, id: &EntityId) -> bool {
        self.index.contains_key(id)
    }

    pub fn len(&self) -> usize {
        self.entities.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entities.is_empty()
    }

    pub fn is_placeholder(&self, id: &EntityId) -> bool {
        self.report.placeholders.iter().any(|p| &p.id == id)
    }
}
