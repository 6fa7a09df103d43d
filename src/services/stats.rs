//! Dataset statistics for operational tooling.

use std::collections::{BTreeMap, HashSet};

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::context::{AppCache, Context};
use crate::di::FromRef;
use crate::models::{DataOrigin, Dataset, EntityId};

/// Record counts per relationship category.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct RelationCounts {
    pub stack_and_integrations: usize,
    pub affiliations: usize,
    pub contributing_teams: usize,
    pub funding_grants: usize,
}

/// Grants attributed to one giver.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct GiverSummary {
    pub id: EntityId,
    pub name: String,
    pub grant_count: usize,
    /// Recipient ids in listing order, one per grant.
    pub recipients: Vec<EntityId>,
}

/// One giver to receiver grant.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GrantEntry {
    pub from: EntityId,
    pub to: EntityId,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub amount: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub date: Option<String>,
}

const SAMPLE_GRANTS: usize = 10;

#[derive(Debug, Clone, Serialize)]
pub struct DatasetStats {
    pub origin: DataOrigin,
    /// Wall-clock time the served snapshot was captured.
    pub captured_at: Option<DateTime<Utc>>,
    pub snapshot_age_secs: Option<u64>,
    pub total_entities: usize,
    pub listed_entities: usize,
    pub placeholders: usize,
    pub relations: RelationCounts,
    /// Giver to recipient grants, self-grants excluded. Repeats count.
    pub grant_edges: usize,
    pub recipients_with_grants: usize,
    pub unique_givers: usize,
    /// Givers with the most grants first.
    pub grants_by_giver: Vec<GiverSummary>,
    /// The first grants in listing order.
    pub sample_grants: Vec<GrantEntry>,
}

/// Summarizes the cached dataset.
#[derive(Clone)]
pub struct StatsService {
    cache: AppCache,
}

impl FromRef<Context> for StatsService {
    fn from_ref(ctx: &Context) -> Self {
        Self {
            cache: FromRef::from_ref(ctx),
        }
    }
}

impl StatsService {
    pub async fn summarize(&self, force_refresh: bool) -> DatasetStats {
        let dataset = self.cache.get(force_refresh).await;
        let mut stats = summarize_dataset(&dataset);
        if let Some(snapshot) = self.cache.peek().await {
            stats.captured_at = Some(snapshot.captured_wall);
            stats.snapshot_age_secs = Some(snapshot.age().as_secs());
        }
        stats
    }
}

pub fn summarize_dataset(dataset: &Dataset) -> DatasetStats {
    let mut relations = RelationCounts::default();
    let mut grant_edges = 0;
    let mut sample_grants = Vec::new();
    let mut recipients: HashSet<&EntityId> = HashSet::new();
    let mut by_giver: BTreeMap<&EntityId, Vec<EntityId>> = BTreeMap::new();

    for entity in dataset.entities() {
        relations.stack_and_integrations += entity.stack.len();
        relations.affiliations += entity.affiliations.len();
        relations.contributing_teams += entity.contributors.len();
        relations.funding_grants += entity.grants.len();

        for grant in &entity.grants {
            for giver in grant.donators.iter().filter(|g| *g != &entity.id) {
                grant_edges += 1;
                recipients.insert(&entity.id);
                by_giver.entry(giver).or_default().push(entity.id.clone());
                if sample_grants.len() < SAMPLE_GRANTS {
                    sample_grants.push(GrantEntry {
                        from: giver.clone(),
                        to: entity.id.clone(),
                        amount: grant.amount,
                        date: grant.date.clone(),
                    });
                }
            }
        }
    }

    let mut grants_by_giver: Vec<GiverSummary> = by_giver
        .into_iter()
        .map(|(id, recipients)| GiverSummary {
            id: id.clone(),
            name: dataset
                .get(id)
                .map(|e| e.name.clone())
                .unwrap_or_else(|| id.to_string()),
            grant_count: recipients.len(),
            recipients,
        })
        .collect();
    grants_by_giver.sort_by(|a, b| b.grant_count.cmp(&a.grant_count));

    DatasetStats {
        origin: dataset.origin,
        captured_at: None,
        snapshot_age_secs: None,
        total_entities: dataset.len(),
        listed_entities: dataset.report.listed,
        placeholders: dataset.report.placeholders.len(),
        relations,
        grant_edges,
        recipients_with_grants: recipients.len(),
        unique_givers: grants_by_giver.len(),
        grants_by_giver,
        sample_grants,
    }
}
