//! Entity reconciliation.
//!
//! Guarantees that every relationship target, grant giver and administering
//! organization named anywhere in the dataset resolves to an entity. Ids
//! referenced but absent from the primary listing become placeholders (zero
//! score, no categories) named after the first display name found for them,
//! scanning entities in listing order.

use std::collections::{HashMap, HashSet};

use crate::models::{
    fallback_name, DataOrigin, Dataset, EntityId, Placeholder, RawEntity, ReconciliationReport,
};

/// Reconciles a fetched listing into a dataset.
pub fn reconcile(listing: Vec<RawEntity>, origin: DataOrigin) -> Dataset {
    let fetched = listing.len();
    let mut entities = dedup_listing(listing);
    let duplicates_dropped = fetched - entities.len();
    if duplicates_dropped > 0 {
        tracing::warn!(
            duplicates = duplicates_dropped,
            "Dropped repeated ids from the primary listing"
        );
    }

    let listed: HashSet<EntityId> = entities.iter().map(|e| e.id.clone()).collect();
    let missing: Vec<EntityId> = referenced_ids(&entities)
        .into_iter()
        .filter(|id| !listed.contains(id))
        .collect();

    let mut report = ReconciliationReport {
        listed: entities.len(),
        duplicates_dropped,
        placeholders: Vec::with_capacity(missing.len()),
    };

    if !missing.is_empty() {
        let mut names = recover_names(&entities, &missing);
        for id in missing {
            let name = names.remove(&id).unwrap_or_else(|| fallback_name(&id));
            report.placeholders.push(Placeholder {
                id: id.clone(),
                name: name.clone(),
            });
            entities.push(RawEntity::placeholder(id, name));
        }

        let sample: Vec<String> = report
            .placeholders
            .iter()
            .take(10)
            .map(|p| format!("{} ({})", p.name, p.id))
            .collect();
        tracing::info!(
            placeholders = report.placeholders.len(),
            sample = %sample.join(", "),
            "Synthesized placeholders for referenced entities missing from the listing"
        );
    }

    Dataset::new(entities, report, origin)
}

fn dedup_listing(listing: Vec<RawEntity>) -> Vec<RawEntity> {
    let mut seen = HashSet::with_capacity(listing.len());
    listing
        .into_iter()
        .filter(|e| seen.insert(e.id.clone()))
        .collect()
}

/// Every relation target, administering organization and grant giver, in
/// first-seen order.
fn referenced_ids(entities: &[RawEntity]) -> Vec<EntityId> {
    let mut seen = HashSet::new();
    let mut ordered = Vec::new();

    for entity in entities {
        let relation_targets = entity.relations().filter_map(|r| r.target.as_ref());
        let grant_parties = entity
            .grants
            .iter()
            .flat_map(|g| g.organizations.iter().chain(g.donators.iter()));

        for id in relation_targets.chain(grant_parties) {
            if seen.insert(id) {
                ordered.push(id.clone());
            }
        }
    }
    ordered
}

/// First display name seen for each wanted id. Within an entity, relation
/// records are scanned first, then organization names, then giver names.
fn recover_names(entities: &[RawEntity], wanted: &[EntityId]) -> HashMap<EntityId, String> {
    let wanted: HashSet<&EntityId> = wanted.iter().collect();
    let mut names: HashMap<EntityId, String> = HashMap::new();

    for entity in entities {
        let relation_names = entity.relations().filter_map(|r| {
            let target = r.target.as_ref()?;
            let name = r.target_name.as_deref()?;
            Some((target, name))
        });
        let grant_names = entity
            .grants
            .iter()
            .flat_map(|g| g.administrators().chain(g.givers()))
            .filter_map(|(id, name)| name.map(|n| (id, n)));

        for (id, name) in relation_names.chain(grant_names) {
            if wanted.contains(id) && !names.contains_key(id) {
                names.insert(id.clone(), name.to_string());
            }
        }
        if names.len() == wanted.len() {
            break;
        }
    }
    names
}
