//! Upstream document shapes and their conversion into the internal schema.
//!
//! The project-relations source is loosely typed: ids are strings or numbers,
//! reference fields vary per collection, grant givers are scalars or arrays,
//! and amounts may be numeric strings. Everything is validated here, at the
//! trust boundary. Records that cannot be converted are quarantined (counted
//! and logged) instead of travelling further down the pipeline.

use serde::Deserialize;
use serde_json::{Map, Value};

use super::entity::{fallback_name, EntityId, GrantRecord, RawEntity, RelationRecord};

/// Fields tried, in order, to find the entity a relation item points at.
pub const REFERENCE_FIELDS: [&str; 4] = ["project", "project_id", "id", "target_project_id"];

/// Fields tried, in order, for the display name of a relation target.
const TARGET_NAME_FIELDS: [&str; 2] = ["project_name", "name"];

/// Fields tried, in order, for a relation subtype.
const SUBTYPE_FIELDS: [&str; 2] = ["type", "affiliationType"];

/// Pagination block of a list document.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct Pagination {
    pub total: u64,
    pub limit: u64,
    pub offset: u64,
    pub has_more: bool,
}

/// A document returned by the project-relations endpoint, in either shape:
/// list mode (`data.projects` + `pagination`) or single mode (`data.project`).
#[derive(Debug, Clone, Default, Deserialize)]
pub struct UpstreamDocument {
    #[serde(default)]
    pub data: Option<DocumentData>,
    #[serde(default)]
    pub pagination: Option<Pagination>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct DocumentData {
    #[serde(default)]
    pub projects: Option<Value>,
    #[serde(default)]
    pub project: Option<Value>,
}

/// The record collection carried by a document.
#[derive(Debug, Clone)]
pub enum DocumentRecords {
    List(Vec<Value>),
    Single(Value),
}

impl DocumentRecords {
    pub fn into_vec(self) -> Vec<Value> {
        match self {
            DocumentRecords::List(records) => records,
            DocumentRecords::Single(record) => vec![record],
        }
    }
}

impl UpstreamDocument {
    /// Extracts the record collection, describing what was found when neither
    /// shape is present.
    pub fn records(self) -> Result<DocumentRecords, String> {
        let data = self
            .data
            .ok_or_else(|| "missing 'data' object".to_string())?;

        match (data.projects, data.project) {
            (Some(Value::Array(records)), _) => Ok(DocumentRecords::List(records)),
            (Some(other), _) => Err(format!(
                "expected 'data.projects' array in list mode, got {}",
                json_kind(&other)
            )),
            (None, Some(record @ Value::Object(_))) => Ok(DocumentRecords::Single(record)),
            (None, Some(other)) => Err(format!(
                "expected 'data.project' object in single mode, got {}",
                json_kind(&other)
            )),
            (None, None) => {
                Err("expected 'data.projects' (list) or 'data.project' (single)".to_string())
            }
        }
    }
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

/// Result of converting a batch of raw records.
#[derive(Debug, Default)]
pub struct Ingest {
    pub entities: Vec<RawEntity>,
    /// Entity records rejected outright (not an object, or no usable id).
    pub quarantined: usize,
    /// Relationship items dropped from otherwise valid entities.
    pub dropped_items: usize,
}

impl Ingest {
    pub fn extend(&mut self, other: Ingest) {
        self.entities.extend(other.entities);
        self.quarantined += other.quarantined;
        self.dropped_items += other.dropped_items;
    }
}

/// Converts raw upstream records into validated entities.
pub fn ingest_records(records: &[Value]) -> Ingest {
    let mut ingest = Ingest::default();
    for record in records {
        match entity_from_json(record, &mut ingest.dropped_items) {
            Some(entity) => ingest.entities.push(entity),
            None => {
                ingest.quarantined += 1;
                tracing::warn!(
                    record = %truncate(&record.to_string(), 120),
                    "Quarantined upstream record without a usable id"
                );
            }
        }
    }
    ingest
}

fn truncate(s: &str, max: usize) -> &str {
    match s.char_indices().nth(max) {
        Some((idx, _)) => &s[..idx],
        None => s,
    }
}

fn entity_from_json(value: &Value, dropped: &mut usize) -> Option<RawEntity> {
    let obj = value.as_object()?;
    let id = obj.get("id").and_then(EntityId::from_json)?;

    let name = string_field(obj, &["name"]).unwrap_or_else(|| fallback_name(&id));

    let mut categories: Vec<String> = match obj.get("categories") {
        Some(Value::Array(items)) => items
            .iter()
            .filter_map(|c| c.as_str())
            .map(str::to_string)
            .collect(),
        _ => Vec::new(),
    };
    if categories.is_empty() {
        if let Some(category) = string_field(obj, &["category"]) {
            categories.push(category);
        }
    }

    let score = obj.get("cp_total").and_then(loose_f64).unwrap_or(0.0);

    Some(RawEntity {
        stack: collection(obj, "stack_and_integrations", dropped, relation_from_json),
        affiliations: collection(obj, "affiliation", dropped, relation_from_json),
        contributors: collection(obj, "contributing_teams", dropped, relation_from_json),
        grants: collection(obj, "funding_received_grants", dropped, grant_from_json),
        id,
        name,
        categories,
        score,
    })
}

fn collection<T>(
    obj: &Map<String, Value>,
    key: &str,
    dropped: &mut usize,
    convert: fn(&Value) -> Option<T>,
) -> Vec<T> {
    match obj.get(key) {
        None | Some(Value::Null) => Vec::new(),
        Some(Value::Array(items)) => {
            let converted: Vec<T> = items.iter().filter_map(convert).collect();
            *dropped += items.len() - converted.len();
            converted
        }
        Some(_) => {
            *dropped += 1;
            Vec::new()
        }
    }
}

/// Resolves the first present field of `fields` to an entity id.
pub fn resolve_reference(obj: &Map<String, Value>, fields: &[&str]) -> Option<EntityId> {
    fields
        .iter()
        .find_map(|field| obj.get(*field).and_then(EntityId::from_json))
}

fn relation_from_json(value: &Value) -> Option<RelationRecord> {
    let obj = value.as_object()?;
    Some(RelationRecord {
        target: resolve_reference(obj, &REFERENCE_FIELDS),
        subtype: string_field(obj, &SUBTYPE_FIELDS),
        target_name: string_field(obj, &TARGET_NAME_FIELDS),
    })
}

fn grant_from_json(value: &Value) -> Option<GrantRecord> {
    let obj = value.as_object()?;
    let (donators, donator_names) = positional_refs(obj, "projectDonator", "projectDonator_name");
    let (organizations, organization_names) =
        positional_refs(obj, "organization", "organization_name");

    Some(GrantRecord {
        donators,
        donator_names,
        organizations,
        organization_names,
        amount: obj.get("amount").and_then(loose_f64),
        date: string_field(obj, &["date"]),
    })
}

/// Reads a scalar-or-array id field and its positional name list, keeping
/// names aligned with the ids that survive validation.
fn positional_refs(
    obj: &Map<String, Value>,
    ids_key: &str,
    names_key: &str,
) -> (Vec<EntityId>, Vec<Option<String>>) {
    let raw_ids = one_or_many(obj.get(ids_key));
    let raw_names = one_or_many(obj.get(names_key));

    let mut ids = Vec::with_capacity(raw_ids.len());
    let mut names = Vec::with_capacity(raw_ids.len());
    for (idx, raw) in raw_ids.iter().enumerate() {
        if let Some(id) = EntityId::from_json(raw) {
            ids.push(id);
            names.push(
                raw_names
                    .get(idx)
                    .and_then(|n| n.as_str())
                    .map(str::trim)
                    .filter(|n| !n.is_empty())
                    .map(str::to_string),
            );
        }
    }
    (ids, names)
}

fn one_or_many(value: Option<&Value>) -> Vec<Value> {
    match value {
        None | Some(Value::Null) => Vec::new(),
        Some(Value::Array(items)) => items.clone(),
        Some(other) => vec![other.clone()],
    }
}

fn string_field(obj: &Map<String, Value>, fields: &[&str]) -> Option<String> {
    fields.iter().find_map(|field| {
        obj.get(*field)
            .and_then(|v| v.as_str())
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(str::to_string)
    })
}

/// Reads a number or a numeric string. Anything else is absent.
fn loose_f64(value: &Value) -> Option<f64> {
    let parsed = match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse::<f64>().ok(),
        _ => None,
    }?;
    parsed.is_finite().then_some(parsed)
}
