//! Entity model: the strict internal schema for projects and their
//! relationship records.

use std::fmt;

use serde::{Deserialize, Deserializer, Serialize};

/// Identifier of an entity, always held in its string form.
///
/// Upstream ids arrive as JSON strings or numbers. Both collapse onto one
/// key: `3`, `3.0` and `"3"` are the same entity.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(transparent)]
pub struct EntityId(String);

impl EntityId {
    /// Builds an id from its string form. Surrounding whitespace is dropped;
    /// an empty string is not an id.
    pub fn parse(raw: &str) -> Option<Self> {
        let trimmed = raw.trim();
        if trimmed.is_empty() {
            None
        } else {
            Some(Self(trimmed.to_string()))
        }
    }

    /// Normalizes a JSON scalar. Objects, arrays, booleans and null are not ids.
    pub fn from_json(value: &serde_json::Value) -> Option<Self> {
        match value {
            serde_json::Value::String(s) => Self::parse(s),
            serde_json::Value::Number(n) => Some(Self(number_key(n))),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

fn number_key(n: &serde_json::Number) -> String {
    if let Some(i) = n.as_i64() {
        return i.to_string();
    }
    if let Some(u) = n.as_u64() {
        return u.to_string();
    }
    match n.as_f64() {
        Some(f) if f.fract() == 0.0 && f.abs() < 9.0e15 => format!("{}", f as i64),
        _ => n.to_string(),
    }
}

impl fmt::Display for EntityId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for EntityId {
    fn from(s: &str) -> Self {
        Self(s.trim().to_string())
    }
}

impl<'de> Deserialize<'de> for EntityId {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let value = serde_json::Value::deserialize(deserializer)?;
        EntityId::from_json(&value)
            .ok_or_else(|| serde::de::Error::custom(format!("not an entity id: {}", value)))
    }
}

/// Name given to an entity when no display name is known.
pub fn fallback_name(id: &EntityId) -> String {
    format!("Entity {}", id)
}

/// A link from an entity to another entity (stack, affiliation, or
/// contributing-team item).
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RelationRecord {
    /// Referenced entity, resolved through the reference fallback chain.
    pub target: Option<EntityId>,
    /// Free-text relationship subtype (e.g. "library", "built_on").
    #[serde(skip_serializing_if = "Option::is_none")]
    pub subtype: Option<String>,
    /// Display name of the target, used only to name placeholders.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub target_name: Option<String>,
}

/// A funding grant received by the owning entity.
///
/// Givers are listed positionally: `donator_names[i]` names `donators[i]`.
/// `organizations` identify who administered the grant; they are referenced
/// entities but not givers.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct GrantRecord {
    pub donators: Vec<EntityId>,
    pub donator_names: Vec<Option<String>>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub organizations: Vec<EntityId>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub organization_names: Vec<Option<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub amount: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub date: Option<String>,
}

impl GrantRecord {
    /// Givers paired with their positional display names.
    pub fn givers(&self) -> impl Iterator<Item = (&EntityId, Option<&str>)> {
        named(&self.donators, &self.donator_names)
    }

    /// Administering organizations paired with their positional names.
    pub fn administrators(&self) -> impl Iterator<Item = (&EntityId, Option<&str>)> {
        named(&self.organizations, &self.organization_names)
    }
}

fn named<'a>(
    ids: &'a [EntityId],
    names: &'a [Option<String>],
) -> impl Iterator<Item = (&'a EntityId, Option<&'a str>)> {
    ids.iter().enumerate().map(move |(i, id)| {
        let name = names
            .get(i)
            .and_then(|n| n.as_deref())
            .filter(|n| !n.is_empty());
        (id, name)
    })
}

/// A project as listed by the data source, after validation.
///
/// Created fresh on every fetch and never mutated afterwards.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RawEntity {
    pub id: EntityId,
    pub name: String,
    #[serde(default)]
    pub categories: Vec<String>,
    /// Composite score, drives node size.
    #[serde(default)]
    pub score: f64,
    #[serde(default)]
    pub stack: Vec<RelationRecord>,
    #[serde(default)]
    pub affiliations: Vec<RelationRecord>,
    #[serde(default)]
    pub contributors: Vec<RelationRecord>,
    #[serde(default)]
    pub grants: Vec<GrantRecord>,
}

impl RawEntity {
    /// Placeholder for an id that is referenced but not listed.
    pub fn placeholder(id: EntityId, name: String) -> Self {
        Self {
            id,
            name,
            categories: Vec::new(),
            score: 0.0,
            stack: Vec::new(),
            affiliations: Vec::new(),
            contributors: Vec::new(),
            grants: Vec::new(),
        }
    }

    /// Relation records in scan order: affiliation, stack, contributing teams.
    pub fn relations(&self) -> impl Iterator<Item = &RelationRecord> {
        self.affiliations
            .iter()
            .chain(self.stack.iter())
            .chain(self.contributors.iter())
    }

    pub fn has_category(&self, category: &str) -> bool {
        self.categories.iter().any(|c| c == category)
    }

    /// First category, used as the primary category of the node.
    pub fn primary_category(&self) -> Option<&str> {
        self.categories.first().map(String::as_str)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_numeric_and_string_ids_collapse() {
        let a: EntityId = serde_json::from_value(json!(3)).unwrap();
        let b: EntityId = serde_json::from_value(json!("3")).unwrap();
        let c: EntityId = serde_json::from_value(json!(3.0)).unwrap();
        assert_eq!(a, b);
        assert_eq!(b, c);
        assert_eq!(a.as_str(), "3");
    }

    #[test]
    fn test_non_scalar_ids_rejected() {
        assert!(EntityId::from_json(&json!(null)).is_none());
        assert!(EntityId::from_json(&json!("")).is_none());
        assert!(EntityId::from_json(&json!("   ")).is_none());
        assert!(EntityId::from_json(&json!([1])).is_none());
        assert!(serde_json::from_value::<EntityId>(json!(true)).is_err());
    }

    #[test]
    fn test_fractional_id_kept_verbatim() {
        let id = EntityId::from_json(&json!(2.5)).unwrap();
        assert_eq!(id.as_str(), "2.5");
    }

    #[test]
    fn test_grant_givers_positional() {
        let grant = GrantRecord {
            donators: vec!["3".into(), "4".into()],
            donator_names: vec![Some("Giver".to_string())],
            ..Default::default()
        };
        let givers: Vec<_> = grant.givers().collect();
        assert_eq!(givers.len(), 2);
        assert_eq!(givers[0].1, Some("Giver"));
        assert_eq!(givers[1].1, None);
    }

    #[test]
    fn test_administrators_positional() {
        let grant = GrantRecord {
            organizations: vec!["8".into(), "9".into()],
            organization_names: vec![None, Some("Admin".to_string())],
            ..Default::default()
        };
        let admins: Vec<_> = grant.administrators().collect();
        assert_eq!(admins[0], (&EntityId::from("8"), None));
        assert_eq!(admins[1], (&EntityId::from("9"), Some("Admin")));
    }

    #[test]
    fn test_placeholder_is_empty() {
        let p = RawEntity::placeholder("9".into(), "Entity 9".to_string());
        assert_eq!(p.score, 0.0);
        assert!(p.categories.is_empty());
        assert_eq!(p.relations().count(), 0);
        assert_eq!(fallback_name(&p.id), "Entity 9");
    }
}
