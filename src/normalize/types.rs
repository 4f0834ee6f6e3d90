use crate::normalize::error::{NormalizeError, Result};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::btree_map::Entry;
use std::collections::BTreeMap;
use std::fmt;

/// Represents a unique identifier for an entity
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct EntityId(pub String);

impl EntityId {
    pub fn new(id: impl Into<String>) -> Self {
        EntityId(id.into())
    }

    /// Key for a JSON id value: strings as-is, numbers by their decimal text.
    ///
    /// `1` and `"1"` therefore share a key and are merged as one entity.
    pub fn from_value(value: &Value) -> Option<Self> {
        match value {
            Value::String(s) => Some(EntityId(s.clone())),
            Value::Number(n) => Some(EntityId(n.to_string())),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for EntityId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// A flat entity record; relation fields hold IDs instead of nested objects
pub type Record = Map<String, Value>;

/// All entities of one type, keyed by ID
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct EntityTable(pub BTreeMap<EntityId, Record>);

impl EntityTable {
    pub fn get(&self, id: &EntityId) -> Option<&Record> {
        self.0.get(id)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&EntityId, &Record)> {
        self.0.iter()
    }
}

/// Entity tables keyed by entity-type name. Types with no instances are absent.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct EntityTables(pub BTreeMap<String, EntityTable>);

impl EntityTables {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn table(&self, entity_type: &str) -> Option<&EntityTable> {
        self.0.get(entity_type)
    }

    pub fn get(&self, entity_type: &str, id: &EntityId) -> Option<&Record> {
        self.0.get(entity_type).and_then(|table| table.get(id))
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Total number of records across every table
    pub fn entity_count(&self) -> usize {
        self.0.values().map(EntityTable::len).sum()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &EntityTable)> {
        self.0.iter()
    }

    /// Insert a record, merging with any existing record of the same ID.
    pub fn upsert(
        &mut self,
        entity_type: &str,
        id: EntityId,
        record: Record,
        strategy: MergeStrategy,
    ) -> Result<()> {
        let table = self.0.entry(entity_type.to_string()).or_default();

        match table.0.entry(id) {
            Entry::Vacant(slot) => {
                slot.insert(record);
            }
            Entry::Occupied(mut slot) => {
                let id = slot.key().clone();
                strategy.merge(entity_type, &id, slot.get_mut(), record)?;
            }
        }

        Ok(())
    }
}

/// How repeated occurrences of the same entity ID are combined
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum MergeStrategy {
    /// Field-by-field; the later occurrence in traversal order wins
    #[default]
    LastWriteWins,
    /// Field-by-field; fields already stored are kept
    FirstWriteWins,
    /// Any field that differs between occurrences is an error
    Reject,
}

impl MergeStrategy {
    fn merge(self, entity_type: &str, id: &EntityId, existing: &mut Record, incoming: Record) -> Result<()> {
        for (field, value) in incoming {
            match existing.get(&field) {
                None => {
                    existing.insert(field, value);
                }
                Some(current) if *current == value => {}
                Some(_) => match self {
                    MergeStrategy::LastWriteWins => {
                        tracing::debug!(entity_type, id = %id, field = %field, "overwriting conflicting field");
                        existing.insert(field, value);
                    }
                    MergeStrategy::FirstWriteWins => {
                        tracing::debug!(entity_type, id = %id, field = %field, "keeping first value of conflicting field");
                    }
                    MergeStrategy::Reject => {
                        return Err(NormalizeError::ConflictingEntity {
                            schema: entity_type.to_string(),
                            id: id.0.clone(),
                            field,
                        });
                    }
                },
            }
        }
        Ok(())
    }
}

/// Configuration for normalization and denormalization
#[derive(Debug, Clone)]
pub struct NormalizeConfig {
    /// Maximum traversal depth before failing with `DepthExceeded`
    pub max_depth: usize,

    /// Policy for repeated occurrences of the same entity
    pub merge: MergeStrategy,
}

impl Default for NormalizeConfig {
    fn default() -> Self {
        NormalizeConfig {
            max_depth: 64,
            merge: MergeStrategy::default(),
        }
    }
}

/// The pair produced by normalization: entity tables plus the ID skeleton
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct NormalizedOutput {
    pub entities: EntityTables,
    pub result: Value,
}

/// Short name of a JSON value's type, for error messages
pub(crate) fn json_type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn record(value: Value) -> Record {
        serde_json::from_value(value).unwrap()
    }

    #[test]
    fn test_entity_id_from_value() {
        assert_eq!(EntityId::from_value(&json!("abc")), Some(EntityId::new("abc")));
        assert_eq!(EntityId::from_value(&json!(42)), Some(EntityId::new("42")));
        assert_eq!(EntityId::from_value(&json!(true)), None);
        assert_eq!(EntityId::from_value(&json!(null)), None);
    }

    #[test]
    fn test_last_write_wins() {
        let mut tables = EntityTables::new();
        tables
            .upsert("users", EntityId::new("1"), record(json!({"id": 1, "name": "old", "age": 3})), MergeStrategy::LastWriteWins)
            .unwrap();
        tables
            .upsert("users", EntityId::new("1"), record(json!({"id": 1, "name": "new"})), MergeStrategy::LastWriteWins)
            .unwrap();

        let stored = tables.get("users", &EntityId::new("1")).unwrap();
        assert_eq!(stored.get("name").unwrap(), "new");
        assert_eq!(stored.get("age").unwrap(), 3);
        assert_eq!(tables.entity_count(), 1);
    }

    #[test]
    fn test_first_write_wins() {
        let mut tables = EntityTables::new();
        tables
            .upsert("users", EntityId::new("1"), record(json!({"id": 1, "name": "old"})), MergeStrategy::FirstWriteWins)
            .unwrap();
        tables
            .upsert("users", EntityId::new("1"), record(json!({"id": 1, "name": "new", "age": 3})), MergeStrategy::FirstWriteWins)
            .unwrap();

        let stored = tables.get("users", &EntityId::new("1")).unwrap();
        assert_eq!(stored.get("name").unwrap(), "old");
        assert_eq!(stored.get("age").unwrap(), 3);
    }

    #[test]
    fn test_reject_conflict() {
        let mut tables = EntityTables::new();
        tables
            .upsert("users", EntityId::new("1"), record(json!({"id": 1, "name": "old"})), MergeStrategy::Reject)
            .unwrap();

        // identical duplicates are fine
        tables
            .upsert("users", EntityId::new("1"), record(json!({"id": 1, "name": "old"})), MergeStrategy::Reject)
            .unwrap();

        let err = tables
            .upsert("users", EntityId::new("1"), record(json!({"id": 1, "name": "new"})), MergeStrategy::Reject)
            .unwrap_err();
        assert_eq!(
            err,
            NormalizeError::ConflictingEntity {
                schema: "users".to_string(),
                id: "1".to_string(),
                field: "name".to_string(),
            }
        );
    }

    #[test]
    fn test_tables_serialize_as_nested_maps() {
        let mut tables = EntityTables::new();
        tables
            .upsert("users", EntityId::new("7"), record(json!({"id": 7})), MergeStrategy::default())
            .unwrap();

        let value = serde_json::to_value(&tables).unwrap();
        assert_eq!(value, json!({"users": {"7": {"id": 7}}}));

        let back: EntityTables = serde_json::from_value(value).unwrap();
        assert_eq!(back, tables);
    }
}
