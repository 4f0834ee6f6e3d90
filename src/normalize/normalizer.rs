use crate::normalize::error::{NormalizeError, Result};
use crate::normalize::schema::{IdAttribute, Relation, Schema, SchemaRegistry, Shape};
use crate::normalize::types::{json_type_name, EntityTables, NormalizeConfig, NormalizedOutput, Record};
use serde_json::{Map, Value};

/// Flattens nested JSON into entity tables according to a schema registry
pub struct Normalizer<'a> {
    registry: &'a SchemaRegistry,
    config: NormalizeConfig,
}

impl<'a> Normalizer<'a> {
    pub fn new(registry: &'a SchemaRegistry, config: NormalizeConfig) -> Self {
        Normalizer { registry, config }
    }

    /// Normalize `input`, laid out as `shape`, into entity tables and a result shape
    pub fn normalize(&self, input: &Value, shape: &Shape) -> Result<NormalizedOutput> {
        let mut entities = EntityTables::new();
        let result = self.normalize_into(input, shape, &mut entities)?;

        tracing::debug!(
            tables = entities.0.len(),
            entities = entities.entity_count(),
            "normalized input"
        );

        Ok(NormalizedOutput { entities, result })
    }

    /// Normalize into existing tables. On error the tables may hold a
    /// partial traversal and should be discarded.
    pub(crate) fn normalize_into(
        &self,
        input: &Value,
        shape: &Shape,
        entities: &mut EntityTables,
    ) -> Result<Value> {
        self.visit_shape(input, shape, "", 0, entities)
    }

    fn enter(&self, depth: usize) -> Result<()> {
        if depth > self.config.max_depth {
            return Err(NormalizeError::DepthExceeded {
                max_depth: self.config.max_depth,
            });
        }
        Ok(())
    }

    fn visit_shape(
        &self,
        value: &Value,
        shape: &Shape,
        path: &str,
        depth: usize,
        entities: &mut EntityTables,
    ) -> Result<Value> {
        self.enter(depth)?;

        match shape {
            Shape::Entity(name) => {
                let schema = self.registry.resolve(name)?;
                self.visit_entity(value, schema, path, depth, entities)
            }
            Shape::List(inner) => match value {
                Value::Null => Ok(Value::Null),
                Value::Array(items) => {
                    let mut ids = Vec::with_capacity(items.len());
                    for (idx, item) in items.iter().enumerate() {
                        let item_path = pointer(path, &idx.to_string());
                        ids.push(self.visit_shape(item, inner, &item_path, depth + 1, entities)?);
                    }
                    Ok(Value::Array(ids))
                }
                other => Err(mismatch(path, "array", other)),
            },
            Shape::Object(fields) => match value {
                Value::Null => Ok(Value::Null),
                Value::Object(obj) => {
                    let mut out = Map::new();
                    for (key, field_value) in obj {
                        let normalized = match fields.get(key) {
                            Some(field_shape) => {
                                let field_path = pointer(path, key);
                                self.visit_shape(field_value, field_shape, &field_path, depth + 1, entities)?
                            }
                            None => field_value.clone(),
                        };
                        out.insert(key.clone(), normalized);
                    }
                    Ok(Value::Object(out))
                }
                other => Err(mismatch(path, "object", other)),
            },
        }
    }

    /// Normalize a value standing at an entity position
    fn visit_entity(
        &self,
        value: &Value,
        schema: &Schema,
        path: &str,
        depth: usize,
        entities: &mut EntityTables,
    ) -> Result<Value> {
        self.enter(depth)?;

        match value {
            Value::Null => Ok(Value::Null),
            // Already an ID reference
            Value::String(_) | Value::Number(_) => Ok(value.clone()),
            Value::Object(obj) => self.normalize_object(obj, schema, path, depth, entities),
            other => Err(mismatch(path, "entity object or id", other)),
        }
    }

    fn normalize_object(
        &self,
        obj: &Map<String, Value>,
        schema: &Schema,
        path: &str,
        depth: usize,
        entities: &mut EntityTables,
    ) -> Result<Value> {
        let mut record = Record::new();

        for (key, value) in obj {
            let Some(relation) = schema.relations.get(key) else {
                record.insert(key.clone(), value.clone());
                continue;
            };

            let target = self.registry.resolve(relation.target())?;
            let field_path = pointer(path, key);

            let flat = match relation {
                Relation::One(_) => self.visit_entity(value, target, &field_path, depth + 1, entities)?,
                Relation::Many(_) => match value {
                    Value::Null => Value::Null,
                    Value::Array(items) => {
                        let mut ids = Vec::with_capacity(items.len());
                        for (idx, item) in items.iter().enumerate() {
                            let item_path = pointer(&field_path, &idx.to_string());
                            ids.push(self.visit_entity(item, target, &item_path, depth + 1, entities)?);
                        }
                        Value::Array(ids)
                    }
                    other => return Err(mismatch(&field_path, "array", other)),
                },
            };

            record.insert(key.clone(), flat);
        }

        let (id, raw_id) = schema
            .id_attribute
            .extract(&record)
            .ok_or_else(|| NormalizeError::InvalidId {
                schema: schema.name.clone(),
                path: display_path(path),
            })?;

        if let IdAttribute::Field(field) = &schema.id_attribute {
            let stored = entities.get(&schema.name, &id).and_then(|existing| existing.get(field));
            if let Some(stored) = stored {
                if json_type_name(stored) != json_type_name(&raw_id) {
                    tracing::debug!(
                        entity_type = %schema.name,
                        id = %id,
                        stored = json_type_name(stored),
                        incoming = json_type_name(&raw_id),
                        "ids of different JSON types share a table key"
                    );
                }
            }
        }

        tracing::trace!(entity_type = %schema.name, id = %id, "upserting entity");
        entities.upsert(&schema.name, id, record, self.config.merge)?;

        Ok(raw_id)
    }
}

/// Normalize with the default configuration
pub fn normalize(input: &Value, shape: &Shape, registry: &SchemaRegistry) -> Result<NormalizedOutput> {
    Normalizer::new(registry, NormalizeConfig::default()).normalize(input, shape)
}

/// Append a JSON pointer token to `path`
pub(crate) fn pointer(path: &str, token: &str) -> String {
    let escaped = token.replace('~', "~0").replace('/', "~1");
    format!("{}/{}", path, escaped)
}

pub(crate) fn display_path(path: &str) -> String {
    if path.is_empty() {
        String::from("/")
    } else {
        path.to_string()
    }
}

pub(crate) fn mismatch(path: &str, expected: &'static str, found: &Value) -> NormalizeError {
    NormalizeError::SchemaMismatch {
        path: display_path(path),
        expected,
        found: json_type_name(found),
    }
}
