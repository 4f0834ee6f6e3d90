//! Rebuilds nested JSON from entity tables and a result shape
//!
//! Denormalization never substitutes placeholders: an ID without a table
//! entry fails with `MissingEntity`. ID cycles in the tables fail with
//! `DepthExceeded`, since a JSON value cannot be cyclic.

use crate::normalize::error::{NormalizeError, Result};
use crate::normalize::normalizer::{mismatch, pointer};
use crate::normalize::schema::{Relation, Schema, SchemaRegistry, Shape};
use crate::normalize::types::{EntityId, EntityTables, NormalizeConfig};
use serde_json::{Map, Value};

pub struct Denormalizer<'a> {
    registry: &'a SchemaRegistry,
    entities: &'a EntityTables,
    config: NormalizeConfig,
}

impl<'a> Denormalizer<'a> {
    pub fn new(registry: &'a SchemaRegistry, entities: &'a EntityTables, config: NormalizeConfig) -> Self {
        Denormalizer {
            registry,
            entities,
            config,
        }
    }

    /// Reconstruct the nested value described by `result` laid out as `shape`
    pub fn denormalize(&self, result: &Value, shape: &Shape) -> Result<Value> {
        let value = self.visit_shape(result, shape, "", 0)?;
        tracing::debug!(entities = self.entities.entity_count(), "denormalized result");
        Ok(value)
    }

    fn enter(&self, depth: usize) -> Result<()> {
        if depth > self.config.max_depth {
            return Err(NormalizeError::DepthExceeded {
                max_depth: self.config.max_depth,
            });
        }
        Ok(())
    }

    fn visit_shape(&self, value: &Value, shape: &Shape, path: &str, depth: usize) -> Result<Value> {
        self.enter(depth)?;

        match shape {
            Shape::Entity(name) => {
                let schema = self.registry.resolve(name)?;
                self.visit_entity(value, schema, path, depth)
            }
            Shape::List(inner) => match value {
                Value::Null => Ok(Value::Null),
                Value::Array(items) => items
                    .iter()
                    .enumerate()
                    .map(|(idx, item)| self.visit_shape(item, inner, &pointer(path, &idx.to_string()), depth + 1))
                    .collect::<Result<Vec<_>>>()
                    .map(Value::Array),
                other => Err(mismatch(path, "array", other)),
            },
            Shape::Object(fields) => match value {
                Value::Null => Ok(Value::Null),
                Value::Object(obj) => {
                    let mut out = Map::new();
                    for (key, field_value) in obj {
                        let restored = match fields.get(key) {
                            Some(field_shape) => {
                                self.visit_shape(field_value, field_shape, &pointer(path, key), depth + 1)?
                            }
                            None => field_value.clone(),
                        };
                        out.insert(key.clone(), restored);
                    }
                    Ok(Value::Object(out))
                }
                other => Err(mismatch(path, "object", other)),
            },
        }
    }

    fn visit_entity(&self, value: &Value, schema: &Schema, path: &str, depth: usize) -> Result<Value> {
        self.enter(depth)?;

        if value.is_null() {
            return Ok(Value::Null);
        }

        let id = EntityId::from_value(value).ok_or_else(|| mismatch(path, "entity id", value))?;
        let record = self
            .entities
            .get(&schema.name, &id)
            .ok_or_else(|| NormalizeError::MissingEntity {
                schema: schema.name.clone(),
                id: id.0.clone(),
            })?;

        let mut restored = Map::new();
        for (key, field_value) in record {
            let Some(relation) = schema.relations.get(key) else {
                restored.insert(key.clone(), field_value.clone());
                continue;
            };

            let target = self.registry.resolve(relation.target())?;
            let field_path = pointer(path, key);

            let nested = match relation {
                Relation::One(_) => self.visit_entity(field_value, target, &field_path, depth + 1)?,
                Relation::Many(_) => match field_value {
                    Value::Null => Value::Null,
                    Value::Array(ids) => ids
                        .iter()
                        .enumerate()
                        .map(|(idx, id)| {
                            self.visit_entity(id, target, &pointer(&field_path, &idx.to_string()), depth + 1)
                        })
                        .collect::<Result<Vec<_>>>()
                        .map(Value::Array)?,
                    other => return Err(mismatch(&field_path, "array", other)),
                },
            };

            restored.insert(key.clone(), nested);
        }

        Ok(Value::Object(restored))
    }
}

/// Denormalize with the default configuration
pub fn denormalize(
    result: &Value,
    shape: &Shape,
    registry: &SchemaRegistry,
    entities: &EntityTables,
) -> Result<Value> {
    Denormalizer::new(registry, entities, NormalizeConfig::default()).denormalize(result, shape)
}
