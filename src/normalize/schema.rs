//! Entity schemas, the registry that resolves them by name, and shapes
//!
//! Relations point at their target by name rather than by reference, so
//! self-referential and mutually-referential schemas need no special setup:
//! the registry resolves names at traversal time.

use crate::normalize::error::{NormalizeError, Result};
use crate::normalize::types::{EntityId, Record};
use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

/// Function deriving an entity's ID from its flat record
pub type IdFn = Arc<dyn Fn(&Record) -> Option<String> + Send + Sync>;

/// How the ID of an entity is found
#[derive(Clone)]
pub enum IdAttribute {
    /// Read the ID from a field (string or number)
    Field(String),
    /// Compute the ID from the record
    Function(IdFn),
}

impl IdAttribute {
    /// Derive the ID of `record`.
    ///
    /// Returns the table key together with the value to put in the
    /// result shape: the raw field value for field IDs, the derived
    /// string for function IDs.
    pub fn extract(&self, record: &Record) -> Option<(EntityId, serde_json::Value)> {
        match self {
            IdAttribute::Field(field) => {
                let raw = record.get(field)?;
                EntityId::from_value(raw).map(|id| (id, raw.clone()))
            }
            IdAttribute::Function(f) => {
                let id = f(record)?;
                Some((EntityId::new(id.clone()), serde_json::Value::String(id)))
            }
        }
    }
}

impl Default for IdAttribute {
    fn default() -> Self {
        IdAttribute::Field(String::from("id"))
    }
}

impl fmt::Debug for IdAttribute {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            IdAttribute::Field(field) => f.debug_tuple("Field").field(field).finish(),
            IdAttribute::Function(_) => f.write_str("Function(..)"),
        }
    }
}

/// A relation from a field to another entity type
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Relation {
    /// A single nested entity
    One(String),
    /// An ordered sequence of nested entities
    Many(String),
}

impl Relation {
    /// Name of the related schema
    pub fn target(&self) -> &str {
        match self {
            Relation::One(name) | Relation::Many(name) => name,
        }
    }
}

/// A named entity type
#[derive(Debug, Clone)]
pub struct Schema {
    pub name: String,
    pub id_attribute: IdAttribute,
    pub relations: BTreeMap<String, Relation>,
}

impl Schema {
    pub fn new(name: impl Into<String>) -> Self {
        Schema {
            name: name.into(),
            id_attribute: IdAttribute::default(),
            relations: BTreeMap::new(),
        }
    }

    /// Use a different field as the ID
    pub fn id_field(mut self, field: impl Into<String>) -> Self {
        self.id_attribute = IdAttribute::Field(field.into());
        self
    }

    /// Derive the ID with a function
    pub fn id_fn<F>(mut self, f: F) -> Self
    where
        F: Fn(&Record) -> Option<String> + Send + Sync + 'static,
    {
        self.id_attribute = IdAttribute::Function(Arc::new(f));
        self
    }

    pub fn one(mut self, field: impl Into<String>, target: impl Into<String>) -> Self {
        self.relations.insert(field.into(), Relation::One(target.into()));
        self
    }

    pub fn many(mut self, field: impl Into<String>, target: impl Into<String>) -> Self {
        self.relations.insert(field.into(), Relation::Many(target.into()));
        self
    }
}

/// Schemas keyed by name
#[derive(Debug, Clone, Default)]
pub struct SchemaRegistry {
    schemas: BTreeMap<String, Schema>,
}

impl SchemaRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a schema, replacing any previous schema of the same name
    pub fn register(&mut self, schema: Schema) -> &mut Self {
        self.schemas.insert(schema.name.clone(), schema);
        self
    }

    pub fn with(mut self, schema: Schema) -> Self {
        self.register(schema);
        self
    }

    pub fn get(&self, name: &str) -> Option<&Schema> {
        self.schemas.get(name)
    }

    /// Resolve a schema name, failing with `UnknownSchema`
    pub fn resolve(&self, name: &str) -> Result<&Schema> {
        self.get(name).ok_or_else(|| NormalizeError::UnknownSchema {
            name: name.to_string(),
        })
    }

    pub fn len(&self) -> usize {
        self.schemas.len()
    }

    pub fn is_empty(&self) -> bool {
        self.schemas.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Schema> {
        self.schemas.values()
    }

    /// Check that every relation targets a registered schema
    pub fn validate(&self) -> Result<()> {
        for schema in self.schemas.values() {
            for relation in schema.relations.values() {
                self.resolve(relation.target())?;
            }
        }
        Ok(())
    }
}

/// Layout of a top-level input (or result)
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Shape {
    /// A single entity of the named schema
    Entity(String),
    /// An ordered sequence
    List(Box<Shape>),
    /// A plain object whose keys hold nested shapes; other keys pass through
    Object(BTreeMap<String, Shape>),
}

impl Shape {
    pub fn entity(name: impl Into<String>) -> Self {
        Shape::Entity(name.into())
    }

    /// Shorthand for a list of entities
    pub fn list_of(name: impl Into<String>) -> Self {
        Shape::List(Box::new(Shape::Entity(name.into())))
    }

    /// Check that every entity named in the shape is registered
    pub fn validate(&self, registry: &SchemaRegistry) -> Result<()> {
        match self {
            Shape::Entity(name) => registry.resolve(name).map(|_| ()),
            Shape::List(inner) => inner.validate(registry),
            Shape::Object(fields) => fields.values().try_for_each(|shape| shape.validate(registry)),
        }
    }
}
