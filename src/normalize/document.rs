//! Schema documents: a JSON description of a registry and its root shape
//!
//! ```json
//! {
//!   "schemas": {
//!     "posts":    { "relations": { "author": "authors", "comments": ["comments"] } },
//!     "comments": { "relations": { "author": "authors" } },
//!     "authors":  { "id_attribute": "id" }
//!   },
//!   "root": ["posts"]
//! }
//! ```
//!
//! A relation written as a string is a single entity; a one-element array
//! is an ordered collection. Shapes follow the same convention, and an
//! object shape maps keys to nested shapes.

use crate::normalize::schema::{Relation, Schema, SchemaRegistry, Shape};
use anyhow::{anyhow, bail, Context, Result};
use serde::Deserialize;
use std::collections::BTreeMap;
use std::io::Read;
use std::path::Path;

#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
enum RelationDef {
    One(String),
    Many(Vec<String>),
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
struct SchemaDef {
    #[serde(default)]
    id_attribute: Option<String>,
    #[serde(default)]
    relations: BTreeMap<String, RelationDef>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
enum ShapeDef {
    Entity(String),
    List(Vec<ShapeDef>),
    Object(BTreeMap<String, ShapeDef>),
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
struct RawDocument {
    schemas: BTreeMap<String, SchemaDef>,
    #[serde(default)]
    root: Option<ShapeDef>,
}

/// A loaded schema registry plus an optional root shape
#[derive(Debug, Clone)]
pub struct SchemaDocument {
    pub registry: SchemaRegistry,
    pub root: Option<Shape>,
}

impl SchemaDocument {
    pub fn from_json(text: &str) -> Result<Self> {
        let raw: RawDocument = serde_json::from_str(text).context("Failed to parse schema document")?;
        Self::build(raw)
    }

    pub fn from_reader<R: Read>(reader: R) -> Result<Self> {
        let raw: RawDocument = serde_json::from_reader(reader).context("Failed to parse schema document")?;
        Self::build(raw)
    }

    pub fn from_path<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let file = std::fs::File::open(path)
            .with_context(|| format!("Failed to open schema file: {}", path.display()))?;
        Self::from_reader(std::io::BufReader::new(file))
    }

    /// Parse a standalone shape, e.g. a `--root` flag value
    pub fn parse_shape(text: &str) -> Result<Shape> {
        // Bare names are accepted without JSON quoting
        let def: ShapeDef = match serde_json::from_str(text) {
            Ok(def) => def,
            Err(_) => ShapeDef::Entity(text.trim().to_string()),
        };
        build_shape(def)
    }

    /// Pick the root shape: an explicit override wins over the document's
    /// `root`. The chosen shape is validated against the registry.
    pub fn resolve_root(&self, override_shape: Option<&str>) -> Result<Shape> {
        match override_shape {
            Some(text) => {
                let shape = Self::parse_shape(text)?;
                shape.validate(&self.registry).context("Invalid --root shape")?;
                Ok(shape)
            }
            None => self
                .root
                .clone()
                .ok_or_else(|| anyhow!("No root shape: pass --root or set \"root\" in the schema document")),
        }
    }

    fn build(raw: RawDocument) -> Result<Self> {
        let mut registry = SchemaRegistry::new();

        for (name, def) in raw.schemas {
            let mut schema = Schema::new(name.clone());
            if let Some(field) = def.id_attribute {
                schema = schema.id_field(field);
            }

            for (field, relation) in def.relations {
                let relation = match relation {
                    RelationDef::One(target) => Relation::One(target),
                    RelationDef::Many(mut targets) => {
                        if targets.len() != 1 {
                            bail!(
                                "Relation `{}.{}` must list exactly one schema, found {}",
                                name,
                                field,
                                targets.len()
                            );
                        }
                        Relation::Many(targets.remove(0))
                    }
                };
                schema.relations.insert(field, relation);
            }

            registry.register(schema);
        }

        registry.validate().context("Invalid schema document")?;

        let root = raw.root.map(build_shape).transpose()?;
        if let Some(shape) = &root {
            shape.validate(&registry).context("Invalid root shape")?;
        }

        Ok(SchemaDocument { registry, root })
    }
}

fn build_shape(def: ShapeDef) -> Result<Shape> {
    Ok(match def {
        ShapeDef::Entity(name) => Shape::Entity(name),
        ShapeDef::List(mut items) => {
            if items.len() != 1 {
                bail!("List shape must contain exactly one element, found {}", items.len());
            }
            Shape::List(Box::new(build_shape(items.remove(0))?))
        }
        ShapeDef::Object(fields) => Shape::Object(
            fields
                .into_iter()
                .map(|(key, def)| Ok((key, build_shape(def)?)))
                .collect::<Result<BTreeMap<_, _>>>()?,
        ),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::normalize::schema::IdAttribute;

    const BLOG: &str = r#"{
        "schemas": {
            "posts": {"relations": {"author": "authors", "comments": ["comments"]}},
            "comments": {"relations": {"author": "authors"}},
            "authors": {"id_attribute": "username"}
        },
        "root": ["posts"]
    }"#;

    #[test]
    fn test_parse_blog_document() {
        let doc = SchemaDocument::from_json(BLOG).unwrap();

        assert_eq!(doc.registry.len(), 3);
        assert_eq!(doc.root, Some(Shape::list_of("posts")));

        let posts = doc.registry.get("posts").unwrap();
        assert_eq!(posts.relations["author"], Relation::One("authors".to_string()));
        assert_eq!(posts.relations["comments"], Relation::Many("comments".to_string()));

        let authors = doc.registry.get("authors").unwrap();
        assert!(matches!(&authors.id_attribute, IdAttribute::Field(f) if f == "username"));
    }

    #[test]
    fn test_unknown_target_rejected() {
        let err = SchemaDocument::from_json(r#"{"schemas": {"posts": {"relations": {"author": "people"}}}}"#)
            .unwrap_err();
        assert!(format!("{:#}", err).contains("unknown schema `people`"));
    }

    #[test]
    fn test_many_relation_needs_one_target() {
        let err = SchemaDocument::from_json(
            r#"{"schemas": {"a": {"relations": {"x": ["a", "a"]}}}}"#,
        )
        .unwrap_err();
        assert!(err.to_string().contains("exactly one schema"));
    }

    #[test]
    fn test_parse_shape() {
        assert_eq!(SchemaDocument::parse_shape("posts").unwrap(), Shape::entity("posts"));
        assert_eq!(SchemaDocument::parse_shape(r#"["posts"]"#).unwrap(), Shape::list_of("posts"));

        let shape = SchemaDocument::parse_shape(r#"{"items": ["posts"], "owner": "authors"}"#).unwrap();
        let Shape::Object(fields) = shape else {
            panic!("Expected object shape");
        };
        assert_eq!(fields["items"], Shape::list_of("posts"));
        assert_eq!(fields["owner"], Shape::entity("authors"));
    }

    #[test]
    fn test_document_without_root() {
        let doc = SchemaDocument::from_json(r#"{"schemas": {"tags": {}}}"#).unwrap();
        assert!(doc.root.is_none());
        assert!(doc.registry.get("tags").is_some());
    }

    #[test]
    fn test_resolve_root() {
        let doc = SchemaDocument::from_json(BLOG).unwrap();

        assert_eq!(doc.resolve_root(None).unwrap(), Shape::list_of("posts"));
        assert_eq!(doc.resolve_root(Some("authors")).unwrap(), Shape::entity("authors"));

        let err = doc.resolve_root(Some(r#"["people"]"#)).unwrap_err();
        assert!(format!("{:#}", err).contains("unknown schema `people`"));

        let bare = SchemaDocument::from_json(r#"{"schemas": {"tags": {}}}"#).unwrap();
        assert!(bare.resolve_root(None).unwrap_err().to_string().contains("No root shape"));
    }
}
