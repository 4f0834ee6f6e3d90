//! # json-normalize - Flat entity tables from nested JSON
//!
//! Normalization turns a nested object graph into one table per entity
//! type, keyed by ID, with every nested entity replaced by its ID. The
//! result shape mirrors the input with entities swapped for IDs, and
//! denormalization rebuilds the original graph from the two.
//!
//! ## Quick Start
//!
//! ```rust
//! use json_normalize::{normalize, denormalize, Schema, SchemaRegistry, Shape};
//! use serde_json::json;
//!
//! # fn main() -> Result<(), json_normalize::NormalizeError> {
//! let registry = SchemaRegistry::new()
//!     .with(Schema::new("authors"))
//!     .with(Schema::new("comments").one("author", "authors"))
//!     .with(Schema::new("posts").one("author", "authors").many("comments", "comments"));
//!
//! let posts = json!([{
//!     "id": 1,
//!     "title": "First Post",
//!     "author": {"id": 7, "name": "Alice"},
//!     "comments": [{"id": 10, "author": {"id": 7, "name": "Alice"}}]
//! }]);
//!
//! let shape = Shape::list_of("posts");
//! let output = normalize(&posts, &shape, &registry)?;
//!
//! // output.result == [1]
//! // output.entities has "posts", "comments" and one "authors" record
//! assert_eq!(output.result, json!([1]));
//!
//! let restored = denormalize(&output.result, &shape, &registry, &output.entities)?;
//! assert_eq!(restored, posts);
//! # Ok(())
//! # }
//! ```

use anyhow::{Context, Result};
use serde_json::Value;
use std::io::BufRead;

pub mod normalize;

// Re-export commonly used types for convenience
pub use normalize::{
    denormalize, normalize, Denormalizer, EntityId, EntityTable, EntityTables, IdAttribute, MergeStrategy,
    NormalizeConfig, NormalizeError, NormalizedOutput, Normalizer, Relation, Schema, SchemaDocument,
    SchemaRegistry, Shape, SingleWriter, TableWriter,
};

/// Normalize a newline-delimited JSON stream.
///
/// Each non-blank line is normalized against `shape`; entities from every
/// line accumulate into one set of tables and `result` holds one entry
/// per line.
pub fn normalize_json<R: BufRead>(
    reader: R,
    registry: &SchemaRegistry,
    shape: &Shape,
    config: NormalizeConfig,
) -> Result<NormalizedOutput> {
    let normalizer = Normalizer::new(registry, config);
    let mut entities = EntityTables::new();
    let mut results = Vec::new();

    for (line_no, line) in reader.lines().enumerate() {
        let line = line.context("Failed to read line")?;
        if line.trim().is_empty() {
            continue;
        }

        let value: Value = serde_json::from_str(&line)
            .with_context(|| format!("Failed to parse JSON on line {}", line_no + 1))?;

        let result = normalizer
            .normalize_into(&value, shape, &mut entities)
            .with_context(|| format!("Failed to normalize line {}", line_no + 1))?;
        results.push(result);
    }

    tracing::debug!(
        records = results.len(),
        entities = entities.entity_count(),
        "normalized stream"
    );

    Ok(NormalizedOutput {
        entities,
        result: Value::Array(results),
    })
}
