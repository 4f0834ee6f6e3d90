//! Schema-directed normalization of nested JSON into flat entity tables
//!
//! A `SchemaRegistry` names each entity type, how its ID is found, and
//! which fields hold nested entities. `Normalizer` walks the input and
//! replaces every nested entity with its ID; `Denormalizer` does the
//! reverse from the tables and the ID skeleton.

pub mod denormalizer;
pub mod document;
pub mod error;
pub mod normalizer;
pub mod schema;
pub mod types;
pub mod writer;

pub use denormalizer::{denormalize, Denormalizer};
pub use document::SchemaDocument;
pub use error::NormalizeError;
pub use normalizer::{normalize, Normalizer};
pub use schema::{IdAttribute, IdFn, Relation, Schema, SchemaRegistry, Shape};
pub use types::{EntityId, EntityTable, EntityTables, MergeStrategy, NormalizeConfig, NormalizedOutput, Record};
pub use writer::{SingleWriter, TableWriter};
