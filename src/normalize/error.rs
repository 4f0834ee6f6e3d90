use thiserror::Error;

/// Errors raised by normalization and denormalization.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum NormalizeError {
    /// A result or relation references an ID with no table entry
    #[error("entity `{id}` not found in table `{schema}`")]
    MissingEntity { schema: String, id: String },

    #[error("traversal exceeded the maximum depth of {max_depth}")]
    DepthExceeded { max_depth: usize },

    /// The input does not have the arity or type the shape calls for
    #[error("schema mismatch at `{path}`: expected {expected}, found {found}")]
    SchemaMismatch {
        path: String,
        expected: &'static str,
        found: &'static str,
    },

    #[error("unknown schema `{name}`")]
    UnknownSchema { name: String },

    /// The ID attribute is absent or not a string/number
    #[error("entity of type `{schema}` at `{path}` has no usable id")]
    InvalidId { schema: String, path: String },

    /// Only raised under `MergeStrategy::Reject`
    #[error("conflicting values for field `{field}` of entity `{id}` in table `{schema}`")]
    ConflictingEntity {
        schema: String,
        id: String,
        field: String,
    },
}

pub type Result<T> = std::result::Result<T, NormalizeError>;
