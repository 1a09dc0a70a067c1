//! Error types for the group flattener.

use crate::backend::BackendError;

/// Errors that can occur while flattening a dataset.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// The input/output pairing cannot be flattened (same dataset, missing
    /// capability, output already holds groups). Raised before any write.
    #[error("invalid flatten configuration: {0}")]
    Configuration(String),

    /// A reference-bearing attribute matches neither the list nor the
    /// mapping grammar.
    #[error("cannot parse attribute `{attribute}` value {value:?}")]
    Parse { attribute: String, value: String },

    /// A reference could not be mapped to any dimension or variable.
    #[error("unresolved reference `{reference}` in attribute `{attribute}` of {variable}")]
    UnresolvedReference {
        variable: String,
        attribute: String,
        reference: String,
    },

    /// Two or more equally-near candidates matched a lateral search.
    #[error(
        "ambiguous reference `{reference}` in attribute `{attribute}` of {variable}: candidates {candidates:?}"
    )]
    AmbiguousReference {
        variable: String,
        attribute: String,
        reference: String,
        candidates: Vec<String>,
    },

    /// The group tree is nested deeper than the configured limit.
    #[error("group {path} exceeds maximum nesting depth {limit}")]
    GroupDepthExceeded { path: String, limit: usize },

    /// The configuration file could not be read or decoded.
    #[error("cannot load flatten configuration: {0}")]
    Config(String),

    /// Error raised by the dataset backend.
    #[error(transparent)]
    Backend(#[from] BackendError),
}

pub type Result<T> = std::result::Result<T, Error>;
