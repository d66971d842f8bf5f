//! Rich diagnostic error types for medkg.
//!
//! Each subsystem defines its own error type with miette `#[diagnostic]` derives,
//! providing error codes and help text. [`MedError`] aggregates them so the
//! pipeline and binaries can propagate any of them with `?`.

use miette::Diagnostic;
use thiserror::Error;

use crate::config::ConfigError;
use crate::llm::LlmError;
use crate::seeds::SeedError;

/// Top-level error type for medkg.
///
/// Each variant wraps a subsystem-specific error, preserving the full diagnostic
/// chain through to the user.
#[derive(Debug, Error, Diagnostic)]
pub enum MedError {
    #[error(transparent)]
    #[diagnostic(transparent)]
    Store(#[from] StoreError),

    #[error(transparent)]
    #[diagnostic(transparent)]
    Schema(#[from] SchemaError),

    #[error(transparent)]
    #[diagnostic(transparent)]
    Llm(#[from] LlmError),

    #[error(transparent)]
    #[diagnostic(transparent)]
    Seed(#[from] SeedError),

    #[error(transparent)]
    #[diagnostic(transparent)]
    Config(#[from] ConfigError),
}

// ---------------------------------------------------------------------------
// Store errors
// ---------------------------------------------------------------------------

#[derive(Debug, Error, Diagnostic)]
pub enum StoreError {
    #[error("I/O error: {source}")]
    #[diagnostic(
        code(medkg::store::io),
        help(
            "A filesystem operation failed. Check that the data directory exists, \
             has correct permissions, and that the disk is not full."
        )
    )]
    Io {
        #[source]
        source: std::io::Error,
    },

    #[error("redb transaction error: {message}")]
    #[diagnostic(
        code(medkg::store::redb),
        help(
            "The embedded database encountered a transaction error. \
             This may indicate corruption; try running with a fresh data directory."
        )
    )]
    Redb { message: String },

    #[error("serialization error: {message}")]
    #[diagnostic(
        code(medkg::store::serde),
        help(
            "Failed to serialize or deserialize graph data. \
             The stored format may have changed between versions. Re-seed the graph."
        )
    )]
    Serialization { message: String },

    #[error("edge endpoint missing: {label} \"{key}\"")]
    #[diagnostic(
        code(medkg::store::dangling_edge),
        help(
            "A persisted relationship refers to a node that is not in the database. \
             The data directory is inconsistent; re-seed the graph."
        )
    )]
    DanglingEdge { label: String, key: String },
}

// ---------------------------------------------------------------------------
// Schema errors
// ---------------------------------------------------------------------------

#[derive(Debug, Error, Diagnostic)]
pub enum SchemaError {
    #[error("empty business key for {label}")]
    #[diagnostic(
        code(medkg::schema::empty_key),
        help("Every node needs a non-blank identifying key (`name`, or `id` for visits).")
    )]
    EmptyKey { label: String },

    #[error("unknown node label: {label}")]
    #[diagnostic(
        code(medkg::schema::unknown_label),
        help(
            "Valid labels are: Patient, Symptom, Disease, RiskFactor, Visit, \
             Observation, Test, Treatment."
        )
    )]
    UnknownLabel { label: String },

    #[error("unknown relationship type: {name}")]
    #[diagnostic(
        code(medkg::schema::unknown_relation),
        help(
            "Valid relationship types are: HAS_SYMPTOM, HAS_RISK_FACTOR, HAS_VISIT, \
             HAS_OBSERVATION, HAS_TEST, INDICATES, TREATED_BY, USED_FOR_DIAGNOSIS_OF, SUPPORTS."
        )
    )]
    UnknownRelation { name: String },

    #[error("{relation} connects {expected_from} -> {expected_to}, got {from} -> {to}")]
    #[diagnostic(
        code(medkg::schema::endpoint_mismatch),
        help("Relationships are directed and typed; check the endpoint labels.")
    )]
    EndpointMismatch {
        relation: String,
        expected_from: String,
        expected_to: String,
        from: String,
        to: String,
    },

    #[error("attribute \"{attribute}\" is not allowed on {owner}")]
    #[diagnostic(
        code(medkg::schema::attribute),
        help("The graph schema is closed. Only documented attributes may be set.")
    )]
    UnknownAttribute { owner: String, attribute: String },
}

/// Convenience alias for functions returning medkg results.
pub type MedResult<T> = std::result::Result<T, MedError>;
