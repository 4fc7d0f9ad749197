//! Error taxonomy for the entity-resolution core

use thiserror::Error;

use crate::search::SearchError;
use crate::store::StoreError;

/// Result type alias for pipeline operations
pub type Result<T> = std::result::Result<T, PipelineError>;

/// Errors that abort the current unit of work.
///
/// Per-record skip conditions (missing identifiers, ambiguous scores,
/// transient backend failures) are not errors; they surface through
/// [`crate::pipeline::IngestOutcome::Skipped`] so a batch keeps running.
#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("store error: {0}")]
    Store(#[from] StoreError),

    #[error("search error: {0}")]
    Search(#[from] SearchError),

    /// A canonical-document invariant does not hold (duplicate ranking key,
    /// asymmetric affiliation relation). Hard error for the document.
    #[error("invariant violation: {0}")]
    Invariant(String),

    #[error("config error: {0}")]
    Config(#[from] ConfigError),
}

/// Why a record was skipped instead of merged or inserted.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SkipReason {
    /// No usable matching key: no DOI, no external id, no title/name.
    #[error("record carries no usable matching key")]
    MissingIdentifier,

    /// A single document operation failed; the record is picked up on the
    /// next run thanks to the provenance idempotency guard.
    #[error("transient failure: {0}")]
    Transient(String),

    /// Affiliation fuzzy match fell below the floor score; logged for
    /// adjudication, never silently dropped.
    #[error("no affiliation match above floor (best score {best_score})")]
    UnresolvedAffiliation { best_score: u8 },
}

#[derive(Debug, Clone, PartialEq, Error)]
pub enum ConfigError {
    #[error("invalid config: {0}")]
    Parse(String),
}
