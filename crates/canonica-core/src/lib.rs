//! Entity-resolution core of the canonica harmonization suite.
//!
//! The pipeline turns normalized provider records into canonical works,
//! persons, affiliations and sources: the locator finds candidates
//! (exact ids first, fuzzy search second), the decider issues composite
//! match verdicts, the merge engine unions fields under per-field
//! policies, and the duplicate unifier sweeps the accumulated store for
//! missed splits.

pub mod compare;
pub mod config;
pub mod error;
pub mod fuzzy;
pub mod locate;
pub mod memory_store;
pub mod merge;
pub mod pipeline;
pub mod search;
pub mod store;
pub mod text;
pub mod unify;

#[cfg(feature = "sqlite")]
pub mod sqlite_store;

pub use config::{MatchThresholds, PipelineConfig};
pub use error::{ConfigError, PipelineError, Result, SkipReason};
pub use memory_store::MemoryStore;
pub use pipeline::{BatchReport, IngestOutcome, Pipeline};
pub use search::{LocalSearchIndex, SearchError, SearchHit, SimilaritySearch, WorkQuery};
pub use store::{
    CanonicalEntity, Collection, DocumentStore, Filter, KeyGroup, StoreError, StrongKey, Versioned,
};
pub use unify::UnifyReport;

#[cfg(feature = "sqlite")]
pub use sqlite_store::SqliteStore;
