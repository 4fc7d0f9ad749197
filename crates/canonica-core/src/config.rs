//! Pipeline configuration
//!
//! The fuzzy-matching thresholds are calibration parameters, not semantic
//! constants; the defaults reproduce the tuning the suite has been run with.

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

/// Tunable thresholds for the Match Decider, on the 0-100 similarity scale.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MatchThresholds {
    /// Whole-string name ratio at or above which the name check passes.
    pub name_accept: u8,
    /// Lower bound of the review band; names scoring in
    /// `name_review..name_accept` get a second partial-ratio check.
    pub name_review: u8,
    /// Partial-ratio bar applied inside the review band.
    pub name_partial_accept: u8,

    /// Author partial-match bar for work matching.
    pub author_thd: u8,
    /// Title bar when an author corroborated the work match.
    pub paper_thd_low: u8,
    /// Title bar when title similarity must carry the decision alone.
    pub paper_thd_high: u8,

    /// Affiliation name ratio for immediate acceptance.
    pub affiliation_accept: u8,
    /// Floor below which affiliation candidates are reported unresolved.
    pub affiliation_floor: u8,
    /// Partial-ratio bar inside the affiliation review band.
    pub affiliation_partial_accept: u8,

    /// Author-slot matching chain inside a work's author list.
    pub slot_ratio: u8,
    pub slot_ratio_floor: u8,
    pub slot_partial: u8,
    pub slot_token_sort: u8,
}

impl Default for MatchThresholds {
    fn default() -> Self {
        Self {
            name_accept: 80,
            name_review: 55,
            name_partial_accept: 90,
            author_thd: 65,
            paper_thd_low: 90,
            paper_thd_high: 95,
            affiliation_accept: 90,
            affiliation_floor: 70,
            affiliation_partial_accept: 93,
            slot_ratio: 70,
            slot_ratio_floor: 45,
            slot_partial: 80,
            slot_token_sort: 99,
        }
    }
}

/// Top-level configuration for a pipeline run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    /// Worker threads for batch processing; 0 uses the rayon default.
    pub num_jobs: usize,
    /// Candidates requested from the similarity backend per fuzzy lookup.
    pub top_k: usize,
    /// Optimistic-concurrency retries on version conflict.
    pub max_retries: u32,
    /// Upper bound on weak-key duplicate groups; 0 means unbounded.
    pub max_group_size: usize,
    /// Person-id namespaces probed first, in order ("trusted" providers).
    pub trusted_sources: Vec<String>,
    /// Provenance priority for survivor selection during unification.
    pub source_priority: Vec<String>,
    pub thresholds: MatchThresholds,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            num_jobs: 0,
            top_k: 10,
            max_retries: 3,
            max_group_size: 0,
            trusted_sources: vec!["scienti".to_string()],
            source_priority: vec![
                "staff".to_string(),
                "scienti".to_string(),
                "minciencias".to_string(),
            ],
            thresholds: MatchThresholds::default(),
        }
    }
}

impl PipelineConfig {
    /// Parse a configuration from TOML; unset keys keep their defaults.
    pub fn from_toml_str(input: &str) -> Result<Self, ConfigError> {
        toml::from_str(input).map_err(|e| ConfigError::Parse(e.to_string()))
    }
}
