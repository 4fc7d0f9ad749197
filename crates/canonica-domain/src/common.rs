//! Value types embedded in every canonical entity

use chrono::Utc;
use serde::{Deserialize, Serialize};

/// A (namespace, value) pair identifying an entity in an outside system
/// (DOI, ORCID, ROR, ISSN, provider-internal codes).
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ExternalId {
    pub source: String,
    pub id: String,
}

impl ExternalId {
    pub fn new(source: impl Into<String>, id: impl Into<String>) -> Self {
        Self {
            source: source.into(),
            id: id.into(),
        }
    }
}

/// One entry of the provenance log: which provider touched the document, when.
///
/// The incremental pipeline keeps at most one entry per source; the entry
/// doubles as the idempotency marker for re-runs.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Provenance {
    pub source: String,
    pub time: i64,
}

impl Provenance {
    pub fn now(source: impl Into<String>) -> Self {
        Self {
            source: source.into(),
            time: Utc::now().timestamp(),
        }
    }
}

/// A title as reported by one provider, with detected language.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Title {
    pub title: String,
    pub lang: Option<String>,
    pub source: String,
}

/// A classification tag assigned by one provider ("article", "thesis", …).
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct TypeEntry {
    pub source: String,
    #[serde(rename = "type")]
    pub kind: String,
}

/// A per-provider citation counter.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct CitationCount {
    pub source: String,
    pub count: i64,
}

/// A provider-reported URL (landing page, open-access copy, profile).
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExternalUrl {
    pub source: String,
    pub url: String,
}

/// A display name in a given language, as reported by one provider.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Name {
    pub name: String,
    pub lang: Option<String>,
    pub source: String,
}

/// A time-bounded ranking entry (quartile, h-index, researcher category).
///
/// For sources the triple `(source, from_date, to_date)` is a unique key;
/// duplicate entries for the same key are an invariant violation.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Ranking {
    pub source: String,
    pub rank: String,
    pub from_date: Option<i64>,
    pub to_date: Option<i64>,
    pub order: Option<i32>,
    pub date: Option<i64>,
}

impl Ranking {
    /// The uniqueness key for source rankings.
    pub fn window_key(&self) -> (&str, Option<i64>, Option<i64>) {
        (self.source.as_str(), self.from_date, self.to_date)
    }
}

/// A subject classification block from one provider.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct SubjectGroup {
    pub source: String,
    pub subjects: Vec<SubjectRef>,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubjectRef {
    pub id: String,
    pub name: String,
    pub level: i32,
    #[serde(default)]
    pub external_ids: Vec<ExternalId>,
}

/// Mint a fresh document id.
pub fn new_id() -> String {
    uuid::Uuid::new_v4().to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn external_id_equality_is_by_value() {
        let a = ExternalId::new("doi", "10.1234/x");
        let b = ExternalId::new("doi", "10.1234/x");
        assert_eq!(a, b);
        assert_ne!(a, ExternalId::new("orcid", "10.1234/x"));
    }

    #[test]
    fn ranking_window_key() {
        let r = Ranking {
            source: "scimago Best Quartile".into(),
            rank: "Q1".into(),
            from_date: Some(10),
            to_date: Some(20),
            order: None,
            date: None,
        };
        assert_eq!(r.window_key(), ("scimago Best Quartile", Some(10), Some(20)));
    }
}
