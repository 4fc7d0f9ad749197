//! Source: the canonical journal/venue record

use serde::{Deserialize, Serialize};

use crate::common::*;

/// A journal or venue, identified by ISSN/eISSN/scimago id.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Source {
    pub id: String,
    pub updated: Vec<Provenance>,
    pub names: Vec<Name>,
    pub external_ids: Vec<ExternalId>,
    pub types: Vec<TypeEntry>,
    /// Time-bounded quartile/h-index entries. No two entries may share
    /// `(source, from_date, to_date)`.
    pub ranking: Vec<Ranking>,
    pub publisher: Option<String>,
    pub apc: Apc,
    pub subjects: Vec<SubjectGroup>,
}

impl Source {
    /// Factory for the empty source shape.
    pub fn new() -> Self {
        Self {
            id: new_id(),
            updated: Vec::new(),
            names: Vec::new(),
            external_ids: Vec::new(),
            types: Vec::new(),
            ranking: Vec::new(),
            publisher: None,
            apc: Apc::default(),
            subjects: Vec::new(),
        }
    }

    /// Preferred display name: es first, then en, then first reported.
    pub fn display_name(&self) -> Option<&str> {
        let mut best: Option<&str> = None;
        for n in &self.names {
            match n.lang.as_deref() {
                Some("es") => return Some(&n.name),
                Some("en") => best = Some(&n.name),
                _ => {}
            }
        }
        best.or_else(|| self.names.first().map(|n| n.name.as_str()))
    }

    pub fn updated_by(&self, source: &str) -> bool {
        self.updated.iter().any(|p| p.source == source)
    }
}

impl Default for Source {
    fn default() -> Self {
        Self::new()
    }
}

/// Article processing charge, as reported by DOAJ.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct Apc {
    pub charges: Option<i64>,
    pub currency: Option<String>,
}
