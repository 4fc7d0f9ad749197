//! Affiliation: the canonical institution record

use serde::{Deserialize, Serialize};

use crate::common::*;

/// An institution, faculty, department or research group.
///
/// Seeded primarily from the ROR import, then enriched by other providers.
/// Relations are bidirectional: if A lists B, B must list A.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Affiliation {
    pub id: String,
    pub updated: Vec<Provenance>,
    pub names: Vec<Name>,
    pub abbreviations: Vec<String>,
    pub external_ids: Vec<ExternalId>,
    pub external_urls: Vec<ExternalUrl>,
    pub types: Vec<TypeEntry>,
    pub relations: Vec<Relation>,
    pub addresses: Vec<Address>,
    pub ranking: Vec<Ranking>,
}

impl Affiliation {
    /// Factory for the empty affiliation shape.
    pub fn new() -> Self {
        Self {
            id: new_id(),
            updated: Vec::new(),
            names: Vec::new(),
            abbreviations: Vec::new(),
            external_ids: Vec::new(),
            external_urls: Vec::new(),
            types: Vec::new(),
            relations: Vec::new(),
            addresses: Vec::new(),
            ranking: Vec::new(),
        }
    }

    /// Preferred display name: ror-sourced first, then es, then en, then any.
    pub fn display_name(&self) -> Option<&str> {
        let mut best: Option<&str> = None;
        for n in &self.names {
            if n.source == "ror" {
                return Some(&n.name);
            }
            match n.lang.as_deref() {
                Some("es") => best = Some(&n.name),
                Some("en") if best.is_none() => best = Some(&n.name),
                _ => {}
            }
        }
        best.or_else(|| self.names.first().map(|n| n.name.as_str()))
    }

    pub fn updated_by(&self, source: &str) -> bool {
        self.updated.iter().any(|p| p.source == source)
    }

    /// True if relations are symmetric with respect to `other`.
    pub fn relates_to(&self, other_id: &str) -> bool {
        self.relations.iter().any(|r| r.id == other_id)
    }
}

impl Default for Affiliation {
    fn default() -> Self {
        Self::new()
    }
}

/// A link to a parent or sibling affiliation (department → faculty, group →
/// institution).
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Relation {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub types: Vec<TypeEntry>,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize, Default)]
pub struct Address {
    pub city: Option<String>,
    pub state: Option<String>,
    pub country: Option<String>,
    pub country_code: Option<String>,
    pub lat: Option<f64>,
    pub lng: Option<f64>,
}
