//! Person: the canonical researcher record

use serde::{Deserialize, Serialize};

use crate::common::*;

/// A researcher record merged from one or more providers.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Person {
    pub id: String,
    pub updated: Vec<Provenance>,
    pub full_name: String,
    pub first_names: Vec<String>,
    pub last_names: Vec<String>,
    pub initials: String,
    /// Alternate spellings seen in citations, lower-cased.
    pub aliases: Vec<String>,
    pub external_ids: Vec<ExternalId>,
    pub sex: Option<String>,
    pub marital_status: Option<String>,
    pub birthplace: Option<String>,
    pub birthdate: Option<i64>,
    pub keywords: Vec<String>,
    pub affiliations: Vec<Membership>,
    /// Cross-references to works this person authored, keyed by namespace.
    pub related_works: Vec<RelatedWork>,
    pub ranking: Vec<Ranking>,
    pub degrees: Vec<Degree>,
    pub subjects: Vec<SubjectGroup>,
}

impl Person {
    /// Factory for the empty person shape, all fields present with defaults.
    pub fn new() -> Self {
        Self {
            id: new_id(),
            updated: Vec::new(),
            full_name: String::new(),
            first_names: Vec::new(),
            last_names: Vec::new(),
            initials: String::new(),
            aliases: Vec::new(),
            external_ids: Vec::new(),
            sex: None,
            marital_status: None,
            birthplace: None,
            birthdate: None,
            keywords: Vec::new(),
            affiliations: Vec::new(),
            related_works: Vec::new(),
            ranking: Vec::new(),
            degrees: Vec::new(),
            subjects: Vec::new(),
        }
    }

    /// The person's ORCID, if known.
    pub fn orcid(&self) -> Option<&str> {
        self.external_ids
            .iter()
            .find(|e| e.source == "orcid")
            .map(|e| e.id.as_str())
    }

    pub fn updated_by(&self, source: &str) -> bool {
        self.updated.iter().any(|p| p.source == source)
    }
}

impl Default for Person {
    fn default() -> Self {
        Self::new()
    }
}

/// A person's tenure at an affiliation. Dates are provider-shaped strings
/// (often bare years); empty means unknown.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize, Default)]
pub struct Membership {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub types: Vec<TypeEntry>,
    pub start_date: Option<String>,
    pub end_date: Option<String>,
    pub position: Option<String>,
}

/// A work this person is known to have authored, by external id.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct RelatedWork {
    pub source: String,
    pub id: String,
    pub year: Option<i32>,
}

/// An academic degree, as reported by one provider.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Degree {
    pub source: String,
    pub degree: String,
}
