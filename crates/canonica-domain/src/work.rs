//! Work: the canonical publication record

use serde::{Deserialize, Serialize};

use crate::common::*;

/// A publication record merged from one or more providers.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Work {
    pub id: String,
    pub updated: Vec<Provenance>,
    pub titles: Vec<Title>,
    pub abstracts: Vec<Abstract>,
    pub external_ids: Vec<ExternalId>,
    pub external_urls: Vec<ExternalUrl>,
    pub year_published: Option<i32>,
    pub types: Vec<TypeEntry>,
    pub authors: Vec<AuthorRef>,
    pub author_count: usize,
    pub source: Option<SourceRef>,
    pub citations_count: Vec<CitationCount>,
    pub bibliographic_info: BibliographicInfo,
    pub rights: Vec<Right>,
    pub subjects: Vec<SubjectGroup>,
}

impl Work {
    /// Factory for the empty work shape, all fields present with defaults.
    pub fn new() -> Self {
        Self {
            id: new_id(),
            updated: Vec::new(),
            titles: Vec::new(),
            abstracts: Vec::new(),
            external_ids: Vec::new(),
            external_urls: Vec::new(),
            year_published: None,
            types: Vec::new(),
            authors: Vec::new(),
            author_count: 0,
            source: None,
            citations_count: Vec::new(),
            bibliographic_info: BibliographicInfo::default(),
            rights: Vec::new(),
            subjects: Vec::new(),
        }
    }

    /// The work's DOI, if any provider supplied one.
    pub fn doi(&self) -> Option<&str> {
        self.external_ids
            .iter()
            .find(|e| e.source == "doi")
            .map(|e| e.id.as_str())
    }

    /// First title, used for fuzzy-search queries.
    pub fn primary_title(&self) -> Option<&str> {
        self.titles.first().map(|t| t.title.as_str())
    }

    /// True if the given provider already merged into this document.
    pub fn updated_by(&self, source: &str) -> bool {
        self.updated.iter().any(|p| p.source == source)
    }
}

impl Default for Work {
    fn default() -> Self {
        Self::new()
    }
}

/// An abstract as reported by one provider.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Abstract {
    pub text: String,
    pub lang: Option<String>,
    pub source: String,
}

/// A usage-rights statement (repository records carry these).
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Right {
    pub source: String,
    pub right: String,
}

/// Volume/issue/pages block.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct BibliographicInfo {
    pub volume: Option<String>,
    pub issue: Option<String>,
    pub pages: Option<String>,
    pub start_page: Option<String>,
    pub end_page: Option<String>,
}

/// Reference to the venue the work appeared in. An empty `id` means the
/// venue could not be linked to a canonical source document.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct SourceRef {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub external_ids: Vec<ExternalId>,
}

/// An author slot on a work.
///
/// Either resolved (`id` points to a canonical person) or an unresolved stub
/// (`id` empty, name and raw affiliations kept). Stubs may be promoted to
/// resolved on a later pass; once resolved the id is stable.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct AuthorRef {
    pub id: String,
    pub full_name: String,
    #[serde(default)]
    pub affiliations: Vec<AffiliationRef>,
    #[serde(default)]
    pub external_ids: Vec<ExternalId>,
}

impl AuthorRef {
    pub fn stub(full_name: impl Into<String>) -> Self {
        Self {
            id: String::new(),
            full_name: full_name.into(),
            affiliations: Vec::new(),
            external_ids: Vec::new(),
        }
    }

    pub fn is_resolved(&self) -> bool {
        !self.id.is_empty()
    }
}

/// An affiliation slot on a work author. An empty `id` is an unlinked name.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct AffiliationRef {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub types: Vec<TypeEntry>,
    #[serde(default)]
    pub external_ids: Vec<ExternalId>,
}
