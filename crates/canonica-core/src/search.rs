//! Similarity search over works.
//!
//! The locator falls back to this when a record has no usable identifier.
//! The trait keeps the backend pluggable; [`LocalSearchIndex`] is the
//! in-process implementation, scoring works by token overlap on the
//! normalized title with small boosts for matching metadata.

use std::collections::{BTreeSet, HashMap};
use std::sync::RwLock;

use canonica_domain::Work;

use crate::text;

/// Long author lists drown the title signal, so queries carry at most
/// this many names.
pub const MAX_QUERY_AUTHORS: usize = 5;

/// A similarity query assembled from an incoming record.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct WorkQuery {
    pub title: String,
    pub source: Option<String>,
    pub year: Option<i32>,
    pub volume: Option<String>,
    pub issue: Option<String>,
    pub start_page: Option<String>,
    pub authors: Vec<String>,
}

impl WorkQuery {
    /// Build the query a work would be located by.
    pub fn for_work(work: &Work) -> Self {
        Self {
            title: work.primary_title().unwrap_or_default().to_string(),
            source: work.source.as_ref().map(|s| s.name.clone()),
            year: work.year_published,
            volume: work.bibliographic_info.volume.clone(),
            issue: work.bibliographic_info.issue.clone(),
            start_page: work.bibliographic_info.start_page.clone(),
            authors: work
                .authors
                .iter()
                .take(MAX_QUERY_AUTHORS)
                .map(|a| a.full_name.clone())
                .collect(),
        }
    }
}

/// One candidate returned by the backend. Title and authors ride along so
/// the decision stage can verify without another store round-trip.
#[derive(Debug, Clone, PartialEq)]
pub struct SearchHit {
    pub work_id: String,
    pub title: String,
    pub authors: Vec<String>,
    pub score: f64,
}

/// Search backend seam.
pub trait SimilaritySearch: Send + Sync {
    /// Add or refresh a work in the index.
    fn index_work(&self, work: &Work) -> Result<(), SearchError>;

    /// Drop a work from the index (folded duplicates leave the index too).
    fn remove(&self, work_id: &str) -> Result<(), SearchError>;

    /// Best `top_k` candidates for the query, highest score first.
    fn search(&self, query: &WorkQuery, top_k: usize) -> Result<Vec<SearchHit>, SearchError>;
}

#[derive(Debug, thiserror::Error)]
pub enum SearchError {
    #[error("search backend timed out: {0}")]
    Timeout(String),

    #[error("search backend error: {0}")]
    Backend(String),
}

impl SearchError {
    /// Transient failures skip the record instead of failing the run.
    pub fn is_transient(&self) -> bool {
        matches!(self, SearchError::Timeout(_))
    }
}

#[derive(Debug, Clone)]
struct IndexedWork {
    title: String,
    title_tokens: BTreeSet<String>,
    authors: Vec<String>,
    source: Option<String>,
    year: Option<i32>,
    volume: Option<String>,
    issue: Option<String>,
    start_page: Option<String>,
}

/// In-process index over normalized title tokens.
#[derive(Default)]
pub struct LocalSearchIndex {
    works: RwLock<HashMap<String, IndexedWork>>,
}

impl LocalSearchIndex {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.works.read().map(|w| w.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

fn tokens(s: &str) -> BTreeSet<String> {
    text::normalize(s)
        .split_whitespace()
        .map(str::to_string)
        .collect()
}

fn jaccard(a: &BTreeSet<String>, b: &BTreeSet<String>) -> f64 {
    if a.is_empty() && b.is_empty() {
        return 0.0;
    }
    let shared = a.intersection(b).count() as f64;
    let total = a.union(b).count() as f64;
    shared / total
}

fn opt_eq<T: PartialEq>(a: &Option<T>, b: &Option<T>) -> bool {
    matches!((a, b), (Some(x), Some(y)) if x == y)
}

impl SimilaritySearch for LocalSearchIndex {
    fn index_work(&self, work: &Work) -> Result<(), SearchError> {
        let title = work.primary_title().unwrap_or_default().to_string();
        let entry = IndexedWork {
            title_tokens: tokens(&title),
            title,
            authors: work.authors.iter().map(|a| a.full_name.clone()).collect(),
            source: work.source.as_ref().map(|s| s.name.clone()),
            year: work.year_published,
            volume: work.bibliographic_info.volume.clone(),
            issue: work.bibliographic_info.issue.clone(),
            start_page: work.bibliographic_info.start_page.clone(),
        };
        self.works
            .write()
            .map_err(|_| SearchError::Backend("index lock poisoned".into()))?
            .insert(work.id.clone(), entry);
        Ok(())
    }

    fn remove(&self, work_id: &str) -> Result<(), SearchError> {
        self.works
            .write()
            .map_err(|_| SearchError::Backend("index lock poisoned".into()))?
            .remove(work_id);
        Ok(())
    }

    fn search(&self, query: &WorkQuery, top_k: usize) -> Result<Vec<SearchHit>, SearchError> {
        let works = self
            .works
            .read()
            .map_err(|_| SearchError::Backend("index lock poisoned".into()))?;
        let query_tokens = tokens(&query.title);
        let query_authors: Vec<BTreeSet<String>> = query
            .authors
            .iter()
            .take(MAX_QUERY_AUTHORS)
            .map(|a| tokens(a))
            .collect();

        let mut hits: Vec<SearchHit> = works
            .iter()
            .filter_map(|(id, entry)| {
                let title_score = jaccard(&query_tokens, &entry.title_tokens);
                if title_score == 0.0 {
                    return None;
                }
                let author_score = if query_authors.is_empty() || entry.authors.is_empty() {
                    0.0
                } else {
                    let mut best_sum = 0.0;
                    for qa in &query_authors {
                        let best = entry
                            .authors
                            .iter()
                            .map(|a| jaccard(qa, &tokens(a)))
                            .fold(0.0, f64::max);
                        best_sum += best;
                    }
                    best_sum / query_authors.len() as f64
                };
                let mut boost = 0.0;
                if opt_eq(&query.year, &entry.year) {
                    boost += 0.05;
                }
                if opt_eq(&query.volume, &entry.volume) {
                    boost += 0.05;
                }
                if opt_eq(&query.issue, &entry.issue) {
                    boost += 0.05;
                }
                if opt_eq(&query.start_page, &entry.start_page) {
                    boost += 0.05;
                }
                if let (Some(qs), Some(es)) = (&query.source, &entry.source) {
                    if text::normalize(qs) == text::normalize(es) {
                        boost += 0.05;
                    }
                }
                Some(SearchHit {
                    work_id: id.clone(),
                    title: entry.title.clone(),
                    authors: entry.authors.clone(),
                    score: title_score + 0.5 * author_score + boost,
                })
            })
            .collect();

        hits.sort_by(|a, b| {
            b.score
                .partial_cmp(&a.score)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then_with(|| a.work_id.cmp(&b.work_id))
        });
        hits.truncate(top_k);
        Ok(hits)
    }
}
