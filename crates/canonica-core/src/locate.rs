//! Candidate location: exact identifiers first, fuzzy lookups second.
//!
//! An empty candidate set is not an error, it means "insert new". Records
//! with no usable key at all are skipped with a log line rather than
//! failing the batch.

use canonica_domain::{Affiliation, Person, Work};
use tracing::{debug, warn};

use crate::compare::{self, AffiliationMatch};
use crate::config::PipelineConfig;
use crate::error::{PipelineError, SkipReason};
use crate::search::{SearchHit, SimilaritySearch, WorkQuery};
use crate::store::{Collection, Filter, Versioned};
use crate::text;

/// Candidates for an incoming work.
#[derive(Debug)]
pub enum WorkCandidates {
    /// Found through the DOI index; identity already established.
    Exact(Versioned<Work>),
    /// Ranked similarity-search hits awaiting the decider's verdict.
    Fuzzy(Vec<SearchHit>),
    /// Nothing located: insert a new canonical document.
    None,
    /// Record not processable right now.
    Skip(SkipReason),
}

/// DOI lookup first, similarity search when the record has no DOI.
pub fn locate_work(
    work: &Work,
    works: &Collection<Work>,
    search: &dyn SimilaritySearch,
    config: &PipelineConfig,
) -> Result<WorkCandidates, PipelineError> {
    if let Some(doi) = work.doi() {
        let filter = Filter::ExternalIdFromProvider {
            source: "doi".to_string(),
            id: doi.to_string(),
        };
        return Ok(match works.find_one(&filter)? {
            Some(hit) => WorkCandidates::Exact(hit),
            None => WorkCandidates::None,
        });
    }

    let query = WorkQuery::for_work(work);
    if query.title.trim().is_empty() {
        debug!(work_id = %work.id, "work has no doi and no title, skipping");
        return Ok(WorkCandidates::Skip(SkipReason::MissingIdentifier));
    }

    match search.search(&query, config.top_k) {
        Ok(hits) if hits.is_empty() => Ok(WorkCandidates::None),
        Ok(hits) => Ok(WorkCandidates::Fuzzy(hits)),
        Err(e) if e.is_transient() => {
            warn!(work_id = %work.id, error = %e, "similarity search unavailable, skipping record");
            Ok(WorkCandidates::Skip(SkipReason::Transient(e.to_string())))
        }
        Err(e) => Err(PipelineError::Search(e)),
    }
}

/// Candidates for an incoming person.
#[derive(Debug)]
pub enum PersonCandidates {
    /// Located through an exact identifier namespace.
    ById(Versioned<Person>),
    /// Exact full-name matches only; explicitly a weaker signal, every
    /// candidate still needs the composite decider.
    ByName(Vec<Versioned<Person>>),
    None,
}

/// Probe identifier namespaces in priority order, trusted providers
/// first, then any namespace, then exact full name as a last resort.
pub fn locate_person(
    person: &Person,
    persons: &Collection<Person>,
    config: &PipelineConfig,
) -> Result<PersonCandidates, PipelineError> {
    for trusted in &config.trusted_sources {
        for eid in person.external_ids.iter().filter(|e| &e.source == trusted) {
            let filter = Filter::ExternalIdFromProvider {
                source: eid.source.clone(),
                id: eid.id.clone(),
            };
            if let Some(hit) = persons.find_one(&filter)? {
                return Ok(PersonCandidates::ById(hit));
            }
        }
    }
    for eid in &person.external_ids {
        if config.trusted_sources.contains(&eid.source) {
            continue;
        }
        if let Some(hit) = persons.find_one(&Filter::ExternalId(eid.id.clone()))? {
            return Ok(PersonCandidates::ById(hit));
        }
    }

    if person.full_name.trim().is_empty() {
        debug!(person_id = %person.id, "person has no identifiers and no name, skipping lookup");
        return Ok(PersonCandidates::None);
    }
    let by_name = persons.find(&Filter::FullName(person.full_name.clone()), 0)?;
    if by_name.is_empty() {
        Ok(PersonCandidates::None)
    } else {
        Ok(PersonCandidates::ByName(by_name))
    }
}

/// Candidates for an incoming affiliation name.
#[derive(Debug)]
pub enum AffiliationCandidates {
    Matched(Versioned<Affiliation>),
    /// Best fuzzy score landed above the floor but below acceptance;
    /// reported for adjudication, never silently dropped.
    Unresolved { best_score: u8 },
    None,
}

/// External-id lookup first, then fuzzy matching on stopword-stripped
/// institution names.
pub fn locate_affiliation(
    affiliation: &Affiliation,
    affiliations: &Collection<Affiliation>,
    config: &PipelineConfig,
) -> Result<AffiliationCandidates, PipelineError> {
    for eid in &affiliation.external_ids {
        if let Some(hit) = affiliations.find_one(&Filter::ExternalId(eid.id.clone()))? {
            return Ok(AffiliationCandidates::Matched(hit));
        }
    }

    let Some(name) = affiliation.display_name() else {
        debug!(affiliation_id = %affiliation.id, "affiliation carries no name, skipping lookup");
        return Ok(AffiliationCandidates::None);
    };
    let stripped = text::strip_institution_tokens(name);
    if stripped.is_empty() {
        return Ok(AffiliationCandidates::None);
    }

    let candidates = affiliations.scan()?;
    let names: Vec<String> = candidates
        .iter()
        .map(|c| {
            c.doc
                .display_name()
                .map(text::strip_institution_tokens)
                .unwrap_or_default()
        })
        .collect();

    match compare::best_affiliation_match(&stripped, &names, &config.thresholds) {
        AffiliationMatch::Accepted { index, score } => {
            debug!(name = %name, score, "affiliation matched by fuzzy name");
            Ok(AffiliationCandidates::Matched(candidates[index].clone()))
        }
        AffiliationMatch::Unresolved { best_score } => {
            warn!(name = %name, best_score, "affiliation above floor but below acceptance, left unresolved");
            Ok(AffiliationCandidates::Unresolved { best_score })
        }
        AffiliationMatch::NoMatch => Ok(AffiliationCandidates::None),
    }
}
