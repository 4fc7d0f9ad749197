//! Per-record ingestion pipeline: locate, decide, merge or insert.
//!
//! One `Pipeline` owns handles to the four canonical collections, the
//! similarity index and the configuration, and is shared across worker
//! threads. All writes are single-document versioned replaces; a conflict
//! means another worker touched the document and the record is retried
//! from the locate step with fresh reads. At-least-once semantics: the
//! provenance guard makes re-ingestion safe, so a record dropped after
//! exhausting retries is simply picked up by the next run.

use std::sync::Arc;

use canonica_domain::{Affiliation, ExternalId, Membership, Person, RelatedWork, Source, Work};
use canonica_identifiers::{
    is_valid_orcid, normalize_doi, normalize_issn, normalize_orcid, parse_profile_id,
};
use rayon::prelude::*;
use tracing::{debug, error, info, warn};

use crate::compare;
use crate::config::PipelineConfig;
use crate::error::{Result, SkipReason};
use crate::locate::{self, AffiliationCandidates, PersonCandidates, WorkCandidates};
use crate::merge::{self, MergeOutcome};
use crate::search::SimilaritySearch;
use crate::store::{Collection, DocumentStore, Filter};
use crate::unify::{self, UnifyReport};

/// What happened to one ingested record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum IngestOutcome {
    /// Merged into an existing canonical document.
    Merged { id: String },
    /// No candidate matched; a new canonical document was created.
    Inserted { id: String },
    /// The provenance guard held and nothing new arrived.
    AlreadyProcessed { id: String },
    /// Record not processable this run.
    Skipped(SkipReason),
}

/// Counters for a batch run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BatchReport {
    pub merged: usize,
    pub inserted: usize,
    pub already_processed: usize,
    pub skipped: usize,
    pub failed: usize,
}

impl BatchReport {
    fn add(mut self, other: BatchReport) -> Self {
        self.merged += other.merged;
        self.inserted += other.inserted;
        self.already_processed += other.already_processed;
        self.skipped += other.skipped;
        self.failed += other.failed;
        self
    }

    fn record(provider: &str, outcome: Result<IngestOutcome>) -> Self {
        let mut report = BatchReport::default();
        match outcome {
            Ok(IngestOutcome::Merged { .. }) => report.merged = 1,
            Ok(IngestOutcome::Inserted { .. }) => report.inserted = 1,
            Ok(IngestOutcome::AlreadyProcessed { .. }) => report.already_processed = 1,
            Ok(IngestOutcome::Skipped(reason)) => {
                debug!(provider, %reason, "record skipped");
                report.skipped = 1;
            }
            Err(e) => {
                error!(provider, error = %e, "record failed, continuing batch");
                report.failed = 1;
            }
        }
        report
    }
}

/// Bring provider-reported identifiers into canonical form before any
/// lookup: DOIs lose their resolver prefix, ORCIDs must pass their
/// checksum, profile URLs collapse to `(namespace, id)` pairs. Malformed
/// values in checksummed namespaces are dropped, not matched on.
fn canonicalize_ids(ids: &mut Vec<ExternalId>) {
    let mut kept: Vec<ExternalId> = Vec::with_capacity(ids.len());
    for eid in ids.drain(..) {
        let replacement = match eid.source.as_str() {
            // Unparseable DOIs keep their raw (lower-cased) value; a weird
            // provider-local id still beats losing the record's only key.
            "doi" => Some(ExternalId::new(
                "doi",
                normalize_doi(&eid.id).unwrap_or_else(|| eid.id.trim().to_lowercase()),
            )),
            "orcid" => normalize_orcid(&eid.id)
                .filter(|id| is_valid_orcid(id))
                .map(|id| ExternalId::new("orcid", id)),
            "issn" | "eissn" => {
                normalize_issn(&eid.id).map(|id| ExternalId::new(eid.source.clone(), id))
            }
            _ if eid.id.starts_with("http") => match parse_profile_id(&eid.id) {
                Some((kind, id)) => Some(ExternalId::new(kind.as_source(), id)),
                None => Some(eid),
            },
            _ => Some(eid),
        };
        match replacement {
            Some(e) => {
                if !kept.contains(&e) {
                    kept.push(e);
                }
            }
            None => debug!("dropped malformed identifier"),
        }
    }
    *ids = kept;
}

/// The provider-agnostic ingestion pipeline.
pub struct Pipeline {
    works: Collection<Work>,
    persons: Collection<Person>,
    affiliations: Collection<Affiliation>,
    sources: Collection<Source>,
    search: Arc<dyn SimilaritySearch>,
    config: PipelineConfig,
}

impl Pipeline {
    pub fn new(
        store: Arc<dyn DocumentStore>,
        search: Arc<dyn SimilaritySearch>,
        config: PipelineConfig,
    ) -> Self {
        Self {
            works: Collection::new(Arc::clone(&store)),
            persons: Collection::new(Arc::clone(&store)),
            affiliations: Collection::new(Arc::clone(&store)),
            sources: Collection::new(store),
            search,
            config,
        }
    }

    pub fn works(&self) -> &Collection<Work> {
        &self.works
    }

    pub fn persons(&self) -> &Collection<Person> {
        &self.persons
    }

    pub fn affiliations(&self) -> &Collection<Affiliation> {
        &self.affiliations
    }

    pub fn sources(&self) -> &Collection<Source> {
        &self.sources
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    /// Ingest one normalized work record from a provider.
    pub fn ingest_work(&self, mut incoming: Work, provider: &str) -> Result<IngestOutcome> {
        canonicalize_ids(&mut incoming.external_ids);
        for author in &mut incoming.authors {
            canonicalize_ids(&mut author.external_ids);
        }
        if let Some(venue) = incoming.source.as_mut() {
            canonicalize_ids(&mut venue.external_ids);
        }
        self.link_venue(&mut incoming)?;
        self.resolve_authors(&mut incoming)?;

        let mut attempt = 0;
        loop {
            let candidate = match locate::locate_work(
                &incoming,
                &self.works,
                self.search.as_ref(),
                &self.config,
            )? {
                WorkCandidates::Skip(reason) => return Ok(IngestOutcome::Skipped(reason)),
                WorkCandidates::Exact(current) => Some(current),
                WorkCandidates::Fuzzy(hits) => {
                    let title = incoming.primary_title().unwrap_or_default().to_string();
                    let authors: Vec<String> = incoming
                        .authors
                        .iter()
                        .map(|a| a.full_name.clone())
                        .collect();
                    let confirmed = hits.iter().find(|hit| {
                        compare::check_work(&title, &authors, hit, &self.config.thresholds)
                    });
                    match confirmed {
                        Some(hit) => self.works.get(&hit.work_id)?,
                        None => None,
                    }
                }
                WorkCandidates::None => None,
            };

            let Some(current) = candidate else {
                return self.insert_work(incoming, provider);
            };

            let mut merged = current.doc.clone();
            let outcome =
                merge::merge_work(&mut merged, &incoming, provider, &self.config.thresholds);
            if outcome == MergeOutcome::AlreadyProcessed {
                debug!(provider, work_id = %current.id, "work already carries this provider");
                return Ok(IngestOutcome::AlreadyProcessed { id: current.id });
            }
            match self.works.replace(&current.id, current.version, &merged) {
                Ok(_) => {
                    self.index_work(&merged);
                    self.record_related_works(&merged)?;
                    return Ok(IngestOutcome::Merged { id: current.id });
                }
                Err(e) if e.is_conflict() && attempt < self.config.max_retries => {
                    attempt += 1;
                    debug!(work_id = %current.id, attempt, "work changed underneath, retrying merge");
                }
                Err(e) if e.is_conflict() => {
                    warn!(work_id = %current.id, "merge retries exhausted, dropping record for this run");
                    return Ok(IngestOutcome::Skipped(SkipReason::Transient(
                        e.to_string(),
                    )));
                }
                Err(e) => return Err(e.into()),
            }
        }
    }

    fn insert_work(&self, incoming: Work, provider: &str) -> Result<IngestOutcome> {
        let mut work = incoming;
        if !work.updated_by(provider) {
            work.updated.push(canonica_domain::Provenance::now(provider));
        }
        work.author_count = work.author_count.max(work.authors.len());
        let id = self.works.insert(&work)?;
        self.index_work(&work);
        self.record_related_works(&work)?;
        debug!(provider, work_id = %id, "inserted new canonical work");
        Ok(IngestOutcome::Inserted { id })
    }

    fn index_work(&self, work: &Work) {
        // The canonical store is authoritative; a failed index refresh only
        // costs fuzzy recall until the next run.
        if let Err(e) = self.search.index_work(work) {
            warn!(work_id = %work.id, error = %e, "failed to refresh similarity index");
        }
    }

    /// Point the work's venue reference at the canonical source document,
    /// when one exists for any of its external ids (ISSN and friends).
    fn link_venue(&self, work: &mut Work) -> Result<()> {
        let Some(venue) = work.source.as_mut() else {
            return Ok(());
        };
        for eid in &venue.external_ids {
            if let Some(hit) = self
                .sources
                .find_one(&Filter::ExternalId(eid.id.clone()))?
            {
                venue.id = hit.id;
                if let Some(name) = hit.doc.display_name() {
                    venue.name = name.to_string();
                }
                return Ok(());
            }
        }
        Ok(())
    }

    /// Promote author stubs to canonical person references where possible.
    ///
    /// A missing person is not an error: the stub stays name-only and a
    /// later pass promotes it once the person document exists.
    fn resolve_authors(&self, work: &mut Work) -> Result<()> {
        let doi = work.doi().map(str::to_string);
        let year = work.year_published;
        for author in &mut work.authors {
            if author.is_resolved() {
                continue;
            }
            let mut probe = Person::new();
            probe.full_name = author.full_name.clone();
            probe.external_ids = author.external_ids.clone();
            probe.affiliations = author
                .affiliations
                .iter()
                .map(|a| Membership {
                    id: a.id.clone(),
                    name: a.name.clone(),
                    types: a.types.clone(),
                    ..Default::default()
                })
                .collect();
            if let Some(doi) = &doi {
                probe.related_works.push(RelatedWork {
                    source: "doi".to_string(),
                    id: doi.clone(),
                    year,
                });
            }

            let resolved = match locate::locate_person(&probe, &self.persons, &self.config)? {
                PersonCandidates::ById(hit) => Some(hit),
                PersonCandidates::ByName(candidates) => candidates
                    .into_iter()
                    .find(|c| compare::compare_author(&probe, &c.doc, &self.config.thresholds)),
                PersonCandidates::None => None,
            };
            let Some(hit) = resolved else {
                debug!(author = %author.full_name, "no canonical person yet, keeping stub");
                continue;
            };
            author.id = hit.id.clone();
            if hit.doc.full_name.chars().count() > author.full_name.chars().count() {
                author.full_name = hit.doc.full_name.clone();
            }
            self.enrich_person(hit, &probe)?;
        }
        Ok(())
    }

    /// Persist identifiers and work links discovered while resolving an
    /// author slot back onto the canonical person.
    fn enrich_person(
        &self,
        current: crate::store::Versioned<Person>,
        probe: &Person,
    ) -> Result<()> {
        let mut attempt = 0;
        let mut current = current;
        loop {
            let mut updated = current.doc.clone();
            for eid in &probe.external_ids {
                if !updated.external_ids.contains(eid) {
                    updated.external_ids.push(eid.clone());
                }
            }
            for rw in &probe.related_works {
                if !updated.related_works.iter().any(|r| r.id == rw.id) {
                    updated.related_works.push(rw.clone());
                }
            }
            if updated == current.doc {
                return Ok(());
            }
            match self.persons.replace(&current.id, current.version, &updated) {
                Ok(_) => return Ok(()),
                Err(e) if e.is_conflict() && attempt < self.config.max_retries => {
                    attempt += 1;
                    match self.persons.get(&current.id)? {
                        Some(fresh) => current = fresh,
                        None => return Ok(()),
                    }
                }
                Err(e) if e.is_conflict() => {
                    warn!(person_id = %current.id, "person enrichment retries exhausted");
                    return Ok(());
                }
                Err(e) => return Err(e.into()),
            }
        }
    }

    /// Mirror a merged work's DOI into each resolved author's
    /// `related_works`, so the unifier's co-authorship key stays current.
    fn record_related_works(&self, work: &Work) -> Result<()> {
        let Some(doi) = work.doi() else {
            return Ok(());
        };
        for author in work.authors.iter().filter(|a| a.is_resolved()) {
            let Some(person) = self.persons.get(&author.id)? else {
                continue;
            };
            let mut probe = Person::new();
            probe.related_works.push(RelatedWork {
                source: "doi".to_string(),
                id: doi.to_string(),
                year: work.year_published,
            });
            self.enrich_person(person, &probe)?;
        }
        Ok(())
    }

    /// Ingest one normalized person record from a provider.
    pub fn ingest_person(&self, mut incoming: Person, provider: &str) -> Result<IngestOutcome> {
        canonicalize_ids(&mut incoming.external_ids);
        if incoming.full_name.trim().is_empty() && incoming.external_ids.is_empty() {
            return Ok(IngestOutcome::Skipped(SkipReason::MissingIdentifier));
        }

        let mut attempt = 0;
        loop {
            let candidate = match locate::locate_person(&incoming, &self.persons, &self.config)? {
                PersonCandidates::ById(hit) => Some(hit),
                PersonCandidates::ByName(candidates) => candidates
                    .into_iter()
                    .find(|c| compare::compare_author(&incoming, &c.doc, &self.config.thresholds)),
                PersonCandidates::None => None,
            };

            let Some(current) = candidate else {
                let mut person = incoming.clone();
                if !person.updated_by(provider) {
                    person
                        .updated
                        .push(canonica_domain::Provenance::now(provider));
                }
                let id = self.persons.insert(&person)?;
                debug!(provider, person_id = %id, "inserted new canonical person");
                return Ok(IngestOutcome::Inserted { id });
            };

            let mut merged = current.doc.clone();
            if merge::merge_person(&mut merged, &incoming, provider) == MergeOutcome::AlreadyProcessed
            {
                return Ok(IngestOutcome::AlreadyProcessed { id: current.id });
            }
            match self.persons.replace(&current.id, current.version, &merged) {
                Ok(_) => return Ok(IngestOutcome::Merged { id: current.id }),
                Err(e) if e.is_conflict() && attempt < self.config.max_retries => {
                    attempt += 1;
                }
                Err(e) if e.is_conflict() => {
                    return Ok(IngestOutcome::Skipped(SkipReason::Transient(e.to_string())));
                }
                Err(e) => return Err(e.into()),
            }
        }
    }

    /// Ingest one normalized affiliation record from a provider.
    pub fn ingest_affiliation(
        &self,
        mut incoming: Affiliation,
        provider: &str,
    ) -> Result<IngestOutcome> {
        canonicalize_ids(&mut incoming.external_ids);
        if incoming.display_name().is_none() && incoming.external_ids.is_empty() {
            return Ok(IngestOutcome::Skipped(SkipReason::MissingIdentifier));
        }

        let mut attempt = 0;
        loop {
            let candidate =
                match locate::locate_affiliation(&incoming, &self.affiliations, &self.config)? {
                    AffiliationCandidates::Matched(hit) => Some(hit),
                    AffiliationCandidates::Unresolved { best_score } => {
                        return Ok(IngestOutcome::Skipped(SkipReason::UnresolvedAffiliation {
                            best_score,
                        }));
                    }
                    AffiliationCandidates::None => None,
                };

            let Some(current) = candidate else {
                let mut affiliation = incoming.clone();
                if !affiliation.updated_by(provider) {
                    affiliation
                        .updated
                        .push(canonica_domain::Provenance::now(provider));
                }
                let id = self.affiliations.insert(&affiliation)?;
                return Ok(IngestOutcome::Inserted { id });
            };

            let mut merged = current.doc.clone();
            if merge::merge_affiliation(&mut merged, &incoming, provider)
                == MergeOutcome::AlreadyProcessed
            {
                return Ok(IngestOutcome::AlreadyProcessed { id: current.id });
            }
            match self
                .affiliations
                .replace(&current.id, current.version, &merged)
            {
                Ok(_) => return Ok(IngestOutcome::Merged { id: current.id }),
                Err(e) if e.is_conflict() && attempt < self.config.max_retries => {
                    attempt += 1;
                }
                Err(e) if e.is_conflict() => {
                    return Ok(IngestOutcome::Skipped(SkipReason::Transient(e.to_string())));
                }
                Err(e) => return Err(e.into()),
            }
        }
    }

    /// Ingest one normalized source (journal/venue) record from a provider.
    pub fn ingest_source(&self, mut incoming: Source, provider: &str) -> Result<IngestOutcome> {
        canonicalize_ids(&mut incoming.external_ids);
        if incoming.external_ids.is_empty() && incoming.display_name().is_none() {
            return Ok(IngestOutcome::Skipped(SkipReason::MissingIdentifier));
        }

        let mut attempt = 0;
        loop {
            let mut candidate = None;
            for eid in &incoming.external_ids {
                if let Some(hit) = self
                    .sources
                    .find_one(&Filter::ExternalId(eid.id.clone()))?
                {
                    candidate = Some(hit);
                    break;
                }
            }

            let Some(current) = candidate else {
                let mut source = incoming.clone();
                if !source.updated_by(provider) {
                    source
                        .updated
                        .push(canonica_domain::Provenance::now(provider));
                }
                let id = self.sources.insert(&source)?;
                return Ok(IngestOutcome::Inserted { id });
            };

            let mut merged = current.doc.clone();
            if merge::merge_source(&mut merged, &incoming, provider)?
                == MergeOutcome::AlreadyProcessed
            {
                return Ok(IngestOutcome::AlreadyProcessed { id: current.id });
            }
            match self.sources.replace(&current.id, current.version, &merged) {
                Ok(_) => return Ok(IngestOutcome::Merged { id: current.id }),
                Err(e) if e.is_conflict() && attempt < self.config.max_retries => {
                    attempt += 1;
                }
                Err(e) if e.is_conflict() => {
                    return Ok(IngestOutcome::Skipped(SkipReason::Transient(e.to_string())));
                }
                Err(e) => return Err(e.into()),
            }
        }
    }

    /// Batch-ingest works in parallel. Failures are logged and counted,
    /// never fatal to the batch.
    pub fn ingest_works(&self, records: Vec<Work>, provider: &str) -> BatchReport {
        let run = || {
            records
                .into_par_iter()
                .map(|w| BatchReport::record(provider, self.ingest_work(w, provider)))
                .reduce(BatchReport::default, BatchReport::add)
        };
        let report = self.with_pool(run);
        info!(
            provider,
            merged = report.merged,
            inserted = report.inserted,
            already_processed = report.already_processed,
            skipped = report.skipped,
            failed = report.failed,
            "work batch finished"
        );
        report
    }

    /// Batch-ingest persons in parallel.
    pub fn ingest_persons(&self, records: Vec<Person>, provider: &str) -> BatchReport {
        let run = || {
            records
                .into_par_iter()
                .map(|p| BatchReport::record(provider, self.ingest_person(p, provider)))
                .reduce(BatchReport::default, BatchReport::add)
        };
        let report = self.with_pool(run);
        info!(
            provider,
            merged = report.merged,
            inserted = report.inserted,
            skipped = report.skipped,
            failed = report.failed,
            "person batch finished"
        );
        report
    }

    fn with_pool<T, F>(&self, run: F) -> T
    where
        T: Send,
        F: FnOnce() -> T + Send,
    {
        if self.config.num_jobs == 0 {
            return run();
        }
        match rayon::ThreadPoolBuilder::new()
            .num_threads(self.config.num_jobs)
            .build()
        {
            Ok(pool) => pool.install(run),
            Err(e) => {
                warn!(error = %e, "could not build worker pool, running on the default");
                run()
            }
        }
    }

    /// Run the duplicate unification sweep over the person collection.
    pub fn run_unification(&self) -> Result<UnifyReport> {
        unify::unify_persons(&self.persons, &self.config)
    }
}

impl std::fmt::Debug for Pipeline {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Pipeline")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}
