//! Batch sweep that repairs missed splits in the person collection.
//!
//! Grouping by a strong key (shared ORCID) is proof of identity and folds
//! directly. Grouping by a weak key (a co-authored DOI) is only candidate
//! generation: every member still has to pass the composite decider
//! against the survivor before it is absorbed.
//!
//! Groups are independent and run in parallel; members of one group fold
//! sequentially into an evolving survivor. The read-modify-write on the
//! survivor is protected by the store's version check, with a bounded
//! retry on conflict.

use canonica_domain::Person;
use rayon::prelude::*;
use tracing::{debug, info, warn};

use crate::compare;
use crate::config::PipelineConfig;
use crate::error::{PipelineError, Result};
use crate::merge;
use crate::store::{self, CanonicalEntity, Collection, KeyGroup, StrongKey, Versioned};

/// Counters from one unification sweep.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct UnifyReport {
    /// Groups with more than one member, strong and weak keys combined.
    pub groups: usize,
    /// Duplicates absorbed and archived.
    pub folded: usize,
    /// Weak-key members that failed pairwise confirmation.
    pub unconfirmed: usize,
    /// Weak-key groups skipped for exceeding `max_group_size`.
    pub oversized: usize,
}

impl UnifyReport {
    fn add(mut self, other: UnifyReport) -> Self {
        self.groups += other.groups;
        self.folded += other.folded;
        self.unconfirmed += other.unconfirmed;
        self.oversized += other.oversized;
        self
    }
}

/// How the members of a group were generated, which decides whether they
/// still need the decider.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum KeyStrength {
    Strong,
    Weak,
}

/// One full deduplication pass over the person collection.
///
/// Idempotent: the surviving documents carry the union of their group's
/// external ids, so a second pass finds no group with two members.
pub fn unify_persons(persons: &Collection<Person>, config: &PipelineConfig) -> Result<UnifyReport> {
    let docs = persons.raw().scan(Person::COLLECTION)?;

    let strong = store::group_by_key(
        &docs,
        &StrongKey::ExternalId {
            source: "orcid".to_string(),
        },
    );
    let weak = store::group_by_key(
        &docs,
        &StrongKey::RelatedWork {
            source: "doi".to_string(),
        },
    );
    drop(docs);

    let tagged: Vec<(KeyGroup, KeyStrength)> = strong
        .into_iter()
        .map(|g| (g, KeyStrength::Strong))
        .chain(weak.into_iter().map(|g| (g, KeyStrength::Weak)))
        .collect();
    info!(groups = tagged.len(), "starting person unification sweep");

    let sweep = || -> Result<UnifyReport> {
        tagged
            .par_iter()
            .map(|(group, strength)| unify_group(persons, group, *strength, config))
            .try_reduce(UnifyReport::default, |a, b| Ok(a.add(b)))
    };

    let report = if config.num_jobs > 0 {
        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(config.num_jobs)
            .build()
            .map_err(|e| PipelineError::Invariant(format!("worker pool: {}", e)))?;
        pool.install(sweep)?
    } else {
        sweep()?
    };

    info!(
        folded = report.folded,
        unconfirmed = report.unconfirmed,
        oversized = report.oversized,
        "person unification sweep finished"
    );
    Ok(report)
}

fn unify_group(
    persons: &Collection<Person>,
    group: &KeyGroup,
    strength: KeyStrength,
    config: &PipelineConfig,
) -> Result<UnifyReport> {
    if strength == KeyStrength::Weak
        && config.max_group_size > 0
        && group.ids.len() > config.max_group_size
    {
        warn!(
            key = %group.key,
            members = group.ids.len(),
            "weak-key group exceeds the size bound, skipping"
        );
        return Ok(UnifyReport {
            groups: 1,
            oversized: 1,
            ..Default::default()
        });
    }

    let mut members = Vec::new();
    for id in &group.ids {
        // A member may already have been absorbed by an overlapping group.
        if let Some(v) = persons.get(id)? {
            members.push(v);
        }
    }
    if members.len() < 2 {
        return Ok(UnifyReport {
            groups: 1,
            ..Default::default()
        });
    }

    let survivor_id = select_survivor(&members, strength, &config.source_priority);
    debug!(key = %group.key, survivor = %survivor_id, members = members.len(), "folding group");

    let mut report = UnifyReport {
        groups: 1,
        ..Default::default()
    };
    let mut attempt = 0;
    loop {
        let Some(current) = persons.get(&survivor_id)? else {
            return Ok(report);
        };
        let mut merged = current.doc.clone();
        let mut absorbed: Vec<Versioned<Person>> = Vec::new();
        let mut unconfirmed = 0usize;

        for member in &members {
            if member.id == survivor_id {
                continue;
            }
            let Some(fresh) = persons.get(&member.id)? else {
                continue;
            };
            if strength == KeyStrength::Weak
                && !compare::compare_author(&merged, &fresh.doc, &config.thresholds)
            {
                unconfirmed += 1;
                continue;
            }
            merge::fold_person(&mut merged, &fresh.doc);
            absorbed.push(fresh);
        }

        if absorbed.is_empty() {
            report.unconfirmed += unconfirmed;
            return Ok(report);
        }

        match persons.replace(&survivor_id, current.version, &merged) {
            Ok(_) => {
                for v in &absorbed {
                    persons.archive(v)?;
                }
                report.folded += absorbed.len();
                report.unconfirmed += unconfirmed;
                return Ok(report);
            }
            Err(e) if e.is_conflict() && attempt < config.max_retries => {
                attempt += 1;
                debug!(survivor = %survivor_id, attempt, "survivor changed underneath, retrying fold");
            }
            Err(e) => return Err(e.into()),
        }
    }
}

/// Deterministic survivor choice: the first member whose provenance
/// carries the highest-priority source wins; otherwise strong-key groups
/// keep the first document and weak-key groups keep the longest full
/// name (more disambiguating information).
fn select_survivor(
    members: &[Versioned<Person>],
    strength: KeyStrength,
    source_priority: &[String],
) -> String {
    for source in source_priority {
        if let Some(v) = members.iter().find(|v| v.doc.updated_by(source)) {
            return v.id.clone();
        }
    }
    match strength {
        KeyStrength::Strong => members[0].id.clone(),
        KeyStrength::Weak => members
            .iter()
            .max_by_key(|v| v.doc.full_name.chars().count())
            .map(|v| v.id.clone())
            .unwrap_or_else(|| members[0].id.clone()),
    }
}
