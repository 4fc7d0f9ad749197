//! Field-level merge of an incoming record into a canonical document.
//!
//! Policies per field family:
//! - append-only sets (titles, external ids, types, related works, ...):
//!   union by value equality, never remove
//! - scalars (year, sex, birthdate, publisher): first writer wins, set
//!   only while empty
//! - full names: longest wins, the losing spelling is kept as an alias
//! - authors and memberships: matched through the decider and enriched in
//!   place instead of duplicated
//!
//! The provenance log doubles as the idempotency key: a provider that
//! already appears in `updated` gets a no-op, except that newly discovered
//! authors, memberships and ranking windows may still land on a later pass.
//! Callers persist the result with a single versioned replace, so a merge
//! is never partially visible.

use canonica_domain::{
    Affiliation, AffiliationRef, AuthorRef, Person, Provenance, Ranking, Relation, Source, Work,
};

use crate::compare;
use crate::config::MatchThresholds;
use crate::error::PipelineError;
use crate::text;

/// What a merge did to the canonical document.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MergeOutcome {
    /// The document changed and needs to be written back.
    Updated,
    /// The provider had already contributed and nothing new arrived.
    AlreadyProcessed,
}

fn union_into<T: PartialEq + Clone>(dst: &mut Vec<T>, src: &[T]) {
    for item in src {
        if !dst.contains(item) {
            dst.push(item.clone());
        }
    }
}

fn set_if_empty<T: Clone>(dst: &mut Option<T>, src: &Option<T>) {
    if dst.is_none() {
        if let Some(value) = src {
            *dst = Some(value.clone());
        }
    }
}

/// Fuller names carry more disambiguating information.
fn longest_wins(dst: &mut String, src: &str) -> bool {
    if src.chars().count() > dst.chars().count() {
        *dst = src.to_string();
        true
    } else {
        false
    }
}

/// Merge ranking entries, enforcing uniqueness of `(source, from, to)`.
/// A second entry for an existing window with different content is an
/// invariant violation, not something to tolerate silently.
pub fn merge_rankings(
    dst: &mut Vec<Ranking>,
    src: &[Ranking],
    doc_id: &str,
) -> Result<(), PipelineError> {
    for entry in src {
        if dst.contains(entry) {
            continue;
        }
        if dst.iter().any(|r| r.window_key() == entry.window_key()) {
            return Err(PipelineError::Invariant(format!(
                "duplicate ranking window {:?} on document {}",
                entry.window_key(),
                doc_id
            )));
        }
        dst.push(entry.clone());
    }
    Ok(())
}

fn union_affiliation_refs(dst: &mut Vec<AffiliationRef>, src: &[AffiliationRef]) {
    for aff in src {
        let present = if aff.id.is_empty() {
            dst.contains(aff)
        } else {
            dst.iter().any(|a| a.id == aff.id)
        };
        if !present {
            dst.push(aff.clone());
        }
    }
}

/// Slot each incoming author into the canonical author list.
///
/// A matched slot is enriched in place: unresolved stubs get promoted to
/// the incoming person id, names grow to the fullest spelling seen, and
/// affiliations/external ids union in. Unmatched authors append as new
/// (possibly unresolved) slots.
pub fn merge_authors(
    canonical: &mut Vec<AuthorRef>,
    incoming: &[AuthorRef],
    thresholds: &MatchThresholds,
) {
    for author in incoming {
        match compare::match_author_slot(&author.full_name, canonical, thresholds) {
            Some(idx) => {
                let slot = &mut canonical[idx];
                // A resolved id is stable; only stubs get promoted.
                if slot.id.is_empty() && !author.id.is_empty() {
                    slot.id = author.id.clone();
                }
                longest_wins(&mut slot.full_name, &author.full_name);
                union_into(&mut slot.external_ids, &author.external_ids);
                union_affiliation_refs(&mut slot.affiliations, &author.affiliations);
            }
            None => canonical.push(author.clone()),
        }
    }
}

/// Merge an incoming work into its canonical document.
pub fn merge_work(
    canonical: &mut Work,
    incoming: &Work,
    source: &str,
    thresholds: &MatchThresholds,
) -> MergeOutcome {
    let before = canonical.clone();
    let already = canonical.updated_by(source);

    if !already {
        union_into(&mut canonical.titles, &incoming.titles);
        union_into(&mut canonical.abstracts, &incoming.abstracts);
        union_into(&mut canonical.external_ids, &incoming.external_ids);
        union_into(&mut canonical.external_urls, &incoming.external_urls);
        union_into(&mut canonical.types, &incoming.types);
        union_into(&mut canonical.citations_count, &incoming.citations_count);
        union_into(&mut canonical.rights, &incoming.rights);
        union_into(&mut canonical.subjects, &incoming.subjects);
        set_if_empty(&mut canonical.year_published, &incoming.year_published);
        if canonical.source.is_none() {
            canonical.source = incoming.source.clone();
        }
        let bib = &mut canonical.bibliographic_info;
        set_if_empty(&mut bib.volume, &incoming.bibliographic_info.volume);
        set_if_empty(&mut bib.issue, &incoming.bibliographic_info.issue);
        set_if_empty(&mut bib.start_page, &incoming.bibliographic_info.start_page);
        set_if_empty(&mut bib.end_page, &incoming.bibliographic_info.end_page);
    }

    // New author discovery is allowed even after the provenance guard.
    merge_authors(&mut canonical.authors, &incoming.authors, thresholds);
    canonical.author_count = canonical
        .author_count
        .max(incoming.author_count)
        .max(canonical.authors.len());

    if !already {
        canonical.updated.push(Provenance::now(source));
        return MergeOutcome::Updated;
    }
    if *canonical != before {
        MergeOutcome::Updated
    } else {
        MergeOutcome::AlreadyProcessed
    }
}

fn union_memberships(
    dst: &mut Vec<canonica_domain::Membership>,
    src: &[canonica_domain::Membership],
) {
    for membership in src {
        let present = if membership.id.is_empty() {
            dst.contains(membership)
        } else {
            dst.iter().any(|m| m.id == membership.id)
        };
        if !present {
            dst.push(membership.clone());
        }
    }
}

/// Merge an incoming person into its canonical document.
pub fn merge_person(canonical: &mut Person, incoming: &Person, source: &str) -> MergeOutcome {
    let before = canonical.clone();
    let already = canonical.updated_by(source);

    if !already {
        if !incoming.full_name.is_empty()
            && text::normalize(&incoming.full_name) != text::normalize(&canonical.full_name)
        {
            // Whichever spelling loses survives as an alias.
            let loser = if incoming.full_name.chars().count()
                > canonical.full_name.chars().count()
            {
                canonical.full_name.to_lowercase()
            } else {
                incoming.full_name.to_lowercase()
            };
            if !loser.is_empty() && !canonical.aliases.contains(&loser) {
                canonical.aliases.push(loser);
            }
        }
        if longest_wins(&mut canonical.full_name, &incoming.full_name) {
            if !incoming.first_names.is_empty() {
                canonical.first_names = incoming.first_names.clone();
            }
            if !incoming.last_names.is_empty() {
                canonical.last_names = incoming.last_names.clone();
            }
            if !incoming.initials.is_empty() {
                canonical.initials = incoming.initials.clone();
            }
        }
        union_into(&mut canonical.aliases, &incoming.aliases);
        union_into(&mut canonical.external_ids, &incoming.external_ids);
        union_into(&mut canonical.keywords, &incoming.keywords);
        union_into(&mut canonical.related_works, &incoming.related_works);
        union_into(&mut canonical.ranking, &incoming.ranking);
        union_into(&mut canonical.degrees, &incoming.degrees);
        union_into(&mut canonical.subjects, &incoming.subjects);
        set_if_empty(&mut canonical.sex, &incoming.sex);
        set_if_empty(&mut canonical.marital_status, &incoming.marital_status);
        set_if_empty(&mut canonical.birthplace, &incoming.birthplace);
        set_if_empty(&mut canonical.birthdate, &incoming.birthdate);
    }

    // Membership discovery is allowed even after the provenance guard.
    union_memberships(&mut canonical.affiliations, &incoming.affiliations);

    if !already {
        canonical.updated.push(Provenance::now(source));
        return MergeOutcome::Updated;
    }
    if *canonical != before {
        MergeOutcome::Updated
    } else {
        MergeOutcome::AlreadyProcessed
    }
}

/// Absorb a duplicate person into its survivor, unconditionally.
///
/// Unlike [`merge_person`] there is no provenance guard: the unifier has
/// already established identity, so everything unions in. Provenance
/// entries from the absorbed document are kept for providers the survivor
/// has not seen.
pub fn fold_person(survivor: &mut Person, absorbed: &Person) {
    if !absorbed.full_name.is_empty()
        && text::normalize(&absorbed.full_name) != text::normalize(&survivor.full_name)
    {
        let loser = if absorbed.full_name.chars().count() > survivor.full_name.chars().count() {
            survivor.full_name.to_lowercase()
        } else {
            absorbed.full_name.to_lowercase()
        };
        if !loser.is_empty() && !survivor.aliases.contains(&loser) {
            survivor.aliases.push(loser);
        }
    }
    if longest_wins(&mut survivor.full_name, &absorbed.full_name) {
        if !absorbed.first_names.is_empty() {
            survivor.first_names = absorbed.first_names.clone();
        }
        if !absorbed.last_names.is_empty() {
            survivor.last_names = absorbed.last_names.clone();
        }
        if !absorbed.initials.is_empty() {
            survivor.initials = absorbed.initials.clone();
        }
    }
    union_into(&mut survivor.aliases, &absorbed.aliases);
    union_into(&mut survivor.external_ids, &absorbed.external_ids);
    union_into(&mut survivor.keywords, &absorbed.keywords);
    union_into(&mut survivor.related_works, &absorbed.related_works);
    union_into(&mut survivor.ranking, &absorbed.ranking);
    union_into(&mut survivor.degrees, &absorbed.degrees);
    union_into(&mut survivor.subjects, &absorbed.subjects);
    set_if_empty(&mut survivor.sex, &absorbed.sex);
    set_if_empty(&mut survivor.marital_status, &absorbed.marital_status);
    set_if_empty(&mut survivor.birthplace, &absorbed.birthplace);
    set_if_empty(&mut survivor.birthdate, &absorbed.birthdate);
    union_memberships(&mut survivor.affiliations, &absorbed.affiliations);
    for entry in &absorbed.updated {
        if !survivor.updated_by(&entry.source) {
            survivor.updated.push(entry.clone());
        }
    }
}

/// Merge an incoming affiliation into its canonical document.
pub fn merge_affiliation(
    canonical: &mut Affiliation,
    incoming: &Affiliation,
    source: &str,
) -> MergeOutcome {
    let already = canonical.updated_by(source);
    if already {
        return MergeOutcome::AlreadyProcessed;
    }
    union_into(&mut canonical.names, &incoming.names);
    union_into(&mut canonical.abbreviations, &incoming.abbreviations);
    union_into(&mut canonical.external_ids, &incoming.external_ids);
    union_into(&mut canonical.external_urls, &incoming.external_urls);
    union_into(&mut canonical.types, &incoming.types);
    union_into(&mut canonical.addresses, &incoming.addresses);
    union_into(&mut canonical.ranking, &incoming.ranking);
    for relation in &incoming.relations {
        if !canonical.relates_to(&relation.id) {
            canonical.relations.push(relation.clone());
        }
    }
    canonical.updated.push(Provenance::now(source));
    MergeOutcome::Updated
}

/// Record a relation between two affiliations on both sides, keeping the
/// relation graph symmetric.
pub fn link_affiliations(a: &mut Affiliation, b: &mut Affiliation) {
    if !a.relates_to(&b.id) {
        a.relations.push(Relation {
            id: b.id.clone(),
            name: b.display_name().unwrap_or_default().to_string(),
            types: b.types.clone(),
        });
    }
    if !b.relates_to(&a.id) {
        b.relations.push(Relation {
            id: a.id.clone(),
            name: a.display_name().unwrap_or_default().to_string(),
            types: a.types.clone(),
        });
    }
}

/// Merge an incoming source (journal/venue) into its canonical document.
///
/// Ranking windows may keep arriving after the provenance guard trips,
/// since providers publish one window per period.
pub fn merge_source(
    canonical: &mut Source,
    incoming: &Source,
    source: &str,
) -> Result<MergeOutcome, PipelineError> {
    let before = canonical.clone();
    let already = canonical.updated_by(source);

    if !already {
        union_into(&mut canonical.names, &incoming.names);
        union_into(&mut canonical.external_ids, &incoming.external_ids);
        union_into(&mut canonical.types, &incoming.types);
        union_into(&mut canonical.subjects, &incoming.subjects);
        set_if_empty(&mut canonical.publisher, &incoming.publisher);
        if canonical.apc == Default::default() {
            canonical.apc = incoming.apc.clone();
        }
    }

    let id = canonical.id.clone();
    merge_rankings(&mut canonical.ranking, &incoming.ranking, &id)?;

    if !already {
        canonical.updated.push(Provenance::now(source));
        return Ok(MergeOutcome::Updated);
    }
    if *canonical != before {
        Ok(MergeOutcome::Updated)
    } else {
        Ok(MergeOutcome::AlreadyProcessed)
    }
}
