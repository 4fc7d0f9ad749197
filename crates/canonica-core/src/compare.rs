//! Match decisions over noisy bibliographic records.
//!
//! Bibliographic names collide constantly (shared surnames, transliteration
//! variants, abbreviated given names), so every accept here is composite:
//! a name-similarity tier AND a corroborating signal, or a looser threshold
//! backed by a stricter one elsewhere. The bias is deliberate — a missed
//! match becomes a duplicate the unifier can repair later, a false merge
//! entangles provenance and is much harder to undo.

use canonica_domain::{AuthorRef, Person};

use crate::config::MatchThresholds;
use crate::fuzzy;
use crate::search::SearchHit;
use crate::text;

/// Whether two name strings clear the tiered person-name test.
///
/// `>= name_accept` on the whole-string ratio is an immediate accept; the
/// review band below it gets a second chance at a higher partial-ratio bar.
pub fn names_match(a: &str, b: &str, thresholds: &MatchThresholds) -> bool {
    let a = text::normalize(a);
    let b = text::normalize(b);
    if a.is_empty() || b.is_empty() {
        return false;
    }
    let score = fuzzy::ratio(&a, &b);
    if score >= thresholds.name_accept {
        return true;
    }
    if score >= thresholds.name_review {
        return fuzzy::partial_ratio(&a, &b) >= thresholds.name_partial_accept;
    }
    false
}

/// Corroborating signals found between two person documents.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Corroboration {
    pub shared_affiliation: bool,
    pub shared_external_id: bool,
    pub shared_work: bool,
}

impl Corroboration {
    pub fn any(&self) -> bool {
        self.shared_affiliation || self.shared_external_id || self.shared_work
    }
}

/// Collect every overlap between two person documents' linkable sets.
pub fn corroborate(a: &Person, b: &Person) -> Corroboration {
    Corroboration {
        shared_affiliation: a
            .affiliations
            .iter()
            .any(|m| !m.id.is_empty() && b.affiliations.iter().any(|n| n.id == m.id)),
        shared_external_id: a
            .external_ids
            .iter()
            .any(|e| b.external_ids.iter().any(|f| f.id == e.id)),
        shared_work: a
            .related_works
            .iter()
            .any(|w| b.related_works.iter().any(|v| v.id == w.id)),
    }
}

fn name_variants(person: &Person) -> Vec<&str> {
    std::iter::once(person.full_name.as_str())
        .chain(person.aliases.iter().map(String::as_str))
        .filter(|n| !n.is_empty())
        .collect()
}

/// The central person-identity primitive: name tier AND corroboration.
///
/// Name similarity alone never merges two identities, whatever the score;
/// callers that have already narrowed the pool to a single exact-id group
/// skip this and fold directly. Symmetric in its arguments.
pub fn compare_author(a: &Person, b: &Person, thresholds: &MatchThresholds) -> bool {
    let name_ok = name_variants(a)
        .iter()
        .any(|an| name_variants(b).iter().any(|bn| names_match(an, bn, thresholds)));
    name_ok && corroborate(a, b).any()
}

/// Verdict on one similarity-search candidate for an incoming work.
///
/// An author corroboration (best partial ratio over the hit's author list
/// clearing `author_thd`) buys the looser title bar; without it the title
/// has to carry the decision alone at the strict bar.
pub fn check_work(
    title: &str,
    authors: &[String],
    hit: &SearchHit,
    thresholds: &MatchThresholds,
) -> bool {
    let title = text::normalize(title);
    let hit_title = text::normalize(&hit.title);
    if title.is_empty() || hit_title.is_empty() {
        return false;
    }
    let title_score = fuzzy::ratio(&title, &hit_title);

    let author_ok = authors.iter().any(|a| {
        let a = text::normalize(a);
        !a.is_empty()
            && hit
                .authors
                .iter()
                .any(|h| fuzzy::partial_ratio(&a, &text::normalize(h)) >= thresholds.author_thd)
    });

    if author_ok {
        title_score >= thresholds.paper_thd_low
    } else {
        title_score >= thresholds.paper_thd_high
    }
}

/// Find the author slot on a work that a person name belongs to.
///
/// Three-stage chain over the slot names: straight ratio, then partial
/// ratio for middling scores, then token-sort for reordered names just
/// above the floor. `None` when no slot clears any stage.
pub fn match_author_slot(
    name: &str,
    slots: &[AuthorRef],
    thresholds: &MatchThresholds,
) -> Option<usize> {
    let name = text::normalize(name);
    if name.is_empty() || slots.is_empty() {
        return None;
    }
    let normalized: Vec<String> = slots
        .iter()
        .map(|s| text::normalize(&s.full_name))
        .collect();
    let (idx, score) =
        fuzzy::extract_one(&name, normalized.iter().map(String::as_str), fuzzy::ratio)?;
    if score >= thresholds.slot_ratio {
        return Some(idx);
    }
    if score > thresholds.slot_ratio_floor {
        let (idx, score) = fuzzy::extract_one(
            &name,
            normalized.iter().map(String::as_str),
            fuzzy::partial_ratio,
        )?;
        if score >= thresholds.slot_partial {
            return Some(idx);
        }
        let (idx, score) = fuzzy::extract_one(
            &name,
            normalized.iter().map(String::as_str),
            fuzzy::token_sort_ratio,
        )?;
        if score >= thresholds.slot_token_sort {
            return Some(idx);
        }
    }
    None
}

/// Outcome of a fuzzy institution-name lookup.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AffiliationMatch {
    /// Index into the candidate list, with the winning score.
    Accepted { index: usize, score: u8 },
    /// Best score landed between the floor and the accept bars; surfaced
    /// for adjudication instead of silently dropped.
    Unresolved { best_score: u8 },
    /// Nothing above the floor.
    NoMatch,
}

/// Chained fuzzy match of an institution name against candidate names.
///
/// Inputs should already be stopword-stripped (see
/// [`text::strip_institution_tokens`]) so the distinguishing substring
/// carries the score.
pub fn best_affiliation_match(
    name: &str,
    candidates: &[String],
    thresholds: &MatchThresholds,
) -> AffiliationMatch {
    if name.is_empty() || candidates.is_empty() {
        return AffiliationMatch::NoMatch;
    }
    let Some((idx, score)) = fuzzy::extract_one(
        name,
        candidates.iter().map(String::as_str),
        fuzzy::ratio,
    ) else {
        return AffiliationMatch::NoMatch;
    };
    if score > thresholds.affiliation_accept {
        return AffiliationMatch::Accepted { index: idx, score };
    }
    if score > thresholds.affiliation_floor {
        if let Some((idx, partial)) = fuzzy::extract_one(
            name,
            candidates.iter().map(String::as_str),
            fuzzy::partial_ratio,
        ) {
            if partial > thresholds.affiliation_partial_accept {
                return AffiliationMatch::Accepted {
                    index: idx,
                    score: partial,
                };
            }
        }
        return AffiliationMatch::Unresolved { best_score: score };
    }
    AffiliationMatch::NoMatch
}

#[cfg(test)]
mod tests {
    use super::*;
    use canonica_domain::{ExternalId, Membership, Person, RelatedWork};

    fn thresholds() -> MatchThresholds {
        MatchThresholds::default()
    }

    fn person(full_name: &str) -> Person {
        let mut p = Person::new();
        p.full_name = full_name.to_string();
        p
    }

    #[test]
    fn names_match_tiers() {
        let t = thresholds();
        assert!(names_match("Diego Restrepo", "Diego Restrepo", &t));
        assert!(names_match("Diego Restrepo", "Diego Restrépo", &t));
        assert!(!names_match("Diego Restrepo", "Carlos Martinez", &t));
        assert!(!names_match("", "Diego Restrepo", &t));
    }

    #[test]
    fn identical_names_without_signal_never_merge() {
        let a = person("Maria Garcia");
        let b = person("Maria Garcia");
        assert!(!compare_author(&a, &b, &thresholds()));
    }

    #[test]
    fn shared_affiliation_corroborates() {
        let mut a = person("Maria Garcia");
        let mut b = person("María García");
        a.affiliations.push(Membership {
            id: "aff1".into(),
            name: "Universidad de Antioquia".into(),
            ..Default::default()
        });
        b.affiliations.push(Membership {
            id: "aff1".into(),
            name: "Universidad de Antioquia".into(),
            ..Default::default()
        });
        let t = thresholds();
        assert!(compare_author(&a, &b, &t));
        assert_eq!(compare_author(&a, &b, &t), compare_author(&b, &a, &t));
    }

    #[test]
    fn shared_work_corroborates() {
        let mut a = person("Jane Doe");
        let mut b = person("Jane Doe");
        a.related_works.push(RelatedWork {
            source: "doi".into(),
            id: "10.1/x".into(),
            year: Some(2020),
        });
        b.related_works.push(RelatedWork {
            source: "doi".into(),
            id: "10.1/x".into(),
            year: Some(2020),
        });
        assert!(compare_author(&a, &b, &thresholds()));
    }

    #[test]
    fn unlinked_memberships_do_not_corroborate() {
        let mut a = person("Jane Doe");
        let mut b = person("Jane Doe");
        for p in [&mut a, &mut b] {
            p.affiliations.push(Membership {
                id: String::new(),
                name: "somewhere".into(),
                ..Default::default()
            });
        }
        assert!(!corroborate(&a, &b).any());
    }

    #[test]
    fn alias_can_carry_the_name_tier() {
        let mut a = person("J. Restrepo Quintero");
        a.aliases.push("diego restrepo quintero".into());
        a.external_ids.push(ExternalId::new("orcid", "0000-0001"));
        let mut b = person("Diego Restrepo Quintero");
        b.external_ids.push(ExternalId::new("orcid", "0000-0001"));
        assert!(compare_author(&a, &b, &thresholds()));
    }

    #[test]
    fn check_work_two_tier_title_bar() {
        let t = thresholds();
        let hit = SearchHit {
            work_id: "w1".into(),
            title: "Deep learning for X".into(),
            authors: vec!["Jane Doe".into()],
            score: 1.0,
        };
        // Author corroborated: the looser bar applies.
        assert!(check_work(
            "Deep Learning for X",
            &["J. Doe".to_string()],
            &hit,
            &t,
        ));
        // No author overlap and an exact title: the strict bar still passes.
        assert!(check_work(
            "Deep learning for X",
            &["Someone Else".to_string()],
            &hit,
            &t,
        ));
        // No author overlap and a drifted title: rejected.
        assert!(!check_work(
            "Deep learning for X and also Y",
            &["Someone Else".to_string()],
            &hit,
            &t,
        ));
    }

    #[test]
    fn author_slot_chain() {
        let t = thresholds();
        let slots = vec![
            AuthorRef::stub("Restrepo Quintero Diego"),
            AuthorRef::stub("Carlos Martinez"),
        ];
        assert_eq!(
            match_author_slot("Restrepo Quintero Diego", &slots, &t),
            Some(0)
        );
        // Reordered tokens fall through to the token-sort stage.
        assert_eq!(
            match_author_slot("Diego Restrepo Quintero", &slots, &t),
            Some(0)
        );
        assert_eq!(match_author_slot("Ana Botero", &slots, &t), None);
        assert_eq!(match_author_slot("", &slots, &t), None);
    }

    #[test]
    fn affiliation_match_floor_surfaces_unresolved() {
        let t = thresholds();
        let candidates = vec![
            "nacional colombia".to_string(),
            "andes".to_string(),
        ];
        match best_affiliation_match("nacional colombia", &candidates, &t) {
            AffiliationMatch::Accepted { index, .. } => assert_eq!(index, 0),
            other => panic!("expected accept, got {:?}", other),
        }
        assert_eq!(
            best_affiliation_match("externado", &candidates, &t),
            AffiliationMatch::NoMatch
        );
    }
}
