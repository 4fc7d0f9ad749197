//! Property tests for the merge laws and decider symmetry.

use canonica_core::compare;
use canonica_core::merge::{self, MergeOutcome};
use canonica_core::MatchThresholds;
use canonica_domain::{ExternalId, Membership, Person, Provenance, Title, Work};
use proptest::prelude::*;

fn external_id_strategy() -> impl Strategy<Value = ExternalId> {
    ("[a-z]{3,8}", "[a-z0-9./-]{1,12}").prop_map(|(source, id)| ExternalId::new(source, id))
}

fn title_strategy() -> impl Strategy<Value = Title> {
    ("[A-Za-z ]{1,40}", "[a-z]{2,8}").prop_map(|(title, source)| Title {
        title,
        lang: None,
        source,
    })
}

fn work_strategy() -> impl Strategy<Value = Work> {
    (
        prop::collection::vec(external_id_strategy(), 0..6),
        prop::collection::vec(title_strategy(), 0..4),
        prop::option::of(1900..2030i32),
    )
        .prop_map(|(external_ids, titles, year)| {
            let mut w = Work::new();
            w.external_ids = external_ids;
            w.titles = titles;
            w.year_published = year;
            w
        })
}

fn membership_strategy() -> impl Strategy<Value = Membership> {
    ("[a-z0-9]{1,6}", "[A-Za-z ]{1,20}").prop_map(|(id, name)| Membership {
        id,
        name,
        ..Default::default()
    })
}

fn person_strategy() -> impl Strategy<Value = Person> {
    (
        "[A-Za-z]{2,10} [A-Za-z]{2,12}",
        prop::collection::vec(external_id_strategy(), 0..4),
        prop::collection::vec(membership_strategy(), 0..3),
    )
        .prop_map(|(full_name, external_ids, affiliations)| {
            let mut p = Person::new();
            p.full_name = full_name;
            p.external_ids = external_ids;
            p.affiliations = affiliations;
            p
        })
}

proptest! {
    /// Set-union law: nothing present in either input may be missing from
    /// the merged document, and append-only fields never shrink.
    #[test]
    fn merge_never_loses_append_only_data(
        mut canonical in work_strategy(),
        incoming in work_strategy(),
    ) {
        let thresholds = MatchThresholds::default();
        let before = canonical.clone();
        merge::merge_work(&mut canonical, &incoming, "prov", &thresholds);

        prop_assert!(canonical.external_ids.len() >= before.external_ids.len());
        prop_assert!(canonical.titles.len() >= before.titles.len());
        for eid in before.external_ids.iter().chain(incoming.external_ids.iter()) {
            prop_assert!(canonical.external_ids.contains(eid));
        }
        for title in before.titles.iter().chain(incoming.titles.iter()) {
            prop_assert!(canonical.titles.contains(title));
        }
    }

    /// First writer wins on scalars: a present year is never overwritten.
    #[test]
    fn merge_never_overwrites_scalars(
        mut canonical in work_strategy(),
        incoming in work_strategy(),
    ) {
        let thresholds = MatchThresholds::default();
        let original_year = canonical.year_published;
        merge::merge_work(&mut canonical, &incoming, "prov", &thresholds);
        if original_year.is_some() {
            prop_assert_eq!(canonical.year_published, original_year);
        }
    }

    /// The provenance guard makes a second merge of the same provider a
    /// no-op with the document unchanged.
    #[test]
    fn merge_is_idempotent_per_provider(
        mut canonical in work_strategy(),
        incoming in work_strategy(),
    ) {
        let thresholds = MatchThresholds::default();
        merge::merge_work(&mut canonical, &incoming, "prov", &thresholds);
        let after_first = canonical.clone();
        let outcome = merge::merge_work(&mut canonical, &incoming, "prov", &thresholds);
        prop_assert_eq!(outcome, MergeOutcome::AlreadyProcessed);
        prop_assert_eq!(canonical, after_first);
    }

    /// At most one provenance entry per provider, however often it runs.
    #[test]
    fn provenance_stays_unique_per_provider(
        mut canonical in work_strategy(),
        incoming in work_strategy(),
        runs in 1..4usize,
    ) {
        let thresholds = MatchThresholds::default();
        for _ in 0..runs {
            merge::merge_work(&mut canonical, &incoming, "prov", &thresholds);
        }
        let count = canonical
            .updated
            .iter()
            .filter(|p| p.source == "prov")
            .count();
        prop_assert_eq!(count, 1);
    }

    /// The composite decider is symmetric in its arguments.
    #[test]
    fn decide_is_symmetric(a in person_strategy(), b in person_strategy()) {
        let thresholds = MatchThresholds::default();
        prop_assert_eq!(
            compare::compare_author(&a, &b, &thresholds),
            compare::compare_author(&b, &a, &thresholds)
        );
    }

    /// Name similarity alone, even a perfect score, never merges two
    /// identities without a corroborating signal.
    #[test]
    fn identical_names_without_signal_never_match(name in "[A-Za-z]{2,10} [A-Za-z]{2,12}") {
        let thresholds = MatchThresholds::default();
        let mut a = Person::new();
        a.full_name = name.clone();
        let mut b = Person::new();
        b.full_name = name;
        prop_assert!(!compare::compare_author(&a, &b, &thresholds));
    }
}

#[test]
fn fold_unions_provenance_without_duplicates() {
    let mut survivor = Person::new();
    survivor.full_name = "Jane Doe".into();
    survivor.updated.push(Provenance::now("staff"));

    let mut absorbed = Person::new();
    absorbed.full_name = "Jane Elizabeth Doe".into();
    absorbed.updated.push(Provenance::now("staff"));
    absorbed.updated.push(Provenance::now("scienti"));
    absorbed.external_ids.push(ExternalId::new("orcid", "0000-0001"));

    merge::fold_person(&mut survivor, &absorbed);
    assert_eq!(survivor.updated.len(), 2);
    assert_eq!(survivor.full_name, "Jane Elizabeth Doe");
    assert!(survivor.aliases.contains(&"jane doe".to_string()));
    assert_eq!(survivor.external_ids.len(), 1);
}
