//! End-to-end scenarios over the ingestion pipeline and the unifier.

use std::sync::Arc;

use canonica_core::{
    IngestOutcome, LocalSearchIndex, MemoryStore, Pipeline, PipelineConfig, SkipReason,
};
use canonica_domain::{
    Affiliation, AuthorRef, ExternalId, Membership, Name, Person, Ranking, Source, SourceRef,
    Title, Work,
};

fn pipeline() -> Pipeline {
    Pipeline::new(
        Arc::new(MemoryStore::new()),
        Arc::new(LocalSearchIndex::new()),
        PipelineConfig::default(),
    )
}

fn work(title: &str, doi: Option<&str>, authors: &[&str]) -> Work {
    let mut w = Work::new();
    w.titles.push(Title {
        title: title.to_string(),
        lang: Some("en".into()),
        source: "test".into(),
    });
    if let Some(doi) = doi {
        w.external_ids.push(ExternalId::new("doi", doi));
    }
    for a in authors {
        w.authors.push(AuthorRef::stub(a.to_string()));
    }
    w
}

fn person(name: &str, orcid: Option<&str>) -> Person {
    let mut p = Person::new();
    p.full_name = name.to_string();
    if let Some(orcid) = orcid {
        p.external_ids.push(ExternalId::new("orcid", orcid));
    }
    p
}

#[test]
fn same_doi_from_two_providers_becomes_one_document() {
    let pipeline = pipeline();

    let a = work("Deep Learning for X", Some("10.1/x"), &["Jane Doe"]);
    let outcome = pipeline.ingest_work(a, "openalex").unwrap();
    let id = match outcome {
        IngestOutcome::Inserted { id } => id,
        other => panic!("expected insert, got {:?}", other),
    };

    let b = work("Deep learning for X", Some("10.1/x"), &["J. Doe", "A. Smith"]);
    match pipeline.ingest_work(b, "scholar").unwrap() {
        IngestOutcome::Merged { id: merged } => assert_eq!(merged, id),
        other => panic!("expected merge, got {:?}", other),
    }

    assert_eq!(pipeline.works().count().unwrap(), 1);
    let canonical = pipeline.works().get(&id).unwrap().unwrap().doc;
    assert_eq!(canonical.titles.len(), 2);
    assert_eq!(canonical.authors.len(), 2);
    assert_eq!(canonical.updated.len(), 2);
}

#[test]
fn doi_resolver_prefixes_do_not_split_documents() {
    let pipeline = pipeline();
    let a = work("Some title", Some("https://doi.org/10.1234/ABC"), &[]);
    pipeline.ingest_work(a, "p1").unwrap();
    let b = work("Some title", Some("10.1234/abc"), &[]);
    match pipeline.ingest_work(b, "p2").unwrap() {
        IngestOutcome::Merged { .. } => {}
        other => panic!("expected merge, got {:?}", other),
    }
    assert_eq!(pipeline.works().count().unwrap(), 1);
}

#[test]
fn rerunning_a_provider_is_a_no_op() {
    let pipeline = pipeline();
    let record = work("Stable title", Some("10.1/x"), &["Jane Doe"]);
    pipeline.ingest_work(record.clone(), "openalex").unwrap();
    match pipeline.ingest_work(record, "openalex").unwrap() {
        IngestOutcome::AlreadyProcessed { .. } => {}
        other => panic!("expected no-op, got {:?}", other),
    }
    assert_eq!(pipeline.works().count().unwrap(), 1);
}

#[test]
fn works_without_doi_merge_through_similarity_search() {
    let pipeline = pipeline();
    pipeline
        .ingest_work(
            work("Neutrino oscillations in dense matter", None, &["Diego Restrepo"]),
            "openalex",
        )
        .unwrap();

    // Same paper from a repository, cased differently, no DOI.
    let incoming = work(
        "Neutrino Oscillations in Dense Matter",
        None,
        &["Diego Restrepo"],
    );
    match pipeline.ingest_work(incoming, "dspace").unwrap() {
        IngestOutcome::Merged { .. } => {}
        other => panic!("expected merge, got {:?}", other),
    }
    assert_eq!(pipeline.works().count().unwrap(), 1);
}

#[test]
fn dissimilar_titles_insert_new_documents() {
    let pipeline = pipeline();
    pipeline
        .ingest_work(work("Neutrino oscillations in dense matter", None, &[]), "p1")
        .unwrap();
    pipeline
        .ingest_work(work("Grain boundary effects in steel", None, &[]), "p2")
        .unwrap();
    assert_eq!(pipeline.works().count().unwrap(), 2);
}

#[test]
fn work_with_no_doi_and_no_title_is_skipped() {
    let pipeline = pipeline();
    assert_eq!(
        pipeline.ingest_work(Work::new(), "p1").unwrap(),
        IngestOutcome::Skipped(SkipReason::MissingIdentifier)
    );
    assert_eq!(pipeline.works().count().unwrap(), 0);
}

#[test]
fn author_stub_promotes_once_the_person_exists() {
    let pipeline = pipeline();
    let mut p = person("Jane Doe", Some("0000-0002-1825-0097"));
    p.external_ids.push(ExternalId::new("scienti", "C42"));
    let person_id = match pipeline.ingest_person(p, "scienti").unwrap() {
        IngestOutcome::Inserted { id } => id,
        other => panic!("expected insert, got {:?}", other),
    };

    let mut record = work("A paper", Some("10.1/x"), &[]);
    record.authors.push(AuthorRef {
        id: String::new(),
        full_name: "Jane Doe".into(),
        affiliations: Vec::new(),
        external_ids: vec![ExternalId::new("scienti", "C42")],
    });
    let work_id = match pipeline.ingest_work(record, "scienti").unwrap() {
        IngestOutcome::Inserted { id } => id,
        other => panic!("expected insert, got {:?}", other),
    };

    let canonical = pipeline.works().get(&work_id).unwrap().unwrap().doc;
    assert_eq!(canonical.authors[0].id, person_id);

    // The resolved person picked up the co-authored DOI.
    let stored = pipeline.persons().get(&person_id).unwrap().unwrap().doc;
    assert!(stored.related_works.iter().any(|w| w.id == "10.1/x"));
}

#[test]
fn unknown_author_stays_a_stub() {
    let pipeline = pipeline();
    let record = work("A paper", Some("10.1/x"), &["Nobody Known"]);
    let id = match pipeline.ingest_work(record, "p1").unwrap() {
        IngestOutcome::Inserted { id } => id,
        other => panic!("expected insert, got {:?}", other),
    };
    let canonical = pipeline.works().get(&id).unwrap().unwrap().doc;
    assert!(!canonical.authors[0].is_resolved());
}

#[test]
fn two_people_with_the_same_name_are_never_merged() {
    let pipeline = pipeline();
    let mut a = person("Maria Garcia", None);
    a.affiliations.push(Membership {
        id: "u-antioquia".into(),
        name: "Universidad de Antioquia".into(),
        ..Default::default()
    });
    let mut b = person("Maria Garcia", None);
    b.affiliations.push(Membership {
        id: "u-andes".into(),
        name: "Universidad de los Andes".into(),
        ..Default::default()
    });

    pipeline.ingest_person(a, "p1").unwrap();
    match pipeline.ingest_person(b, "p2").unwrap() {
        IngestOutcome::Inserted { .. } => {}
        other => panic!("expected insert, got {:?}", other),
    }
    assert_eq!(pipeline.persons().count().unwrap(), 2);

    // The unifier does not collapse them either.
    let report = pipeline.run_unification().unwrap();
    assert_eq!(report.folded, 0);
    assert_eq!(pipeline.persons().count().unwrap(), 2);
}

#[test]
fn orcid_duplicates_fold_into_the_priority_survivor() {
    let pipeline = pipeline();
    // Two canonical documents already share an ORCID: the split the
    // incremental pipeline missed and the unifier exists to repair.
    let mut a = person("J Doe", Some("0000-0002-1825-0097"));
    a.external_ids.push(ExternalId::new("minciencias", "M1"));
    a.updated
        .push(canonica_domain::Provenance::now("minciencias"));
    let mut b = person("Jane Elizabeth Doe", Some("0000-0002-1825-0097"));
    b.external_ids.push(ExternalId::new("scienti", "C7"));
    b.updated.push(canonica_domain::Provenance::now("scienti"));

    pipeline.persons().insert(&a).unwrap();
    pipeline.persons().insert(&b).unwrap();
    assert_eq!(pipeline.persons().count().unwrap(), 2);

    let report = pipeline.run_unification().unwrap();
    assert_eq!(report.folded, 1);
    assert_eq!(pipeline.persons().count().unwrap(), 1);
    assert_eq!(pipeline.persons().archive_count().unwrap(), 1);

    let survivors = pipeline.persons().scan().unwrap();
    let survivor = &survivors[0].doc;
    // scienti outranks minciencias, and the fold unions everything.
    assert!(survivor.updated_by("scienti"));
    assert_eq!(survivor.full_name, "Jane Elizabeth Doe");
    assert!(survivor.external_ids.iter().any(|e| e.source == "minciencias"));

    // Fixed point: a second sweep has nothing left to fold.
    let second = pipeline.run_unification().unwrap();
    assert_eq!(second.folded, 0);
}

fn affiliation(name: &str, ror: Option<&str>) -> Affiliation {
    let mut a = Affiliation::new();
    a.names.push(Name {
        name: name.to_string(),
        lang: Some("es".into()),
        source: "test".into(),
    });
    if let Some(ror) = ror {
        a.external_ids.push(ExternalId::new("ror", ror));
    }
    a
}

#[test]
fn stopword_variants_link_to_one_affiliation() {
    let pipeline = pipeline();
    let id = match pipeline
        .ingest_affiliation(affiliation("Univ Nacional De Colombia", Some("02xyz")), "ror")
        .unwrap()
    {
        IngestOutcome::Inserted { id } => id,
        other => panic!("expected insert, got {:?}", other),
    };

    match pipeline
        .ingest_affiliation(affiliation("Universidad Nacional de Colombia", None), "scienti")
        .unwrap()
    {
        IngestOutcome::Merged { id: merged } => assert_eq!(merged, id),
        other => panic!("expected merge, got {:?}", other),
    }
    assert_eq!(pipeline.affiliations().count().unwrap(), 1);
    let canonical = pipeline.affiliations().get(&id).unwrap().unwrap().doc;
    assert_eq!(canonical.names.len(), 2);
}

#[test]
fn borderline_affiliation_scores_are_surfaced_not_merged() {
    let pipeline = pipeline();
    pipeline
        .ingest_affiliation(affiliation("Instituto de Quimica Aplicada", None), "ror")
        .unwrap();

    // Close enough to clear the floor, not close enough to accept.
    let outcome = pipeline
        .ingest_affiliation(affiliation("Instituto de Quimica Avanzada", None), "scienti")
        .unwrap();
    match outcome {
        IngestOutcome::Skipped(SkipReason::UnresolvedAffiliation { best_score }) => {
            assert!(best_score > 70);
        }
        other => panic!("expected unresolved skip, got {:?}", other),
    }
    assert_eq!(pipeline.affiliations().count().unwrap(), 1);
}

#[test]
fn source_ranking_windows_accumulate_without_duplicates() {
    let pipeline = pipeline();
    let mut source = Source::new();
    source.names.push(Name {
        name: "Physical Review D".into(),
        lang: Some("en".into()),
        source: "scimago".into(),
    });
    source.external_ids.push(ExternalId::new("issn", "2470-0010"));
    source.ranking.push(Ranking {
        source: "scimago".into(),
        rank: "Q1".into(),
        from_date: Some(100),
        to_date: Some(200),
        order: None,
        date: None,
    });
    let id = match pipeline.ingest_source(source.clone(), "scimago").unwrap() {
        IngestOutcome::Inserted { id } => id,
        other => panic!("expected insert, got {:?}", other),
    };

    // Next period's file carries a new window plus the one already stored.
    source.ranking.push(Ranking {
        source: "scimago".into(),
        rank: "Q1".into(),
        from_date: Some(200),
        to_date: Some(300),
        order: None,
        date: None,
    });
    match pipeline.ingest_source(source, "scimago").unwrap() {
        IngestOutcome::Merged { .. } => {}
        other => panic!("expected merge, got {:?}", other),
    }

    let canonical = pipeline.sources().get(&id).unwrap().unwrap().doc;
    assert_eq!(canonical.ranking.len(), 2);
    assert_eq!(canonical.updated.len(), 1);
}

#[test]
fn venue_reference_links_to_the_canonical_source() {
    let pipeline = pipeline();
    let mut source = Source::new();
    source.names.push(Name {
        name: "Physical Review D".into(),
        lang: Some("en".into()),
        source: "doaj".into(),
    });
    source.external_ids.push(ExternalId::new("issn", "2470-0010"));
    let source_id = match pipeline.ingest_source(source, "doaj").unwrap() {
        IngestOutcome::Inserted { id } => id,
        other => panic!("expected insert, got {:?}", other),
    };

    let mut record = work("A paper", Some("10.1/x"), &[]);
    record.source = Some(SourceRef {
        id: String::new(),
        name: "Phys Rev D".into(),
        external_ids: vec![ExternalId::new("issn", "2470-0010")],
    });
    let work_id = match pipeline.ingest_work(record, "openalex").unwrap() {
        IngestOutcome::Inserted { id } => id,
        other => panic!("expected insert, got {:?}", other),
    };

    let canonical = pipeline.works().get(&work_id).unwrap().unwrap().doc;
    let venue = canonical.source.unwrap();
    assert_eq!(venue.id, source_id);
    assert_eq!(venue.name, "Physical Review D");
}

#[test]
fn batch_ingestion_counts_outcomes() {
    let pipeline = pipeline();
    let records = vec![
        work("First paper", Some("10.1/a"), &["Jane Doe"]),
        work("Second paper", Some("10.1/b"), &[]),
        Work::new(), // no key at all
    ];
    let report = pipeline.ingest_works(records, "openalex");
    assert_eq!(report.inserted, 2);
    assert_eq!(report.skipped, 1);
    assert_eq!(report.failed, 0);

    // Re-running the same batch only trips the provenance guard.
    let records = vec![
        work("First paper", Some("10.1/a"), &["Jane Doe"]),
        work("Second paper", Some("10.1/b"), &[]),
    ];
    let report = pipeline.ingest_works(records, "openalex");
    assert_eq!(report.already_processed, 2);
}
