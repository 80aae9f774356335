//! Architecture contract tests.

mod support;

use support::architecture::{exists, lines_matching, report};

#[test]
fn domain_has_no_outer_layer_imports() {
    let hits = lines_matching(
        "src/domain",
        &[
            "crate::adapter",
            "crate::infrastructure",
            "crate::application",
            "crate::port",
            "tokio_postgres::",
            "clap::",
        ],
    );

    assert!(
        hits.is_empty(),
        "found forbidden imports in domain layer:\n{}",
        report(&hits)
    );
}

#[test]
fn ports_depend_only_on_domain_and_errors() {
    let hits = lines_matching(
        "src/port",
        &[
            "crate::adapter",
            "crate::application",
            "crate::infrastructure",
        ],
    );

    assert!(
        hits.is_empty(),
        "found outer-layer imports in ports:\n{}",
        report(&hits)
    );
}

#[test]
fn application_never_reaches_into_adapters() {
    let hits = lines_matching("src/application", &["crate::adapter", "tokio_postgres"]);

    assert!(
        hits.is_empty(),
        "application layer must go through ports:\n{}",
        report(&hits)
    );
}

#[test]
fn driver_is_confined_to_the_postgres_adapter() {
    let hits: Vec<_> = lines_matching("src", &["tokio_postgres"])
        .into_iter()
        .filter(|hit| hit.file != "src/adapter/outbound/postgres.rs")
        .collect();

    assert!(
        hits.is_empty(),
        "tokio_postgres used outside its adapter:\n{}",
        report(&hits)
    );
}

#[test]
fn schema_ships_with_the_crate() {
    assert!(exists("sql/schema.sql"));
}
