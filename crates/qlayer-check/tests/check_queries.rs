//! Parse, validate and process queries through a configured checker
//!
//! Run with: cargo test --package qlayer-check --test check_queries

use qlayer_check::config::Config;
use qlayer_check::{CheckError, Checker};
use qlayer_ir::{DataSource, EntitySource, Query, SelectedExpression};
use qlayer_processors::{HttpRequestSettings, SubscriptionRequestSettings};
use qlayer_validate::ValidationError;

const CONFIG: &str = r#"
processors:
  pipeline: [sampling_rate, consistency_enforcer]
  turbo_sample_rate: 0.25
entities:
  - name: spans
    columns:
      - { name: message, type: String }
      - { name: duration, type: UInt32 }
      - { name: trace_id, type: UUID }
    functions: [like, notLike, count, equals, avg]
    validators:
      avg: [{ column: { types: [UInt, Int, Float] } }]
  - name: transactions
    columns:
      - { name: trace_id, type: UUID }
      - { name: message, type: "Nullable(String)" }
    functions: [like, count, equals]
    relationships:
      spans: { entity: spans, columns: [[trace_id, trace_id]] }
"#;

fn config() -> Config {
    serde_yaml::from_str(CONFIG).unwrap()
}

fn checker() -> Checker {
    Checker::from_config(&config()).unwrap()
}

fn entity_source(query: &Query) -> &EntitySource {
    match query.get_from_clause() {
        DataSource::Entity(source) => source,
        DataSource::Join(_) => panic!("expected a single entity"),
    }
}

#[test]
fn test_like_on_string_column_passes() {
    let report = checker()
        .check(
            "MATCH (s: spans) SELECT count() WHERE like(message, 'a%') = 1",
            &HttpRequestSettings::default(),
        )
        .unwrap();

    assert_eq!(report.fingerprint, report.query.fingerprint());
    let source = entity_source(&report.query);
    assert!(source.r#final);
    assert_eq!(source.sample_rate, None);
}

#[test]
fn test_like_on_literal_is_rejected_without_reporting() {
    let err = checker()
        .check(
            "MATCH (s: spans) SELECT count() WHERE like(5, 'x') = 1",
            &HttpRequestSettings::default(),
        )
        .unwrap_err();
    let CheckError::Validation(err) = err else {
        panic!("expected a validation error, got {err:?}");
    };
    assert!(!err.should_report());
    assert!(err.to_string().starts_with("Illegal call to function like"));
}

#[test]
fn test_entity_signature_from_config() {
    let checker = checker();
    checker
        .check(
            "MATCH (s: spans) SELECT avg(duration)",
            &HttpRequestSettings::default(),
        )
        .unwrap();
    let err = checker
        .check(
            "MATCH (s: spans) SELECT avg(message)",
            &HttpRequestSettings::default(),
        )
        .unwrap_err();
    assert!(matches!(
        err,
        CheckError::Validation(ValidationError::InvalidExpression(_))
    ));
}

#[test]
fn test_join_validates_every_entity() {
    let checker = checker();
    let settings = HttpRequestSettings::default();

    // transactions.message is Nullable(String), accepted by like
    let report = checker
        .check(
            "MATCH (t: transactions) -[spans]-> (s: spans) \
             SELECT count() WHERE like(t.message, 'a%') = 1 AND like(s.message, 'b%') = 1",
            &settings,
        )
        .unwrap();
    assert!(report.query.get_from_clause().is_final());

    let err = checker
        .check(
            "MATCH (t: transactions) -[spans]-> (s: spans) \
             SELECT count() WHERE like(s.duration, 'a%') = 1",
            &settings,
        )
        .unwrap_err();
    assert!(matches!(err, CheckError::Validation(_)));
}

#[test]
fn test_turbo_requests_are_sampled() {
    let settings = HttpRequestSettings {
        turbo: true,
        referrer: "test".to_string(),
        ..Default::default()
    };
    let report = checker()
        .check("MATCH (s: spans) SELECT count()", &settings)
        .unwrap();
    assert_eq!(entity_source(&report.query).sample_rate, Some(0.25));

    // subscriptions are never turbo
    let report = checker()
        .check(
            "MATCH (s: spans) SELECT count()",
            &SubscriptionRequestSettings::new("subscriptions"),
        )
        .unwrap();
    assert_eq!(entity_source(&report.query).sample_rate, None);
}

#[test]
fn test_json_query_input() {
    let mut query = Query::new(EntitySource::new("spans"));
    query.set_selected_columns(vec![SelectedExpression::new(
        "c",
        qlayer_ir::dsl::function_call(None, "count", vec![]),
    )]);
    let text = serde_json::to_string(&query).unwrap();

    let report = checker()
        .check(&text, &HttpRequestSettings::default())
        .unwrap();
    assert_eq!(report.query.get_selected_columns(), query.get_selected_columns());
    assert!(report.query.get_from_clause().is_final());
}

#[test]
fn test_strict_mode_and_allow_list() {
    let mut config = config();
    config.validation.strict = true;
    let strict = Checker::from_config(&config).unwrap();
    let err = strict
        .check(
            "MATCH (s: spans) SELECT uniq(trace_id)",
            &HttpRequestSettings::default(),
        )
        .unwrap_err();
    assert!(matches!(err, CheckError::Validation(_)));

    let mut config = self::config();
    config.validation.allowed_functions = Some(vec!["count".to_string()]);
    let restricted = Checker::from_config(&config).unwrap();
    restricted
        .check("MATCH (s: spans) SELECT count()", &HttpRequestSettings::default())
        .unwrap();
    assert!(restricted
        .check(
            "MATCH (s: spans) SELECT avg(duration)",
            &HttpRequestSettings::default(),
        )
        .is_err());
}

#[test]
fn test_unknown_entity_is_a_parse_error() {
    let err = checker()
        .check("MATCH (g: ghost) SELECT count()", &HttpRequestSettings::default())
        .unwrap_err();
    assert!(matches!(err, CheckError::Parse(_)));
}
