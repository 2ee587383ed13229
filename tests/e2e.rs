//! Black-box seed scenarios from §8 (E1-E6) plus a couple of the testable
//! properties those scenarios are meant to stand in for. Exercises the crate
//! only through its public surface — no internal module paths.

use sqlspec::config::Configuration;
use sqlspec::error::SqlSpecError;
use sqlspec::statement::Statement;
use sqlspec::value::{ExecParams, ParamPayload, Value};
use sqlspec::PlaceholderStyle;

/// E1: positional `?` input, PostgreSQL dialect, target `NumericDollar`.
#[test]
fn e1_positional_qmark_to_numeric_dollar() {
    let config = Configuration::new("postgres")
        .with_target_parameter_style(PlaceholderStyle::NumericDollar)
        .shared();
    let stmt = Statement::new(
        "SELECT * FROM u WHERE id = ? AND name = ?",
        ParamPayload::positional([Value::from(42i64), Value::from("x")]),
        config,
    );
    let compiled = stmt.compile().unwrap();
    assert!(compiled.rendered_sql.contains("$1"));
    assert!(compiled.rendered_sql.contains("$2"));
    assert!(!compiled.rendered_sql.contains('?'));
    assert_eq!(compiled.placeholder_style, PlaceholderStyle::NumericDollar);
    assert_eq!(
        compiled.parameters,
        ExecParams::Positional(vec![Value::Int(42), Value::Text("x".into())])
    );
}

/// E2: named `:alpha`/`:beta` input, target `Qmark`.
#[test]
fn e2_named_colon_to_qmark() {
    let config = Configuration::new("sqlite")
        .with_target_parameter_style(PlaceholderStyle::Qmark)
        .shared();
    let stmt = Statement::new(
        "SELECT 1 WHERE a = :alpha AND b = :beta",
        ParamPayload::named([("alpha", Value::from(1i64)), ("beta", Value::from(2i64))]),
        config,
    );
    let compiled = stmt.compile().unwrap();
    assert_eq!(compiled.rendered_sql.matches('?').count(), 2);
    assert!(!compiled.rendered_sql.contains(':'));
    assert_eq!(
        compiled.parameters,
        ExecParams::Positional(vec![Value::Int(1), Value::Int(2)])
    );
}

/// E3: literal parameterization hoists the `25`/`'active'` literals into
/// fresh bind parameters with no user-supplied input.
#[test]
fn e3_literal_parameterization_hoists_comparison_literals() {
    let config = Configuration::new("sqlite")
        .with_parameterize_literals(true)
        .with_target_parameter_style(PlaceholderStyle::Qmark)
        .shared();
    let stmt = Statement::new(
        "SELECT * FROM u WHERE age > 25 AND status = 'active'",
        ParamPayload::Empty,
        config,
    );
    let compiled = stmt.compile().unwrap();
    assert_eq!(compiled.rendered_sql.matches('?').count(), 2);
    assert!(!compiled.rendered_sql.contains("25"));
    assert!(!compiled.rendered_sql.contains("active"));
    assert_eq!(
        compiled.parameters,
        ExecParams::Positional(vec![Value::Int(25), Value::Text("active".into())])
    );
}

/// E4: a three-statement script renders each sub-statement independently,
/// joined with `;\n`, trailing semicolon, no placeholders under `Static`.
#[test]
fn e4_script_joins_with_newline_semicolon_and_trailing_semicolon() {
    let config = Configuration::new("sqlite")
        .with_target_parameter_style(PlaceholderStyle::Static)
        .shared();
    let stmt = Statement::new(
        "INSERT INTO t(a) VALUES (1); INSERT INTO t(a) VALUES (2); UPDATE t SET a = 3 WHERE a = 1;",
        ParamPayload::Empty,
        config,
    )
    .as_script();
    let compiled = stmt.compile().unwrap();

    let parts: Vec<&str> = compiled.rendered_sql.split(";\n").collect();
    assert_eq!(parts.len(), 3);
    assert!(parts[0].contains("INSERT INTO t"));
    assert!(parts[1].contains("INSERT INTO t"));
    assert!(parts[2].trim_end().contains("UPDATE t"));
    assert!(compiled.rendered_sql.trim_end().ends_with(';'));
    assert!(compiled.parameter_info.is_empty());
    assert!(!compiled.rendered_sql.contains('?'));
}

/// E5: list expansion under a non-native-list adapter (`sqlite`).
#[test]
fn e5_list_expansion_under_non_native_adapter() {
    let config = Configuration::new("sqlite")
        .with_target_parameter_style(PlaceholderStyle::NamedColon)
        .shared();
    let stmt = Statement::new(
        "SELECT * FROM u WHERE id IN (:ids)",
        ParamPayload::named([("ids", Value::from(vec![1i64, 2, 3]))]),
        config,
    );
    let compiled = stmt.compile().unwrap();
    assert!(compiled.rendered_sql.contains(":ids_0"));
    assert!(compiled.rendered_sql.contains(":ids_1"));
    assert!(compiled.rendered_sql.contains(":ids_2"));
    assert!(!compiled.rendered_sql.contains(":ids)"));
    match compiled.parameters {
        ExecParams::Named(ref map) => {
            assert_eq!(map.get("ids_0"), Some(&Value::Int(1)));
            assert_eq!(map.get("ids_1"), Some(&Value::Int(2)));
            assert_eq!(map.get("ids_2"), Some(&Value::Int(3)));
        }
        ref other => panic!("expected named parameters, got {other:?}"),
    }
}

/// E6: strict mode blocks a `DELETE` with no `WHERE`.
#[test]
fn e6_strict_mode_blocks_delete_without_where() {
    let config = Configuration::new("sqlite").with_strict_mode(true).shared();
    let stmt = Statement::new("DELETE FROM u", ParamPayload::Empty, config);
    let err = stmt.compile().unwrap_err();
    match err {
        SqlSpecError::ValidationBlocked { rule, severity, .. } => {
            assert_eq!(rule.as_str(), "dml_safety.delete_without_where");
            assert_eq!(severity, sqlspec::error::Severity::High);
        }
        other => panic!("expected ValidationBlocked, got {other:?}"),
    }
}

/// Property 1 (idempotence): repeated `compile()` on the same statement
/// returns the exact same cached value.
#[test]
fn property_compile_is_idempotent() {
    let config = Configuration::new("sqlite").shared();
    let stmt = Statement::new("SELECT * FROM u WHERE id = ?", ParamPayload::positional([1i64]), config);
    let first = stmt.compile().unwrap();
    let second = stmt.compile().unwrap();
    assert!(std::sync::Arc::ptr_eq(&first, &second));
}

/// Property 6 (cache correctness): two statements differing only in
/// parameter values hit the same compiled-cache entry.
#[test]
fn property_cache_hits_across_differing_parameter_values() {
    let config = Configuration::new("sqlite").shared();
    let a = Statement::new("SELECT * FROM cache_probe WHERE id = ?", ParamPayload::positional([1i64]), config.clone());
    let b = Statement::new("SELECT * FROM cache_probe WHERE id = ?", ParamPayload::positional([999i64]), config);
    let compiled_a = a.compile().unwrap();
    let compiled_b = b.compile().unwrap();
    assert_eq!(compiled_a.cache_fingerprint, compiled_b.cache_fingerprint);
    assert_eq!(compiled_a.rendered_sql, compiled_b.rendered_sql);
    assert_eq!(
        compiled_b.parameters,
        ExecParams::Positional(vec![Value::Int(999)])
    );
}

/// Property 4 (parameter preservation): a named payload round-trips to the
/// same logical bindings regardless of target style.
#[test]
fn property_named_payload_preserved_across_styles() {
    let config = Configuration::new("postgres")
        .with_target_parameter_style(PlaceholderStyle::NamedDollar)
        .shared();
    let stmt = Statement::new(
        "SELECT * FROM u WHERE name = :name",
        ParamPayload::named([("name", Value::from("alice"))]),
        config,
    );
    let compiled = stmt.compile().unwrap();
    match compiled.parameters {
        ExecParams::Named(ref map) => {
            assert_eq!(map.get("name"), Some(&Value::Text("alice".into())));
        }
        ref other => panic!("expected named parameters, got {other:?}"),
    }
}
