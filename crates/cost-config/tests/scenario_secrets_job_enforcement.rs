//! Job-aware fail-closed enforcement of secret resolution.
//!
//! Lookups go through an explicit map so no test mutates the process
//! environment.

use std::collections::HashMap;

use cost_config::secrets::resolve_secrets_with;
use cost_config::{load_layered_yaml_from_strings, Job, DEFAULT_CONFIG_YAML};

fn cfg() -> serde_json::Value {
    load_layered_yaml_from_strings(&[DEFAULT_CONFIG_YAML])
        .unwrap()
        .config_json
}

fn lookup(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
    let map: HashMap<String, String> = pairs
        .iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect();
    move |k: &str| map.get(k).cloned()
}

#[test]
fn invoices_job_requires_aiven_token() {
    let err = resolve_secrets_with(
        &cfg(),
        Job::Invoices,
        lookup(&[("COST_DATABASE_URL", "postgres://localhost/cost")]),
    )
    .unwrap_err()
    .to_string();
    assert!(err.contains("SECRETS_MISSING"), "{err}");
    assert!(err.contains("AIVEN_API_TOKEN"), "{err}");
}

#[test]
fn every_job_requires_database_url() {
    for job in [Job::Invoices, Job::Currency, Job::Ledger] {
        let err = resolve_secrets_with(&cfg(), job, lookup(&[("AIVEN_API_TOKEN", "tok")]))
            .unwrap_err()
            .to_string();
        assert!(err.contains("COST_DATABASE_URL"), "{}: {err}", job.as_str());
    }
}

#[test]
fn currency_job_token_is_optional() {
    let s = resolve_secrets_with(
        &cfg(),
        Job::Currency,
        lookup(&[("COST_DATABASE_URL", "postgres://localhost/cost")]),
    )
    .unwrap();
    assert!(s.currency_api_token.is_none());
    assert!(s.database_url.is_some());
}

#[test]
fn custom_env_names_from_yaml_are_honoured() {
    let overlay = r#"
aiven:
  token_env: "MY_AIVEN_TOKEN"
warehouse:
  url_env: "MY_DB_URL"
"#;
    let cfg = load_layered_yaml_from_strings(&[DEFAULT_CONFIG_YAML, overlay])
        .unwrap()
        .config_json;
    let s = resolve_secrets_with(
        &cfg,
        Job::Invoices,
        lookup(&[("MY_AIVEN_TOKEN", "tok-1"), ("MY_DB_URL", "postgres://db")]),
    )
    .unwrap();
    assert_eq!(s.aiven_api_token.as_deref(), Some("tok-1"));
    assert_eq!(s.require_database_url("MY_DB_URL").unwrap(), "postgres://db");
}

#[test]
fn error_names_var_never_value_and_debug_is_redacted() {
    let s = resolve_secrets_with(
        &cfg(),
        Job::Invoices,
        lookup(&[
            ("AIVEN_API_TOKEN", "super-secret-token"),
            ("COST_DATABASE_URL", "postgres://u:pw@h/db"),
        ]),
    )
    .unwrap();
    let dbg = format!("{s:?}");
    assert!(!dbg.contains("super-secret-token"), "{dbg}");
    assert!(!dbg.contains("pw@h"), "{dbg}");
    assert!(dbg.contains("<REDACTED>"));
}

#[test]
fn blank_values_count_as_missing() {
    let err = resolve_secrets_with(
        &cfg(),
        Job::Ledger,
        lookup(&[("COST_DATABASE_URL", "   ")]),
    )
    .unwrap_err()
    .to_string();
    assert!(err.contains("SECRETS_MISSING"), "{err}");
}
