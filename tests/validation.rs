use std::fs;
use std::path::PathBuf;

use gatecheck::checks;
use gatecheck::lockfile::generate_lock;
use gatecheck::pipeline::{CheckParameters, CheckRegistry, CheckSpec};
use gatecheck::plan::Plan;
use gatecheck::validation::validate_plan;
use serde_json::json;
use tempfile::tempdir;

fn build_registry() -> CheckRegistry {
    let mut registry = CheckRegistry::new();
    checks::register_defaults(&mut registry);
    registry
}

fn base_plan() -> Plan {
    Plan {
        version: 1,
        project: PathBuf::from("."),
        checks: Vec::new(),
    }
}

fn check_spec(name: &str, params: &[(&str, serde_json::Value)]) -> CheckSpec {
    let mut map = CheckParameters::default();
    for (key, value) in params {
        map.insert((*key).to_string(), value.clone());
    }
    CheckSpec {
        check: name.to_string(),
        params: Some(map),
    }
}

#[test]
fn validation_rejects_empty_plan() {
    let plan = base_plan();
    let report = validate_plan(&plan, &build_registry());

    assert!(!report.is_ok());
    assert!(
        report
            .errors
            .iter()
            .any(|e| e.contains("at least one check"))
    );
}

#[test]
fn validation_rejects_unsupported_version() {
    let mut plan = base_plan();
    plan.version = 2;
    plan.checks.push(check_spec("tests", &[]));

    let report = validate_plan(&plan, &build_registry());
    assert!(
        report
            .errors
            .iter()
            .any(|e| e.contains("Unsupported plan version"))
    );
}

#[test]
fn validation_rejects_unknown_check() {
    let mut plan = base_plan();
    plan.checks.push(check_spec("fuzz", &[]));

    let report = validate_plan(&plan, &build_registry());
    assert!(!report.is_ok());
    assert!(
        report
            .errors
            .iter()
            .any(|e| e.contains("cannot be instantiated"))
    );
}

#[test]
fn validation_warns_when_tests_are_not_last() {
    let mut plan = base_plan();
    plan.checks.push(check_spec("tests", &[]));
    plan.checks.push(check_spec("style", &[]));

    let report = validate_plan(&plan, &build_registry());
    assert!(report.is_ok());
    assert!(
        report
            .warnings
            .iter()
            .any(|w| w.contains("conventionally gates last"))
    );
}

#[test]
fn validation_warns_on_duplicate_check_names() {
    let mut plan = base_plan();
    plan.checks.push(check_spec("style", &[]));
    plan.checks.push(check_spec("style", &[]));

    let report = validate_plan(&plan, &build_registry());
    assert!(report.is_ok());
    assert!(
        report
            .warnings
            .iter()
            .any(|w| w.contains("more than once"))
    );
}

#[test]
fn labeled_duplicates_are_accepted_silently() {
    let mut plan = base_plan();
    plan.checks.push(check_spec(
        "command",
        &[("label", json!("fmt")), ("program", json!("cargo"))],
    ));
    plan.checks.push(check_spec(
        "command",
        &[("label", json!("clippy")), ("program", json!("cargo"))],
    ));

    let report = validate_plan(&plan, &build_registry());
    assert!(report.is_ok());
    assert!(report.warnings.is_empty());
}

#[test]
fn lockfile_captures_every_check_command() {
    let temp = tempdir().unwrap();
    let mut plan = base_plan();
    plan.checks.push(check_spec("style", &[("targets", json!(["src"]))]));
    plan.checks.push(check_spec("tests", &[]));

    let lock_path = temp.path().join("gate.lock");
    generate_lock(&plan, &build_registry(), &lock_path).unwrap();

    let content = fs::read_to_string(&lock_path).unwrap();
    assert!(content.contains("plan_version: 1"));
    assert!(content.contains("name: style"));
    assert!(content.contains("program: pydocstyle"));
    assert!(content.contains("command_hash"));
}

#[test]
fn lockfile_refuses_unknown_checks() {
    let temp = tempdir().unwrap();
    let mut plan = base_plan();
    plan.checks.push(check_spec("fuzz", &[]));

    let err = generate_lock(&plan, &build_registry(), &temp.path().join("gate.lock"))
        .unwrap_err();
    assert!(err.to_string().contains("Cannot lock check 'fuzz'"));
}
