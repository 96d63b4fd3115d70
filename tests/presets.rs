use gatecheck::checks;
use gatecheck::pipeline::CheckRegistry;
use gatecheck::plan::Plan;
use gatecheck::presets::{generate_preset, known_presets};
use gatecheck::validation::validate_plan;
use tempfile::tempdir;

fn build_registry() -> CheckRegistry {
    let mut registry = CheckRegistry::new();
    checks::register_defaults(&mut registry);
    registry
}

#[test]
fn python_preset_is_the_classic_five_check_gate() {
    let temp = tempdir().unwrap();
    let destination = temp.path().join("plans/python.yaml");

    generate_preset("python", &destination).unwrap();
    let plan = Plan::load(&destination).unwrap();

    let names: Vec<_> = plan.checks.iter().map(|c| c.check.as_str()).collect();
    assert_eq!(names, ["style", "imports", "manifest", "docs", "tests"]);

    let report = validate_plan(&plan, &build_registry());
    assert!(report.is_ok(), "python preset should validate: {:?}", report.errors);
}

#[test]
fn rust_preset_validates_without_warnings() {
    let temp = tempdir().unwrap();
    let destination = temp.path().join("rust.yaml");

    generate_preset("rust", &destination).unwrap();
    let plan = Plan::load(&destination).unwrap();

    let report = validate_plan(&plan, &build_registry());
    assert!(report.is_ok(), "rust preset should validate: {:?}", report.errors);
    assert!(
        report.warnings.is_empty(),
        "rust preset should be warning-free: {:?}",
        report.warnings
    );
}

#[test]
fn every_known_preset_generates() {
    let temp = tempdir().unwrap();
    for preset in known_presets() {
        let destination = temp.path().join(format!("{preset}.yaml"));
        generate_preset(preset, &destination).unwrap();
        assert!(destination.is_file());
    }
}

#[test]
fn unknown_preset_is_rejected() {
    let temp = tempdir().unwrap();
    let err = generate_preset("golang", &temp.path().join("nope.yaml")).unwrap_err();
    assert!(err.to_string().contains("Unknown preset"));
}
