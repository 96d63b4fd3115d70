use std::path::Path;

use gatecheck::checks;
use gatecheck::pipeline::CheckRegistry;
use gatecheck::plan::Plan;
use gatecheck::validation::validate_plan;

#[test]
fn quickstart_plan_is_valid() {
    let plan = Plan::load(Path::new("plans/quickstart.yaml"))
        .expect("quickstart plan should load");
    let mut registry = CheckRegistry::new();
    checks::register_defaults(&mut registry);
    let report = validate_plan(&plan, &registry);
    assert!(
        report.is_ok(),
        "quickstart plan should pass validation: {:?}",
        report.errors
    );
}
