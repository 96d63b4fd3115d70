use std::collections::HashSet;

use serde::Serialize;

use crate::pipeline::{CheckRegistry, CheckSpec};
use crate::plan::{Plan, is_glob};

#[derive(Debug, Default, Serialize)]
pub struct ValidationReport {
    pub errors: Vec<String>,
    pub warnings: Vec<String>,
}

impl ValidationReport {
    pub fn is_ok(&self) -> bool {
        self.errors.is_empty()
    }

    pub fn merge(&mut self, other: ValidationReport) {
        self.errors.extend(other.errors);
        self.warnings.extend(other.warnings);
    }
}

pub fn validate_plan(plan: &Plan, registry: &CheckRegistry) -> ValidationReport {
    let mut report = ValidationReport::default();

    if plan.version != 1 {
        report
            .errors
            .push(format!("Unsupported plan version: {}", plan.version));
    }

    if plan.project.as_os_str().is_empty() {
        report.errors.push("Project path cannot be empty".into());
    }

    if plan.checks.is_empty() {
        report
            .errors
            .push("Plan must contain at least one check".into());
    }

    let mut seen_names = HashSet::new();
    for (idx, spec) in plan.checks.iter().enumerate() {
        report.merge(validate_check_order(idx, spec, &plan.checks));

        let params = spec.params.clone().unwrap_or_default();
        match registry.create(&spec.check, params) {
            Ok(stage) => {
                for target in &stage.targets {
                    if is_glob(target)
                        && let Err(err) = glob::Pattern::new(target)
                    {
                        report.errors.push(format!(
                            "Check {} ('{}') target '{}' is not a valid glob: {}",
                            idx + 1,
                            spec.check,
                            target,
                            err
                        ));
                    }
                }
                if !seen_names.insert(stage.name.clone()) {
                    report.warnings.push(format!(
                        "Check name '{}' appears more than once; set a distinct 'label' to tell the results apart",
                        stage.name
                    ));
                }
            }
            Err(err) => {
                report.errors.push(format!(
                    "Check {} ('{}') cannot be instantiated: {}",
                    idx + 1,
                    spec.check,
                    err
                ));
            }
        }
    }

    report
}

fn validate_check_order(idx: usize, spec: &CheckSpec, checks: &[CheckSpec]) -> ValidationReport {
    let mut report = ValidationReport::default();
    if spec.check == "tests" && idx + 1 < checks.len() {
        report.warnings.push(format!(
            "Check {} runs the test suite before '{}'; the suite conventionally gates last",
            idx + 1,
            checks[idx + 1].check
        ));
    }
    report
}
