use anyhow::{Result, anyhow};
use serde_json::Value;

use crate::pipeline::{CheckParameters, CheckRegistry, Stage};

pub fn register_defaults(registry: &mut CheckRegistry) {
    registry.register("style", style_check);
    registry.register("imports", imports_check);
    registry.register("manifest", manifest_check);
    registry.register("docs", docs_check);
    registry.register("tests", tests_check);
    registry.register("command", command_check);
}

/// Style checker over source, test and docs trees. Defaults to pydocstyle;
/// `program` substitutes any tool with compatible invocation.
fn style_check(mut params: CheckParameters) -> Result<Stage> {
    let program = take_string(&mut params, "program").unwrap_or_else(|| "pydocstyle".to_string());
    let targets = take_string_list(&mut params, "targets")
        .unwrap_or_else(|| vec![".".to_string()]);
    let args = take_string_list(&mut params, "extra_args").unwrap_or_default();
    Ok(Stage {
        name: take_string(&mut params, "label").unwrap_or_else(|| "style".to_string()),
        program,
        args,
        targets,
    })
}

/// Import-order checker in check-only mode with diff output.
fn imports_check(mut params: CheckParameters) -> Result<Stage> {
    let program = take_string(&mut params, "program").unwrap_or_else(|| "isort".to_string());
    let targets = take_string_list(&mut params, "targets")
        .unwrap_or_else(|| vec![".".to_string()]);
    let mut args = vec!["--check-only".to_string(), "--diff".to_string()];
    args.extend(take_string_list(&mut params, "extra_args").unwrap_or_default());
    Ok(Stage {
        name: take_string(&mut params, "label").unwrap_or_else(|| "imports".to_string()),
        program,
        args,
        targets,
    })
}

/// Packaging-manifest checker, run from the project root.
fn manifest_check(mut params: CheckParameters) -> Result<Stage> {
    let program =
        take_string(&mut params, "program").unwrap_or_else(|| "check-manifest".to_string());
    let mut args = Vec::new();
    for pattern in take_string_list(&mut params, "ignore").unwrap_or_default() {
        args.push("--ignore".to_string());
        args.push(pattern);
    }
    args.extend(take_string_list(&mut params, "extra_args").unwrap_or_default());
    Ok(Stage {
        name: take_string(&mut params, "label").unwrap_or_else(|| "manifest".to_string()),
        program,
        args,
        targets: Vec::new(),
    })
}

/// Documentation build: quiet, nitpicky, warnings fatal. The source and
/// build directories stay in the argument list because the build directory
/// is an output, not an inspected path.
fn docs_check(mut params: CheckParameters) -> Result<Stage> {
    let program =
        take_string(&mut params, "program").unwrap_or_else(|| "sphinx-build".to_string());
    let source = take_string(&mut params, "source").unwrap_or_else(|| "docs".to_string());
    let build = take_string(&mut params, "build")
        .unwrap_or_else(|| format!("{source}/_build/html"));
    let mut args = vec!["-qnNW".to_string()];
    args.extend(take_string_list(&mut params, "extra_args").unwrap_or_default());
    args.push(source);
    args.push(build);
    Ok(Stage {
        name: take_string(&mut params, "label").unwrap_or_else(|| "docs".to_string()),
        program,
        args,
        targets: Vec::new(),
    })
}

/// Test-suite runner against the project root.
fn tests_check(mut params: CheckParameters) -> Result<Stage> {
    let program = take_string(&mut params, "program").unwrap_or_else(|| "pytest".to_string());
    let args = take_string_list(&mut params, "extra_args").unwrap_or_default();
    let targets = take_string_list(&mut params, "targets").unwrap_or_default();
    Ok(Stage {
        name: take_string(&mut params, "label").unwrap_or_else(|| "tests".to_string()),
        program,
        args,
        targets,
    })
}

/// Escape hatch: gate on any tool the plan names.
fn command_check(mut params: CheckParameters) -> Result<Stage> {
    let program = take_string(&mut params, "program")
        .ok_or_else(|| anyhow!("command check requires 'program' parameter"))?;
    let args = take_string_list(&mut params, "args").unwrap_or_default();
    let targets = take_string_list(&mut params, "targets").unwrap_or_default();
    Ok(Stage {
        name: take_string(&mut params, "label").unwrap_or_else(|| "command".to_string()),
        program,
        args,
        targets,
    })
}

fn take_string(params: &mut CheckParameters, key: &str) -> Option<String> {
    params.remove(key).and_then(|value| match value {
        Value::String(s) => Some(s),
        other => Some(other.to_string()),
    })
}

fn take_string_list(params: &mut CheckParameters, key: &str) -> Option<Vec<String>> {
    params.remove(key).map(|value| match value {
        Value::String(s) => vec![s],
        Value::Array(items) => items
            .into_iter()
            .filter_map(|item| match item {
                Value::String(s) => Some(s),
                other => Some(other.to_string()),
            })
            .collect(),
        other => vec![other.to_string()],
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn params(entries: &[(&str, Value)]) -> CheckParameters {
        let mut map = CheckParameters::new();
        for (key, value) in entries {
            map.insert((*key).to_string(), value.clone());
        }
        map
    }

    #[test]
    fn style_defaults_to_pydocstyle_on_project_root() {
        let stage = style_check(CheckParameters::new()).unwrap();
        assert_eq!(stage.name, "style");
        assert_eq!(stage.program, "pydocstyle");
        assert_eq!(stage.targets, vec!["."]);
    }

    #[test]
    fn imports_runs_in_check_only_mode() {
        let stage = imports_check(params(&[("targets", json!(["src", "tests"]))])).unwrap();
        assert_eq!(stage.program, "isort");
        assert_eq!(stage.args, vec!["--check-only", "--diff"]);
        assert_eq!(stage.targets, vec!["src", "tests"]);
    }

    #[test]
    fn docs_build_treats_warnings_as_fatal() {
        let stage = docs_check(CheckParameters::new()).unwrap();
        assert_eq!(
            stage.command_line(),
            "sphinx-build -qnNW docs docs/_build/html"
        );
    }

    #[test]
    fn manifest_expands_ignore_patterns() {
        let stage = manifest_check(params(&[("ignore", json!([".ci-*"]))])).unwrap();
        assert_eq!(stage.args, vec!["--ignore", ".ci-*"]);
    }

    #[test]
    fn command_requires_program() {
        let err = command_check(CheckParameters::new()).unwrap_err();
        assert!(err.to_string().contains("program"));
    }

    #[test]
    fn command_honors_label() {
        let stage = command_check(params(&[
            ("program", json!("cargo")),
            ("args", json!(["fmt", "--check"])),
            ("label", json!("fmt")),
        ]))
        .unwrap();
        assert_eq!(stage.name, "fmt");
        assert_eq!(stage.command_line(), "cargo fmt --check");
    }

    #[test]
    fn string_list_accepts_scalar() {
        let mut map = params(&[("targets", json!("src"))]);
        assert_eq!(take_string_list(&mut map, "targets"), Some(vec!["src".to_string()]));
    }
}
