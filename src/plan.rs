use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use glob::glob;
use serde::Deserialize;

use crate::pipeline::CheckSpec;

/// A gate plan: the ordered list of checks to run against a project tree.
/// The order in `checks` is the execution order.
#[derive(Debug, Deserialize)]
pub struct Plan {
    pub version: u32,
    #[serde(default = "default_project")]
    pub project: PathBuf,
    pub checks: Vec<CheckSpec>,
}

fn default_project() -> PathBuf {
    PathBuf::from(".")
}

impl Plan {
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read plan file: {}", path.display()))?;
        let plan: Plan = serde_yaml::from_str(&content)
            .with_context(|| format!("Failed to parse plan YAML: {}", path.display()))?;
        Ok(plan)
    }

    /// The classic release gate: style, import order, packaging manifest,
    /// documentation build, test suite — in that order.
    pub fn default_plan() -> Self {
        Self {
            version: 1,
            project: default_project(),
            checks: ["style", "imports", "manifest", "docs", "tests"]
                .iter()
                .map(|name| CheckSpec {
                    check: (*name).to_string(),
                    params: None,
                })
                .collect(),
        }
    }
}

/// Expand target entries against the project root. Entries with glob
/// metacharacters must match at least one path; literal entries pass
/// through untouched (the tool itself reports a missing path).
pub fn expand_targets(patterns: &[String], root: &Path) -> Result<Vec<String>> {
    let mut resolved = Vec::new();
    for pattern in patterns {
        if !is_glob(pattern) {
            resolved.push(pattern.clone());
            continue;
        }
        let rooted = root.join(pattern);
        let matches = glob(&rooted.to_string_lossy())
            .with_context(|| format!("Invalid target pattern: {pattern}"))?;
        let mut found = false;
        for entry in matches {
            let path = entry?;
            let relative = path.strip_prefix(root).unwrap_or(&path);
            resolved.push(relative.to_string_lossy().to_string());
            found = true;
        }
        if !found {
            anyhow::bail!("No targets matched pattern: {pattern}");
        }
    }
    Ok(resolved)
}

pub fn is_glob(pattern: &str) -> bool {
    pattern.chars().any(|c| matches!(c, '*' | '?' | '['))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    #[test]
    fn default_plan_runs_the_five_classic_checks() {
        let plan = Plan::default_plan();
        assert_eq!(plan.version, 1);
        let names: Vec<_> = plan.checks.iter().map(|c| c.check.as_str()).collect();
        assert_eq!(names, ["style", "imports", "manifest", "docs", "tests"]);
    }

    #[test]
    fn literal_targets_pass_through() {
        let resolved =
            expand_targets(&["src".to_string(), "tests".to_string()], Path::new(".")).unwrap();
        assert_eq!(resolved, vec!["src", "tests"]);
    }

    #[test]
    fn glob_targets_expand_relative_to_root() {
        let temp = tempfile::tempdir().unwrap();
        fs::write(temp.path().join("a.py"), "").unwrap();
        fs::write(temp.path().join("b.py"), "").unwrap();

        let mut resolved = expand_targets(&["*.py".to_string()], temp.path()).unwrap();
        resolved.sort();
        assert_eq!(resolved, vec!["a.py", "b.py"]);
    }

    #[test]
    fn unmatched_glob_is_an_error() {
        let temp = tempfile::tempdir().unwrap();
        let err = expand_targets(&["*.py".to_string()], temp.path()).unwrap_err();
        assert!(err.to_string().contains("No targets matched"));
    }
}
