use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::process::Command;
use std::sync::Arc;
use std::time::Instant;

use anyhow::{Result, anyhow};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use thiserror::Error;
use tracing::{debug, instrument, warn};

use crate::observability::MetricsCollector;
use crate::plan::expand_targets;

pub type CheckParameters = Map<String, Value>;

/// One verification step: an external tool invocation against the project
/// tree. Immutable once built; its position in the runner's stage list is
/// its ordinal.
#[derive(Debug, Clone)]
pub struct Stage {
    pub name: String,
    pub program: String,
    pub args: Vec<String>,
    pub targets: Vec<String>,
}

impl Stage {
    pub fn command_line(&self) -> String {
        let mut parts = Vec::with_capacity(1 + self.args.len() + self.targets.len());
        parts.push(self.program.clone());
        parts.extend(self.args.iter().cloned());
        parts.extend(self.targets.iter().cloned());
        parts.join(" ")
    }
}

/// Outcome of a single completed stage. Both output streams are kept so
/// diagnostics can show exactly what the tool said.
#[derive(Debug, Clone, Serialize)]
pub struct RunResult {
    pub stage: String,
    pub ordinal: usize,
    pub exit_code: Option<i32>,
    pub stdout: String,
    pub stderr: String,
    pub duration_ms: f64,
}

impl RunResult {
    pub fn success(&self) -> bool {
        self.exit_code == Some(0)
    }

    /// Exit code as reported by the tool, or 1 when it was killed by a
    /// signal and reported none.
    pub fn code(&self) -> i32 {
        self.exit_code.unwrap_or(1)
    }

    pub fn combined_output(&self) -> String {
        let mut combined = String::with_capacity(self.stdout.len() + self.stderr.len() + 1);
        combined.push_str(&self.stdout);
        if !self.stderr.is_empty() {
            if !combined.is_empty() && !combined.ends_with('\n') {
                combined.push('\n');
            }
            combined.push_str(&self.stderr);
        }
        combined
    }
}

/// Aggregate result of a full gate run: either every stage passed, or the
/// run stopped at the first failing stage.
#[derive(Debug)]
pub enum PipelineOutcome {
    Passed { results: Vec<RunResult> },
    Failed { failure: RunResult, completed: Vec<RunResult> },
}

impl PipelineOutcome {
    pub fn passed(&self) -> bool {
        matches!(self, PipelineOutcome::Passed { .. })
    }

    /// Results of every stage that ran, in execution order, including the
    /// failing stage if there was one.
    pub fn results(&self) -> Vec<&RunResult> {
        match self {
            PipelineOutcome::Passed { results } => results.iter().collect(),
            PipelineOutcome::Failed { failure, completed } => {
                let mut all: Vec<&RunResult> = completed.iter().collect();
                all.push(failure);
                all
            }
        }
    }
}

/// Errors raised by the runner itself, distinct from a stage that ran and
/// reported failure (which is a `PipelineOutcome::Failed`).
#[derive(Debug, Error)]
pub enum GateError {
    #[error("invalid gate configuration: {0}")]
    Configuration(String),
    #[error("check '{stage}' (stage {ordinal}) could not be launched: {source}")]
    Execution {
        stage: String,
        ordinal: usize,
        #[source]
        source: std::io::Error,
    },
}

/// Lifecycle of a single gate run. Transitions only move forward;
/// `Succeeded`, `Failed` and `ExecutionError` are terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunState {
    NotStarted,
    Running(usize),
    Succeeded,
    Failed(usize),
    ExecutionError,
}

type CheckConstructor = Arc<dyn Fn(CheckParameters) -> Result<Stage> + Send + Sync>;

pub struct CheckRegistry {
    factories: HashMap<String, CheckConstructor>,
}

impl Default for CheckRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl CheckRegistry {
    pub fn new() -> Self {
        Self {
            factories: HashMap::new(),
        }
    }

    pub fn register<F>(&mut self, name: impl Into<String>, constructor: F)
    where
        F: Fn(CheckParameters) -> Result<Stage> + Send + Sync + 'static,
    {
        self.factories.insert(name.into(), Arc::new(constructor));
    }

    pub fn create(&self, name: &str, params: CheckParameters) -> Result<Stage> {
        let factory = self.factories.get(name).ok_or_else(|| {
            anyhow!(
                "Unknown check '{}'. Available checks: {}",
                name,
                self.known_checks().join(", ")
            )
        })?;
        factory(params)
    }

    pub fn known_checks(&self) -> Vec<String> {
        let mut names: Vec<_> = self.factories.keys().cloned().collect();
        names.sort();
        names
    }
}

/// Sequential fail-fast executor. Exactly one stage subprocess is alive at
/// any time; stage i+1 never starts before stage i has exited successfully.
#[derive(Debug)]
pub struct GateRunner {
    stages: Vec<Stage>,
    project_root: PathBuf,
    metrics: MetricsCollector,
    state: RunState,
}

impl GateRunner {
    pub fn new(stages: Vec<Stage>, project_root: PathBuf) -> Self {
        Self {
            stages,
            project_root,
            metrics: MetricsCollector::new(),
            state: RunState::NotStarted,
        }
    }

    pub fn stages(&self) -> &[Stage] {
        &self.stages
    }

    pub fn project_root(&self) -> &Path {
        &self.project_root
    }

    pub fn state(&self) -> RunState {
        self.state
    }

    pub fn metrics(&self) -> MetricsCollector {
        self.metrics.clone()
    }

    /// Run every stage in declared order, stopping at the first failure.
    ///
    /// A stage that ran and exited non-zero yields `Ok(Failed)`; only
    /// problems of the runner itself (unlaunchable tool, bad configuration)
    /// surface as `Err`. Calling `run` again begins a fresh run.
    #[instrument(skip(self), fields(checks = self.stages.len()))]
    pub fn run(&mut self) -> Result<PipelineOutcome, GateError> {
        if self.stages.is_empty() {
            return Err(GateError::Configuration(
                "gate plan contains no checks".to_string(),
            ));
        }
        if !self.project_root.is_dir() {
            return Err(GateError::Configuration(format!(
                "project root '{}' does not exist or is not a directory",
                self.project_root.display()
            )));
        }

        self.metrics.reset();
        let total_start = Instant::now();
        let mut completed = Vec::new();

        for (ordinal, stage) in self.stages.iter().enumerate() {
            self.state = RunState::Running(ordinal);
            let span = tracing::span!(
                tracing::Level::DEBUG,
                "check",
                check = stage.name.as_str(),
                ordinal
            );
            let _span_guard = span.enter();
            let _timer = self.metrics.start_check(&stage.name);
            debug!(command = %stage.command_line(), "Dispatching check");

            let result = match invoke_stage(stage, ordinal, &self.project_root) {
                Ok(result) => result,
                Err(err) => {
                    self.state = RunState::ExecutionError;
                    self.metrics.record_total_duration(total_start.elapsed());
                    return Err(err);
                }
            };

            if result.success() {
                self.metrics.record_check_pass();
                debug!(
                    check = stage.name.as_str(),
                    duration_ms = result.duration_ms,
                    "Check passed"
                );
                completed.push(result);
            } else {
                self.metrics.record_check_failure();
                self.metrics.record_total_duration(total_start.elapsed());
                self.state = RunState::Failed(ordinal);
                warn!(
                    check = stage.name.as_str(),
                    exit_code = result.code(),
                    "Check failed; remaining checks skipped"
                );
                return Ok(PipelineOutcome::Failed {
                    failure: result,
                    completed,
                });
            }
        }

        self.metrics.record_total_duration(total_start.elapsed());
        self.state = RunState::Succeeded;
        Ok(PipelineOutcome::Passed { results: completed })
    }
}

fn invoke_stage(stage: &Stage, ordinal: usize, root: &Path) -> Result<RunResult, GateError> {
    let started = Instant::now();
    let output = Command::new(&stage.program)
        .args(&stage.args)
        .args(&stage.targets)
        .current_dir(root)
        .output()
        .map_err(|source| GateError::Execution {
            stage: stage.name.clone(),
            ordinal,
            source,
        })?;

    Ok(RunResult {
        stage: stage.name.clone(),
        ordinal,
        exit_code: output.status.code(),
        stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
        stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
        duration_ms: started.elapsed().as_secs_f64() * 1_000.0,
    })
}

pub fn build_pipeline(
    registry: &CheckRegistry,
    specs: &[CheckSpec],
    project_root: PathBuf,
) -> Result<GateRunner> {
    let mut stages = Vec::with_capacity(specs.len());
    for spec in specs {
        let params = spec.params.clone().unwrap_or_default();
        let mut stage = registry.create(&spec.check, params)?;
        stage.targets = expand_targets(&stage.targets, &project_root)?;
        stages.push(stage);
    }

    Ok(GateRunner::new(stages, project_root))
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct CheckSpec {
    pub check: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub params: Option<CheckParameters>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn stage(name: &str, program: &str, args: &[&str]) -> Stage {
        Stage {
            name: name.to_string(),
            program: program.to_string(),
            args: args.iter().map(|a| a.to_string()).collect(),
            targets: Vec::new(),
        }
    }

    #[test]
    fn command_line_includes_args_and_targets() {
        let mut s = stage("style", "pydocstyle", &["--count"]);
        s.targets = vec!["src".to_string(), "tests".to_string()];
        assert_eq!(s.command_line(), "pydocstyle --count src tests");
    }

    #[test]
    fn run_result_code_defaults_on_signal_death() {
        let result = RunResult {
            stage: "tests".to_string(),
            ordinal: 4,
            exit_code: None,
            stdout: String::new(),
            stderr: String::new(),
            duration_ms: 0.0,
        };
        assert!(!result.success());
        assert_eq!(result.code(), 1);
    }

    #[test]
    fn combined_output_keeps_stream_order() {
        let result = RunResult {
            stage: "docs".to_string(),
            ordinal: 3,
            exit_code: Some(2),
            stdout: "building".to_string(),
            stderr: "warning treated as error".to_string(),
            duration_ms: 1.0,
        };
        assert_eq!(
            result.combined_output(),
            "building\nwarning treated as error"
        );
    }

    #[test]
    fn runner_starts_not_started() {
        let runner = GateRunner::new(vec![stage("style", "true", &[])], PathBuf::from("."));
        assert_eq!(runner.state(), RunState::NotStarted);
    }
}
