use std::fs::File;
use std::path::Path;

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::to_writer_pretty;

use crate::pipeline::{PipelineOutcome, RunResult, Stage};

/// Machine-readable record of one gate run, written behind `--report`.
#[derive(Debug, Serialize)]
pub struct GateReport {
    pub generated_at: DateTime<Utc>,
    pub project: String,
    pub passed: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub failed_check: Option<FailedCheck>,
    pub checks: Vec<CheckEntry>,
}

#[derive(Debug, Serialize)]
pub struct FailedCheck {
    pub name: String,
    pub ordinal: usize,
    pub exit_code: i32,
}

#[derive(Debug, Serialize)]
pub struct CheckEntry {
    pub name: String,
    pub ordinal: usize,
    pub program: String,
    pub exit_code: Option<i32>,
    pub duration_ms: f64,
    pub stdout: String,
    pub stderr: String,
}

impl GateReport {
    pub fn from_outcome(project: &Path, stages: &[Stage], outcome: &PipelineOutcome) -> Self {
        let failed_check = match outcome {
            PipelineOutcome::Passed { .. } => None,
            PipelineOutcome::Failed { failure, .. } => Some(FailedCheck {
                name: failure.stage.clone(),
                ordinal: failure.ordinal,
                exit_code: failure.code(),
            }),
        };

        let checks = outcome
            .results()
            .into_iter()
            .map(|result| entry_for(result, stages))
            .collect();

        Self {
            generated_at: Utc::now(),
            project: project.to_string_lossy().to_string(),
            passed: outcome.passed(),
            failed_check,
            checks,
        }
    }

    pub fn write(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent()
            && !parent.as_os_str().is_empty()
        {
            std::fs::create_dir_all(parent).with_context(|| {
                format!("Failed to create report directory: {}", parent.display())
            })?;
        }
        let file = File::create(path)
            .with_context(|| format!("Failed to create report file: {}", path.display()))?;
        to_writer_pretty(file, self)
            .with_context(|| format!("Failed to write report JSON: {}", path.display()))?;
        Ok(())
    }
}

fn entry_for(result: &RunResult, stages: &[Stage]) -> CheckEntry {
    let program = stages
        .get(result.ordinal)
        .map(|stage| stage.program.clone())
        .unwrap_or_default();
    CheckEntry {
        name: result.stage.clone(),
        ordinal: result.ordinal,
        program,
        exit_code: result.exit_code,
        duration_ms: result.duration_ms,
        stdout: result.stdout.clone(),
        stderr: result.stderr.clone(),
    }
}
