use std::fs::File;
use std::path::Path;

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use serde::Serialize;
use sha2::{Digest, Sha256};

use crate::pipeline::{CheckRegistry, Stage};
use crate::plan::Plan;

#[derive(Debug, Serialize)]
pub struct PlanLock {
    pub plan_version: u32,
    pub generated_at: DateTime<Utc>,
    pub project: String,
    pub checks: Vec<CheckLock>,
}

#[derive(Debug, Serialize)]
pub struct CheckLock {
    pub name: String,
    pub program: String,
    pub command_hash: String,
}

/// Write a reproducibility record of exactly what the gate will execute:
/// one hashed command line per check, in execution order.
pub fn generate_lock(plan: &Plan, registry: &CheckRegistry, path: &Path) -> Result<()> {
    let mut checks = Vec::with_capacity(plan.checks.len());
    for spec in &plan.checks {
        let params = spec.params.clone().unwrap_or_default();
        let stage = registry
            .create(&spec.check, params)
            .with_context(|| format!("Cannot lock check '{}'", spec.check))?;
        checks.push(CheckLock {
            name: stage.name.clone(),
            program: stage.program.clone(),
            command_hash: hash_command(&stage),
        });
    }

    let lock = PlanLock {
        plan_version: plan.version,
        generated_at: Utc::now(),
        project: plan.project.to_string_lossy().to_string(),
        checks,
    };

    let file = File::create(path)
        .with_context(|| format!("Failed to create lockfile: {}", path.display()))?;
    serde_yaml::to_writer(file, &lock)
        .with_context(|| format!("Failed to write lockfile: {}", path.display()))?;

    Ok(())
}

fn hash_command(stage: &Stage) -> String {
    let mut hasher = Sha256::new();
    hasher.update(stage.name.as_bytes());
    hasher.update(stage.program.as_bytes());
    let argv = serde_json::to_vec(&(&stage.args, &stage.targets)).unwrap_or_default();
    hasher.update(argv);
    format!("{:x}", hasher.finalize())
}
