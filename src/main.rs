use std::fs::{self, File};
use std::path::{Path, PathBuf};
use std::process::exit;

use anyhow::{Context, Result, anyhow, bail};
use clap::error::ErrorKind;
use clap::{CommandFactory, Parser, Subcommand, ValueHint};
use clap_complete::Shell;
use gatecheck::checks;
use gatecheck::lockfile::generate_lock;
use gatecheck::observability::{MetricsCollector, log_snapshot};
use gatecheck::pipeline::{CheckRegistry, GateError, PipelineOutcome, Stage, build_pipeline};
use gatecheck::plan::Plan;
use gatecheck::presets::{generate_preset, known_presets};
use gatecheck::report::GateReport;
use gatecheck::validation::validate_plan;
use serde_json::to_writer_pretty;
use tracing::{error, info, warn};
use tracing_subscriber::{EnvFilter, prelude::*};

/// Sentinel exit code when a check tool could not be launched at all.
const EXIT_EXECUTION_ERROR: i32 = 127;
/// Sentinel exit code for an invalid plan or project root (EX_CONFIG).
const EXIT_CONFIGURATION_ERROR: i32 = 78;

fn main() -> Result<()> {
    let cli = Cli::parse();
    let Cli { command, project } = cli;

    if command.is_some() && project.is_some() {
        Cli::command()
            .error(
                ErrorKind::ArgumentConflict,
                "A bare project path cannot be combined with subcommands",
            )
            .exit();
    }

    configure_tracing()?;

    if let Some(command) = command {
        match command {
            Commands::Run {
                plan,
                project,
                dry_run,
                print_metrics,
                metrics_json,
                metrics_prometheus,
                report,
            } => run_gate(RunOptions {
                plan_path: plan,
                project,
                dry_run,
                print_metrics,
                metrics_json,
                metrics_prometheus,
                report,
            }),
            Commands::ListChecks => {
                list_checks();
                Ok(())
            }
            Commands::Validate { plan } => validate_plan_cmd(plan),
            Commands::Lock { plan, output } => lock_plan(plan, output),
            Commands::Plan { action } => plan_command(action),
            Commands::Completions { shell } => {
                let mut cmd = Cli::command();
                let name = cmd.get_name().to_string();
                clap_complete::generate(shell, &mut cmd, name, &mut std::io::stdout());
                Ok(())
            }
        }
    } else {
        // Bare invocation: the classic fixed gate against the project tree.
        run_gate(RunOptions {
            plan_path: None,
            project,
            dry_run: false,
            print_metrics: false,
            metrics_json: None,
            metrics_prometheus: None,
            report: None,
        })
    }
}

fn configure_tracing() -> Result<()> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer())
        .try_init()
        .map_err(|err| anyhow!(err.to_string()))?;

    Ok(())
}

struct RunOptions {
    plan_path: Option<PathBuf>,
    project: Option<PathBuf>,
    dry_run: bool,
    print_metrics: bool,
    metrics_json: Option<PathBuf>,
    metrics_prometheus: Option<PathBuf>,
    report: Option<PathBuf>,
}

fn run_gate(options: RunOptions) -> Result<()> {
    let registry = build_registry();

    let plan = match &options.plan_path {
        Some(path) => match Plan::load(path) {
            Ok(plan) => plan,
            Err(err) => {
                error!("{err:#}");
                exit(EXIT_CONFIGURATION_ERROR);
            }
        },
        None => Plan::default_plan(),
    };

    let validation = validate_plan(&plan, &registry);
    for warning in &validation.warnings {
        warn!("{warning}");
    }
    if !validation.is_ok() {
        for error_msg in &validation.errors {
            error!("{error_msg}");
        }
        exit(EXIT_CONFIGURATION_ERROR);
    }

    let project_root = options
        .project
        .clone()
        .unwrap_or_else(|| plan.project.clone());

    if options.dry_run {
        info!(
            "Loaded plan with {} check(s) for project '{}'",
            plan.checks.len(),
            project_root.display()
        );
        return Ok(());
    }

    let mut runner = match build_pipeline(&registry, &plan.checks, project_root.clone()) {
        Ok(runner) => runner,
        Err(err) => {
            error!("{err:#}");
            exit(EXIT_CONFIGURATION_ERROR);
        }
    };

    let metrics_handle = runner.metrics();

    match runner.run() {
        Ok(outcome) => {
            let stages: Vec<Stage> = runner.stages().to_vec();
            emit_run_artifacts(&options, &metrics_handle, &project_root, &stages, &outcome)?;
            match outcome {
                PipelineOutcome::Passed { results } => {
                    for result in &results {
                        info!(
                            check = result.stage.as_str(),
                            duration_ms = result.duration_ms,
                            "Check passed"
                        );
                    }
                    info!("Gate passed: all {} check(s) succeeded", results.len());
                    Ok(())
                }
                PipelineOutcome::Failed { failure, completed } => {
                    error!(
                        check = failure.stage.as_str(),
                        stage = failure.ordinal,
                        exit_code = failure.code(),
                        checks_completed = completed.len(),
                        "Gate failed"
                    );
                    let diagnostics = failure.combined_output();
                    if !diagnostics.is_empty() {
                        eprintln!("{diagnostics}");
                    }
                    exit(failure.code());
                }
            }
        }
        Err(err @ GateError::Execution { .. }) => {
            error!("{err}");
            exit(EXIT_EXECUTION_ERROR);
        }
        Err(err @ GateError::Configuration(_)) => {
            error!("{err}");
            exit(EXIT_CONFIGURATION_ERROR);
        }
    }
}

fn emit_run_artifacts(
    options: &RunOptions,
    metrics: &MetricsCollector,
    project_root: &Path,
    stages: &[Stage],
    outcome: &PipelineOutcome,
) -> Result<()> {
    if options.print_metrics || options.metrics_json.is_some() || options.metrics_prometheus.is_some()
    {
        let snapshot = metrics.snapshot();
        if options.print_metrics {
            log_snapshot(&snapshot);
        }
        if let Some(path) = &options.metrics_json {
            if let Some(parent) = path.parent()
                && !parent.as_os_str().is_empty()
            {
                fs::create_dir_all(parent).with_context(|| {
                    format!("Failed to create metrics directory: {}", parent.display())
                })?;
            }
            let file = File::create(path)
                .with_context(|| format!("Failed to create metrics file: {}", path.display()))?;
            to_writer_pretty(file, &snapshot)
                .with_context(|| format!("Failed to write metrics JSON: {}", path.display()))?;
            info!(metrics = %path.display(), "Metrics JSON written");
        }
        if let Some(path) = &options.metrics_prometheus {
            if let Some(parent) = path.parent()
                && !parent.as_os_str().is_empty()
            {
                fs::create_dir_all(parent).with_context(|| {
                    format!("Failed to create metrics directory: {}", parent.display())
                })?;
            }
            fs::write(path, snapshot.to_prometheus()).with_context(|| {
                format!("Failed to write Prometheus metrics: {}", path.display())
            })?;
            info!(metrics = %path.display(), "Prometheus metrics written");
        }
    }

    if let Some(path) = &options.report {
        let report = GateReport::from_outcome(project_root, stages, outcome);
        report.write(path)?;
        info!(report = %path.display(), "Gate report written");
    }

    Ok(())
}

fn list_checks() {
    let registry = build_registry();
    println!("Available checks:");
    for name in registry.known_checks() {
        println!("- {name}");
    }
}

fn validate_plan_cmd(plan_path: PathBuf) -> Result<()> {
    let plan = Plan::load(&plan_path)?;
    let registry = build_registry();
    let report = validate_plan(&plan, &registry);

    for warning in &report.warnings {
        warn!(file = %plan_path.display(), "{warning}");
    }

    if report.is_ok() {
        info!(file = %plan_path.display(), "Plan validation passed");
        Ok(())
    } else {
        for error_msg in &report.errors {
            error!(file = %plan_path.display(), "{error_msg}");
        }
        Err(anyhow!(
            "Plan validation failed with {} error(s)",
            report.errors.len()
        ))
    }
}

fn lock_plan(plan_path: PathBuf, output_path: PathBuf) -> Result<()> {
    let plan = Plan::load(&plan_path)?;
    let registry = build_registry();
    let report = validate_plan(&plan, &registry);

    for warning in &report.warnings {
        warn!(file = %plan_path.display(), "{warning}");
    }

    if !report.is_ok() {
        for error_msg in &report.errors {
            error!(file = %plan_path.display(), "{error_msg}");
        }
        return Err(anyhow!(
            "Cannot generate lockfile due to {} validation error(s)",
            report.errors.len()
        ));
    }

    if let Some(parent) = output_path.parent()
        && !parent.as_os_str().is_empty()
    {
        fs::create_dir_all(parent).with_context(|| {
            format!("Failed to create lockfile directory: {}", parent.display())
        })?;
    }

    generate_lock(&plan, &registry, &output_path)?;
    info!(
        lockfile = %output_path.display(),
        "Lockfile generated successfully"
    );

    Ok(())
}

fn plan_command(command: PlanCommands) -> Result<()> {
    match command {
        PlanCommands::New { preset, output } => {
            let destination =
                output.unwrap_or_else(|| PathBuf::from(format!("plans/{preset}.yaml")));
            let generated = generate_preset(&preset, &destination)
                .with_context(|| format!("Known presets: {}", known_presets().join(", ")))?;
            info!(
                preset = %preset,
                path = %generated.display(),
                "Preset plan generated"
            );
            Ok(())
        }
        PlanCommands::Lint { plans } => lint_plans(&plans),
        PlanCommands::Diff { lhs, rhs } => diff_plans(&lhs, &rhs),
    }
}

fn lint_plans(plans: &[PathBuf]) -> Result<()> {
    if plans.is_empty() {
        bail!("No plan files supplied for linting");
    }

    let registry = build_registry();
    let mut failures = 0usize;

    for plan_path in plans {
        match Plan::load(plan_path) {
            Ok(plan) => {
                let report = validate_plan(&plan, &registry);
                for warning in &report.warnings {
                    warn!(file = %plan_path.display(), "{warning}");
                }
                if report.is_ok() {
                    info!(file = %plan_path.display(), "Lint passed");
                } else {
                    failures += 1;
                    for error_msg in &report.errors {
                        error!(file = %plan_path.display(), "{error_msg}");
                    }
                }
            }
            Err(err) => {
                failures += 1;
                error!(file = %plan_path.display(), "Failed to load plan: {err}");
            }
        }
    }

    if failures > 0 {
        bail!("Lint failed for {failures} plan(s)");
    }

    info!("All plan lint checks passed");
    Ok(())
}

fn diff_plans(lhs: &Path, rhs: &Path) -> Result<()> {
    let left = Plan::load(lhs)?;
    let right = Plan::load(rhs)?;

    let mut differences = Vec::new();

    if left.version != right.version {
        differences.push(format!(
            "Version mismatch: {} vs {}",
            left.version, right.version
        ));
    }

    if left.project != right.project {
        differences.push(format!(
            "Project differs: '{}' vs '{}'",
            left.project.display(),
            right.project.display()
        ));
    }

    let min_len = left.checks.len().min(right.checks.len());
    if left.checks.len() != right.checks.len() {
        differences.push(format!(
            "Check count differs: {} vs {}",
            left.checks.len(),
            right.checks.len()
        ));
    }

    for (idx, (l_check, r_check)) in left
        .checks
        .iter()
        .take(min_len)
        .zip(right.checks.iter())
        .enumerate()
    {
        if l_check.check != r_check.check {
            differences.push(format!(
                "Check {} name differs: '{}' vs '{}'",
                idx + 1,
                l_check.check,
                r_check.check
            ));
        }
        let l_params = l_check.params.clone().unwrap_or_default();
        let r_params = r_check.params.clone().unwrap_or_default();
        if l_params != r_params {
            differences.push(format!(
                "Check {} ('{}') parameters differ: {} vs {}",
                idx + 1,
                l_check.check,
                serde_json::to_string(&l_params).unwrap_or_else(|_| "<invalid>".into()),
                serde_json::to_string(&r_params).unwrap_or_else(|_| "<invalid>".into())
            ));
        }
    }

    if left.checks.len() > min_len {
        for (extra_idx, check) in left.checks[min_len..].iter().enumerate() {
            differences.push(format!(
                "Extra check in left plan at position {}: '{}'",
                min_len + extra_idx + 1,
                check.check
            ));
        }
    }

    if right.checks.len() > min_len {
        for (extra_idx, check) in right.checks[min_len..].iter().enumerate() {
            differences.push(format!(
                "Extra check in right plan at position {}: '{}'",
                min_len + extra_idx + 1,
                check.check
            ));
        }
    }

    if differences.is_empty() {
        info!(
            left = %lhs.display(),
            right = %rhs.display(),
            "Plans are equivalent"
        );
        println!("Plans match: {} == {}", lhs.display(), rhs.display());
        Ok(())
    } else {
        println!(
            "Plan differences between '{}' and '{}':",
            lhs.display(),
            rhs.display()
        );
        for diff in &differences {
            println!("- {diff}");
        }
        bail!("Plans differ ({} difference(s) found)", differences.len());
    }
}

fn build_registry() -> CheckRegistry {
    let mut registry = CheckRegistry::new();
    checks::register_defaults(&mut registry);
    registry
}

#[derive(Parser)]
#[command(
    name = "gatecheck",
    version,
    about = "Fail-fast release quality gate runner"
)]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,
    #[arg(
        value_name = "PROJECT",
        help = "Run the default gate against this project tree (defaults to the current directory)",
        value_hint = ValueHint::DirPath
    )]
    project: Option<PathBuf>,
}

#[derive(Subcommand)]
enum Commands {
    Run {
        plan: Option<PathBuf>,
        #[arg(long)]
        project: Option<PathBuf>,
        #[arg(long)]
        dry_run: bool,
        #[arg(long)]
        print_metrics: bool,
        #[arg(long = "metrics-json")]
        metrics_json: Option<PathBuf>,
        #[arg(long = "metrics-prometheus")]
        metrics_prometheus: Option<PathBuf>,
        #[arg(long)]
        report: Option<PathBuf>,
    },
    ListChecks,
    Validate {
        plan: PathBuf,
    },
    Lock {
        plan: PathBuf,
        output: PathBuf,
    },
    Plan {
        #[command(subcommand)]
        action: PlanCommands,
    },
    Completions {
        #[arg(value_enum)]
        shell: Shell,
    },
}

#[derive(Subcommand)]
enum PlanCommands {
    New {
        #[arg(long)]
        preset: String,
        #[arg(long)]
        output: Option<PathBuf>,
    },
    Lint {
        #[arg(required = true)]
        plans: Vec<PathBuf>,
    },
    Diff {
        lhs: PathBuf,
        rhs: PathBuf,
    },
}
