pub mod checks;
pub mod lockfile;
pub mod observability;
pub mod pipeline;
pub mod plan;
pub mod presets;
pub mod report;
pub mod validation;

pub use pipeline::{
    CheckRegistry, GateError, GateRunner, PipelineOutcome, RunResult, RunState, Stage,
    build_pipeline,
};
pub use plan::Plan;
