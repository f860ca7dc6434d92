//! DAG workflow execution engine: loads a JSON workflow document, resolves
//! its variables, validates the dependency graph, and runs its steps
//! concurrently against a pluggable cloud-operation collaborator.
//!
//! The typical call sequence is [`loader::load_workflow_file`] to build a
//! [`model::Workflow`], then [`model::Workflow::run`] to execute it; each
//! lifecycle phase (`populate`/`validate`/`run`/`print`) can also be driven
//! individually.

pub mod cleanup;
pub mod loader;
pub mod model;
pub mod populate;
pub mod print;
pub mod scheduler;
pub mod step;
#[cfg(test)]
mod test_support;
pub mod validate;
pub mod workflow;

pub use cleanup::CleanupManager;
pub use model::{Step, VarDef, Workflow, WorkflowState};
pub use step::{CloudStepHandler, NestedWorkflow, NoopCloudStepHandler, RealStep, StepContext};

/// Installs a `tracing` subscriber reading its filter from `RUST_LOG`,
/// defaulting to `info`. Callers (a CLI `main`, a test harness) call this
/// once at startup; library code only ever emits through `tracing`.
pub fn init_tracing() {
    use tracing_subscriber::EnvFilter;

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let _ = tracing_subscriber::fmt().with_env_filter(filter).try_init();
}
