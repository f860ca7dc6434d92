//! Typed error kinds shared across the workflow engine.
//!
//! Mirrors the taxonomy the engine actually needs to distinguish by kind —
//! callers match on variant to decide whether a failure aborted before any
//! resource was provisioned (`Schema`, `Populate`, `Validate`) or triggered
//! cleanup (`Run`, `Timeout`, `Dependency`).

use thiserror::Error;

/// All error kinds the workflow engine can report to a caller.
///
/// `Cleanup` is never returned as the workflow's terminal error (teardown
/// failures are logged and do not abort remaining hooks), but it is still a
/// variant here so loggers have one typed shape to format.
#[derive(Debug, Error)]
pub enum WorkflowError {
    #[error("{path}:{line}: {message}\n{pointer}")]
    Syntax {
        path: String,
        line: usize,
        message: String,
        pointer: String,
    },

    #[error("{0}")]
    Schema(String),

    #[error("Unresolved var \"${{{token}}}\" found in \"{context}\"")]
    UnresolvedVar { token: String, context: String },

    #[error("{0}")]
    Dependency(String),

    #[error("step \"{step}\" populate failed: {source}")]
    Populate { step: String, source: anyhow::Error },

    #[error("step \"{step}\" validate failed: {source}")]
    Validate { step: String, source: anyhow::Error },

    #[error("step \"{step}\": {source}")]
    Run { step: String, source: anyhow::Error },

    #[error("step \"{step}\" did not stop in specified timeout of {timeout}")]
    Timeout { step: String, timeout: String },

    #[error("cleanup hook failed: {0}")]
    Cleanup(String),
}

impl WorkflowError {
    /// Wraps `source` as a run error for `step`, unless `source` already
    /// carries the same step's run-error wrapping (idempotent per §4.7) —
    /// in which case the existing wrapper is returned unchanged rather than
    /// nested a second time.
    pub fn wrap_run(step: impl Into<String>, source: anyhow::Error) -> Self {
        let step = step.into();
        match source.downcast::<WorkflowError>() {
            Ok(WorkflowError::Run { step: inner_step, source: inner_source }) if inner_step == step => {
                WorkflowError::Run { step, source: inner_source }
            }
            Ok(other) => WorkflowError::Run { step, source: anyhow::Error::new(other) },
            Err(source) => WorkflowError::Run { step, source },
        }
    }
}
