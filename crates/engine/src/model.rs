//! Runtime data model: the populated workflow tree the scheduler walks.
//!
//! This is deliberately the "after Populate" shape — `WorkflowState` carries
//! only the fields that are fixed for the lifetime of a run (§5: "Sources,
//! Vars, and Steps maps are written during populate and read-only
//! thereafter"). The builder operations in `workflow.rs` mutate a plain
//! `Workflow` before populate; once populated, steps are handed to the
//! scheduler behind an `Arc`.

use std::path::PathBuf;
use std::sync::{Arc, Mutex, Weak};
use std::time::Duration;

use indexmap::IndexMap;
use tokio_util::sync::CancellationToken;

use crate::cleanup::{CleanupManager, Hook};
use crate::step::RealStep;

/// A `Vars` entry after parsing (§3). `value` is `None` until populate
/// fills it (for non-`Required` entries without a default, the empty
/// string is used — see `populate.rs`).
#[derive(Debug, Clone, Default)]
pub struct VarDef {
    pub value: Option<String>,
    pub required: bool,
    pub description: Option<String>,
}

/// A node in the DAG. Exactly one variant of `real` is meaningful; the
/// "owning workflow" back-reference from §3 is threaded through hook calls
/// as `StepContext` rather than stored on the step itself, which avoids an
/// ownership cycle between `Workflow` and its `Steps` map.
#[derive(Debug)]
pub struct Step {
    pub name: String,
    pub timeout_raw: Option<String>,
    pub timeout: Duration,
    pub real: RealStep,
}

/// Fields fixed once a workflow has been populated, shared read-only with
/// every step task the scheduler spawns.
pub struct WorkflowState {
    pub name: Option<String>,
    pub project: Option<String>,
    pub zone: Option<String>,
    pub gcs_path: Option<String>,
    pub oauth_path: Option<String>,
    pub vars: IndexMap<String, VarDef>,
    pub sources: Mutex<IndexMap<String, String>>,

    pub id: String,
    pub workflow_dir: PathBuf,
    pub bucket: Option<String>,
    pub scratch_path: Option<String>,
    pub sources_path: Option<String>,
    pub logs_path: Option<String>,
    pub outs_path: Option<String>,

    /// Weak only: a child never outlives the `Run` call of its root, and
    /// must never mutate through this reference (§9).
    pub parent: Option<Weak<WorkflowState>>,

    pub cancel: CancellationToken,
    pub cleanup: Arc<CleanupManager>,
}

/// The authoring-time and populate-time workflow: a mutable builder before
/// `Populate`, read through `Arc<WorkflowState>` + `Arc<IndexMap<_, Step>>`
/// once populated and handed to the scheduler.
pub struct Workflow {
    pub name: Option<String>,
    pub project: Option<String>,
    pub zone: Option<String>,
    pub gcs_path: Option<String>,
    pub oauth_path: Option<String>,
    pub vars: IndexMap<String, VarDef>,
    pub sources: IndexMap<String, String>,
    pub steps: IndexMap<String, Step>,
    pub dependencies: IndexMap<String, Vec<String>>,

    pub workflow_dir: PathBuf,
    pub populated: bool,

    pub(crate) parent: Option<Weak<WorkflowState>>,
    pub(crate) inherited_cancel: Option<CancellationToken>,
    pub(crate) inherited_cleanup: Option<Arc<CleanupManager>>,

    /// Hooks added via `Workflow::add_cleanup_hook` before populate; flushed
    /// into the real `CleanupManager` as soon as one exists (§4.4).
    pub(crate) pending_cleanup: Vec<Hook>,

    pub state: Option<Arc<WorkflowState>>,
}

impl Default for Workflow {
    fn default() -> Self {
        Workflow {
            name: None,
            project: None,
            zone: None,
            gcs_path: None,
            oauth_path: None,
            vars: IndexMap::new(),
            sources: IndexMap::new(),
            steps: IndexMap::new(),
            dependencies: IndexMap::new(),
            workflow_dir: PathBuf::new(),
            populated: false,
            parent: None,
            inherited_cancel: None,
            inherited_cleanup: None,
            pending_cleanup: Vec::new(),
            state: None,
        }
    }
}
