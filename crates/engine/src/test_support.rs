//! Shared fixtures for this crate's inline test modules.

use std::sync::{Arc, Mutex};

use indexmap::IndexMap;
use tokio_util::sync::CancellationToken;

use crate::cleanup::CleanupManager;
use crate::model::WorkflowState;

/// A minimal, unlinked `WorkflowState` for tests that only need a context
/// to hand to a step hook, not a fully populated workflow.
pub fn bare_workflow_state() -> Arc<WorkflowState> {
    Arc::new(WorkflowState {
        name: Some("wf".into()),
        project: None,
        zone: None,
        gcs_path: None,
        oauth_path: None,
        vars: IndexMap::new(),
        sources: Mutex::new(IndexMap::new()),
        id: "id0".into(),
        workflow_dir: std::path::PathBuf::new(),
        bucket: None,
        scratch_path: None,
        sources_path: None,
        logs_path: None,
        outs_path: None,
        parent: None,
        cancel: CancellationToken::new(),
        cleanup: Arc::new(CleanupManager::new()),
    })
}
