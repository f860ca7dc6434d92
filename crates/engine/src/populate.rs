//! The populate pass (§4.6): resolves variables, materializes timeouts,
//! assigns ids, and runs every step's populate hook.
//!
//! Populate is depth-first over Sub/Include workflows and idempotent —
//! `Workflow::populated` guards re-entry so calling `Populate` twice on an
//! already-populated tree is a no-op that returns the cached state.

use std::sync::Arc;

use anyhow::Result;
use chrono::Utc;
use flowgraph_types::WorkflowError;
use indexmap::IndexMap;
use serde_json::{json, Value};
use tokio_util::sync::CancellationToken;

use crate::cleanup::CleanupManager;
use crate::model::{VarDef, Workflow, WorkflowState};
use crate::step::{CloudStepHandler, NestedWorkflow, RealStep, StepContext};
use flowgraph_util::substitute_tree;

/// How a nested workflow composes with its parent (§3).
#[derive(Clone, Copy, PartialEq, Eq)]
pub enum NestedKind {
    Include,
    Sub,
}

/// Populates `workflow` as a root workflow (no parent state).
pub fn populate_root(workflow: &mut Workflow, handler: &dyn CloudStepHandler) -> Result<Arc<WorkflowState>> {
    populate_inner(workflow, handler, None)
}

fn populate_inner(
    workflow: &mut Workflow,
    handler: &dyn CloudStepHandler,
    parent: Option<(Arc<WorkflowState>, NestedKind)>,
) -> Result<Arc<WorkflowState>> {
    if workflow.populated {
        return Ok(workflow
            .state
            .clone()
            .expect("populated workflow must carry cached state"));
    }

    let scaffold = build_scaffold(workflow, parent.as_ref());
    resolve_vars(workflow)?;

    let autovars = seed_autovars(workflow, &scaffold);
    let pairs = replacement_pairs(&autovars, &workflow.vars);
    substitute_top_level_fields(workflow, &pairs);
    substitute_sources(workflow, &pairs);

    let state = Arc::new(WorkflowState {
        name: workflow.name.clone(),
        project: workflow.project.clone(),
        zone: workflow.zone.clone(),
        gcs_path: workflow.gcs_path.clone(),
        oauth_path: workflow.oauth_path.clone(),
        vars: workflow.vars.clone(),
        sources: std::sync::Mutex::new(workflow.sources.clone()),
        id: scaffold.id.clone(),
        workflow_dir: workflow.workflow_dir.clone(),
        bucket: scaffold.bucket.clone(),
        scratch_path: scaffold.scratch_path.clone(),
        sources_path: scaffold.sources_path.clone(),
        logs_path: scaffold.logs_path.clone(),
        outs_path: scaffold.outs_path.clone(),
        parent: scaffold.parent_weak.clone(),
        cancel: scaffold.cancel.clone(),
        cleanup: scaffold.cleanup.clone(),
    });

    for hook in workflow.pending_cleanup.drain(..) {
        state.cleanup.push_boxed(hook);
    }

    for (name, step) in workflow.steps.iter_mut() {
        let step_autovars = with_step_name(&autovars, name);
        let step_pairs = replacement_pairs(&step_autovars, &state.vars);
        let ctx = StepContext {
            workflow: state.clone(),
            step_name: name.clone(),
        };
        populate_step(&mut step.real, handler, &ctx, &step_pairs)
            .map_err(|source| WorkflowError::Populate { step: name.clone(), source })?;
    }

    bubble_include_sources(workflow, &state)?;

    workflow.populated = true;
    workflow.state = Some(state.clone());
    Ok(state)
}

struct Scaffold {
    id: String,
    bucket: Option<String>,
    scratch_path: Option<String>,
    sources_path: Option<String>,
    logs_path: Option<String>,
    outs_path: Option<String>,
    parent_weak: Option<std::sync::Weak<WorkflowState>>,
    cancel: CancellationToken,
    cleanup: Arc<CleanupManager>,
}

fn build_scaffold(workflow: &Workflow, parent: Option<&(Arc<WorkflowState>, NestedKind)>) -> Scaffold {
    match parent {
        None => {
            let id = short_id();
            let project = workflow.project.clone().unwrap_or_default();
            let name = workflow.name.clone().unwrap_or_default();
            let date = Utc::now().format("%Y%m%d-%H%M%S").to_string();
            let bucket = format!("{project}-daisy-bkt");
            let scratch_path = format!("gs://{bucket}/daisy-{name}-{date}-{id}/");
            Scaffold {
                id,
                sources_path: Some(format!("{scratch_path}sources/")),
                logs_path: Some(format!("{scratch_path}logs/")),
                outs_path: Some(format!("{scratch_path}outs/")),
                bucket: Some(bucket),
                scratch_path: Some(scratch_path),
                parent_weak: None,
                cancel: CancellationToken::new(),
                cleanup: Arc::new(CleanupManager::new()),
            }
        }
        Some((parent_state, NestedKind::Include)) => Scaffold {
            id: parent_state.id.clone(),
            bucket: parent_state.bucket.clone(),
            scratch_path: parent_state.scratch_path.clone(),
            sources_path: parent_state.sources_path.clone(),
            logs_path: parent_state.logs_path.clone(),
            outs_path: parent_state.outs_path.clone(),
            parent_weak: Some(Arc::downgrade(parent_state)),
            cancel: parent_state.cancel.clone(),
            cleanup: parent_state.cleanup.clone(),
        },
        Some((parent_state, NestedKind::Sub)) => {
            let id = short_id();
            let project = workflow
                .project
                .clone()
                .or_else(|| parent_state.project.clone())
                .unwrap_or_default();
            let name = workflow.name.clone().unwrap_or_default();
            let date = Utc::now().format("%Y%m%d-%H%M%S").to_string();
            let bucket = format!("{project}-daisy-bkt");
            let scratch_path = format!("gs://{bucket}/daisy-{name}-{date}-{id}/");
            Scaffold {
                id,
                sources_path: Some(format!("{scratch_path}sources/")),
                logs_path: Some(format!("{scratch_path}logs/")),
                outs_path: Some(format!("{scratch_path}outs/")),
                bucket: Some(bucket),
                scratch_path: Some(scratch_path),
                parent_weak: Some(Arc::downgrade(parent_state)),
                cancel: parent_state.cancel.clone(),
                cleanup: Arc::new(CleanupManager::new()),
            }
        }
    }
}

fn short_id() -> String {
    uuid::Uuid::new_v4().simple().to_string()[..8].to_string()
}

fn resolve_vars(workflow: &mut Workflow) -> Result<()> {
    for (name, var) in workflow.vars.iter_mut() {
        if var.value.is_none() {
            if var.required {
                return Err(anyhow::Error::new(WorkflowError::Schema(format!(
                    "required var \"{name}\" was not supplied"
                ))));
            }
            var.value = Some(String::new());
        }
    }
    Ok(())
}

fn seed_autovars(workflow: &Workflow, scaffold: &Scaffold) -> IndexMap<String, String> {
    let mut autovars = IndexMap::new();
    autovars.insert("ID".to_string(), scaffold.id.clone());
    autovars.insert("NAME".to_string(), workflow.name.clone().unwrap_or_default());
    autovars.insert("ZONE".to_string(), workflow.zone.clone().unwrap_or_default());
    autovars.insert("PROJECT".to_string(), workflow.project.clone().unwrap_or_default());
    autovars.insert("WFDIR".to_string(), workflow.workflow_dir.display().to_string());
    autovars.insert("OUTSPATH".to_string(), scaffold.outs_path.clone().unwrap_or_default());
    autovars.insert("SOURCESPATH".to_string(), scaffold.sources_path.clone().unwrap_or_default());
    autovars.insert("LOGSPATH".to_string(), scaffold.logs_path.clone().unwrap_or_default());
    autovars.insert("DATE".to_string(), Utc::now().to_rfc3339());
    autovars.insert("USERNAME".to_string(), std::env::var("USER").unwrap_or_default());
    autovars
}

fn with_step_name(autovars: &IndexMap<String, String>, step_name: &str) -> IndexMap<String, String> {
    let mut overridden = autovars.clone();
    overridden.insert("NAME".to_string(), step_name.to_string());
    overridden
}

/// Autovars take precedence over user vars of the same name (§9 open
/// question, resolved in `DESIGN.md`).
fn replacement_pairs(autovars: &IndexMap<String, String>, vars: &IndexMap<String, VarDef>) -> Vec<(String, String)> {
    let mut pairs = Vec::with_capacity(autovars.len() + vars.len());
    for (name, value) in autovars {
        pairs.push((format!("${{{name}}}"), value.clone()));
    }
    for (name, var) in vars {
        if autovars.contains_key(name) {
            continue;
        }
        pairs.push((format!("${{{name}}}"), var.value.clone().unwrap_or_default()));
    }
    pairs
}

fn substitute_top_level_fields(workflow: &mut Workflow, pairs: &[(String, String)]) {
    let mut tree = json!({
        "name": workflow.name,
        "project": workflow.project,
        "zone": workflow.zone,
        "gcs_path": workflow.gcs_path,
        "oauth_path": workflow.oauth_path,
    });
    substitute_tree(&mut tree, pairs);

    workflow.name = opt_string(&tree["name"]);
    workflow.project = opt_string(&tree["project"]);
    workflow.zone = opt_string(&tree["zone"]);
    workflow.gcs_path = opt_string(&tree["gcs_path"]);
    workflow.oauth_path = opt_string(&tree["oauth_path"]);
}

fn opt_string(value: &Value) -> Option<String> {
    value.as_str().map(str::to_string)
}

fn substitute_sources(workflow: &mut Workflow, pairs: &[(String, String)]) {
    let mut tree = serde_json::to_value(&workflow.sources).unwrap_or(Value::Null);
    substitute_tree(&mut tree, pairs);
    if let Ok(sources) = serde_json::from_value::<IndexMap<String, String>>(tree) {
        workflow.sources = sources;
    }
}

fn populate_step(
    real: &mut RealStep,
    handler: &dyn CloudStepHandler,
    ctx: &StepContext,
    pairs: &[(String, String)],
) -> Result<()> {
    match real {
        RealStep::SubWorkflow(nested) => populate_nested(nested, handler, ctx, NestedKind::Sub),
        RealStep::IncludeWorkflow(nested) => populate_nested(nested, handler, ctx, NestedKind::Include),
        #[cfg(test)]
        RealStep::TestStep(_) => Ok(()),
        other => {
            let kind = other.kind_name();
            if let Some(payload) = other.cloud_payload_mut() {
                substitute_tree(payload, pairs);
                handler.populate(ctx, kind, payload)?;
            }
            Ok(())
        }
    }
}

fn populate_nested(
    nested: &mut NestedWorkflow,
    handler: &dyn CloudStepHandler,
    ctx: &StepContext,
    kind: NestedKind,
) -> Result<()> {
    for (name, var) in &nested.vars {
        nested
            .workflow
            .vars
            .entry(name.clone())
            .or_insert_with(|| var.clone());
    }
    populate_inner(&mut nested.workflow, handler, Some((ctx.workflow.clone(), kind)))?;
    Ok(())
}

fn bubble_include_sources(workflow: &mut Workflow, state: &Arc<WorkflowState>) -> Result<()> {
    for step in workflow.steps.values() {
        if let RealStep::IncludeWorkflow(nested) = &step.real {
            let child_sources = nested.workflow.sources.clone();
            let mut parent_sources = state.sources.lock().expect("sources mutex poisoned");
            for (name, value) in child_sources {
                if parent_sources.contains_key(&name) {
                    return Err(anyhow::Error::new(WorkflowError::Schema(format!(
                        "source \"{name}\" declared by both an include workflow and its parent"
                    ))));
                }
                parent_sources.insert(name, value);
            }
        }
    }
    Ok(())
}
