//! JSON workflow loader (§4.5).
//!
//! Reads a workflow document from disk, decodes it, and recursively loads
//! every `SubWorkflow`/`IncludeWorkflow` reference relative to the parent's
//! directory. No variable substitution happens here — that is the
//! populator's job (§4.6).

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use flowgraph_types::{NestedWorkflowRef, StepDocument, VarEntry, WorkflowDocument, WorkflowError};
use indexmap::IndexMap;

use crate::model::{Step, VarDef, Workflow};
use crate::step::{NestedWorkflow, RealStep};
use flowgraph_util::parse_timeout;

/// Loads a workflow document from `path`, recursively hydrating any nested
/// Sub/Include workflows it references.
pub fn load_workflow_file(path: &Path) -> Result<Workflow> {
    let raw = std::fs::read_to_string(path).with_context(|| format!("reading workflow file {}", path.display()))?;
    let workflow_dir = path
        .parent()
        .map(Path::to_path_buf)
        .unwrap_or_else(|| PathBuf::from("."));
    load_workflow_str(&raw, &workflow_dir, path)
}

/// Parses `raw` as a workflow document rooted at `workflow_dir`. `source_path`
/// is used only for syntax-error reporting.
pub fn load_workflow_str(raw: &str, workflow_dir: &Path, source_path: &Path) -> Result<Workflow> {
    let document: WorkflowDocument = serde_json::from_str(raw).map_err(|err| syntax_error(source_path, raw, &err))?;
    build_workflow(document, workflow_dir)
}

fn syntax_error(path: &Path, raw: &str, err: &serde_json::Error) -> anyhow::Error {
    let line_no = err.line();
    let column = err.column();
    let offending_line = raw.lines().nth(line_no.saturating_sub(1)).unwrap_or("");
    let pointer = format!("{}^", " ".repeat(column.saturating_sub(1)));
    anyhow::Error::new(WorkflowError::Syntax {
        path: path.display().to_string(),
        line: line_no,
        message: format!("{}\n{}", err, offending_line),
        pointer,
    })
}

fn build_workflow(document: WorkflowDocument, workflow_dir: &Path) -> Result<Workflow> {
    let vars = document.vars.iter().map(|(k, v)| (k.clone(), var_def(v))).collect();
    let mut steps = IndexMap::with_capacity(document.steps.len());
    let mut dependencies = IndexMap::new();

    for (name, step_doc) in document.steps {
        let real = build_real_step(&step_doc, workflow_dir)
            .with_context(|| format!("loading step \"{name}\""))?;
        let timeout_raw = step_doc.timeout.clone();
        let timeout = parse_timeout(timeout_raw.as_deref()).map_err(|err| anyhow::anyhow!(err.to_string()))?;
        steps.insert(
            name.clone(),
            Step {
                name: name.clone(),
                timeout_raw,
                timeout,
                real,
            },
        );
    }

    for (name, deps) in document.dependencies {
        dependencies.insert(name, deps);
    }

    Ok(Workflow {
        name: document.name,
        project: document.project,
        zone: document.zone,
        gcs_path: document.gcs_path,
        oauth_path: document.oauth_path,
        vars,
        sources: document.sources,
        steps,
        dependencies,
        workflow_dir: workflow_dir.to_path_buf(),
        ..Workflow::default()
    })
}

fn var_def(entry: &VarEntry) -> VarDef {
    VarDef {
        value: entry.value().map(str::to_string),
        required: entry.required(),
        description: entry.description().map(str::to_string),
    }
}

fn build_real_step(doc: &StepDocument, workflow_dir: &Path) -> Result<RealStep> {
    let variants = doc.set_variant_names();
    if variants.len() != 1 {
        return Err(anyhow::Error::new(WorkflowError::Schema(format!(
            "step must set exactly one real-step variant, found {}: {:?}",
            variants.len(),
            variants
        ))));
    }

    let real = match variants[0] {
        "CreateDisks" => RealStep::CreateDisks(doc.create_disks.clone().unwrap()),
        "CreateInstances" => RealStep::CreateInstances(doc.create_instances.clone().unwrap()),
        "WaitForInstancesSignal" => RealStep::WaitForInstancesSignal(doc.wait_for_instances_signal.clone().unwrap()),
        "CreateImages" => RealStep::CreateImages(doc.create_images.clone().unwrap()),
        "DeleteResources" => RealStep::DeleteResources(doc.delete_resources.clone().unwrap()),
        "CopyGCSObjects" => RealStep::CopyGCSObjects(doc.copy_gcs_objects.clone().unwrap()),
        "SubWorkflow" => RealStep::SubWorkflow(Box::new(load_nested(doc.sub_workflow.as_ref().unwrap(), workflow_dir)?)),
        "IncludeWorkflow" => {
            RealStep::IncludeWorkflow(Box::new(load_nested(doc.include_workflow.as_ref().unwrap(), workflow_dir)?))
        }
        other => unreachable!("unexpected variant name {other}"),
    };
    Ok(real)
}

fn load_nested(reference: &NestedWorkflowRef, parent_dir: &Path) -> Result<NestedWorkflow> {
    let path = resolve_nested_path(parent_dir, &reference.path);
    let workflow = load_workflow_file(&path)?;
    let vars = reference.vars.iter().map(|(k, v)| (k.clone(), var_def(v))).collect();
    Ok(NestedWorkflow { path, vars, workflow })
}

fn resolve_nested_path(parent_dir: &Path, raw: &str) -> PathBuf {
    let candidate = Path::new(raw);
    if candidate.is_absolute() {
        candidate.to_path_buf()
    } else {
        parent_dir.join(candidate)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    fn write_temp(contents: &str) -> NamedTempFile {
        let mut file = NamedTempFile::new().unwrap();
        file.write_all(contents.as_bytes()).unwrap();
        file
    }

    #[test]
    fn loads_a_flat_workflow() {
        let file = write_temp(
            r#"{
                "Name": "build",
                "Steps": {
                    "s0": { "CreateDisks": {} }
                }
            }"#,
        );
        let workflow = load_workflow_file(file.path()).unwrap();
        assert_eq!(workflow.name.as_deref(), Some("build"));
        assert_eq!(workflow.steps.len(), 1);
        assert_eq!(workflow.steps["s0"].real.kind_name(), "CreateDisks");
    }

    #[test]
    fn rejects_a_step_with_zero_variants() {
        let file = write_temp(r#"{ "Steps": { "s0": {} } }"#);
        let err = load_workflow_file(file.path()).unwrap_err();
        assert!(err.to_string().contains("exactly one"));
    }

    #[test]
    fn rejects_a_step_with_multiple_variants() {
        let file = write_temp(r#"{ "Steps": { "s0": { "CreateDisks": {}, "CreateImages": {} } } }"#);
        let err = load_workflow_file(file.path()).unwrap_err();
        assert!(err.to_string().contains("exactly one"));
    }

    #[test]
    fn reports_a_syntax_error_with_line_and_pointer() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("broken.json");
        std::fs::write(&path, "{ \"Steps\": ").unwrap();
        let err = load_workflow_file(&path).unwrap_err();
        let message = err.to_string();
        assert!(message.contains(&path.display().to_string()));
    }

    #[test]
    fn loads_an_include_workflow_relative_to_parent_dir() {
        let dir = tempfile::tempdir().unwrap();
        let child_path = dir.path().join("child.json");
        std::fs::write(&child_path, r#"{ "Steps": { "c0": { "CreateDisks": {} } } }"#).unwrap();

        let parent_path = dir.path().join("parent.json");
        std::fs::write(
            &parent_path,
            r#"{ "Steps": { "s0": { "IncludeWorkflow": { "Path": "child.json" } } } }"#,
        )
        .unwrap();

        let workflow = load_workflow_file(&parent_path).unwrap();
        match &workflow.steps["s0"].real {
            RealStep::IncludeWorkflow(nested) => {
                assert_eq!(nested.workflow.steps.len(), 1);
            }
            other => panic!("expected IncludeWorkflow, got {other:?}"),
        }
    }
}
