//! Canonical printed form (§6): `Print` renders a populated workflow as
//! indented JSON with a fixed key order, independent of how the original
//! document spelled its `Vars` entries or which steps left `Dependencies`
//! unset.

use anyhow::Result;
use indexmap::IndexMap;
use serde::Serialize;
use serde_json::Value;

use crate::model::{VarDef, Workflow};
use crate::step::{NestedWorkflow, RealStep};

#[derive(Serialize)]
struct PrintedWorkflow {
    #[serde(rename = "Name")]
    name: Option<String>,
    #[serde(rename = "Project")]
    project: Option<String>,
    #[serde(rename = "Zone")]
    zone: Option<String>,
    #[serde(rename = "GCSPath")]
    gcs_path: Option<String>,
    #[serde(rename = "Vars")]
    vars: IndexMap<String, PrintedVar>,
    #[serde(rename = "Steps")]
    steps: IndexMap<String, Value>,
    #[serde(rename = "Dependencies")]
    dependencies: IndexMap<String, Value>,
}

#[derive(Serialize)]
struct PrintedVar {
    #[serde(rename = "Value")]
    value: Option<String>,
    #[serde(rename = "Required")]
    required: bool,
    #[serde(rename = "Description")]
    description: Option<String>,
}

impl From<&VarDef> for PrintedVar {
    fn from(var: &VarDef) -> Self {
        PrintedVar {
            value: var.value.clone(),
            required: var.required,
            description: var.description.clone(),
        }
    }
}

/// Renders `workflow` in the canonical 2-space-indented form. `workflow`
/// must already be populated — `Workflow::print` populates first.
pub fn render(workflow: &Workflow) -> Result<String> {
    let vars = workflow.vars.iter().map(|(name, var)| (name.clone(), PrintedVar::from(var))).collect();

    let steps = workflow
        .steps
        .iter()
        .map(|(name, step)| {
            let mut doc = real_step_document(&step.real);
            doc["Timeout"] = Value::String(flowgraph_util::format_duration(step.timeout));
            (name.clone(), doc)
        })
        .collect();

    let dependencies = workflow
        .steps
        .keys()
        .map(|name| {
            let value = match workflow.dependencies.get(name) {
                Some(deps) => Value::Array(deps.iter().cloned().map(Value::String).collect()),
                None => Value::Object(serde_json::Map::new()),
            };
            (name.clone(), value)
        })
        .collect();

    let printed = PrintedWorkflow {
        name: workflow.name.clone(),
        project: workflow.project.clone(),
        zone: workflow.zone.clone(),
        gcs_path: workflow.gcs_path.clone(),
        vars,
        steps,
        dependencies,
    };

    Ok(serde_json::to_string_pretty(&printed)?)
}

fn real_step_document(real: &RealStep) -> Value {
    match real {
        RealStep::CreateDisks(v) => serde_json::json!({ "CreateDisks": v }),
        RealStep::CreateInstances(v) => serde_json::json!({ "CreateInstances": v }),
        RealStep::WaitForInstancesSignal(v) => serde_json::json!({ "WaitForInstancesSignal": v }),
        RealStep::CreateImages(v) => serde_json::json!({ "CreateImages": v }),
        RealStep::DeleteResources(v) => serde_json::json!({ "DeleteResources": v }),
        RealStep::CopyGCSObjects(v) => serde_json::json!({ "CopyGCSObjects": v }),
        RealStep::SubWorkflow(nested) => serde_json::json!({ "SubWorkflow": nested_document(nested) }),
        RealStep::IncludeWorkflow(nested) => serde_json::json!({ "IncludeWorkflow": nested_document(nested) }),
        #[cfg(test)]
        RealStep::TestStep(_) => serde_json::json!({}),
    }
}

fn nested_document(nested: &NestedWorkflow) -> Value {
    serde_json::json!({ "Path": nested.path.display().to_string() })
}
