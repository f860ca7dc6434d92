//! DAG and schema validation (§4.7, first half).
//!
//! Two independent checks run before any step's `run` hook fires: the
//! dependency graph must be acyclic (depth-first, grey/black marking — a
//! back edge is a cycle), and every populated string field must be free of
//! unresolved `${token}` references. Variant `validate` hooks then run in
//! dependency order.

use std::collections::HashMap;

use anyhow::Result;
use flowgraph_types::WorkflowError;
use serde_json::json;

use crate::model::Workflow;
use crate::step::{CloudStepHandler, RealStep, StepContext};
use flowgraph_util::find_unresolved_tokens;

#[derive(Clone, Copy, PartialEq, Eq)]
enum Mark {
    Grey,
    Black,
}

/// Detects cycles in `dependencies` and returns the steps in a valid
/// execution order (dependencies before dependents).
pub fn topological_order(steps: &indexmap::IndexMap<String, crate::model::Step>, dependencies: &indexmap::IndexMap<String, Vec<String>>) -> Result<Vec<String>> {
    for (name, deps) in dependencies {
        if !steps.contains_key(name) {
            return Err(anyhow::Error::new(WorkflowError::Dependency(format!(
                "dependency entry for unknown step \"{name}\""
            ))));
        }
        for dep in deps {
            if !steps.contains_key(dep) {
                return Err(anyhow::Error::new(WorkflowError::Dependency(format!(
                    "step \"{name}\" depends on unknown step \"{dep}\""
                ))));
            }
        }
    }

    let mut marks: HashMap<&str, Mark> = HashMap::new();
    let mut order = Vec::with_capacity(steps.len());

    for name in steps.keys() {
        visit(name, steps, dependencies, &mut marks, &mut order)?;
    }

    Ok(order)
}

fn visit<'a>(
    name: &'a str,
    steps: &'a indexmap::IndexMap<String, crate::model::Step>,
    dependencies: &'a indexmap::IndexMap<String, Vec<String>>,
    marks: &mut HashMap<&'a str, Mark>,
    order: &mut Vec<String>,
) -> Result<()> {
    match marks.get(name) {
        Some(Mark::Black) => return Ok(()),
        Some(Mark::Grey) => {
            return Err(anyhow::Error::new(WorkflowError::Dependency(format!(
                "dependency cycle detected at step \"{name}\""
            ))));
        }
        None => {}
    }

    marks.insert(name, Mark::Grey);
    if let Some(deps) = dependencies.get(name) {
        for dep in deps {
            let dep_key = steps.get_key_value(dep.as_str()).map(|(k, _)| k.as_str()).unwrap_or(dep.as_str());
            visit(dep_key, steps, dependencies, marks, order)?;
        }
    }
    marks.insert(name, Mark::Black);
    order.push(name.to_string());
    Ok(())
}

/// Runs schema- and DAG-level validation plus every step's variant
/// `validate` hook, in dependency order. Recurses into nested Sub/Include
/// workflows.
pub fn validate_workflow(workflow: &Workflow, handler: &dyn CloudStepHandler) -> Result<()> {
    let state = workflow
        .state
        .clone()
        .ok_or_else(|| anyhow::anyhow!("validate called before populate"))?;

    if let Some(name) = &state.name {
        if !is_valid_workflow_name(name) {
            return Err(anyhow::Error::new(WorkflowError::Schema(format!(
                "Name \"{name}\" does not match ^[a-zA-Z][a-zA-Z0-9-]*$"
            ))));
        }
    }

    check_unresolved_vars(workflow)?;

    let order = topological_order(&workflow.steps, &workflow.dependencies)?;

    for name in &order {
        let step = &workflow.steps[name];
        let ctx = StepContext {
            workflow: state.clone(),
            step_name: name.clone(),
        };
        validate_step(&step.real, handler, &ctx)
            .map_err(|source| WorkflowError::Validate { step: name.clone(), source })?;
    }

    Ok(())
}

fn validate_step(real: &RealStep, handler: &dyn CloudStepHandler, ctx: &StepContext) -> Result<()> {
    match real {
        RealStep::SubWorkflow(nested) | RealStep::IncludeWorkflow(nested) => validate_workflow(&nested.workflow, handler),
        #[cfg(test)]
        RealStep::TestStep(_) => Ok(()),
        other => {
            if let Some(payload) = other.cloud_payload() {
                handler.validate(ctx, other.kind_name(), payload)?;
            }
            Ok(())
        }
    }
}

fn check_unresolved_vars(workflow: &Workflow) -> Result<()> {
    let state = workflow.state.as_ref().expect("validate called before populate");
    let mut tree = json!({
        "name": state.name,
        "project": state.project,
        "zone": state.zone,
        "gcs_path": state.gcs_path,
        "oauth_path": state.oauth_path,
        "sources": *state.sources.lock().expect("sources mutex poisoned"),
    });

    for step in workflow.steps.values() {
        if let Some(payload) = step.real.cloud_payload() {
            tree[&step.name] = payload.clone();
        }
    }

    if let Some((token, context)) = find_unresolved_tokens(&tree).into_iter().next() {
        return Err(anyhow::Error::new(WorkflowError::UnresolvedVar { token, context }));
    }
    Ok(())
}

fn is_valid_workflow_name(name: &str) -> bool {
    let mut chars = name.chars();
    match chars.next() {
        Some(c) if c.is_ascii_alphabetic() => {}
        _ => return false,
    }
    chars.all(|c| c.is_ascii_alphanumeric() || c == '-')
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::step::NoopCloudStepHandler;
    use indexmap::indexmap;

    fn step(real: RealStep) -> crate::model::Step {
        crate::model::Step {
            name: String::new(),
            timeout_raw: None,
            timeout: std::time::Duration::from_secs(600),
            real,
        }
    }

    #[test]
    fn detects_a_simple_cycle() {
        let steps = indexmap! {
            "a".to_string() => step(RealStep::CreateDisks(serde_json::Value::Null)),
            "b".to_string() => step(RealStep::CreateDisks(serde_json::Value::Null)),
        };
        let dependencies = indexmap! {
            "a".to_string() => vec!["b".to_string()],
            "b".to_string() => vec!["a".to_string()],
        };
        let err = topological_order(&steps, &dependencies).unwrap_err();
        assert!(err.to_string().contains("cycle"));
    }

    #[test]
    fn orders_a_diamond_dependencies_before_dependents() {
        let steps = indexmap! {
            "s0".to_string() => step(RealStep::CreateDisks(serde_json::Value::Null)),
            "s1".to_string() => step(RealStep::CreateDisks(serde_json::Value::Null)),
            "s2".to_string() => step(RealStep::CreateDisks(serde_json::Value::Null)),
            "s3".to_string() => step(RealStep::CreateDisks(serde_json::Value::Null)),
        };
        let dependencies = indexmap! {
            "s1".to_string() => vec!["s0".to_string()],
            "s2".to_string() => vec!["s0".to_string()],
            "s3".to_string() => vec!["s1".to_string(), "s2".to_string()],
        };
        let order = topological_order(&steps, &dependencies).unwrap();
        let pos = |n: &str| order.iter().position(|s| s == n).unwrap();
        assert!(pos("s0") < pos("s1"));
        assert!(pos("s0") < pos("s2"));
        assert!(pos("s1") < pos("s3"));
        assert!(pos("s2") < pos("s3"));
    }

    #[test]
    fn rejects_dependency_on_unknown_step() {
        let steps = indexmap! {
            "a".to_string() => step(RealStep::CreateDisks(serde_json::Value::Null)),
        };
        let dependencies = indexmap! {
            "a".to_string() => vec!["missing".to_string()],
        };
        let err = topological_order(&steps, &dependencies).unwrap_err();
        assert!(err.to_string().contains("unknown step"));
    }

    #[test]
    fn unresolved_var_is_reported_with_token_and_context() {
        let mut workflow = Workflow::default();
        workflow.project = Some("${var}".into());
        crate::populate::populate_root(&mut workflow, &NoopCloudStepHandler).unwrap();
        let err = validate_workflow(&workflow, &NoopCloudStepHandler).unwrap_err();
        assert_eq!(err.to_string(), "Unresolved var \"${var}\" found in \"${var}\"");
    }
}
