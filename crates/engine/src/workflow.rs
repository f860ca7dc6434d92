//! Public builder and lifecycle operations on [`Workflow`] (§4.4).

use anyhow::Result;
use flowgraph_types::WorkflowError;

use crate::model::{VarDef, Workflow};
use crate::step::CloudStepHandler;

impl Workflow {
    /// Parses `path` into a fresh, unpopulated root workflow.
    pub fn load(path: &std::path::Path) -> Result<Workflow> {
        crate::loader::load_workflow_file(path)
    }

    /// Inserts a fresh step with no dependencies and no timeout override.
    /// Fails if `name` is already present.
    pub fn new_step(&mut self, name: impl Into<String>, real: crate::step::RealStep) -> Result<()> {
        let name = name.into();
        if self.steps.contains_key(&name) {
            return Err(anyhow::Error::new(WorkflowError::Schema(format!(
                "step \"{name}\" already exists"
            ))));
        }
        self.steps.insert(
            name.clone(),
            crate::model::Step {
                name,
                timeout_raw: None,
                timeout: flowgraph_util::parse_timeout(None).expect("default timeout always parses"),
                real,
            },
        );
        Ok(())
    }

    /// Appends each of `deps` to `a`'s dependency list, iff `a` and every
    /// dependency name an existing step. Idempotent: duplicate pairs
    /// coalesce into one edge.
    pub fn add_dependency(&mut self, a: &str, deps: impl IntoIterator<Item = String>) -> Result<()> {
        if !self.steps.contains_key(a) {
            return Err(anyhow::Error::new(WorkflowError::Dependency(format!(
                "cannot add dependency on unknown step \"{a}\""
            ))));
        }
        let deps: Vec<String> = deps.into_iter().collect();
        for dep in &deps {
            if !self.steps.contains_key(dep) {
                return Err(anyhow::Error::new(WorkflowError::Dependency(format!(
                    "step \"{a}\" depends on unknown step \"{dep}\""
                ))));
            }
        }
        let existing = self.dependencies.entry(a.to_string()).or_default();
        for dep in deps {
            if !existing.contains(&dep) {
                existing.push(dep);
            }
        }
        Ok(())
    }

    /// Sets the value of an existing `Vars` entry, or creates a new
    /// optional one if absent.
    pub fn add_var(&mut self, name: impl Into<String>, value: impl Into<String>) {
        let entry = self.vars.entry(name.into()).or_insert_with(VarDef::default);
        entry.value = Some(value.into());
    }

    /// Registers a teardown callback. Before populate the hook is queued
    /// and flushed into the real cleanup manager as soon as one exists;
    /// after populate it is registered immediately.
    pub fn add_cleanup_hook<F>(&mut self, hook: F)
    where
        F: FnOnce() -> Result<()> + Send + 'static,
    {
        match &self.state {
            Some(state) => state.cleanup.push(hook),
            None => self.pending_cleanup.push(Box::new(hook)),
        }
    }

    /// Resolves variables, assigns ids and scratch paths, and runs every
    /// step's populate hook. Idempotent.
    pub fn populate(&mut self, handler: &dyn CloudStepHandler) -> Result<()> {
        crate::populate::populate_root(self, handler)?;
        Ok(())
    }

    /// Checks the DAG for cycles and unresolved variables, then runs every
    /// step's validate hook in dependency order. Populates first if needed.
    pub fn validate(&mut self, handler: &dyn CloudStepHandler) -> Result<()> {
        self.populate(handler)?;
        crate::validate::validate_workflow(self, handler)
    }

    /// Validates, then executes every step concurrently subject to
    /// dependency, timeout, and cancellation semantics, draining cleanup
    /// hooks before returning.
    pub async fn run(&mut self, handler: std::sync::Arc<dyn CloudStepHandler>) -> Result<()> {
        self.validate(handler.as_ref())?;
        crate::scheduler::run_workflow(self, handler).await
    }

    /// Populates, then renders the canonical JSON form (§6).
    pub fn print(&mut self, handler: &dyn CloudStepHandler) -> Result<String> {
        self.populate(handler)?;
        crate::print::render(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::step::{NoopCloudStepHandler, RealStep};
    use serde_json::Value;

    #[test]
    fn new_step_rejects_duplicate_names() {
        let mut workflow = Workflow::default();
        workflow.new_step("s0", RealStep::CreateDisks(Value::Null)).unwrap();
        let err = workflow.new_step("s0", RealStep::CreateDisks(Value::Null)).unwrap_err();
        assert!(err.to_string().contains("already exists"));
    }

    #[test]
    fn add_dependency_is_idempotent() {
        let mut workflow = Workflow::default();
        workflow.new_step("a", RealStep::CreateDisks(Value::Null)).unwrap();
        workflow.new_step("b", RealStep::CreateDisks(Value::Null)).unwrap();
        workflow.add_dependency("a", ["b".to_string()]).unwrap();
        workflow.add_dependency("a", ["b".to_string()]).unwrap();
        assert_eq!(workflow.dependencies["a"], vec!["b".to_string()]);
    }

    #[test]
    fn add_dependency_rejects_unknown_step() {
        let mut workflow = Workflow::default();
        workflow.new_step("a", RealStep::CreateDisks(Value::Null)).unwrap();
        let err = workflow.add_dependency("a", ["missing".to_string()]).unwrap_err();
        assert!(err.to_string().contains("unknown step"));
    }

    #[test]
    fn add_var_creates_entry_when_absent() {
        let mut workflow = Workflow::default();
        workflow.add_var("x", "1");
        assert_eq!(workflow.vars["x"].value.as_deref(), Some("1"));
    }

    #[tokio::test]
    async fn run_executes_a_freshly_built_workflow() {
        let mut workflow = Workflow::default();
        workflow.name = Some("wf".into());
        workflow.new_step("s0", RealStep::CreateDisks(Value::Null)).unwrap();
        workflow.run(std::sync::Arc::new(NoopCloudStepHandler)).await.unwrap();
    }
}
