//! The polymorphic step contract (§4.3).
//!
//! A [`RealStep`] is a closed, tagged sum: exactly one variant is ever
//! constructed per step, and `populate`/`validate`/`run` dispatch to
//! whichever one it is. The six concrete cloud operations are opaque JSON
//! payloads routed through a pluggable [`CloudStepHandler`] — the engine
//! core depends only on that trait, never on a cloud SDK, mirroring the
//! way the registry-backed command runner this engine was adapted from
//! kept its transport pluggable behind one trait object.

use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use serde_json::Value;

use crate::model::WorkflowState;

/// Per-invocation context threaded into every hook call. Carries read
/// access to the fixed-after-populate workflow state and the
/// cancellation token the variant must observe during `run`.
pub struct StepContext {
    pub workflow: Arc<WorkflowState>,
    pub step_name: String,
}

impl StepContext {
    pub fn is_cancelled(&self) -> bool {
        self.workflow.cancel.is_cancelled()
    }

    /// Registers a teardown callback with the owning workflow's cleanup
    /// manager. Real steps call this after successfully provisioning a
    /// resource in `run` (§4.3).
    pub fn register_cleanup<F>(&self, hook: F)
    where
        F: FnOnce() -> Result<()> + Send + 'static,
    {
        self.workflow.cleanup.push(hook);
    }
}

/// Implemented by the collaborator that actually talks to the cloud
/// provider. Deliberately synchronous (per §1, out of scope for this
/// core) — a real implementation bridges to whatever async HTTP client it
/// uses internally, the same way a blocking trait method can wrap an
/// async call with `Handle::block_on` from inside `spawn_blocking`. The
/// scheduler always invokes these through `spawn_blocking` so a slow
/// implementation cannot stall other steps, and passes a context whose
/// `is_cancelled()` the implementation is expected to poll for prompt
/// cancellation.
pub trait CloudStepHandler: Send + Sync {
    fn populate(&self, ctx: &StepContext, kind: &str, payload: &mut Value) -> Result<()>;
    fn validate(&self, ctx: &StepContext, kind: &str, payload: &Value) -> Result<()>;
    fn run(&self, ctx: &StepContext, kind: &str, payload: &Value) -> Result<Value>;
}

/// Default handler used by tests and dry runs: populate/validate are
/// no-ops, and `run` just echoes the payload back, the same contract a
/// no-op command runner gives the rest of the scheduling machinery.
pub struct NoopCloudStepHandler;

impl CloudStepHandler for NoopCloudStepHandler {
    fn populate(&self, _ctx: &StepContext, _kind: &str, _payload: &mut Value) -> Result<()> {
        Ok(())
    }

    fn validate(&self, _ctx: &StepContext, _kind: &str, _payload: &Value) -> Result<()> {
        Ok(())
    }

    fn run(&self, _ctx: &StepContext, _kind: &str, payload: &Value) -> Result<Value> {
        Ok(payload.clone())
    }
}

/// A reference to a nested workflow document (`SubWorkflow` /
/// `IncludeWorkflow`). The composition semantics (merge vs. isolate) live
/// in `populate.rs`; this struct only holds the loaded child.
pub struct NestedWorkflow {
    pub path: std::path::PathBuf,
    pub vars: indexmap::IndexMap<String, crate::model::VarDef>,
    pub workflow: crate::model::Workflow,
}

impl std::fmt::Debug for NestedWorkflow {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("NestedWorkflow").field("path", &self.path).finish_non_exhaustive()
    }
}

/// Descriptor for the test-only variant used by the scheduler's own test
/// suite to exercise linear/diamond/failure/timeout scenarios without a
/// cloud collaborator.
#[cfg(test)]
#[derive(Debug, Clone, Default)]
pub struct TestStepSpec {
    pub sleep_for: Option<Duration>,
    pub fail_with: Option<String>,
}

/// The closed variant set named in §3.
#[derive(Debug)]
pub enum RealStep {
    CreateDisks(Value),
    CreateInstances(Value),
    WaitForInstancesSignal(Value),
    CreateImages(Value),
    DeleteResources(Value),
    CopyGCSObjects(Value),
    SubWorkflow(Box<NestedWorkflow>),
    IncludeWorkflow(Box<NestedWorkflow>),
    #[cfg(test)]
    TestStep(TestStepSpec),
}

impl RealStep {
    pub fn kind_name(&self) -> &'static str {
        match self {
            RealStep::CreateDisks(_) => "CreateDisks",
            RealStep::CreateInstances(_) => "CreateInstances",
            RealStep::WaitForInstancesSignal(_) => "WaitForInstancesSignal",
            RealStep::CreateImages(_) => "CreateImages",
            RealStep::DeleteResources(_) => "DeleteResources",
            RealStep::CopyGCSObjects(_) => "CopyGCSObjects",
            RealStep::SubWorkflow(_) => "SubWorkflow",
            RealStep::IncludeWorkflow(_) => "IncludeWorkflow",
            #[cfg(test)]
            RealStep::TestStep(_) => "TestStep",
        }
    }

    pub fn cloud_payload_mut(&mut self) -> Option<&mut Value> {
        match self {
            RealStep::CreateDisks(v)
            | RealStep::CreateInstances(v)
            | RealStep::WaitForInstancesSignal(v)
            | RealStep::CreateImages(v)
            | RealStep::DeleteResources(v)
            | RealStep::CopyGCSObjects(v) => Some(v),
            _ => None,
        }
    }

    pub fn cloud_payload(&self) -> Option<&Value> {
        match self {
            RealStep::CreateDisks(v)
            | RealStep::CreateInstances(v)
            | RealStep::WaitForInstancesSignal(v)
            | RealStep::CreateImages(v)
            | RealStep::DeleteResources(v)
            | RealStep::CopyGCSObjects(v) => Some(v),
            _ => None,
        }
    }
}
