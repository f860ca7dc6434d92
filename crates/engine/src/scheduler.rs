//! Concurrent DAG execution (§4.7 execution model, §5).
//!
//! One cooperative task per step, all starting "waiting"; a step becomes
//! runnable once every dependency has completed successfully. A single
//! [`CancellationToken`](tokio_util::sync::CancellationToken) owned by the
//! workflow's state is closed on the first failure, which stops any
//! not-yet-started step from starting its variant's `run` and asks running
//! steps to wind down. Steps are driven concurrently with
//! `futures_util::future::join_all` rather than `tokio::task::spawn`,
//! since nested Sub/Include workflows need to borrow their parent's state
//! across recursive calls — spawning would force a `'static` bound this
//! tree doesn't have.

use std::collections::HashMap;
use std::future::Future;
use std::pin::Pin;
use std::sync::{Arc, Mutex};

use anyhow::Result;
use flowgraph_types::WorkflowError;
use flowgraph_util::format_duration;
use futures_util::future::join_all;
use serde_json::Value;
use tokio::sync::Notify;
use tracing::{info, warn};

use crate::model::{Workflow, WorkflowState};
use crate::step::{CloudStepHandler, RealStep, StepContext};

struct RunState {
    outcomes: Mutex<HashMap<String, bool>>,
    notify: Notify,
    first_error: Mutex<Option<anyhow::Error>>,
}

/// Runs every step of `workflow`, honoring dependencies, per-step
/// timeouts, and cancellation, then drains the cleanup manager before
/// returning. Boxed because Sub/Include steps recurse into this same
/// function over a borrowed child workflow.
pub fn run_workflow<'a>(
    workflow: &'a Workflow,
    handler: Arc<dyn CloudStepHandler>,
) -> Pin<Box<dyn Future<Output = Result<()>> + Send + 'a>> {
    run_workflow_with(workflow, handler, true)
}

/// Like [`run_workflow`], but lets an `IncludeWorkflow` step opt out of
/// draining: an Include child shares its parent's cleanup list (§4.8), so
/// only the enclosing root may drain it — draining here would tear down
/// resources the parent hasn't finished registering yet.
fn run_workflow_with<'a>(
    workflow: &'a Workflow,
    handler: Arc<dyn CloudStepHandler>,
    drain_cleanup: bool,
) -> Pin<Box<dyn Future<Output = Result<()>> + Send + 'a>> {
    Box::pin(async move {
        let state = workflow.state.clone().expect("run called before populate");
        let run_state = RunState {
            outcomes: Mutex::new(HashMap::new()),
            notify: Notify::new(),
            first_error: Mutex::new(None),
        };

        let step_futures: Vec<_> = workflow
            .steps
            .keys()
            .map(|name| run_one_step(name, workflow, &state, handler.clone(), &run_state))
            .collect();

        join_all(step_futures).await;

        if drain_cleanup {
            let cleanup_failures = state.cleanup.drain();
            if cleanup_failures > 0 {
                warn!(count = cleanup_failures, "one or more cleanup hooks failed during workflow teardown");
            }
        }

        match run_state.first_error.into_inner().expect("first_error mutex poisoned") {
            Some(err) => Err(err),
            None => Ok(()),
        }
    })
}

async fn run_one_step(
    name: &str,
    workflow: &Workflow,
    state: &Arc<WorkflowState>,
    handler: Arc<dyn CloudStepHandler>,
    run_state: &RunState,
) {
    let deps = workflow.dependencies.get(name);

    loop {
        let notified = run_state.notify.notified();

        if state.cancel.is_cancelled() {
            return;
        }

        if let Some(deps) = deps {
            let outcomes = run_state.outcomes.lock().expect("outcomes mutex poisoned");
            let blocked = deps.iter().any(|dep| outcomes.get(dep) == Some(&false));
            let ready = deps.iter().all(|dep| outcomes.get(dep) == Some(&true));
            drop(outcomes);

            if blocked {
                mark(run_state, name, false);
                run_state.notify.notify_waiters();
                return;
            }
            if ready {
                break;
            }
        } else {
            break;
        }

        notified.await;
    }

    let step = &workflow.steps[name];
    info!(step = name, run = step.real.kind_name(), "starting step");

    let ctx = StepContext {
        workflow: state.clone(),
        step_name: name.to_string(),
    };
    let timeout = step.timeout;
    let run_future = execute_real_step(&step.real, handler, &ctx);

    let outcome = tokio::select! {
        result = run_future => result,
        _ = tokio::time::sleep(timeout) => {
            state.cancel.cancel();
            Err(anyhow::Error::new(WorkflowError::Timeout {
                step: name.to_string(),
                timeout: format_duration(timeout),
            }))
        }
    };

    match outcome {
        Ok(_) => {
            mark(run_state, name, true);
            info!(step = name, "step succeeded");
        }
        Err(err) => {
            let wrapped = if matches!(err.downcast_ref::<WorkflowError>(), Some(WorkflowError::Timeout { .. })) {
                err
            } else {
                anyhow::Error::new(WorkflowError::wrap_run(name, err))
            };
            warn!(step = name, error = %wrapped, "step failed");
            mark(run_state, name, false);
            {
                let mut guard = run_state.first_error.lock().expect("first_error mutex poisoned");
                if guard.is_none() {
                    *guard = Some(wrapped);
                }
            }
            state.cancel.cancel();
        }
    }
    run_state.notify.notify_waiters();
}

fn mark(run_state: &RunState, name: &str, success: bool) {
    run_state
        .outcomes
        .lock()
        .expect("outcomes mutex poisoned")
        .insert(name.to_string(), success);
}

async fn execute_real_step(real: &RealStep, handler: Arc<dyn CloudStepHandler>, ctx: &StepContext) -> Result<Value> {
    match real {
        RealStep::SubWorkflow(nested) => {
            run_workflow_with(&nested.workflow, handler, true).await?;
            Ok(Value::Null)
        }
        RealStep::IncludeWorkflow(nested) => {
            run_workflow_with(&nested.workflow, handler, false).await?;
            Ok(Value::Null)
        }
        #[cfg(test)]
        RealStep::TestStep(spec) => {
            if let Some(sleep_for) = spec.sleep_for {
                tokio::time::sleep(sleep_for).await;
            }
            if let Some(message) = &spec.fail_with {
                return Err(anyhow::anyhow!(message.clone()));
            }
            Ok(Value::Null)
        }
        other => {
            let kind = other.kind_name();
            let payload = other.cloud_payload().cloned().unwrap_or(Value::Null);
            let ctx_owned = StepContext {
                workflow: ctx.workflow.clone(),
                step_name: ctx.step_name.clone(),
            };
            tokio::task::spawn_blocking(move || handler.run(&ctx_owned, kind, &payload))
                .await
                .map_err(|join_err| anyhow::anyhow!("step task panicked: {join_err}"))?
        }
    }
}
