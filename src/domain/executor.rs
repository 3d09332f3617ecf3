//! Drives one resolved chain against one request-scoped state

use std::any::Any;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;

use futures::FutureExt;
use futures::stream::{FuturesUnordered, StreamExt};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::domain::action::Action;
use crate::domain::chain::{Chain, ResolvedStep};
use crate::domain::error::StepError;
use crate::domain::state::ActionState;
use crate::domain::step::StepContext;

/// How the steps of one chain are scheduled.
///
/// `Sequential` treats the chain as a pipeline. `ConcurrentJoin` launches
/// every step at once and joins on completion, for handler code that
/// coordinates through the shared state instead of relying on ordering.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExecutionMode {
    /// Step N+1 starts only after step N succeeds; the first failure stops
    /// the chain.
    #[default]
    Sequential,
    /// All steps start together over the shared state and are joined at
    /// completion. The first failure observed wins; siblings are never
    /// cancelled and run to the end.
    ConcurrentJoin,
}

/// Aggregate result of one chain execution.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    Completed,
    Failed(StepError),
}

impl Outcome {
    pub fn is_completed(&self) -> bool {
        matches!(self, Self::Completed)
    }
}

/// Executes resolved chains under a configured scheduling mode.
#[derive(Debug, Clone, Copy, Default)]
pub struct ChainExecutor {
    mode: ExecutionMode,
}

impl ChainExecutor {
    pub fn new(mode: ExecutionMode) -> Self {
        Self { mode }
    }

    pub fn mode(&self) -> ExecutionMode {
        self.mode
    }

    /// Run every step of `chain` against `state`.
    ///
    /// `Completed` only if every step succeeded. There is no retry: a
    /// failing step's error propagates to the caller as-is.
    pub async fn execute(
        &self,
        chain: &Chain,
        action: Arc<Action>,
        state: Arc<ActionState>,
    ) -> Outcome {
        match self.mode {
            ExecutionMode::Sequential => self.run_sequential(chain, action, state).await,
            ExecutionMode::ConcurrentJoin => self.run_concurrent(chain, action, state).await,
        }
    }

    async fn run_sequential(
        &self,
        chain: &Chain,
        action: Arc<Action>,
        state: Arc<ActionState>,
    ) -> Outcome {
        for step in chain.steps() {
            debug!(step = step.name(), "running chain step");
            if let Err(error) = run_step(step, action.clone(), state.clone()).await {
                warn!(step = step.name(), %error, "chain step failed");
                return Outcome::Failed(error);
            }
        }
        Outcome::Completed
    }

    async fn run_concurrent(
        &self,
        chain: &Chain,
        action: Arc<Action>,
        state: Arc<ActionState>,
    ) -> Outcome {
        let mut pending: FuturesUnordered<_> = chain
            .steps()
            .iter()
            .map(|step| {
                let action = action.clone();
                let state = state.clone();
                async move { (step.name(), run_step(step, action, state).await) }
            })
            .collect();

        // Drain every step even after a failure; only the first failure
        // observed is reported.
        let mut first_failure: Option<StepError> = None;
        while let Some((name, result)) = pending.next().await {
            if let Err(error) = result {
                if first_failure.is_none() {
                    warn!(step = name, %error, "chain step failed");
                    first_failure = Some(error);
                } else {
                    debug!(step = name, %error, "sibling step failed after first failure");
                }
            }
        }

        match first_failure {
            Some(error) => Outcome::Failed(error),
            None => Outcome::Completed,
        }
    }
}

/// Invoke one step, converting a panic into a failure so the join always
/// observes it. The invocation itself is guarded too: a step function may
/// panic while building its future, before anything is awaited.
async fn run_step(
    step: &ResolvedStep,
    action: Arc<Action>,
    state: Arc<ActionState>,
) -> Result<(), StepError> {
    let ctx = StepContext { action, state };
    let future = match std::panic::catch_unwind(AssertUnwindSafe(|| (step.func())(ctx))) {
        Ok(future) => future,
        Err(panic) => return Err(panic_error(step.name(), panic.as_ref())),
    };

    match AssertUnwindSafe(future).catch_unwind().await {
        Ok(result) => result,
        Err(panic) => Err(panic_error(step.name(), panic.as_ref())),
    }
}

fn panic_error(step_name: &str, panic: &(dyn Any + Send)) -> StepError {
    StepError::new(format!(
        "step '{step_name}' panicked: {}",
        panic_message(panic)
    ))
}

fn panic_message(panic: &(dyn Any + Send)) -> &str {
    if let Some(message) = panic.downcast_ref::<&str>() {
        message
    } else if let Some(message) = panic.downcast_ref::<String>() {
        message
    } else {
        "unknown panic"
    }
}
