//! Step functions and the per-action step registry

use std::collections::HashMap;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use crate::domain::action::Action;
use crate::domain::error::StepError;
use crate::domain::state::ActionState;

/// Future returned by a single step invocation
pub type StepFuture = Pin<Box<dyn Future<Output = Result<(), StepError>> + Send>>;

/// One unit of work in a handler chain.
///
/// A step succeeds by resolving `Ok(())` and fails by resolving a
/// [`StepError`]; the error value reaches the host channel verbatim.
pub type StepFn = Arc<dyn Fn(StepContext) -> StepFuture + Send + Sync>;

/// Call context handed to every step explicitly.
///
/// `action` gives the step access to the owning registry and any shared
/// helpers; `state` is the per-request context it reads and writes.
#[derive(Clone)]
pub struct StepContext {
    pub action: Arc<Action>,
    pub state: Arc<ActionState>,
}

/// Adapt an async closure into a [`StepFn`].
pub fn step<F, Fut>(f: F) -> StepFn
where
    F: Fn(StepContext) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<(), StepError>> + Send + 'static,
{
    Arc::new(move |ctx| Box::pin(f(ctx)))
}

/// Canonical default chain, in execution order.
pub const DEFAULT_CHAIN: [&str; 4] = ["validate", "input", "process", "output"];

/// Named steps shared by the handlers of one action.
///
/// Always carries the four [`DEFAULT_CHAIN`] keys as no-op pass-throughs
/// unless a supplied step overrides them.
#[derive(Clone)]
pub struct StepRegistry {
    steps: HashMap<String, StepFn>,
}

impl StepRegistry {
    /// Registry holding only the built-in pass-through steps.
    pub fn new() -> Self {
        Self::with_defaults(HashMap::new())
    }

    /// Default-merge: every key in `supplied` wins, built-ins fill the rest.
    pub fn with_defaults(supplied: HashMap<String, StepFn>) -> Self {
        let mut steps = Self::builtin_steps();
        steps.extend(supplied);
        Self { steps }
    }

    fn builtin_steps() -> HashMap<String, StepFn> {
        DEFAULT_CHAIN
            .iter()
            .map(|name| ((*name).to_string(), step(|_ctx| async { Ok(()) })))
            .collect()
    }

    /// Chainable insert, used at wiring time.
    pub fn with_step(mut self, name: impl Into<String>, step: StepFn) -> Self {
        self.steps.insert(name.into(), step);
        self
    }

    pub fn insert(&mut self, name: impl Into<String>, step: StepFn) {
        self.steps.insert(name.into(), step);
    }

    pub fn get(&self, name: &str) -> Option<&StepFn> {
        self.steps.get(name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.steps.contains_key(name)
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.steps.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.steps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }
}

impl Default for StepRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for StepRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mut names: Vec<&str> = self.names().collect();
        names.sort_unstable();
        f.debug_struct("StepRegistry").field("steps", &names).finish()
    }
}
