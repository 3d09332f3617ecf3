//! Chain specification and eager resolution against a step registry

use serde_json::Value;

use crate::domain::error::ActionError;
use crate::domain::step::{DEFAULT_CHAIN, StepFn, StepRegistry};

/// Reference to one step: by registry name or as a direct callable.
#[derive(Clone)]
pub enum StepRef {
    Named(String),
    Direct(StepFn),
}

impl StepRef {
    pub fn named(name: impl Into<String>) -> Self {
        Self::Named(name.into())
    }

    pub fn direct(step: StepFn) -> Self {
        Self::Direct(step)
    }
}

impl From<&str> for StepRef {
    fn from(name: &str) -> Self {
        Self::named(name)
    }
}

impl From<String> for StepRef {
    fn from(name: String) -> Self {
        Self::Named(name)
    }
}

impl From<StepFn> for StepRef {
    fn from(step: StepFn) -> Self {
        Self::Direct(step)
    }
}

impl std::fmt::Debug for StepRef {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Named(name) => f.debug_tuple("Named").field(name).finish(),
            Self::Direct(_) => f.debug_tuple("Direct").field(&"<step>").finish(),
        }
    }
}

/// How a handler describes its chain.
///
/// `Default` stands for an absent specification and resolves to the
/// canonical `validate -> input -> process -> output` sequence.
#[derive(Debug, Clone, Default)]
pub enum ChainSpec {
    #[default]
    Default,
    Single(StepRef),
    Sequence(Vec<StepRef>),
}

impl ChainSpec {
    pub fn single(step: impl Into<StepRef>) -> Self {
        Self::Single(step.into())
    }

    pub fn sequence<I, R>(steps: I) -> Self
    where
        I: IntoIterator<Item = R>,
        R: Into<StepRef>,
    {
        Self::Sequence(steps.into_iter().map(Into::into).collect())
    }

    /// Build a specification from untyped configuration data.
    ///
    /// `null` means absent, a string names one registry step, an array of
    /// strings names a sequence. Anything else is malformed.
    pub fn from_value(value: &Value, route: &str) -> Result<Self, ActionError> {
        match value {
            Value::Null => Ok(Self::Default),
            Value::String(name) => Ok(Self::single(name.as_str())),
            Value::Array(items) => {
                let mut refs = Vec::with_capacity(items.len());
                for item in items {
                    match item {
                        Value::String(name) => refs.push(StepRef::named(name)),
                        _ => return Err(ActionError::chain_spec_invalid(route)),
                    }
                }
                Ok(Self::Sequence(refs))
            }
            _ => Err(ActionError::chain_spec_invalid(route)),
        }
    }

    /// Resolve into a concrete ordered chain.
    ///
    /// Performed once at handler construction; an unknown name fails the
    /// whole registration. `route` only feeds error context.
    pub fn resolve(&self, registry: &StepRegistry, route: &str) -> Result<Chain, ActionError> {
        let refs: Vec<StepRef> = match self {
            Self::Default => DEFAULT_CHAIN.iter().map(|name| StepRef::named(*name)).collect(),
            Self::Single(step_ref) => vec![step_ref.clone()],
            Self::Sequence(step_refs) => step_refs.clone(),
        };

        let mut steps = Vec::with_capacity(refs.len());
        for (index, step_ref) in refs.into_iter().enumerate() {
            let resolved = match step_ref {
                StepRef::Named(name) => {
                    let func = registry
                        .get(&name)
                        .cloned()
                        .ok_or_else(|| ActionError::step_not_found(&name, route))?;
                    ResolvedStep { name, func }
                }
                StepRef::Direct(func) => ResolvedStep {
                    name: format!("step-{index}"),
                    func,
                },
            };
            steps.push(resolved);
        }

        Ok(Chain { steps })
    }
}

/// One resolved chain entry: the bound callable plus a label for logging.
#[derive(Clone)]
pub struct ResolvedStep {
    name: String,
    func: StepFn,
}

impl ResolvedStep {
    pub fn name(&self) -> &str {
        &self.name
    }

    pub(crate) fn func(&self) -> &StepFn {
        &self.func
    }
}

/// Homogeneous ordered sequence of callable steps for one handler.
#[derive(Clone, Default)]
pub struct Chain {
    steps: Vec<ResolvedStep>,
}

impl Chain {
    pub fn steps(&self) -> &[ResolvedStep] {
        &self.steps
    }

    pub fn step_names(&self) -> Vec<&str> {
        self.steps.iter().map(ResolvedStep::name).collect()
    }

    pub fn len(&self) -> usize {
        self.steps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }
}

impl std::fmt::Debug for Chain {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Chain").field("steps", &self.step_names()).finish()
    }
}
