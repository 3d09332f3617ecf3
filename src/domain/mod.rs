//! Domain layer - the handler-chain execution engine

pub mod action;
pub mod chain;
pub mod error;
pub mod executor;
pub mod router;
pub mod state;
pub mod step;

pub use action::{Action, ActionHandler, Disposition, HandlerConfig, Method, RenderFn, TemplateFn};
pub use chain::{Chain, ChainSpec, ResolvedStep, StepRef};
pub use error::{ActionError, StepError};
pub use executor::{ChainExecutor, ExecutionMode, Outcome};
pub use router::{DispatchFn, DispatchFuture, HostRouter};
pub use state::{ActionState, RequestSnapshot, ResponseBody};
pub use step::{DEFAULT_CHAIN, StepContext, StepFn, StepFuture, StepRegistry, step};
