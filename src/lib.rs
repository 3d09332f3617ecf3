//! Actionflow
//!
//! Groups related route handlers ("actions") that share a step registry and
//! runs each matched request through a configurable chain of asynchronous
//! steps, then reconciles the outcome into a rendered response or a hand-off
//! to the next middleware.
//!
//! The core is transport-free; the `api` module adapts it onto axum through
//! the small [`domain::HostRouter`] capability set.

pub mod api;
pub mod cli;
pub mod config;
pub mod domain;
pub mod infrastructure;

pub use config::AppConfig;
pub use domain::{
    Action, ActionError, ActionHandler, ActionState, Chain, ChainExecutor, ChainSpec, Disposition,
    ExecutionMode, HandlerConfig, HostRouter, Method, Outcome, RequestSnapshot, ResponseBody,
    StepContext, StepError, StepFn, StepRef, StepRegistry, step,
};
