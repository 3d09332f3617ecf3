//! Actions group related route handlers sharing a step registry

use std::sync::Arc;

use serde_json::{Map, Value};
use tracing::debug;

use crate::domain::chain::{Chain, ChainSpec};
use crate::domain::error::{ActionError, StepError};
use crate::domain::executor::{ChainExecutor, ExecutionMode, Outcome};
use crate::domain::router::{DispatchFn, HostRouter};
use crate::domain::state::{ActionState, RequestSnapshot, ResponseBody};
use crate::domain::step::StepRegistry;

/// Closed set of HTTP verbs a handler can bind to, plus the any-method
/// wildcard.
///
/// `Patch` can be named but has no counterpart in the [`HostRouter`]
/// capability set, so linking it fails.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Method {
    Get,
    Post,
    Put,
    Delete,
    Patch,
    Any,
}

impl Method {
    pub fn parse(value: &str) -> Result<Self, ActionError> {
        match value.to_ascii_lowercase().as_str() {
            "get" => Ok(Self::Get),
            "post" => Ok(Self::Post),
            "put" => Ok(Self::Put),
            "delete" => Ok(Self::Delete),
            "patch" => Ok(Self::Patch),
            "*" => Ok(Self::Any),
            _ => Err(ActionError::router_method_unsupported(value)),
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Get => "get",
            Self::Post => "post",
            Self::Put => "put",
            Self::Delete => "delete",
            Self::Patch => "patch",
            Self::Any => "*",
        }
    }
}

impl std::fmt::Display for Method {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Produces the whole response body for one handler, replacing the default
/// emission. Receives the accumulated output and the request state.
pub type RenderFn = Arc<dyn Fn(&Map<String, Value>, &ActionState) -> ResponseBody + Send + Sync>;

/// Produces a markup body from the accumulated output.
pub type TemplateFn = Arc<dyn Fn(&Map<String, Value>, &ActionState) -> String + Send + Sync>;

/// Terminal disposition of one dispatched request.
#[derive(Debug, Clone, PartialEq)]
pub enum Disposition {
    /// A body was produced through render, template, or default emission.
    Rendered(ResponseBody),
    /// A step took over the response; `Some` carries its prepared body,
    /// `None` means nothing is emitted at all.
    Interrupted(Option<ResponseBody>),
    /// Control goes to the next middleware in the host chain.
    Delegated,
    /// A step failed; the error goes to the host error channel verbatim.
    Failed(StepError),
}

/// Configuration for one handler binding.
#[derive(Clone, Default)]
pub struct HandlerConfig {
    chain: ChainSpec,
    render: Option<RenderFn>,
    template: Option<TemplateFn>,
}

impl HandlerConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_chain(mut self, chain: ChainSpec) -> Self {
        self.chain = chain;
        self
    }

    pub fn with_render(mut self, render: RenderFn) -> Self {
        self.render = Some(render);
        self
    }

    pub fn with_template(mut self, template: TemplateFn) -> Self {
        self.template = Some(template);
        self
    }
}

impl From<ChainSpec> for HandlerConfig {
    fn from(chain: ChainSpec) -> Self {
        Self::new().with_chain(chain)
    }
}

/// One route+method binding with its eagerly resolved step chain.
pub struct ActionHandler {
    method: Method,
    route: String,
    chain: Chain,
    render: Option<RenderFn>,
    template: Option<TemplateFn>,
}

impl ActionHandler {
    pub fn method(&self) -> Method {
        self.method
    }

    pub fn route(&self) -> &str {
        &self.route
    }

    pub fn chain(&self) -> &Chain {
        &self.chain
    }
}

impl std::fmt::Debug for ActionHandler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ActionHandler")
            .field("method", &self.method)
            .field("route", &self.route)
            .field("chain", &self.chain)
            .field("render", &self.render.is_some())
            .field("template", &self.template.is_some())
            .finish()
    }
}

/// A named group of route handlers sharing a step registry.
///
/// Mutated only at wiring time; read-only once requests are served.
pub struct Action {
    registry: StepRegistry,
    handlers: Vec<Arc<ActionHandler>>,
    template: Option<TemplateFn>,
    executor: ChainExecutor,
}

impl Action {
    pub fn new(registry: StepRegistry) -> Self {
        Self {
            registry,
            handlers: Vec::new(),
            template: None,
            executor: ChainExecutor::default(),
        }
    }

    /// Action-scope template, used when a handler has no override of its own.
    pub fn with_template(mut self, template: TemplateFn) -> Self {
        self.template = Some(template);
        self
    }

    pub fn with_execution_mode(mut self, mode: ExecutionMode) -> Self {
        self.executor = ChainExecutor::new(mode);
        self
    }

    pub fn registry(&self) -> &StepRegistry {
        &self.registry
    }

    pub fn handlers(&self) -> &[Arc<ActionHandler>] {
        &self.handlers
    }

    pub fn execution_mode(&self) -> ExecutionMode {
        self.executor.mode()
    }

    /// Register a handler for `method` on `route`.
    ///
    /// The chain is resolved eagerly, so a malformed specification or an
    /// unknown step name fails here and nothing is registered.
    pub fn on(
        &mut self,
        method: Method,
        route: &str,
        config: impl Into<HandlerConfig>,
    ) -> Result<(), ActionError> {
        let config = config.into();
        let chain = config.chain.resolve(&self.registry, route)?;

        self.handlers.push(Arc::new(ActionHandler {
            method,
            route: route.to_string(),
            chain,
            render: config.render,
            template: config.template,
        }));
        Ok(())
    }

    /// Bind every handler into the host router, in registration order.
    ///
    /// The wildcard method binds as router-level middleware; verbs without
    /// a counterpart in the router capability set fail the whole link.
    pub fn link<R: HostRouter>(self: &Arc<Self>, router: &mut R) -> Result<(), ActionError> {
        for handler in &self.handlers {
            let dispatch = self.dispatch_fn(handler.clone());
            match handler.method {
                Method::Get => router.get(&handler.route, dispatch),
                Method::Post => router.post(&handler.route, dispatch),
                Method::Put => router.put(&handler.route, dispatch),
                Method::Delete => router.delete(&handler.route, dispatch),
                Method::Any => router.use_any(&handler.route, dispatch),
                Method::Patch => {
                    return Err(ActionError::router_method_unsupported(handler.method.as_str()));
                }
            }
        }
        Ok(())
    }

    fn dispatch_fn(self: &Arc<Self>, handler: Arc<ActionHandler>) -> DispatchFn {
        let action = Arc::clone(self);
        Arc::new(move |request| {
            let action = action.clone();
            let handler = handler.clone();
            Box::pin(async move { action.dispatch(&handler, request).await })
        })
    }

    /// Run one matched request through the handler's chain and reconcile
    /// the outcome into a disposition.
    pub async fn dispatch(
        self: &Arc<Self>,
        handler: &ActionHandler,
        request: RequestSnapshot,
    ) -> Disposition {
        let state = Arc::new(ActionState::new(request));
        debug!(
            route = handler.route(),
            method = %handler.method(),
            request_id = %state.id(),
            "dispatching"
        );

        match self
            .executor
            .execute(&handler.chain, Arc::clone(self), Arc::clone(&state))
            .await
        {
            Outcome::Failed(error) => Disposition::Failed(error),
            Outcome::Completed if state.interrupt() => {
                Disposition::Interrupted(state.take_response().await)
            }
            Outcome::Completed => self.render(handler, &state).await,
        }
    }

    async fn render(&self, handler: &ActionHandler, state: &Arc<ActionState>) -> Disposition {
        if state.next() {
            return Disposition::Delegated;
        }

        let out = state.out().await;
        if let Some(render) = &handler.render {
            return Disposition::Rendered(render(&out, state));
        }
        if let Some(template) = handler.template.as_ref().or(self.template.as_ref()) {
            return Disposition::Rendered(ResponseBody::Html(template(&out, state)));
        }
        Disposition::Rendered(ResponseBody::Json(Value::Object(out)))
    }
}

impl std::fmt::Debug for Action {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Action")
            .field("registry", &self.registry)
            .field("handlers", &self.handlers)
            .field("template", &self.template.is_some())
            .field("executor", &self.executor)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::step::{StepContext, step};
    use serde_json::json;

    fn request() -> RequestSnapshot {
        RequestSnapshot::new("GET", "/articles")
    }

    fn arc_action(action: Action) -> Arc<Action> {
        Arc::new(action)
    }

    /// Records bindings instead of serving them.
    #[derive(Default)]
    struct RecordingRouter {
        bindings: Vec<(&'static str, String)>,
    }

    impl HostRouter for RecordingRouter {
        fn get(&mut self, route: &str, _dispatch: DispatchFn) {
            self.bindings.push(("get", route.to_string()));
        }
        fn post(&mut self, route: &str, _dispatch: DispatchFn) {
            self.bindings.push(("post", route.to_string()));
        }
        fn put(&mut self, route: &str, _dispatch: DispatchFn) {
            self.bindings.push(("put", route.to_string()));
        }
        fn delete(&mut self, route: &str, _dispatch: DispatchFn) {
            self.bindings.push(("delete", route.to_string()));
        }
        fn use_any(&mut self, route: &str, _dispatch: DispatchFn) {
            self.bindings.push(("use", route.to_string()));
        }
    }

    #[test]
    fn test_method_parse() {
        assert_eq!(Method::parse("GET").unwrap(), Method::Get);
        assert_eq!(Method::parse("post").unwrap(), Method::Post);
        assert_eq!(Method::parse("*").unwrap(), Method::Any);
        assert!(matches!(
            Method::parse("brew"),
            Err(ActionError::RouterMethodUnsupported { method }) if method == "brew"
        ));
    }

    #[test]
    fn test_on_registers_in_order() {
        let mut action = Action::new(StepRegistry::new());
        action.on(Method::Get, "/a", ChainSpec::Default).unwrap();
        action.on(Method::Post, "/b", ChainSpec::Default).unwrap();

        let routes: Vec<&str> = action.handlers().iter().map(|h| h.route()).collect();
        assert_eq!(routes, vec!["/a", "/b"]);
    }

    #[test]
    fn test_on_fails_fast_on_unknown_step() {
        let mut action = Action::new(StepRegistry::new());
        let result = action.on(Method::Get, "/a", ChainSpec::single("missing"));

        assert!(matches!(result, Err(ActionError::StepNotFound { .. })));
        assert!(action.handlers().is_empty());
    }

    #[test]
    fn test_link_binds_every_handler_in_registration_order() {
        let mut action = Action::new(StepRegistry::new());
        action.on(Method::Get, "/a", ChainSpec::Default).unwrap();
        action.on(Method::Delete, "/b", ChainSpec::Default).unwrap();
        action.on(Method::Any, "/c", ChainSpec::Default).unwrap();

        let action = arc_action(action);
        let mut router = RecordingRouter::default();
        action.link(&mut router).unwrap();

        assert_eq!(
            router.bindings,
            vec![
                ("get", "/a".to_string()),
                ("delete", "/b".to_string()),
                ("use", "/c".to_string()),
            ]
        );
    }

    #[test]
    fn test_link_rejects_unsupported_verb() {
        let mut action = Action::new(StepRegistry::new());
        action.on(Method::Patch, "/a", ChainSpec::Default).unwrap();

        let action = arc_action(action);
        let mut router = RecordingRouter::default();
        let result = action.link(&mut router);

        assert!(matches!(
            result,
            Err(ActionError::RouterMethodUnsupported { method }) if method == "patch"
        ));
    }

    #[tokio::test]
    async fn test_dispatch_default_emission_is_json_out() {
        let registry = StepRegistry::new().with_step(
            "fill",
            step(|ctx: StepContext| async move {
                ctx.state.insert_out("foo", json!("bar")).await;
                Ok(())
            }),
        );
        let mut action = Action::new(registry);
        action.on(Method::Get, "/", ChainSpec::single("fill")).unwrap();

        let action = arc_action(action);
        let handler = action.handlers()[0].clone();
        let disposition = action.dispatch(&handler, request()).await;

        assert_eq!(
            disposition,
            Disposition::Rendered(ResponseBody::Json(json!({"foo": "bar"})))
        );
    }

    #[tokio::test]
    async fn test_dispatch_prefers_render_override() {
        let mut action = Action::new(StepRegistry::new());
        let config = HandlerConfig::from(ChainSpec::Default)
            .with_render(Arc::new(|_out, _state| ResponseBody::Html("<b>custom</b>".into())))
            .with_template(Arc::new(|_out, _state| "handler template".into()));
        action.on(Method::Get, "/", config).unwrap();

        let action = arc_action(action);
        let handler = action.handlers()[0].clone();
        let disposition = action.dispatch(&handler, request()).await;

        assert_eq!(
            disposition,
            Disposition::Rendered(ResponseBody::Html("<b>custom</b>".into()))
        );
    }

    #[tokio::test]
    async fn test_dispatch_handler_template_beats_action_template() {
        let mut action = Action::new(StepRegistry::new())
            .with_template(Arc::new(|_out, _state| "action template".into()));
        let config = HandlerConfig::from(ChainSpec::Default)
            .with_template(Arc::new(|_out, _state| "handler template".into()));
        action.on(Method::Get, "/", config).unwrap();

        let action = arc_action(action);
        let handler = action.handlers()[0].clone();
        let disposition = action.dispatch(&handler, request()).await;

        assert_eq!(
            disposition,
            Disposition::Rendered(ResponseBody::Html("handler template".into()))
        );
    }

    #[tokio::test]
    async fn test_dispatch_falls_back_to_action_template() {
        let registry = StepRegistry::new().with_step(
            "fill",
            step(|ctx: StepContext| async move {
                ctx.state.insert_out("name", json!("vey")).await;
                Ok(())
            }),
        );
        let mut action = Action::new(registry).with_template(Arc::new(|out, _state| {
            format!("hello {}", out.get("name").and_then(Value::as_str).unwrap_or("?"))
        }));
        action.on(Method::Get, "/", ChainSpec::single("fill")).unwrap();

        let action = arc_action(action);
        let handler = action.handlers()[0].clone();
        let disposition = action.dispatch(&handler, request()).await;

        assert_eq!(
            disposition,
            Disposition::Rendered(ResponseBody::Html("hello vey".into()))
        );
    }

    #[tokio::test]
    async fn test_dispatch_next_delegates_without_body() {
        let registry = StepRegistry::new().with_step(
            "pass",
            step(|ctx: StepContext| async move {
                ctx.state.set_next();
                Ok(())
            }),
        );
        let mut action = Action::new(registry);
        action.on(Method::Get, "/", ChainSpec::single("pass")).unwrap();

        let action = arc_action(action);
        let handler = action.handlers()[0].clone();
        let disposition = action.dispatch(&handler, request()).await;

        assert_eq!(disposition, Disposition::Delegated);
    }

    #[tokio::test]
    async fn test_dispatch_interrupt_skips_render() {
        let registry = StepRegistry::new().with_step(
            "quiet",
            step(|ctx: StepContext| async move {
                ctx.state.set_interrupt();
                Ok(())
            }),
        );
        let mut action = Action::new(registry);
        // render override must never be reached
        let config = HandlerConfig::from(ChainSpec::single("quiet"))
            .with_render(Arc::new(|_out, _state| panic!("render called after interrupt")));
        action.on(Method::Get, "/", config).unwrap();

        let action = arc_action(action);
        let handler = action.handlers()[0].clone();
        let disposition = action.dispatch(&handler, request()).await;

        assert_eq!(disposition, Disposition::Interrupted(None));
    }

    #[tokio::test]
    async fn test_dispatch_interrupt_carries_prepared_body() {
        let registry = StepRegistry::new().with_step(
            "takeover",
            step(|ctx: StepContext| async move {
                ctx.state.respond(ResponseBody::Html("already sent".into())).await;
                Ok(())
            }),
        );
        let mut action = Action::new(registry);
        action.on(Method::Get, "/", ChainSpec::single("takeover")).unwrap();

        let action = arc_action(action);
        let handler = action.handlers()[0].clone();
        let disposition = action.dispatch(&handler, request()).await;

        assert_eq!(
            disposition,
            Disposition::Interrupted(Some(ResponseBody::Html("already sent".into())))
        );
    }

    #[tokio::test]
    async fn test_dispatch_failure_forwards_step_error() {
        let registry = StepRegistry::new()
            .with_step("fail", step(|_ctx| async { Err(StepError::new("db down")) }));
        let mut action = Action::new(registry);
        action.on(Method::Get, "/", ChainSpec::single("fail")).unwrap();

        let action = arc_action(action);
        let handler = action.handlers()[0].clone();
        let disposition = action.dispatch(&handler, request()).await;

        assert_eq!(disposition, Disposition::Failed(StepError::new("db down")));
    }

    #[tokio::test]
    async fn test_default_registry_default_chain_trivially_succeeds() {
        let mut action = Action::new(StepRegistry::new());
        action.on(Method::Get, "/", ChainSpec::Default).unwrap();

        let action = arc_action(action);
        let handler = action.handlers()[0].clone();
        assert_eq!(handler.chain().len(), 4);

        let disposition = action.dispatch(&handler, request()).await;
        assert_eq!(
            disposition,
            Disposition::Rendered(ResponseBody::Json(json!({})))
        );
    }
}
