//! Axum-backed host router
//!
//! Every binding is installed as tower middleware rather than an axum
//! route, so a delegated disposition genuinely falls through to the rest
//! of the router the way `next()` does in middleware-style frameworks.

use std::sync::Arc;

use axum::extract::Request;
use axum::http::{Method as HttpMethod, StatusCode};
use axum::middleware::{self, Next};
use axum::response::{Html, IntoResponse, Response};
use axum::{Json, Router};
use serde::Serialize;
use tower_http::trace::TraceLayer;
use tracing::error;

use crate::domain::{Disposition, DispatchFn, HostRouter, RequestSnapshot, ResponseBody, StepError};

/// JSON body sent on the default error channel.
#[derive(Debug, Serialize)]
struct ErrorResponse {
    error: ErrorDetail,
}

#[derive(Debug, Serialize)]
struct ErrorDetail {
    message: String,
}

/// Host error channel: maps a failed step onto a response.
pub type ErrorHandler = Arc<dyn Fn(StepError) -> Response + Send + Sync>;

enum RouteMatch {
    /// One verb on exactly this path.
    Verb(HttpMethod),
    /// Any method on this path or below it.
    AnyMethod,
}

struct Binding {
    route: String,
    matcher: RouteMatch,
    dispatch: DispatchFn,
}

impl Binding {
    fn matches(&self, method: &HttpMethod, path: &str) -> bool {
        match &self.matcher {
            RouteMatch::Verb(bound) => bound == method && path == self.route,
            RouteMatch::AnyMethod => path_within(path, &self.route),
        }
    }
}

fn path_within(path: &str, route: &str) -> bool {
    route == "/"
        || path == route
        || path
            .strip_prefix(route)
            .is_some_and(|rest| rest.starts_with('/'))
}

/// Implements the action-facing router capability set over [`axum::Router`].
///
/// Bindings are collected first and layered in [`AxumHost::into_router`] so
/// they run in registration order.
pub struct AxumHost {
    bindings: Vec<Binding>,
    error_handler: ErrorHandler,
}

impl AxumHost {
    pub fn new() -> Self {
        Self {
            bindings: Vec::new(),
            error_handler: default_error_handler(),
        }
    }

    /// Replace the default 500-JSON error channel.
    pub fn with_error_handler(mut self, handler: ErrorHandler) -> Self {
        self.error_handler = handler;
        self
    }

    fn bind(&mut self, matcher: RouteMatch, route: &str, dispatch: DispatchFn) {
        self.bindings.push(Binding {
            route: route.to_string(),
            matcher,
            dispatch,
        });
    }

    /// Layer every binding onto `base` and finish the router.
    ///
    /// Layers wrap outside-in, so bindings are applied in reverse to keep
    /// the first-registered binding running first.
    pub fn into_router(self, base: Router) -> Router {
        let Self {
            bindings,
            error_handler,
        } = self;

        let mut router = base;
        for binding in bindings.into_iter().rev() {
            let binding = Arc::new(binding);
            let on_error = error_handler.clone();
            router = router.layer(middleware::from_fn(move |req: Request, next: Next| {
                let binding = binding.clone();
                let on_error = on_error.clone();
                async move { run_binding(binding, on_error, req, next).await }
            }));
        }
        router.layer(TraceLayer::new_for_http())
    }
}

impl Default for AxumHost {
    fn default() -> Self {
        Self::new()
    }
}

impl HostRouter for AxumHost {
    fn get(&mut self, route: &str, dispatch: DispatchFn) {
        self.bind(RouteMatch::Verb(HttpMethod::GET), route, dispatch);
    }

    fn post(&mut self, route: &str, dispatch: DispatchFn) {
        self.bind(RouteMatch::Verb(HttpMethod::POST), route, dispatch);
    }

    fn put(&mut self, route: &str, dispatch: DispatchFn) {
        self.bind(RouteMatch::Verb(HttpMethod::PUT), route, dispatch);
    }

    fn delete(&mut self, route: &str, dispatch: DispatchFn) {
        self.bind(RouteMatch::Verb(HttpMethod::DELETE), route, dispatch);
    }

    fn use_any(&mut self, route: &str, dispatch: DispatchFn) {
        self.bind(RouteMatch::AnyMethod, route, dispatch);
    }
}

async fn run_binding(
    binding: Arc<Binding>,
    on_error: ErrorHandler,
    req: Request,
    next: Next,
) -> Response {
    if !binding.matches(req.method(), req.uri().path()) {
        return next.run(req).await;
    }

    let snapshot = snapshot_request(&req);
    match (binding.dispatch)(snapshot).await {
        Disposition::Rendered(body) => body_response(body),
        Disposition::Interrupted(Some(body)) => body_response(body),
        Disposition::Interrupted(None) => StatusCode::NO_CONTENT.into_response(),
        Disposition::Delegated => next.run(req).await,
        Disposition::Failed(err) => {
            error!(route = %binding.route, %err, "handler chain failed");
            on_error(err)
        }
    }
}

fn snapshot_request(req: &Request) -> RequestSnapshot {
    let mut snapshot = RequestSnapshot::new(req.method().as_str(), req.uri().path());
    if let Some(query) = req.uri().query() {
        snapshot = snapshot.with_query(query);
    }
    for (name, value) in req.headers() {
        if let Ok(value) = value.to_str() {
            snapshot = snapshot.with_header(name.as_str(), value);
        }
    }
    snapshot
}

fn body_response(body: ResponseBody) -> Response {
    match body {
        ResponseBody::Json(value) => Json(value).into_response(),
        ResponseBody::Html(html) => Html(html).into_response(),
    }
}

fn default_error_handler() -> ErrorHandler {
    Arc::new(|err: StepError| {
        (
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(ErrorResponse {
                error: ErrorDetail {
                    message: err.message().to_string(),
                },
            }),
        )
            .into_response()
    })
}
