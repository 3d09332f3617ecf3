//! Seam between actions and the host HTTP router

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use crate::domain::action::Disposition;
use crate::domain::state::RequestSnapshot;

/// Future resolving to the terminal disposition of one request.
pub type DispatchFuture = Pin<Box<dyn Future<Output = Disposition> + Send>>;

/// Entry point a host router invokes for one matched request.
pub type DispatchFn = Arc<dyn Fn(RequestSnapshot) -> DispatchFuture + Send + Sync>;

/// Capability set a host router must expose for actions to bind into it.
///
/// Verb bindings match one method on one route. `use_any` installs the
/// dispatch as route-level middleware matching every method. The set is an
/// explicit closed interface; there is no name-based method lookup.
pub trait HostRouter {
    fn get(&mut self, route: &str, dispatch: DispatchFn);
    fn post(&mut self, route: &str, dispatch: DispatchFn);
    fn put(&mut self, route: &str, dispatch: DispatchFn);
    fn delete(&mut self, route: &str, dispatch: DispatchFn);
    fn use_any(&mut self, route: &str, dispatch: DispatchFn);
}
