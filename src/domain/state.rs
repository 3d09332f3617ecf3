//! Per-request state threaded through a handler chain

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};

use serde_json::{Map, Value};
use tokio::sync::RwLock;
use uuid::Uuid;

/// Transport-free view of an inbound request.
///
/// The core never interprets these fields; they are captured by the host
/// adapter and passed through for steps that want to look at them.
#[derive(Debug, Clone, Default)]
pub struct RequestSnapshot {
    method: String,
    path: String,
    query: Option<String>,
    headers: HashMap<String, String>,
}

impl RequestSnapshot {
    pub fn new(method: impl Into<String>, path: impl Into<String>) -> Self {
        Self {
            method: method.into(),
            path: path.into(),
            query: None,
            headers: HashMap::new(),
        }
    }

    pub fn with_query(mut self, query: impl Into<String>) -> Self {
        self.query = Some(query.into());
        self
    }

    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.insert(name.into().to_ascii_lowercase(), value.into());
        self
    }

    pub fn method(&self) -> &str {
        &self.method
    }

    pub fn path(&self) -> &str {
        &self.path
    }

    pub fn query(&self) -> Option<&str> {
        self.query.as_deref()
    }

    /// Header lookup, case-insensitive on the name.
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(&name.to_ascii_lowercase()).map(String::as_str)
    }

    pub fn headers(&self) -> &HashMap<String, String> {
        &self.headers
    }
}

/// Body emitted once a completed chain renders
#[derive(Debug, Clone, PartialEq)]
pub enum ResponseBody {
    /// Structured emission, the default when no template applies
    Json(Value),
    /// Template output, sent as a markup body
    Html(String),
}

/// Mutable context shared by every step of one in-flight request.
///
/// `out` is the single shared resource among a chain's steps. Under
/// concurrent-join execution writes to it are last-write-wins; there is no
/// coordination beyond the lock protecting individual accesses.
#[derive(Debug)]
pub struct ActionState {
    id: Uuid,
    request: RequestSnapshot,
    out: RwLock<Map<String, Value>>,
    next: AtomicBool,
    interrupt: AtomicBool,
    response: RwLock<Option<ResponseBody>>,
}

impl ActionState {
    pub fn new(request: RequestSnapshot) -> Self {
        Self {
            id: Uuid::new_v4(),
            request,
            out: RwLock::new(Map::new()),
            next: AtomicBool::new(false),
            interrupt: AtomicBool::new(false),
            response: RwLock::new(None),
        }
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn request(&self) -> &RequestSnapshot {
        &self.request
    }

    /// Store one output value under `key`.
    pub async fn insert_out(&self, key: impl Into<String>, value: Value) {
        self.out.write().await.insert(key.into(), value);
    }

    pub async fn get_out(&self, key: &str) -> Option<Value> {
        self.out.read().await.get(key).cloned()
    }

    /// Snapshot of the accumulated output.
    pub async fn out(&self) -> Map<String, Value> {
        self.out.read().await.clone()
    }

    /// Ask the render phase to hand control to the next middleware instead
    /// of emitting a response.
    pub fn set_next(&self) {
        self.next.store(true, Ordering::Release);
    }

    pub fn next(&self) -> bool {
        self.next.load(Ordering::Acquire)
    }

    /// Skip the render phase entirely; the step has handled the response.
    pub fn set_interrupt(&self) {
        self.interrupt.store(true, Ordering::Release);
    }

    pub fn interrupt(&self) -> bool {
        self.interrupt.load(Ordering::Acquire)
    }

    /// Hand a finished body straight to the host, bypassing render.
    ///
    /// Steps cannot write to the transport directly, so this is the escape
    /// hatch for "the handler already wrote the response". Implies
    /// `set_interrupt`.
    pub async fn respond(&self, body: ResponseBody) {
        *self.response.write().await = Some(body);
        self.set_interrupt();
    }

    pub(crate) async fn take_response(&self) -> Option<ResponseBody> {
        self.response.write().await.take()
    }
}
