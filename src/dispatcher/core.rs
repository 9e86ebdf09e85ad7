//! Dispatcher core module - hot path for request dispatch.
//!
//! Requests and replies travel over `may` channels; headers stay in `SmallVec` storage
//! so the common case does not touch the heap.

#![deny(clippy::inefficient_to_string)]
#![deny(clippy::unnecessary_to_owned)]

use super::{Endpoint, ErrorHandlers};
use crate::depends::CancelToken;
use crate::ids::RequestId;
use crate::request::{HeaderVec, RawRequest};
use crate::runtime_config::RuntimeConfig;
use may::coroutine;
use may::sync::mpsc;
use serde::Serialize;
use serde_json::Value;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, error, info, warn};

/// Header carrying the request id on replies, and optionally on requests.
pub const REQUEST_ID_HEADER: &str = "x-request-id";

/// Request data passed to an endpoint coroutine
#[derive(Debug, Clone)]
pub struct HandlerRequest {
    /// Unique request ID for tracing and correlation
    pub request_id: RequestId,
    /// Name of the endpoint that should process this request
    pub endpoint: String,
    /// Everything the HTTP layer received
    pub raw: RawRequest,
    /// Flipped by the caller to abandon the request
    pub cancel: CancelToken,
    /// Channel for sending the response back to the dispatcher
    pub reply_tx: mpsc::Sender<HandlerResponse>,
}

/// Response data sent back from an endpoint coroutine
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct HandlerResponse {
    /// HTTP status code (200, 422, 500, etc.)
    pub status: u16,
    /// HTTP response headers (stack-allocated for ≤16 headers)
    #[serde(skip_serializing)]
    pub headers: HeaderVec,
    /// Response body as JSON
    pub body: Value,
}

impl HandlerResponse {
    #[must_use]
    pub fn new(status: u16, headers: HeaderVec, body: Value) -> Self {
        Self {
            status,
            headers,
            body,
        }
    }

    /// Create a JSON response with default headers
    #[must_use]
    pub fn json(status: u16, body: Value) -> Self {
        let mut headers = HeaderVec::new();
        headers.push((Arc::from("content-type"), "application/json".to_string()));
        Self {
            status,
            headers,
            body,
        }
    }

    /// Create a `text/plain` response; the body is a JSON string
    #[must_use]
    pub fn text(status: u16, body: impl Into<String>) -> Self {
        let mut headers = HeaderVec::new();
        headers.push((Arc::from("content-type"), "text/plain; charset=utf-8".to_string()));
        Self {
            status,
            headers,
            body: Value::String(body.into()),
        }
    }

    /// Create an error response with a `{"detail": message}` body
    #[must_use]
    pub fn error(status: u16, message: &str) -> Self {
        Self::json(status, serde_json::json!({ "detail": message }))
    }

    /// Get a header by name
    #[inline]
    #[must_use]
    pub fn get_header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }

    /// Add or update a header
    pub fn set_header(&mut self, name: &str, value: String) {
        self.headers.retain(|(k, _)| !k.eq_ignore_ascii_case(name));
        self.headers.push((Arc::from(name), value));
    }
}

/// Type alias for a channel sender that dispatches requests to an endpoint
pub type HandlerSender = mpsc::Sender<HandlerRequest>;

/// Routes requests to registered endpoint coroutines by name.
#[derive(Clone, Default)]
pub struct Dispatcher {
    /// Map of endpoint names to their channel senders
    pub handlers: HashMap<String, HandlerSender>,
    config: RuntimeConfig,
    errors: ErrorHandlers,
}

impl Dispatcher {
    /// Dispatcher configured from the environment
    #[must_use]
    pub fn new() -> Self {
        Self::with_config(RuntimeConfig::from_env())
    }

    #[must_use]
    pub fn with_config(config: RuntimeConfig) -> Self {
        Dispatcher {
            handlers: HashMap::new(),
            config,
            errors: ErrorHandlers::default(),
        }
    }

    /// Error reply hooks applied to endpoints registered from now on.
    #[must_use]
    pub fn with_error_handlers(mut self, errors: ErrorHandlers) -> Self {
        self.errors = errors;
        self
    }

    #[must_use]
    pub fn config(&self) -> &RuntimeConfig {
        &self.config
    }

    /// Registered endpoint names, sorted
    #[must_use]
    pub fn endpoints(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.handlers.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }

    /// Spawn a coroutine serving `endpoint` and register it under the endpoint's name.
    ///
    /// The endpoint coroutine only receives; every request then runs on a coroutine of
    /// its own, so a resolver or handler that suspends holds up its own request and
    /// nothing else. Registering a name twice replaces the earlier endpoint; the old
    /// sender is dropped, which closes its channel and ends the old receive loop once
    /// its in-flight requests have their replies.
    ///
    /// Endpoint-level [`ErrorHandlers`] left unset fall back to the dispatcher's.
    ///
    /// # Safety
    ///
    /// This function is marked unsafe because it calls `may::coroutine::Builder::spawn()`,
    /// which is unsafe in the `may` runtime. The caller must ensure the May coroutine
    /// runtime is properly initialized and that the configured stack size is large enough
    /// for the endpoint's resolvers and handler.
    ///
    /// # Panics
    ///
    /// Panics inside the pipeline are caught and converted to 500 responses. Dependencies
    /// acquired before the panic are released during unwinding.
    pub unsafe fn register(&mut self, mut endpoint: Endpoint) {
        endpoint.inherit_error_handlers(&self.errors);
        let (tx, rx) = mpsc::channel::<HandlerRequest>();
        let name = endpoint.name().to_string();
        let endpoint = Arc::new(endpoint);
        let config = self.config;
        let stack_size = config.stack_size;

        // SAFETY: may::coroutine::Builder::spawn() is marked unsafe by the may runtime.
        // The endpoint is shared with each request coroutine through an Arc and every
        // reply goes through the request's own channel.
        let spawn_result = unsafe {
            coroutine::Builder::new()
                .name(name.clone())
                .spawn(move || receive(&endpoint, &rx, config))
        };

        if let Err(e) = spawn_result {
            error!(
                endpoint = %name,
                error = %e,
                stack_size = stack_size,
                "Failed to spawn endpoint coroutine - CRITICAL"
            );
            return;
        }

        if self.handlers.insert(name.clone(), tx).is_some() {
            warn!(
                endpoint = %name,
                "Replaced existing endpoint - old coroutine will exit"
            );
        }
        info!(
            endpoint = %name,
            total_endpoints = self.handlers.len(),
            "Endpoint registered"
        );
    }

    /// Dispatch a request to an endpoint and wait for its reply.
    ///
    /// The request id is taken from an `x-request-id` header when it holds a valid ULID.
    /// Returns `None` when no endpoint is registered under `endpoint`.
    #[must_use]
    pub fn dispatch(&self, endpoint: &str, raw: RawRequest) -> Option<HandlerResponse> {
        let request_id = RequestId::from_header_or_new(raw.header(REQUEST_ID_HEADER));
        self.dispatch_with(endpoint, raw, request_id, CancelToken::new())
    }

    /// Dispatch with a caller-held cancellation token and request id.
    #[must_use]
    pub fn dispatch_with(
        &self,
        endpoint: &str,
        raw: RawRequest,
        request_id: RequestId,
        cancel: CancelToken,
    ) -> Option<HandlerResponse> {
        debug!(
            endpoint = %endpoint,
            available_endpoints = self.handlers.len(),
            "Endpoint lookup"
        );
        let Some(tx) = self.handlers.get(endpoint) else {
            error!(
                endpoint = %endpoint,
                available_endpoints = ?self.endpoints(),
                "Endpoint not found"
            );
            return None;
        };

        info!(
            request_id = %request_id,
            endpoint = %endpoint,
            method = %raw.method,
            path = %raw.path,
            "Request dispatched to endpoint"
        );

        let (reply_tx, reply_rx) = mpsc::channel();
        let request = HandlerRequest {
            request_id,
            endpoint: endpoint.to_string(),
            raw,
            cancel,
            reply_tx,
        };
        let start = Instant::now();
        if let Err(e) = tx.send(request) {
            error!(
                request_id = %request_id,
                endpoint = %endpoint,
                error = %e,
                "Failed to send request to endpoint"
            );
            return Some(unavailable(endpoint));
        }

        match reply_rx.recv() {
            Ok(response) => {
                info!(
                    request_id = %request_id,
                    endpoint = %endpoint,
                    latency_ms = start.elapsed().as_millis() as u64,
                    status = response.status,
                    "Endpoint response received"
                );
                Some(response)
            }
            Err(e) => {
                error!(
                    request_id = %request_id,
                    endpoint = %endpoint,
                    elapsed_ms = start.elapsed().as_millis() as u64,
                    error = %e,
                    "Endpoint channel closed - coroutine may have crashed"
                );
                Some(unavailable(endpoint))
            }
        }
    }
}

/// Endpoint coroutine body: hand every received request to a coroutine of its own.
fn receive(endpoint: &Arc<Endpoint>, rx: &mpsc::Receiver<HandlerRequest>, config: RuntimeConfig) {
    let stack_size = config.stack_size;
    debug!(
        endpoint = %endpoint.name(),
        stack_size = stack_size,
        "Endpoint coroutine start"
    );

    for req in rx.iter() {
        let request_id = req.request_id;
        let worker = Arc::clone(endpoint);
        // SAFETY: may::coroutine::Builder::spawn() is marked unsafe by the may runtime.
        // The runtime is running: this code is already on one of its coroutines.
        let spawned = unsafe {
            coroutine::Builder::new()
                .name(format!("{}-{request_id}", endpoint.name()))
                .stack_size(stack_size)
                .spawn(move || serve(&worker, req, &config))
        };
        if let Err(e) = spawned {
            error!(
                request_id = %request_id,
                endpoint = %endpoint.name(),
                error = %e,
                stack_size = stack_size,
                "Failed to spawn request coroutine - CRITICAL"
            );
        }
    }
    debug!(endpoint = %endpoint.name(), "Endpoint coroutine exit");
}

/// Run one request to completion on the current coroutine and send the reply.
fn serve(endpoint: &Endpoint, req: HandlerRequest, config: &RuntimeConfig) {
    let request_id = req.request_id;
    let started = Instant::now();

    let outcome = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| {
        endpoint.call(&req.raw, request_id, &req.cancel, config)
    }));
    let mut response = match outcome {
        Ok(response) => {
            debug!(
                request_id = %request_id,
                endpoint = %endpoint.name(),
                status = response.status,
                execution_time_ms = started.elapsed().as_millis() as u64,
                "Endpoint execution complete"
            );
            response
        }
        Err(panic) => {
            let panic_message = panic
                .downcast_ref::<&str>()
                .map(|s| (*s).to_string())
                .or_else(|| panic.downcast_ref::<String>().cloned())
                .unwrap_or_else(|| format!("{panic:?}"));
            error!(
                request_id = %request_id,
                endpoint = %endpoint.name(),
                panic_message = %panic_message,
                "Handler panicked - CRITICAL"
            );
            HandlerResponse::error(500, "Internal Server Error")
        }
    };
    response.set_header(REQUEST_ID_HEADER, request_id.to_string());
    if req.reply_tx.send(response).is_err() {
        warn!(
            request_id = %request_id,
            endpoint = %endpoint.name(),
            "Caller went away before the reply"
        );
    }
}

fn unavailable(endpoint: &str) -> HandlerResponse {
    HandlerResponse::error(503, &format!("Endpoint '{endpoint}' is not responding"))
}
