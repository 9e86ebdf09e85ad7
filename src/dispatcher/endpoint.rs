use super::{ErrorHandlers, HandlerResponse, HttpError};
use crate::binder::{bind_into, BindOptions};
use crate::depends::{CancelToken, DependencyGraph, ResolutionScope, ResolveError};
use crate::ids::RequestId;
use crate::request::RawRequest;
use crate::runtime_config::RuntimeConfig;
use crate::schema::{ObjectSchema, ResponseShape};
use crate::shaper::{shape, shape_json, ShapePolicy};
use crate::validator::{ErrorKind, SchemaError, SchemaIssue, ValidationError, ValidationErrors};
use crate::value::{BoundObject, BoundValue};
use serde_json::{json, Value};
use std::any::Any;
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use tracing::{debug, error, warn};

/// Status used when the caller cancelled the request before it completed.
pub const CLIENT_CLOSED_REQUEST: u16 = 499;

/// What a handler hands back.
#[derive(Debug, Clone)]
pub enum HandlerOutput {
    /// Arbitrary JSON, validated against the response shape when one is declared
    Json(Value),
    /// An already bound value; keeps explicit-set tracking for `exclude_unset`
    Bound(BoundValue),
    /// A finished response, sent as is
    Reply(HandlerResponse),
}

impl From<Value> for HandlerOutput {
    fn from(value: Value) -> Self {
        HandlerOutput::Json(value)
    }
}

impl From<BoundValue> for HandlerOutput {
    fn from(value: BoundValue) -> Self {
        HandlerOutput::Bound(value)
    }
}

impl From<BoundObject> for HandlerOutput {
    fn from(value: BoundObject) -> Self {
        HandlerOutput::Bound(BoundValue::Object(value))
    }
}

impl From<HandlerResponse> for HandlerOutput {
    fn from(value: HandlerResponse) -> Self {
        HandlerOutput::Reply(value)
    }
}

/// Everything a handler can look at: bound parameters and resolved dependencies.
pub struct EndpointRequest<'a> {
    request_id: RequestId,
    raw: &'a RawRequest,
    params: &'a BoundObject,
    scope: &'a ResolutionScope<'a>,
    cancel: &'a CancelToken,
}

impl<'a> EndpointRequest<'a> {
    #[must_use]
    pub fn request_id(&self) -> RequestId {
        self.request_id
    }

    #[must_use]
    pub fn raw(&self) -> &'a RawRequest {
        self.raw
    }

    #[must_use]
    pub fn params(&self) -> &'a BoundObject {
        self.params
    }

    /// Whether the caller abandoned the request; a cancelled handler's result is dropped
    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        self.cancel.is_cancelled()
    }

    #[must_use]
    pub fn param(&self, name: &str) -> Option<&'a BoundValue> {
        self.params.get(name)
    }

    #[must_use]
    pub fn dependency<T: Any + Send + Sync>(&self, name: &str) -> Option<Arc<T>> {
        self.scope.get(name)
    }

    /// A resolved dependency, or a 500 when it is missing or of another type.
    pub fn require<T: Any + Send + Sync>(&self, name: &str) -> Result<Arc<T>, HttpError> {
        self.dependency(name).ok_or_else(|| {
            HttpError::internal(format!(
                "dependency `{name}` is not available as {}",
                std::any::type_name::<T>()
            ))
        })
    }
}

pub type HandlerFn =
    Arc<dyn Fn(&EndpointRequest<'_>) -> Result<HandlerOutput, HttpError> + Send + Sync>;

/// One operation: parameters, dependency roots, a handler and a response contract.
#[derive(Clone)]
pub struct Endpoint {
    name: String,
    params: Arc<ObjectSchema>,
    roots: Vec<String>,
    graph: Arc<DependencyGraph>,
    response: Option<(ResponseShape, ShapePolicy)>,
    status: u16,
    errors: ErrorHandlers,
    handler: HandlerFn,
}

impl fmt::Debug for Endpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Endpoint")
            .field("name", &self.name)
            .field("params", &self.params.name())
            .field("roots", &self.roots)
            .field("status", &self.status)
            .finish_non_exhaustive()
    }
}

pub struct EndpointBuilder {
    name: String,
    params: Arc<ObjectSchema>,
    roots: Vec<String>,
    graph: Arc<DependencyGraph>,
    response: Option<(ResponseShape, ShapePolicy)>,
    status: u16,
    errors: ErrorHandlers,
    handler: Option<HandlerFn>,
}

impl Endpoint {
    pub fn builder(name: impl Into<String>, params: Arc<ObjectSchema>) -> EndpointBuilder {
        EndpointBuilder {
            name: name.into(),
            params,
            roots: Vec::new(),
            graph: Arc::new(DependencyGraph::default()),
            response: None,
            status: 200,
            errors: ErrorHandlers::default(),
            handler: None,
        }
    }

    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    #[must_use]
    pub fn params(&self) -> &Arc<ObjectSchema> {
        &self.params
    }

    #[must_use]
    pub fn roots(&self) -> &[String] {
        &self.roots
    }

    #[must_use]
    pub fn error_handlers(&self) -> &ErrorHandlers {
        &self.errors
    }

    /// Fill the hooks this endpoint does not set from `fallback`.
    pub(crate) fn inherit_error_handlers(&mut self, fallback: &ErrorHandlers) {
        self.errors = self.errors.or(fallback);
    }

    /// Run the whole pipeline for one request on the current coroutine.
    ///
    /// Binds the endpoint's parameters and the inputs of every reachable resolver,
    /// reporting all validation errors together; then resolves dependencies, runs the
    /// handler and shapes its output. Everything acquired is released before the reply
    /// is returned, whichever way the request ends.
    pub fn call(
        &self,
        raw: &RawRequest,
        request_id: RequestId,
        cancel: &CancelToken,
        config: &RuntimeConfig,
    ) -> HandlerResponse {
        let opts = BindOptions::from(config);
        let mut errors = Vec::new();
        let params = bind_into(&self.params, raw, &opts, &mut errors);
        let mut inputs = HashMap::new();
        for resolver in self.graph.closure(&self.roots) {
            if let Some(schema) = resolver.inputs() {
                let bound = bind_into(schema, raw, &opts, &mut errors);
                inputs.insert(resolver.name().to_string(), bound);
            }
        }
        if let Some(errs) = ValidationErrors::from_vec(dedup_errors(errors)) {
            warn!(
                request_id = %request_id,
                endpoint = %self.name,
                error_count = errs.len(),
                first_error = %errs.errors()[0],
                "Request validation failed"
            );
            return self.errors.validation_response(&errs, config);
        }

        let mut scope = ResolutionScope::new(&self.graph, cancel.clone());
        if let Err(err) = scope.resolve(&self.roots, raw, &inputs) {
            return match err {
                ResolveError::Failed { error, .. } => self.errors.http_response(error),
                ResolveError::Cancelled { .. } => cancelled(),
            };
        }
        if cancel.is_cancelled() {
            return cancelled();
        }

        let req = EndpointRequest {
            request_id,
            raw,
            params: &params,
            scope: &scope,
            cancel,
        };
        let outcome = (self.handler)(&req);
        if cancel.is_cancelled() {
            debug!(
                request_id = %request_id,
                endpoint = %self.name,
                "Handler result dropped, request cancelled"
            );
            return cancelled();
        }
        let response = match outcome {
            Ok(output) => self.render(output, request_id),
            Err(err) => {
                debug!(
                    request_id = %request_id,
                    endpoint = %self.name,
                    status = err.status,
                    "Handler returned an error"
                );
                self.errors.http_response(err)
            }
        };
        scope.finish();
        response
    }

    fn render(&self, output: HandlerOutput, request_id: RequestId) -> HandlerResponse {
        let body = match (output, &self.response) {
            (HandlerOutput::Reply(resp), _) => return resp,
            (HandlerOutput::Json(value), None) => value,
            (HandlerOutput::Bound(value), None) => value.to_json(),
            (HandlerOutput::Bound(value), Some((shape_decl, policy))) => {
                shape(shape_decl, &value, policy)
            }
            (HandlerOutput::Json(value), Some((shape_decl, policy))) => {
                match shape_json(shape_decl, &value, policy) {
                    Ok(shaped) => shaped,
                    Err(errs) => {
                        error!(
                            request_id = %request_id,
                            endpoint = %self.name,
                            errors = %errs,
                            "Response validation failed"
                        );
                        return HandlerResponse::json(
                            500,
                            json!({ "detail": "Internal Server Error" }),
                        );
                    }
                }
            }
        };
        HandlerResponse::json(self.status, body)
    }
}

fn cancelled() -> HandlerResponse {
    HttpError::new(CLIENT_CLOSED_REQUEST, "request cancelled").into_response()
}

/// Schemas that share a source report the same failure once.
fn dedup_errors(errors: Vec<ValidationError>) -> Vec<ValidationError> {
    let mut out: Vec<ValidationError> = Vec::with_capacity(errors.len());
    for e in errors {
        if !out.contains(&e) {
            out.push(e);
        }
    }
    out
}

impl EndpointBuilder {
    /// Dependency roots. Their own dependencies are pulled in transitively.
    #[must_use]
    pub fn depends_on<I, S>(mut self, names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.roots.extend(names.into_iter().map(Into::into));
        self
    }

    #[must_use]
    pub fn graph(mut self, graph: Arc<DependencyGraph>) -> Self {
        self.graph = graph;
        self
    }

    #[must_use]
    pub fn response(mut self, shape: ResponseShape, policy: ShapePolicy) -> Self {
        self.response = Some((shape, policy));
        self
    }

    /// Replace the default error replies for this endpoint. Hooks left unset fall back
    /// to the dispatcher's, then to the defaults.
    #[must_use]
    pub fn error_handlers(mut self, errors: ErrorHandlers) -> Self {
        self.errors = errors;
        self
    }

    /// Success status, 200 unless set.
    #[must_use]
    pub fn status(mut self, status: u16) -> Self {
        self.status = status;
        self
    }

    #[must_use]
    pub fn handler<F, O>(mut self, f: F) -> Self
    where
        F: Fn(&EndpointRequest<'_>) -> Result<O, HttpError> + Send + Sync + 'static,
        O: Into<HandlerOutput>,
    {
        self.handler = Some(Arc::new(move |req: &EndpointRequest<'_>| f(req).map(Into::into)));
        self
    }

    /// # Errors
    ///
    /// `UNKNOWN_DEPENDENCY` for a root missing from the graph, `INVALID_SCHEMA` for a
    /// missing handler or a status outside 100..=599.
    pub fn build(self) -> Result<Endpoint, SchemaError> {
        let mut issues = Vec::new();
        for root in &self.roots {
            if !self.graph.contains(root) {
                issues.push(SchemaIssue::new(
                    format!("{}.{root}", self.name),
                    ErrorKind::UnknownDependency,
                    format!("endpoint `{}` depends on `{root}`, which is not registered", self.name),
                ));
            }
        }
        if !(100..=599).contains(&self.status) {
            issues.push(SchemaIssue::new(
                &self.name,
                ErrorKind::InvalidSchema,
                format!("status {} is not an HTTP status code", self.status),
            ));
        }
        let Some(handler) = self.handler else {
            issues.push(SchemaIssue::new(
                &self.name,
                ErrorKind::InvalidSchema,
                "endpoint has no handler",
            ));
            return Err(SchemaError { issues });
        };
        if !issues.is_empty() {
            return Err(SchemaError { issues });
        }
        Ok(Endpoint {
            name: self.name,
            params: self.params,
            roots: self.roots,
            graph: self.graph,
            response: self.response,
            status: self.status,
            errors: self.errors,
            handler,
        })
    }
}
