//! # Dependency Module
//!
//! Per-request dependency resolution with scoped acquisition and release.
//!
//! A [`Resolver`] is a named unit of per-request computation. It declares the names of
//! the resolvers it depends on and, optionally, request inputs of its own (an
//! [`ObjectSchema`] bound with the same binder as endpoint parameters). Its `acquire`
//! step produces one value; its `release` step runs once that value is no longer needed.
//!
//! Resolvers are registered once in a [`DependencyGraph`], which rejects duplicate names,
//! unknown dependencies and cycles at build time. Each request then opens a
//! [`ResolutionScope`] that:
//!
//! - resolves only the nodes reachable from the endpoint's roots, dependencies first
//! - runs each node at most once and caches its value for the request
//! - checks the request's [`CancelToken`] before every node and hands it to running
//!   resolvers through [`ResolveContext::is_cancelled`]
//! - releases every acquired value exactly once, in reverse acquisition order, on every
//!   exit path (success, handler error, resolver failure, cancellation, unwinding)
//!
//! State that outlives requests (a store handle, a client pool) is injected through a
//! [`StateResolver`] rather than global variables.

mod graph;
mod resolvers;
mod scope;

pub use graph::{DependencyGraph, DependencyGraphBuilder};
pub use resolvers::{BearerToken, FnResolver, HeaderEquals, ModelResolver, ScopedResolver, StateResolver};
pub use scope::{CancelToken, ResolutionScope, ResolveError};

use crate::dispatcher::HttpError;
use crate::request::RawRequest;
use crate::schema::ObjectSchema;
use crate::value::{BoundObject, BoundValue};
use std::any::Any;
use std::collections::HashMap;
use std::sync::Arc;

/// A resolved dependency value, shared for the rest of the request.
pub type Resolved = Arc<dyn Any + Send + Sync>;

/// A named per-request computation.
pub trait Resolver: Send + Sync {
    /// Unique name within a graph
    fn name(&self) -> &str;

    /// Names of the resolvers whose values this one needs
    fn dependencies(&self) -> &[String] {
        &[]
    }

    /// Request inputs bound before resolution starts
    fn inputs(&self) -> Option<&Arc<ObjectSchema>> {
        None
    }

    /// Produce the value. Dependencies are already resolved and reachable through `ctx`.
    fn acquire(&self, ctx: &ResolveContext<'_>) -> Result<Resolved, HttpError>;

    /// Release a value produced by `acquire`. Called exactly once per successful acquire.
    fn release(&self, _value: &Resolved) {}
}

/// What a resolver sees while acquiring.
pub struct ResolveContext<'a> {
    pub(crate) request: &'a RawRequest,
    pub(crate) inputs: Option<&'a BoundObject>,
    pub(crate) values: &'a HashMap<String, Resolved>,
    pub(crate) cancel: &'a CancelToken,
}

impl<'a> ResolveContext<'a> {
    #[must_use]
    pub fn request(&self) -> &'a RawRequest {
        self.request
    }

    /// The resolver's own bound inputs, if it declares any
    #[must_use]
    pub fn inputs(&self) -> Option<&'a BoundObject> {
        self.inputs
    }

    /// Whether the caller abandoned the request. Long-running resolvers poll this and
    /// return early; whatever was acquired before is still released.
    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        self.cancel.is_cancelled()
    }

    #[must_use]
    pub fn cancel_token(&self) -> &'a CancelToken {
        self.cancel
    }

    /// One bound input by declared name
    #[must_use]
    pub fn input(&self, name: &str) -> Option<&'a BoundValue> {
        self.inputs.and_then(|i| i.get(name))
    }

    /// An already resolved dependency, downcast to its concrete type.
    #[must_use]
    pub fn get<T: Any + Send + Sync>(&self, name: &str) -> Option<Arc<T>> {
        self.values
            .get(name)
            .cloned()
            .and_then(|v| v.downcast::<T>().ok())
    }

    /// Like [`ResolveContext::get`], failing with a 500 when the value is missing or of
    /// another type.
    pub fn require<T: Any + Send + Sync>(&self, name: &str) -> Result<Arc<T>, HttpError> {
        self.get(name).ok_or_else(|| {
            HttpError::internal(format!(
                "dependency `{name}` is not available as {}",
                std::any::type_name::<T>()
            ))
        })
    }
}
