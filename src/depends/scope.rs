use super::{DependencyGraph, ResolveContext, Resolved, Resolver};
use crate::dispatcher::HttpError;
use crate::request::RawRequest;
use crate::value::BoundObject;
use std::any::Any;
use std::collections::HashMap;
use std::fmt;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tracing::{debug, error, warn};

/// Per-request cancellation flag, shared between the caller and the pipeline.
#[derive(Debug, Clone, Default)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// Why resolution stopped.
#[derive(Debug, Clone)]
pub enum ResolveError {
    /// A resolver's acquire step failed; dependents were not run
    Failed { resolver: String, error: HttpError },
    /// The request was cancelled before `resolver` started, or while it ran
    Cancelled { resolver: String },
}

impl fmt::Display for ResolveError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ResolveError::Failed { resolver, error } => {
                write!(f, "resolver `{resolver}` failed: {error}")
            }
            ResolveError::Cancelled { resolver } => {
                write!(f, "request cancelled at resolver `{resolver}`")
            }
        }
    }
}

impl std::error::Error for ResolveError {}

/// Values resolved for one request.
///
/// Everything acquired is released in reverse acquisition order when the scope is
/// finished or dropped, whichever comes first.
pub struct ResolutionScope<'g> {
    graph: &'g DependencyGraph,
    cancel: CancelToken,
    values: HashMap<String, Resolved>,
    acquired: Vec<(Arc<dyn Resolver>, Resolved)>,
}

impl<'g> ResolutionScope<'g> {
    #[must_use]
    pub fn new(graph: &'g DependencyGraph, cancel: CancelToken) -> Self {
        ResolutionScope {
            graph,
            cancel,
            values: HashMap::new(),
            acquired: Vec::new(),
        }
    }

    /// Resolve every node reachable from `roots`, dependencies first.
    ///
    /// Nodes already resolved in this scope are not run again. `inputs` holds the bound
    /// request inputs of resolvers that declare any, keyed by resolver name.
    ///
    /// # Errors
    ///
    /// The first acquire failure, or cancellation. Values acquired so far stay in the
    /// scope and are released with it.
    pub fn resolve(
        &mut self,
        roots: &[String],
        request: &RawRequest,
        inputs: &HashMap<String, BoundObject>,
    ) -> Result<(), ResolveError> {
        let graph = self.graph;
        for resolver in graph.closure(roots) {
            let name = resolver.name();
            if self.values.contains_key(name) {
                continue;
            }
            if self.cancel.is_cancelled() {
                warn!(resolver = %name, acquired = self.acquired.len(), "Resolution cancelled");
                return Err(ResolveError::Cancelled {
                    resolver: name.to_string(),
                });
            }
            let ctx = ResolveContext {
                request,
                inputs: inputs.get(name),
                values: &self.values,
                cancel: &self.cancel,
            };
            match resolver.acquire(&ctx) {
                Ok(value) => {
                    debug!(resolver = %name, "Dependency acquired");
                    self.values.insert(name.to_string(), value.clone());
                    self.acquired.push((resolver.clone(), value));
                }
                // a resolver that gave up because it saw the token counts as cancelled
                Err(_) if self.cancel.is_cancelled() => {
                    warn!(resolver = %name, acquired = self.acquired.len(), "Resolution cancelled");
                    return Err(ResolveError::Cancelled {
                        resolver: name.to_string(),
                    });
                }
                Err(error) => {
                    warn!(resolver = %name, status = error.status, "Dependency failed");
                    return Err(ResolveError::Failed {
                        resolver: name.to_string(),
                        error,
                    });
                }
            }
        }
        Ok(())
    }

    /// A resolved value by name
    #[must_use]
    pub fn value(&self, name: &str) -> Option<&Resolved> {
        self.values.get(name)
    }

    /// A resolved value downcast to its concrete type
    #[must_use]
    pub fn get<T: Any + Send + Sync>(&self, name: &str) -> Option<Arc<T>> {
        self.values
            .get(name)
            .cloned()
            .and_then(|v| v.downcast::<T>().ok())
    }

    /// Resolved values keyed by name
    #[must_use]
    pub fn values(&self) -> &HashMap<String, Resolved> {
        &self.values
    }

    /// Names in acquisition order
    #[must_use]
    pub fn acquired(&self) -> Vec<&str> {
        self.acquired.iter().map(|(r, _)| r.name()).collect()
    }

    /// Release everything now.
    pub fn finish(mut self) {
        self.release_all();
    }

    fn release_all(&mut self) {
        while let Some((resolver, value)) = self.acquired.pop() {
            let name = resolver.name().to_string();
            // a panicking release must not skip the remaining ones
            if let Err(panic) = catch_unwind(AssertUnwindSafe(|| resolver.release(&value))) {
                error!(resolver = %name, panic = ?panic, "Dependency release panicked");
            } else {
                debug!(resolver = %name, "Dependency released");
            }
        }
        self.values.clear();
    }
}

impl Drop for ResolutionScope<'_> {
    fn drop(&mut self) {
        self.release_all();
    }
}

impl fmt::Debug for ResolutionScope<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ResolutionScope")
            .field("acquired", &self.acquired())
            .field("cancelled", &self.cancel.is_cancelled())
            .finish()
    }
}
