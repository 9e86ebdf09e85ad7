use crate::binder::bind;
use crate::dispatcher::{Dispatcher, Endpoint, EndpointBuilder, EndpointRequest, HttpError};
use crate::ids::RequestId;
use crate::request::RawRequest;
use crate::schema::ObjectSchema;
use crate::validator::SchemaError;
use crate::value::BoundObject;
use anyhow::Context;
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::any::Any;
use std::sync::Arc;

/// Trait implemented by typed handlers.
pub trait Handler: Send + Sync + 'static {
    /// Built from the bound parameters
    type Request: DeserializeOwned + Send + 'static;
    /// Serialized to JSON, then shaped
    type Response: Serialize + Send + 'static;

    fn handle(&self, req: TypedRequest<'_, Self::Request>) -> Result<Self::Response, HttpError>;
}

/// Typed request data passed to a [`Handler`].
pub struct TypedRequest<'r, T> {
    /// The bound parameters as `T`
    pub data: T,
    inner: &'r EndpointRequest<'r>,
}

impl<'r, T> TypedRequest<'r, T> {
    #[must_use]
    pub fn request_id(&self) -> RequestId {
        self.inner.request_id()
    }

    #[must_use]
    pub fn raw(&self) -> &'r RawRequest {
        self.inner.raw()
    }

    /// The bound parameters, with explicit-set tracking
    #[must_use]
    pub fn params(&self) -> &'r BoundObject {
        self.inner.params()
    }

    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        self.inner.is_cancelled()
    }

    #[must_use]
    pub fn dependency<D: Any + Send + Sync>(&self, name: &str) -> Option<Arc<D>> {
        self.inner.dependency(name)
    }

    pub fn require<D: Any + Send + Sync>(&self, name: &str) -> Result<Arc<D>, HttpError> {
        self.inner.require(name)
    }
}

impl EndpointBuilder {
    /// Use a typed handler.
    ///
    /// A parameter struct that does not match the schema, or a response that does not
    /// serialize, is a server error (500).
    #[must_use]
    pub fn typed<H: Handler>(self, handler: H) -> Self {
        let handler = Arc::new(handler);
        self.handler(move |req: &EndpointRequest<'_>| {
            let data = req.params().deserialize::<H::Request>().map_err(|e| {
                HttpError::internal(format!(
                    "bound parameters do not fit {}: {e}",
                    std::any::type_name::<H::Request>()
                ))
            })?;
            let response = handler.handle(TypedRequest { data, inner: req })?;
            serde_json::to_value(response).map_err(|e| {
                HttpError::internal(format!(
                    "cannot serialize {}: {e}",
                    std::any::type_name::<H::Response>()
                ))
            })
        })
    }
}

impl Dispatcher {
    /// Build an endpoint around a typed handler and register it.
    ///
    /// # Safety
    ///
    /// Same requirements as [`Dispatcher::register`]: the May coroutine runtime must be
    /// initialized.
    ///
    /// # Errors
    ///
    /// When the endpoint does not build.
    pub unsafe fn register_typed<H: Handler>(
        &mut self,
        name: &str,
        params: Arc<ObjectSchema>,
        handler: H,
    ) -> Result<(), SchemaError> {
        let endpoint = Endpoint::builder(name, params).typed(handler).build()?;
        // SAFETY: forwarded from the caller
        unsafe { self.register(endpoint) };
        Ok(())
    }
}

/// Bind a request and deserialize the result into `T` in one step.
///
/// # Errors
///
/// The validation errors, or a deserialization failure when `T` does not fit the schema.
pub fn bind_as<T: DeserializeOwned>(schema: &ObjectSchema, raw: &RawRequest) -> anyhow::Result<T> {
    let bound = bind(schema, raw)?;
    bound.deserialize().with_context(|| {
        format!(
            "bound `{}` does not deserialize into {}",
            schema.name(),
            std::any::type_name::<T>()
        )
    })
}
