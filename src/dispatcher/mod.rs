//! # Dispatcher Module
//!
//! Runs endpoints on `may` coroutines and turns every outcome into a
//! [`HandlerResponse`].
//!
//! ## Overview
//!
//! An [`Endpoint`] bundles a parameter schema, the names of the dependencies it needs,
//! a handler and an optional response contract. [`Endpoint::call`] runs the pipeline for
//! one request on the current coroutine:
//!
//! 1. Bind the endpoint's parameters and the declared inputs of every reachable
//!    resolver. All validation errors are reported together.
//! 2. Resolve dependencies in a per-request [`ResolutionScope`](crate::depends::ResolutionScope).
//! 3. Run the handler.
//! 4. Shape the handler's output with the declared [`ResponseShape`](crate::schema::ResponseShape)
//!    and [`ShapePolicy`](crate::shaper::ShapePolicy).
//! 5. Release every acquired dependency, in reverse order.
//!
//! The [`Dispatcher`] owns one receiving coroutine per registered endpoint, fed through
//! an MPSC channel. Each request it receives runs on a coroutine of its own, so
//! concurrent requests to one endpoint do not wait on each other. Replies come back on a
//! per-request channel.
//!
//! ## Replies
//!
//! | Outcome | Status | Body |
//! |---|---|---|
//! | success | endpoint status (200 by default) | shaped output |
//! | validation failure | `BRRTB_VALIDATION_STATUS` (422) | `{"detail": [{"loc", "type", "msg"}, ...]}` |
//! | [`HttpError`] | its status | `{"detail": ...}` plus its headers |
//! | cancellation | 499 | `{"detail": "request cancelled"}` |
//! | handler panic | 500 | `{"detail": "Internal Server Error"}` |
//!
//! The validation and [`HttpError`] rows can be replaced with [`ErrorHandlers`], set per
//! endpoint or once on the dispatcher.
//!
//! ## Example
//!
//! ```rust,no_run
//! use brrtbind::dispatcher::{Dispatcher, Endpoint};
//! use brrtbind::request::RawRequest;
//! use brrtbind::schema::{FieldSpec, ObjectSchema, SemanticType};
//! use http::Method;
//! use serde_json::json;
//!
//! let params = ObjectSchema::builder("ReadItem")
//!     .field(FieldSpec::path("item_id", SemanticType::Integer))
//!     .build()?;
//! let endpoint = Endpoint::builder("read_item", params)
//!     .handler(|req| Ok(json!({ "item_id": req.param("item_id").map(|v| v.to_json()) })))
//!     .build()?;
//!
//! let mut dispatcher = Dispatcher::new();
//! unsafe { dispatcher.register(endpoint) };
//!
//! let raw = RawRequest::new(Method::GET, "/items/3").with_path_param("item_id", "3");
//! let reply = dispatcher.dispatch("read_item", raw);
//! # Ok::<(), brrtbind::validator::SchemaError>(())
//! ```

mod core;
mod endpoint;
mod error;

pub use core::{Dispatcher, HandlerRequest, HandlerResponse, HandlerSender, REQUEST_ID_HEADER};
pub use endpoint::{
    Endpoint, EndpointBuilder, EndpointRequest, HandlerFn, HandlerOutput, CLIENT_CLOSED_REQUEST,
};
pub use error::{ErrorHandlers, HttpError, HttpErrorHook, ValidationErrorHook};
