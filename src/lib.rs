//! # BRRTBind
//!
//! **BRRTBind** is a request-time data-binding and validation pipeline for HTTP
//! services, running on the `may` coroutine runtime.
//!
//! ## Overview
//!
//! Given the raw pieces of a request (path segments, query string, headers, cookies and
//! body), BRRTBind produces either a typed, validated value or the complete, ordered list
//! of everything that is wrong with the request. Around that core it resolves
//! per-request dependency graphs with scoped acquisition and release, and shapes handler
//! output into wire-ready JSON under include/exclude/exclude-unset policies.
//!
//! ## Architecture
//!
//! - **[`schema`]** - Field and object schemas, response shapes, construction-time checks,
//!   declarative loading from YAML/JSON
//! - **[`request`]** - The raw request model and parsing helpers (query, cookies, forms,
//!   multipart)
//! - **[`binder`]** - Extraction, coercion and constraint checking
//! - **[`value`]** - Bound values with explicit-set tracking
//! - **[`validator`]** - Error taxonomy, validation error lists, schema errors
//! - **[`shaper`]** - Response filtering and serialization
//! - **[`depends`]** - Resolvers, dependency graphs, per-request resolution scopes
//! - **[`dispatcher`]** - Endpoints and their coroutines
//! - **[`typed`]** - Handlers over serde structs
//! - **[`runtime_config`]**, **[`otel`]**, **[`ids`]** - Configuration, logging, request ids
//! - **[`cli`]** - The `brrtbind` binary
//!
//! ### Request Flow
//!
//! ```mermaid
//! sequenceDiagram
//!     participant Caller
//!     participant Dispatcher
//!     participant Endpoint as Endpoint coroutine
//!     participant Binder
//!     participant Scope as ResolutionScope
//!     participant Handler
//!     participant Shaper
//!
//!     Caller->>Dispatcher: dispatch(name, RawRequest)
//!     Dispatcher->>Endpoint: HandlerRequest over channel
//!     Endpoint->>Binder: bind params + resolver inputs
//!     alt validation errors
//!         Binder-->>Endpoint: ValidationErrors
//!         Endpoint-->>Caller: 422 {"detail": [...]}
//!     else bound
//!         Endpoint->>Scope: resolve(roots)
//!         Scope->>Scope: acquire in dependency order
//!         Endpoint->>Handler: EndpointRequest
//!         Handler-->>Endpoint: HandlerOutput
//!         Endpoint->>Shaper: shape(output, policy)
//!         Endpoint->>Scope: finish() (release in reverse)
//!         Endpoint-->>Caller: HandlerResponse
//!     end
//! ```
//!
//! ## Quick Start
//!
//! ```rust
//! use brrtbind::request::RawRequest;
//! use brrtbind::schema::{FieldSpec, ObjectSchema, SemanticType};
//! use brrtbind::binder::bind;
//! use http::Method;
//!
//! let schema = ObjectSchema::builder("ReadItem")
//!     .field(FieldSpec::path("item_id", SemanticType::Integer))
//!     .field(FieldSpec::query("q", SemanticType::String))
//!     .build()?;
//!
//! let raw = RawRequest::new(Method::GET, "/items/5").with_path_param("item_id", "5");
//! let bound = bind(&schema, &raw).expect("valid request");
//! assert_eq!(bound.get("item_id").and_then(|v| v.as_i64()), Some(5));
//! assert!(bound.get("q").is_some_and(|v| v.is_absent()));
//! # Ok::<(), brrtbind::validator::SchemaError>(())
//! ```
//!
//! ## Runtime Considerations
//!
//! Schemas, shapes and dependency graphs are built once at startup, are immutable and
//! are shared as `Arc`s. Each request runs on one coroutine; resolvers may block only
//! that coroutine. Stack size is controlled by `BRRTB_STACK_SIZE` (see
//! [`runtime_config`]).

pub mod binder;
pub mod cli;
pub mod depends;
pub mod dispatcher;
pub mod ids;
pub mod otel;
pub mod request;
pub mod runtime_config;
pub mod schema;
pub mod shaper;
pub mod typed;
pub mod validator;
pub mod value;

pub use binder::{bind, bind_with, BindOptions};
pub use depends::{CancelToken, DependencyGraph, Resolver};
pub use dispatcher::{Dispatcher, Endpoint, HandlerResponse, HttpError};
pub use request::RawRequest;
pub use schema::{load_schemas, FieldSpec, ObjectSchema, ResponseShape, SemanticType};
pub use shaper::{shape, shape_json, ShapePolicy};
pub use validator::{ErrorKind, SchemaError, ValidationError, ValidationErrors};
pub use value::{BoundObject, BoundValue};
