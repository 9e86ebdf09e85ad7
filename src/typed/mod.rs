//! # Typed Module
//!
//! Handlers that work with plain serde structs instead of [`BoundObject`](crate::value::BoundObject)s.
//!
//! ## Overview
//!
//! The binder still does all the work: the endpoint's parameter schema says where each
//! field comes from and how it is validated. Once binding succeeds, the bound fields are
//! deserialized into the handler's `Request` type, and the handler's `Response` is
//! serialized back to JSON and shaped like any other output.
//!
//! ```rust
//! use brrtbind::dispatcher::{Endpoint, HttpError};
//! use brrtbind::schema::{FieldSpec, ObjectSchema, SemanticType};
//! use brrtbind::typed::{Handler, TypedRequest};
//! use serde::{Deserialize, Serialize};
//!
//! #[derive(Deserialize)]
//! struct ReadItem {
//!     item_id: i64,
//!     q: Option<String>,
//! }
//!
//! #[derive(Serialize)]
//! struct Item {
//!     item_id: i64,
//!     q: Option<String>,
//! }
//!
//! struct ReadItemController;
//!
//! impl Handler for ReadItemController {
//!     type Request = ReadItem;
//!     type Response = Item;
//!
//!     fn handle(&self, req: TypedRequest<'_, ReadItem>) -> Result<Item, HttpError> {
//!         Ok(Item { item_id: req.data.item_id, q: req.data.q })
//!     }
//! }
//!
//! let params = ObjectSchema::builder("ReadItem")
//!     .field(FieldSpec::path("item_id", SemanticType::Integer))
//!     .field(FieldSpec::query("q", SemanticType::String))
//!     .build()?;
//! let endpoint = Endpoint::builder("read_item", params)
//!     .typed(ReadItemController)
//!     .build()?;
//! # let _ = endpoint;
//! # Ok::<(), brrtbind::validator::SchemaError>(())
//! ```
//!
//! ## Explicitly set fields
//!
//! A serialized struct reports every key it writes as set. Response fields that should
//! count as unset under `exclude_unset` are best skipped during serialization
//! (`#[serde(skip_serializing_if = "Option::is_none")]`).

mod core;

pub use core::*;
