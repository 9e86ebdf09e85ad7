//! # Schema Module
//!
//! Declared shapes of request inputs and response outputs.
//!
//! A [`FieldSpec`] says where a value comes from (path, query, header, cookie or body),
//! what type it must coerce to and which bounds it must satisfy. An [`ObjectSchema`] is
//! an ordered set of uniquely named fields; a [`ResponseShape`] is the declared output
//! type of a handler plus narrower policies for nested fields.
//!
//! Every schema is built once at startup through a builder whose `build()` checks the
//! whole declaration and returns every issue at once as a
//! [`SchemaError`](crate::validator::SchemaError). Built schemas are immutable and shared
//! as `Arc<ObjectSchema>`.
//!
//! ## Example
//!
//! ```rust
//! use brrtbind::schema::{FieldSpec, ObjectSchema, SemanticType};
//! use serde_json::json;
//!
//! let params = ObjectSchema::builder("ReadItem")
//!     .field(FieldSpec::path("item_id", SemanticType::Integer))
//!     .field(FieldSpec::query("q", SemanticType::String).min_length(3).max_length(50))
//!     .field(FieldSpec::query("limit", SemanticType::Integer).le(100.0).default(json!(10)))
//!     .build()
//!     .expect("valid schema");
//! assert_eq!(params.fields().len(), 3);
//! ```
//!
//! Schemas can also be declared in a YAML or JSON document and loaded with
//! [`load_schemas`].

mod build;
mod load;
mod types;

pub use build::*;
pub use load::*;
pub use types::*;
