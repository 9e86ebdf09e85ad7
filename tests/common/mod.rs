//! Schemas and requests shared by the integration tests.
#![allow(dead_code)]

use brrtbind::request::RawRequest;
use brrtbind::schema::{BodyEncoding, FieldSpec, ObjectSchema, SemanticType};
use http::Method;
use serde_json::{json, Value};
use std::sync::Arc;

/// `/items/{id}?q=...`
pub fn read_item() -> Arc<ObjectSchema> {
    ObjectSchema::builder("ReadItem")
        .field(FieldSpec::path("id", SemanticType::Integer))
        .field(FieldSpec::query("q", SemanticType::String))
        .build()
        .unwrap()
}

pub fn image() -> Arc<ObjectSchema> {
    ObjectSchema::builder("Image")
        .field(
            FieldSpec::field("url", SemanticType::String)
                .required()
                .pattern("^https?://"),
        )
        .field(FieldSpec::field("name", SemanticType::String).required())
        .build()
        .unwrap()
}

/// The classic item model: required name and price, optional description,
/// defaulted tax and tags, optional nested images.
pub fn item() -> Arc<ObjectSchema> {
    ObjectSchema::builder("Item")
        .field(FieldSpec::field("name", SemanticType::String).required())
        .field(FieldSpec::field("description", SemanticType::String).max_length(300))
        .field(FieldSpec::field("price", SemanticType::Float).required().gt(0.0))
        .field(FieldSpec::field("tax", SemanticType::Float).default(json!(10.5)))
        .field(
            FieldSpec::field("tags", SemanticType::set_of(SemanticType::String))
                .default(json!([])),
        )
        .field(FieldSpec::field(
            "images",
            SemanticType::list_of(SemanticType::Object(image())),
        ))
        .build()
        .unwrap()
}

/// An endpoint parameter set with a single JSON body field of type `Item`.
pub fn update_item() -> Arc<ObjectSchema> {
    ObjectSchema::builder("UpdateItem")
        .field(FieldSpec::path("item_id", SemanticType::Integer))
        .field(FieldSpec::body("item", SemanticType::Object(item())).required())
        .build()
        .unwrap()
}

pub fn login_form() -> Arc<ObjectSchema> {
    ObjectSchema::builder("Login")
        .field(FieldSpec::body("username", SemanticType::String).required())
        .field(FieldSpec::body("password", SemanticType::String).required())
        .encoding(BodyEncoding::Form)
        .build()
        .unwrap()
}

pub fn get(path: &str) -> RawRequest {
    RawRequest::new(Method::GET, path)
}

pub fn put_json(path: &str, body: &Value) -> RawRequest {
    RawRequest::new(Method::PUT, path).with_json_body(body)
}

pub fn locs(errors: &brrtbind::ValidationErrors) -> Vec<&str> {
    errors.iter().map(|e| e.loc.as_str()).collect()
}
