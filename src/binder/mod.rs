//! # Binder Module
//!
//! Turns a [`RawRequest`] into a [`BoundObject`] according to an [`ObjectSchema`], or
//! into the complete ordered list of everything that is wrong with it.
//!
//! ## Algorithm
//!
//! Every field is bound independently and binding never stops at the first failure:
//!
//! 1. Extract raw value(s) by wire name. Headers match case-insensitively; query keys
//!    and headers may repeat.
//! 2. Absent values take the declared default (not explicitly set), produce `MISSING`
//!    when required, or bind [`BoundValue::Absent`].
//! 3. Present values coerce to the declared type (`TYPE_ERROR` on failure).
//! 4. Coerced values are checked against constraints (`RANGE_ERROR`, `PATTERN_ERROR`).
//!
//! Body fields first require the content type to match the schema's encoding; a
//! mismatch produces one `UNSUPPORTED_MEDIA_TYPE` at `body` and skips them.
//!
//! ## Error locations
//!
//! Parameters report their wire name (`item_id`, `x-token`); body fields report
//! `body.` followed by the path into the body (`body.items.0.price`). A single,
//! non-embedded JSON body field receives the whole body and reports at `body`.

mod body;
mod coerce;
mod constraints;

pub(crate) use coerce::coerce_json;
pub(crate) use constraints::check as check_constraints;

use crate::request::RawRequest;
use crate::runtime_config::RuntimeConfig;
use crate::schema::{FieldSpec, ObjectSchema, Source};
use crate::validator::{ErrorKind, ValidationError, ValidationErrors};
use crate::value::{BoundObject, BoundValue};
use body::{bind_body_field, read_payload, Payload};
use coerce::{bind_absent, bind_json_object, coerce_text};
use serde_json::Value;
use tracing::{debug, warn};

/// Default body size limit (10 MiB)
pub const DEFAULT_MAX_BODY_BYTES: usize = 10 * 1024 * 1024;

/// Request-independent binding options.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BindOptions {
    /// Larger bodies fail with a `RANGE_ERROR` at `body`
    pub max_body_bytes: usize,
}

impl Default for BindOptions {
    fn default() -> Self {
        BindOptions {
            max_body_bytes: DEFAULT_MAX_BODY_BYTES,
        }
    }
}

impl From<&RuntimeConfig> for BindOptions {
    fn from(config: &RuntimeConfig) -> Self {
        BindOptions {
            max_body_bytes: config.max_body_bytes,
        }
    }
}

/// Bind a request with default options.
pub fn bind(schema: &ObjectSchema, raw: &RawRequest) -> Result<BoundObject, ValidationErrors> {
    bind_with(schema, raw, &BindOptions::default())
}

/// Bind a request.
///
/// # Errors
///
/// Every validation failure of every field, in schema field order.
pub fn bind_with(
    schema: &ObjectSchema,
    raw: &RawRequest,
    opts: &BindOptions,
) -> Result<BoundObject, ValidationErrors> {
    let mut errors = Vec::new();
    let bound = bind_into(schema, raw, opts, &mut errors);
    match ValidationErrors::from_vec(errors) {
        None => Ok(bound),
        Some(errs) => {
            warn!(
                schema = %schema.name(),
                error_count = errs.len(),
                first_error = %errs.errors()[0],
                "Request validation failed"
            );
            Err(errs)
        }
    }
}

/// Bind a JSON object against a schema, ignoring field sources.
///
/// Keys present in the object count as explicitly set; unknown keys are dropped.
/// Errors are located under `prefix`.
pub fn bind_json(
    schema: &ObjectSchema,
    value: &Value,
    prefix: &str,
) -> Result<BoundObject, ValidationErrors> {
    let mut errors = Vec::new();
    let bound = match value {
        Value::Object(map) => bind_json_object(schema, map, prefix, &mut errors),
        _ => {
            errors.push(ValidationError::new(
                prefix,
                ErrorKind::TypeError,
                "value is not a valid object",
            ));
            BoundObject::new()
        }
    };
    ValidationErrors::from_vec(errors).map_or(Ok(bound), Err)
}

fn raw_values<'r>(field: &FieldSpec, raw: &'r RawRequest, wire: &str) -> Vec<&'r str> {
    match field.source {
        Source::Path => raw.path_param(wire).into_iter().collect(),
        Source::Query => raw.query_values(wire),
        Source::Header => raw.header_values(wire),
        Source::Cookie => raw.cookie(wire).into_iter().collect(),
        Source::Body => Vec::new(),
    }
}

fn bind_parameter(
    field: &FieldSpec,
    raw: &RawRequest,
    errors: &mut Vec<ValidationError>,
) -> Option<(BoundValue, bool)> {
    let wire = field.wire_name();
    let values = raw_values(field, raw, &wire);
    debug!(
        field = %field.name,
        source = %field.source,
        wire_name = %wire,
        value_count = values.len(),
        "Extracting parameter"
    );
    if values.is_empty() {
        return bind_absent(field, &wire, errors).map(|v| (v, false));
    }
    let bound = coerce_text(&field.ty, &values, &wire, errors)?;
    check_constraints(field, &bound, &wire, errors).then_some((bound, true))
}

/// Bind into a caller-owned error list. Used to aggregate errors over several schemas.
pub(crate) fn bind_into(
    schema: &ObjectSchema,
    raw: &RawRequest,
    opts: &BindOptions,
    errors: &mut Vec<ValidationError>,
) -> BoundObject {
    let mut obj = BoundObject::with_capacity(schema.fields().len());
    let mut payload: Option<Payload> = None;

    for field in schema.fields() {
        let bound = if field.source == Source::Body {
            let payload = payload.get_or_insert_with(|| read_payload(schema, raw, opts, errors));
            bind_body_field(schema, field, payload, errors)
        } else {
            bind_parameter(field, raw, errors)
        };
        let Some((value, set)) = bound else {
            continue;
        };
        if field.deprecated && set {
            warn!(
                schema = %schema.name(),
                field = %field.name,
                source = %field.source,
                "Deprecated field supplied"
            );
        }
        obj.push(field.name.clone(), field.wire_name(), value, set);
    }
    obj
}
