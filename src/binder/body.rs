use super::coerce::{bind_absent, bind_json_field, coerce_text, dedup};
use super::{constraints, BindOptions};
use crate::request::{
    content_type_param, media_type, parse_form_body, parse_multipart, Part, ParamVec, RawRequest,
};
use crate::schema::{BodyEncoding, FieldSpec, ObjectSchema, SemanticType};
use crate::validator::{join_loc, ErrorKind, ValidationError};
use crate::value::{BoundValue, FileUpload};
use serde_json::Value;
use tracing::debug;

pub(crate) const BODY_LOC: &str = "body";

/// Request body decoded according to the schema's encoding.
#[derive(Debug)]
pub(crate) enum Payload {
    /// No body was sent
    Absent,
    /// The body was refused and an error recorded; body fields are skipped
    Rejected,
    Json(Value),
    Form(ParamVec),
    Multipart(Vec<Part>),
}

fn reject(errors: &mut Vec<ValidationError>, kind: ErrorKind, message: String) -> Payload {
    errors.push(ValidationError::new(BODY_LOC, kind, message));
    Payload::Rejected
}

/// Decode the body once for every body field of `schema`.
pub(crate) fn read_payload(
    schema: &ObjectSchema,
    raw: &RawRequest,
    opts: &BindOptions,
    errors: &mut Vec<ValidationError>,
) -> Payload {
    if raw.body.is_empty() {
        return Payload::Absent;
    }
    if raw.body.len() > opts.max_body_bytes {
        return reject(
            errors,
            ErrorKind::RangeError,
            format!("request body exceeds {} bytes", opts.max_body_bytes),
        );
    }

    let encoding = schema.encoding();
    let media = raw.content_type().map(media_type);
    match (&media, encoding) {
        // a JSON body without a declared content type is still parsed as JSON
        (None, BodyEncoding::Json) => {}
        (Some(m), _) if encoding.accepts(m) => {}
        _ => {
            return reject(
                errors,
                ErrorKind::UnsupportedMediaType,
                format!(
                    "expected content type {}, got {}",
                    encoding.mime(),
                    media.as_deref().unwrap_or("none")
                ),
            )
        }
    }

    match encoding {
        BodyEncoding::Json => match serde_json::from_slice::<Value>(&raw.body) {
            Ok(v) => Payload::Json(v),
            Err(e) => reject(errors, ErrorKind::TypeError, format!("invalid JSON body: {e}")),
        },
        BodyEncoding::Form => Payload::Form(parse_form_body(&raw.body)),
        BodyEncoding::Multipart => {
            let boundary = raw
                .content_type()
                .and_then(|ct| content_type_param(ct, "boundary"));
            let Some(boundary) = boundary else {
                return reject(
                    errors,
                    ErrorKind::TypeError,
                    "multipart body declares no boundary".to_string(),
                );
            };
            match parse_multipart(&raw.body, &boundary) {
                Ok(parts) => {
                    debug!(part_count = parts.len(), "Multipart body parsed");
                    Payload::Multipart(parts)
                }
                Err(e) => reject(errors, ErrorKind::TypeError, e.to_string()),
            }
        }
    }
}

fn to_upload(part: &Part) -> FileUpload {
    FileUpload {
        filename: part.filename.clone(),
        content_type: part.content_type.clone(),
        data: part.data.clone(),
    }
}

fn bind_text_values(
    field: &FieldSpec,
    values: &[&str],
    loc: &str,
    errors: &mut Vec<ValidationError>,
) -> Option<(BoundValue, bool)> {
    if values.is_empty() {
        return bind_absent(field, loc, errors).map(|v| (v, false));
    }
    let bound = coerce_text(&field.ty, values, loc, errors)?;
    constraints::check(field, &bound, loc, errors).then_some((bound, true))
}

fn bind_files(
    field: &FieldSpec,
    parts: &[&Part],
    loc: &str,
    errors: &mut Vec<ValidationError>,
) -> Option<(BoundValue, bool)> {
    if parts.is_empty() {
        return bind_absent(field, loc, errors).map(|v| (v, false));
    }
    if let Some((i, _)) = parts.iter().enumerate().find(|(_, p)| !p.is_file()) {
        let at = if matches!(field.ty, SemanticType::File) {
            loc.to_string()
        } else {
            join_loc(loc, &i.to_string())
        };
        errors.push(ValidationError::new(at, ErrorKind::TypeError, "expected an uploaded file"));
        return None;
    }
    let mut files: Vec<BoundValue> = parts.iter().map(|p| BoundValue::File(to_upload(p))).collect();
    let value = match &field.ty {
        SemanticType::List(_) => BoundValue::List(files),
        SemanticType::Set(_) => BoundValue::Set(dedup(files)),
        _ => files.pop().unwrap_or(BoundValue::Absent),
    };
    constraints::check(field, &value, loc, errors).then_some((value, true))
}

/// Bind one body field from the decoded payload.
///
/// Returns `None` when the payload was rejected or errors were recorded.
pub(crate) fn bind_body_field(
    schema: &ObjectSchema,
    field: &FieldSpec,
    payload: &Payload,
    errors: &mut Vec<ValidationError>,
) -> Option<(BoundValue, bool)> {
    let key = field.wire_name();
    match payload {
        Payload::Rejected => None,
        Payload::Absent if schema.body_is_single_field() => {
            bind_absent(field, BODY_LOC, errors).map(|v| (v, false))
        }
        Payload::Absent => {
            bind_absent(field, &join_loc(BODY_LOC, &key), errors).map(|v| (v, false))
        }
        Payload::Json(body) if schema.body_is_single_field() => {
            bind_json_field(field, Some(body), BODY_LOC, errors)
        }
        Payload::Json(Value::Object(map)) => {
            bind_json_field(field, map.get(&key), &join_loc(BODY_LOC, &key), errors)
        }
        Payload::Json(_) => {
            // report the shape mismatch once, on the first body field
            let first = schema.body_fields().next().is_some_and(|f| f.name == field.name);
            if first {
                errors.push(ValidationError::new(
                    BODY_LOC,
                    ErrorKind::TypeError,
                    "expected a JSON object",
                ));
            }
            None
        }
        Payload::Form(params) => {
            let values: Vec<&str> = params
                .iter()
                .filter(|(k, _)| k.as_ref() == key)
                .map(|(_, v)| v.as_str())
                .collect();
            bind_text_values(field, &values, &join_loc(BODY_LOC, &key), errors)
        }
        Payload::Multipart(parts) => {
            let named: Vec<&Part> = parts.iter().filter(|p| p.name == key).collect();
            let loc = join_loc(BODY_LOC, &key);
            if field.ty.is_file() {
                bind_files(field, &named, &loc, errors)
            } else {
                let texts: Vec<String> = named.iter().map(|p| p.text()).collect();
                let values: Vec<&str> = texts.iter().map(String::as_str).collect();
                bind_text_values(field, &values, &loc, errors)
            }
        }
    }
}
