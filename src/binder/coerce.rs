use super::constraints;
use crate::schema::{FieldSpec, ObjectSchema, SemanticType};
use crate::validator::{join_loc, ErrorKind, ValidationError};
use crate::value::{BoundObject, BoundValue};
use serde_json::{Map, Value};

const TRUE_WORDS: [&str; 4] = ["true", "1", "yes", "on"];
const FALSE_WORDS: [&str; 4] = ["false", "0", "no", "off"];

/// Boolean vocabulary, case-insensitive.
pub(crate) fn parse_bool(text: &str) -> Option<bool> {
    let t = text.trim();
    if TRUE_WORDS.iter().any(|w| t.eq_ignore_ascii_case(w)) {
        Some(true)
    } else if FALSE_WORDS.iter().any(|w| t.eq_ignore_ascii_case(w)) {
        Some(false)
    } else {
        None
    }
}

pub(crate) fn parse_int(text: &str) -> Option<i64> {
    text.trim().parse::<i64>().ok()
}

/// Finite floats only; `nan` and `inf` are rejected.
pub(crate) fn parse_float(text: &str) -> Option<f64> {
    text.trim().parse::<f64>().ok().filter(|f| f.is_finite())
}

fn type_error(loc: &str, message: impl Into<String>) -> ValidationError {
    ValidationError::new(loc, ErrorKind::TypeError, message)
}

fn not_a_member(members: &[String], loc: &str) -> ValidationError {
    type_error(
        loc,
        format!("value is not a valid enumeration member; permitted: {}", members.join(", ")),
    )
}

/// Set semantics: keep the first occurrence of each value.
pub(crate) fn dedup(items: Vec<BoundValue>) -> Vec<BoundValue> {
    let mut out: Vec<BoundValue> = Vec::with_capacity(items.len());
    for item in items {
        if !out.contains(&item) {
            out.push(item);
        }
    }
    out
}

/// Coerce one raw text to a scalar type.
pub(crate) fn coerce_scalar_text(
    ty: &SemanticType,
    text: &str,
    loc: &str,
) -> Result<BoundValue, ValidationError> {
    match ty {
        SemanticType::String => Ok(BoundValue::Str(text.to_string())),
        SemanticType::Any => Ok(BoundValue::Json(Value::String(text.to_string()))),
        SemanticType::Integer => parse_int(text)
            .map(BoundValue::Int)
            .ok_or_else(|| type_error(loc, "value is not a valid integer")),
        SemanticType::Float => parse_float(text)
            .map(BoundValue::Float)
            .ok_or_else(|| type_error(loc, "value is not a valid float")),
        SemanticType::Boolean => parse_bool(text)
            .map(BoundValue::Bool)
            .ok_or_else(|| type_error(loc, "value could not be parsed to a boolean")),
        SemanticType::Enum(members) => {
            if members.iter().any(|m| m == text) {
                Ok(BoundValue::Str(text.to_string()))
            } else {
                Err(not_a_member(members, loc))
            }
        }
        SemanticType::File => Err(type_error(loc, "expected an uploaded file")),
        SemanticType::Union(members) => members
            .iter()
            .find_map(|m| coerce_scalar_text(m, text, loc).ok())
            .ok_or_else(|| {
                type_error(loc, format!("value does not match any of {}", ty.describe()))
            }),
        other => Err(type_error(
            loc,
            format!("expected {}, got a single text value", other.describe()),
        )),
    }
}

/// Coerce the textual values of one parameter (query, header, cookie, path, form).
///
/// Lists and sets take every value in appearance order, each item reported at
/// `loc.<index>`. Scalars take the last value. `values` is never empty.
pub(crate) fn coerce_text(
    ty: &SemanticType,
    values: &[&str],
    loc: &str,
    errors: &mut Vec<ValidationError>,
) -> Option<BoundValue> {
    match ty {
        SemanticType::List(inner) | SemanticType::Set(inner) => {
            let before = errors.len();
            let mut items = Vec::with_capacity(values.len());
            for (i, text) in values.iter().enumerate() {
                match coerce_scalar_text(inner, text, &join_loc(loc, &i.to_string())) {
                    Ok(v) => items.push(v),
                    Err(e) => errors.push(e),
                }
            }
            if errors.len() > before {
                return None;
            }
            Some(if matches!(ty, SemanticType::Set(_)) {
                BoundValue::Set(dedup(items))
            } else {
                BoundValue::List(items)
            })
        }
        _ => {
            let text = values.last().copied().unwrap_or_default();
            match coerce_scalar_text(ty, text, loc) {
                Ok(v) => Some(v),
                Err(e) => {
                    errors.push(e);
                    None
                }
            }
        }
    }
}

fn json_integer(value: &Value) -> Option<i64> {
    match value {
        Value::Number(n) => n.as_i64().or_else(|| {
            n.as_f64()
                .filter(|f| f.fract() == 0.0 && *f >= i64::MIN as f64 && *f < i64::MAX as f64)
                .map(|f| f as i64)
        }),
        Value::String(s) => parse_int(s),
        _ => None,
    }
}

fn json_float(value: &Value) -> Option<f64> {
    match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => parse_float(s),
        _ => None,
    }
}

fn json_bool(value: &Value) -> Option<bool> {
    match value {
        Value::Bool(b) => Some(*b),
        Value::Number(n) => match n.as_i64() {
            Some(1) => Some(true),
            Some(0) => Some(false),
            _ => None,
        },
        Value::String(s) => parse_bool(s),
        _ => None,
    }
}

/// Coerce a JSON value to a declared type, laxly.
///
/// Numeric strings become numbers, integral floats become integers, booleans accept
/// the textual vocabulary and 0/1, and numbers and booleans are accepted as strings
/// (`true` becomes `"True"`). Nested objects bind field by field.
pub(crate) fn coerce_json(
    ty: &SemanticType,
    value: &Value,
    loc: &str,
    errors: &mut Vec<ValidationError>,
) -> Option<BoundValue> {
    if value.is_null() && !matches!(ty, SemanticType::Any) {
        errors.push(type_error(loc, "none is not an allowed value"));
        return None;
    }
    let coerced = match ty {
        SemanticType::Any => Ok(BoundValue::Json(value.clone())),
        SemanticType::String => match value {
            Value::String(s) => Ok(BoundValue::Str(s.clone())),
            Value::Number(n) => Ok(BoundValue::Str(n.to_string())),
            Value::Bool(b) => Ok(BoundValue::Str(if *b { "True" } else { "False" }.to_string())),
            _ => Err(type_error(loc, "value is not a valid string")),
        },
        SemanticType::Integer => json_integer(value)
            .map(BoundValue::Int)
            .ok_or_else(|| type_error(loc, "value is not a valid integer")),
        SemanticType::Float => json_float(value)
            .map(BoundValue::Float)
            .ok_or_else(|| type_error(loc, "value is not a valid float")),
        SemanticType::Boolean => json_bool(value)
            .map(BoundValue::Bool)
            .ok_or_else(|| type_error(loc, "value could not be parsed to a boolean")),
        SemanticType::Enum(members) => match value {
            Value::String(s) if members.contains(s) => Ok(BoundValue::Str(s.clone())),
            _ => Err(not_a_member(members, loc)),
        },
        SemanticType::File => Err(type_error(loc, "expected an uploaded file")),
        SemanticType::List(inner) | SemanticType::Set(inner) => {
            let Value::Array(items) = value else {
                errors.push(type_error(loc, "value is not a valid list"));
                return None;
            };
            let before = errors.len();
            let bound: Vec<BoundValue> = items
                .iter()
                .enumerate()
                .filter_map(|(i, item)| coerce_json(inner, item, &join_loc(loc, &i.to_string()), errors))
                .collect();
            if errors.len() > before {
                return None;
            }
            Ok(if matches!(ty, SemanticType::Set(_)) {
                BoundValue::Set(dedup(bound))
            } else {
                BoundValue::List(bound)
            })
        }
        SemanticType::Map(key_ty, value_ty) => {
            let Value::Object(map) = value else {
                errors.push(type_error(loc, "value is not a valid dict"));
                return None;
            };
            let before = errors.len();
            let mut pairs = Vec::with_capacity(map.len());
            for (key, item) in map {
                let item_loc = join_loc(loc, key);
                let k = match coerce_scalar_text(key_ty, key, &item_loc) {
                    Ok(k) => Some(k),
                    Err(e) => {
                        errors.push(e);
                        None
                    }
                };
                let v = coerce_json(value_ty, item, &item_loc, errors);
                if let (Some(k), Some(v)) = (k, v) {
                    pairs.push((k, v));
                }
            }
            if errors.len() > before {
                return None;
            }
            Ok(BoundValue::Map(pairs))
        }
        SemanticType::Object(schema) => {
            let Value::Object(map) = value else {
                errors.push(type_error(loc, "value is not a valid object"));
                return None;
            };
            let before = errors.len();
            let obj = bind_json_object(schema, map, loc, errors);
            if errors.len() > before {
                return None;
            }
            Ok(BoundValue::Object(obj))
        }
        SemanticType::Union(members) => {
            // first member that binds cleanly; otherwise every member's errors
            let mut attempts = Vec::new();
            for member in members {
                let mut member_errors = Vec::new();
                if let Some(bound) = coerce_json(member, value, loc, &mut member_errors) {
                    if member_errors.is_empty() {
                        return Some(bound);
                    }
                }
                attempts.extend(member_errors);
            }
            if attempts.is_empty() {
                attempts.push(type_error(
                    loc,
                    format!("value does not match any of {}", ty.describe()),
                ));
            }
            errors.extend(attempts);
            return None;
        }
    };
    match coerced {
        Ok(v) => Some(v),
        Err(e) => {
            errors.push(e);
            None
        }
    }
}

/// Value for a field that was not supplied: its default (not explicitly set), a
/// `MISSING` error when required, or `Absent`.
pub(crate) fn bind_absent(
    field: &FieldSpec,
    loc: &str,
    errors: &mut Vec<ValidationError>,
) -> Option<BoundValue> {
    if let Some(default) = &field.default {
        Some(default.clone())
    } else if field.required {
        errors.push(ValidationError::new(loc, ErrorKind::Missing, "field required"));
        None
    } else {
        Some(BoundValue::Absent)
    }
}

/// Bind one field from an optional JSON value. Returns the value and whether it was
/// explicitly supplied, or `None` when errors were recorded.
pub(crate) fn bind_json_field(
    field: &FieldSpec,
    value: Option<&Value>,
    loc: &str,
    errors: &mut Vec<ValidationError>,
) -> Option<(BoundValue, bool)> {
    match value {
        None => bind_absent(field, loc, errors).map(|v| (v, false)),
        Some(Value::Null) if !matches!(field.ty, SemanticType::Any) => {
            if field.required {
                errors.push(type_error(loc, "none is not an allowed value"));
                None
            } else {
                Some((BoundValue::Null, true))
            }
        }
        Some(v) => {
            let bound = coerce_json(&field.ty, v, loc, errors)?;
            constraints::check(field, &bound, loc, errors).then_some((bound, true))
        }
    }
}

/// Bind every field of a nested object schema from a JSON object, keyed by wire name.
///
/// Unknown keys are ignored. Errors land under `prefix.<wire name>`.
pub(crate) fn bind_json_object(
    schema: &ObjectSchema,
    map: &Map<String, Value>,
    prefix: &str,
    errors: &mut Vec<ValidationError>,
) -> BoundObject {
    let mut obj = BoundObject::with_capacity(schema.fields().len());
    for field in schema.fields() {
        let key = field.wire_name();
        let loc = join_loc(prefix, &key);
        if let Some((value, set)) = bind_json_field(field, map.get(&key), &loc, errors) {
            obj.push(field.name.clone(), key, value, set);
        }
    }
    obj
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_bool_vocabulary() {
        for t in ["true", "TRUE", "1", "Yes", "on"] {
            assert_eq!(parse_bool(t), Some(true), "{t}");
        }
        for f in ["false", "0", "NO", "Off"] {
            assert_eq!(parse_bool(f), Some(false), "{f}");
        }
        assert_eq!(parse_bool("maybe"), None);
    }

    #[test]
    fn test_float_rejects_non_finite() {
        assert_eq!(parse_float("1.5"), Some(1.5));
        assert_eq!(parse_float("NaN"), None);
        assert_eq!(parse_float("inf"), None);
    }

    #[test]
    fn test_list_item_errors_are_indexed() {
        let mut errors = Vec::new();
        let ty = SemanticType::list_of(SemanticType::Integer);
        assert!(coerce_text(&ty, &["1", "x", "3", "y"], "ids", &mut errors).is_none());
        let locs: Vec<&str> = errors.iter().map(|e| e.loc.as_str()).collect();
        assert_eq!(locs, vec!["ids.1", "ids.3"]);
    }

    #[test]
    fn test_scalar_takes_last_value() {
        let mut errors = Vec::new();
        let v = coerce_text(&SemanticType::Integer, &["1", "2"], "n", &mut errors);
        assert_eq!(v, Some(BoundValue::Int(2)));
    }

    #[test]
    fn test_lax_json_numbers() {
        let mut errors = Vec::new();
        assert_eq!(
            coerce_json(&SemanticType::Integer, &json!(3.0), "x", &mut errors),
            Some(BoundValue::Int(3))
        );
        assert_eq!(
            coerce_json(&SemanticType::Float, &json!("2.5"), "x", &mut errors),
            Some(BoundValue::Float(2.5))
        );
        assert!(coerce_json(&SemanticType::Integer, &json!(3.5), "x", &mut errors).is_none());
        assert_eq!(errors.len(), 1);
        assert_eq!(errors[0].kind, ErrorKind::TypeError);
    }

    #[test]
    fn test_map_keys_coerce_to_key_type() {
        let mut errors = Vec::new();
        let ty = SemanticType::map_of(SemanticType::Integer, SemanticType::Float);
        let v = coerce_json(&ty, &json!({"1": 0.5, "two": 1.0}), "body", &mut errors);
        assert!(v.is_none());
        assert_eq!(errors[0].loc, "body.two");
    }

    #[test]
    fn test_integer_rejects_floats_beyond_range() {
        let mut errors = Vec::new();
        // 2^63 is not representable as i64
        let too_big = json!(9_223_372_036_854_775_808.0);
        assert!(coerce_json(&SemanticType::Integer, &too_big, "x", &mut errors).is_none());
        assert_eq!(errors[0].message, "value is not a valid integer");
        assert_eq!(
            coerce_json(&SemanticType::Integer, &json!(-9_223_372_036_854_775_808.0), "x", &mut errors),
            Some(BoundValue::Int(i64::MIN))
        );
    }

    #[test]
    fn test_strings_accept_numbers_and_booleans() {
        let mut errors = Vec::new();
        assert_eq!(
            coerce_json(&SemanticType::String, &json!(true), "x", &mut errors),
            Some(BoundValue::Str("True".into()))
        );
        assert_eq!(
            coerce_json(&SemanticType::String, &json!(false), "x", &mut errors),
            Some(BoundValue::Str("False".into()))
        );
        assert_eq!(
            coerce_json(&SemanticType::String, &json!(42), "x", &mut errors),
            Some(BoundValue::Str("42".into()))
        );
        assert!(coerce_json(&SemanticType::String, &json!([1]), "x", &mut errors).is_none());
        assert_eq!(errors.len(), 1);
    }

    #[test]
    fn test_union_takes_first_member_that_binds() {
        let ty = SemanticType::union_of([SemanticType::Integer, SemanticType::String]);
        let mut errors = Vec::new();
        assert_eq!(coerce_text(&ty, &["7"], "q", &mut errors), Some(BoundValue::Int(7)));
        assert_eq!(
            coerce_text(&ty, &["seven"], "q", &mut errors),
            Some(BoundValue::Str("seven".into()))
        );

        let strict = SemanticType::union_of([SemanticType::Integer, SemanticType::Boolean]);
        assert!(coerce_text(&strict, &["seven"], "q", &mut errors).is_none());
        assert_eq!(errors[0].message, "value does not match any of union<integer | boolean>");

        assert!(coerce_json(&strict, &json!("seven"), "body.q", &mut errors).is_none());
        let locs: Vec<&str> = errors[1..].iter().map(|e| e.loc.as_str()).collect();
        assert_eq!(locs, vec!["body.q", "body.q"]);
    }
}
