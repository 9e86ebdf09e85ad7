use crate::schema::FieldSpec;
use crate::validator::{ErrorKind, ValidationError};
use crate::value::BoundValue;

fn length_of(value: &BoundValue) -> Option<usize> {
    match value {
        BoundValue::Str(s) => Some(s.chars().count()),
        BoundValue::List(items) | BoundValue::Set(items) => Some(items.len()),
        BoundValue::Map(pairs) => Some(pairs.len()),
        _ => None,
    }
}

fn number_of(value: &BoundValue) -> Option<f64> {
    match value {
        BoundValue::Int(i) => Some(*i as f64),
        BoundValue::Float(f) => Some(*f),
        _ => None,
    }
}

fn first_violation(field: &FieldSpec, value: &BoundValue) -> Option<(ErrorKind, String)> {
    let c = &field.constraints;
    if let Some(len) = length_of(value) {
        if let Some(min) = c.min_length.filter(|min| len < *min) {
            return Some((
                ErrorKind::RangeError,
                format!("ensure this value has at least {min} characters or items"),
            ));
        }
        if let Some(max) = c.max_length.filter(|max| len > *max) {
            return Some((
                ErrorKind::RangeError,
                format!("ensure this value has at most {max} characters or items"),
            ));
        }
    }
    if let Some(n) = number_of(value) {
        if let Some(gt) = c.gt.filter(|gt| n <= *gt) {
            return Some((ErrorKind::RangeError, format!("ensure this value is greater than {gt}")));
        }
        if let Some(ge) = c.ge.filter(|ge| n < *ge) {
            return Some((
                ErrorKind::RangeError,
                format!("ensure this value is greater than or equal to {ge}"),
            ));
        }
        if let Some(lt) = c.lt.filter(|lt| n >= *lt) {
            return Some((ErrorKind::RangeError, format!("ensure this value is less than {lt}")));
        }
        if let Some(le) = c.le.filter(|le| n > *le) {
            return Some((
                ErrorKind::RangeError,
                format!("ensure this value is less than or equal to {le}"),
            ));
        }
    }
    if let (BoundValue::Str(s), Some(re)) = (value, field.pattern()) {
        if !re.is_match(s) {
            return Some((
                ErrorKind::PatternError,
                format!("string does not match regex \"{}\"", re.as_str()),
            ));
        }
    }
    None
}

/// Check a coerced value against the field's declared bounds.
///
/// Records at most one error per field and returns whether the value passed.
pub(crate) fn check(
    field: &FieldSpec,
    value: &BoundValue,
    loc: &str,
    errors: &mut Vec<ValidationError>,
) -> bool {
    match first_violation(field, value) {
        Some((kind, message)) => {
            errors.push(ValidationError::new(loc, kind, message));
            false
        }
        None => true,
    }
}
