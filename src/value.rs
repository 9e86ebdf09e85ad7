//! # Bound Values
//!
//! [`BoundValue`] is what the binder produces for one field: a coerced, validated runtime
//! value owned by a single request. Objects keep, per field, whether the value was
//! explicitly supplied by the producer or filled in from a declared default. Response
//! shaping (`exclude_unset`) and partial updates ([`BoundObject::merge_into`]) rely on
//! that flag.

use serde::de::DeserializeOwned;
use serde_json::{json, Map, Number, Value};

/// An uploaded file taken from a `multipart/form-data` body.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileUpload {
    /// Client-supplied file name, if any
    pub filename: Option<String>,
    /// Part content type, if any
    pub content_type: Option<String>,
    /// Raw part bytes
    pub data: Vec<u8>,
}

impl FileUpload {
    #[must_use]
    pub fn size(&self) -> usize {
        self.data.len()
    }
}

/// A coerced and validated value.
#[derive(Debug, Clone, PartialEq)]
pub enum BoundValue {
    /// The field was not supplied and has no default. Not the same as an empty string.
    Absent,
    /// An explicit JSON `null`
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    Str(String),
    File(FileUpload),
    /// Untyped JSON (`any` fields)
    Json(Value),
    List(Vec<BoundValue>),
    /// De-duplicated by value equality, in first-appearance order
    Set(Vec<BoundValue>),
    /// Ordered key/value pairs; keys are coerced to the declared key type
    Map(Vec<(BoundValue, BoundValue)>),
    Object(BoundObject),
}

impl BoundValue {
    #[must_use]
    pub fn is_absent(&self) -> bool {
        matches!(self, BoundValue::Absent)
    }

    #[must_use]
    pub fn as_str(&self) -> Option<&str> {
        match self {
            BoundValue::Str(s) => Some(s),
            _ => None,
        }
    }

    #[must_use]
    pub fn as_i64(&self) -> Option<i64> {
        match self {
            BoundValue::Int(i) => Some(*i),
            _ => None,
        }
    }

    #[must_use]
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            BoundValue::Float(f) => Some(*f),
            BoundValue::Int(i) => Some(*i as f64),
            _ => None,
        }
    }

    #[must_use]
    pub fn as_bool(&self) -> Option<bool> {
        match self {
            BoundValue::Bool(b) => Some(*b),
            _ => None,
        }
    }

    #[must_use]
    pub fn as_object(&self) -> Option<&BoundObject> {
        match self {
            BoundValue::Object(o) => Some(o),
            _ => None,
        }
    }

    #[must_use]
    pub fn as_file(&self) -> Option<&FileUpload> {
        match self {
            BoundValue::File(f) => Some(f),
            _ => None,
        }
    }

    /// Items of a list or set
    #[must_use]
    pub fn as_items(&self) -> Option<&[BoundValue]> {
        match self {
            BoundValue::List(items) | BoundValue::Set(items) => Some(items),
            _ => None,
        }
    }

    /// Text used when this value is a mapping key.
    #[must_use]
    pub fn key_text(&self) -> String {
        match self {
            BoundValue::Str(s) => s.clone(),
            BoundValue::Int(i) => i.to_string(),
            BoundValue::Float(f) => f.to_string(),
            BoundValue::Bool(b) => b.to_string(),
            other => other.to_json().to_string(),
        }
    }

    /// Render as JSON. Absent renders as `null`; files render as a summary.
    #[must_use]
    pub fn to_json(&self) -> Value {
        self.render(false)
    }

    pub(crate) fn render(&self, set_only: bool) -> Value {
        match self {
            BoundValue::Absent | BoundValue::Null => Value::Null,
            BoundValue::Bool(b) => Value::Bool(*b),
            BoundValue::Int(i) => Value::from(*i),
            BoundValue::Float(f) => Number::from_f64(*f).map_or(Value::Null, Value::Number),
            BoundValue::Str(s) => Value::String(s.clone()),
            BoundValue::File(file) => json!({
                "filename": file.filename,
                "content_type": file.content_type,
                "size": file.size(),
            }),
            BoundValue::Json(v) => v.clone(),
            BoundValue::List(items) | BoundValue::Set(items) => {
                Value::Array(items.iter().map(|v| v.render(set_only)).collect())
            }
            BoundValue::Map(pairs) => Value::Object(
                pairs
                    .iter()
                    .map(|(k, v)| (k.key_text(), v.render(set_only)))
                    .collect(),
            ),
            BoundValue::Object(obj) => obj.render(set_only),
        }
    }
}

/// One field of a [`BoundObject`].
#[derive(Debug, Clone, PartialEq)]
pub struct BoundField {
    /// Declared field name
    pub name: String,
    /// Wire name (alias or converted header name)
    pub key: String,
    pub value: BoundValue,
    /// `true` when the producer supplied the value, `false` when it came from a default
    pub explicitly_set: bool,
}

/// Ordered set of bound fields, following the schema's field order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct BoundObject {
    fields: Vec<BoundField>,
}

impl BoundObject {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with_capacity(n: usize) -> Self {
        BoundObject {
            fields: Vec::with_capacity(n),
        }
    }

    pub fn push(
        &mut self,
        name: impl Into<String>,
        key: impl Into<String>,
        value: BoundValue,
        explicitly_set: bool,
    ) {
        self.fields.push(BoundField {
            name: name.into(),
            key: key.into(),
            value,
            explicitly_set,
        });
    }

    #[must_use]
    pub fn fields(&self) -> &[BoundField] {
        &self.fields
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.fields.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    #[must_use]
    pub fn field(&self, name: &str) -> Option<&BoundField> {
        self.fields.iter().find(|f| f.name == name)
    }

    /// Value of a field by declared name
    #[must_use]
    pub fn get(&self, name: &str) -> Option<&BoundValue> {
        self.field(name).map(|f| &f.value)
    }

    /// Whether the field was explicitly supplied
    #[must_use]
    pub fn is_set(&self, name: &str) -> bool {
        self.field(name).is_some_and(|f| f.explicitly_set)
    }

    /// Declared names of the explicitly supplied fields
    #[must_use]
    pub fn set_fields(&self) -> Vec<&str> {
        self.fields
            .iter()
            .filter(|f| f.explicitly_set)
            .map(|f| f.name.as_str())
            .collect()
    }

    /// Every field keyed by declared name.
    #[must_use]
    pub fn to_json(&self) -> Value {
        self.render(false)
    }

    /// Only explicitly supplied fields, recursively.
    #[must_use]
    pub fn to_json_set_only(&self) -> Value {
        self.render(true)
    }

    fn render(&self, set_only: bool) -> Value {
        let mut map = Map::with_capacity(self.fields.len());
        for f in &self.fields {
            if set_only && !f.explicitly_set {
                continue;
            }
            map.insert(f.name.clone(), f.value.render(set_only));
        }
        Value::Object(map)
    }

    /// Deserialize the bound fields into a plain data struct.
    pub fn deserialize<T: DeserializeOwned>(&self) -> serde_json::Result<T> {
        serde_json::from_value(self.to_json())
    }

    /// Apply the explicitly supplied fields onto a stored record.
    ///
    /// Fields left at their defaults never overwrite stored data. The overlay is shallow:
    /// a supplied nested object replaces the stored one. A non-object `stored` value is
    /// treated as an empty record.
    #[must_use]
    pub fn merge_into(&self, stored: &Value) -> Value {
        let mut merged = match stored {
            Value::Object(map) => map.clone(),
            _ => Map::new(),
        };
        for f in self.fields.iter().filter(|f| f.explicitly_set) {
            merged.insert(f.name.clone(), f.value.to_json());
        }
        Value::Object(merged)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn item() -> BoundObject {
        let mut obj = BoundObject::new();
        obj.push("name", "name", BoundValue::Str("Foo".into()), true);
        obj.push("price", "price", BoundValue::Float(50.2), true);
        obj.push("tax", "tax", BoundValue::Float(10.5), false);
        obj.push("tags", "tags", BoundValue::List(vec![]), false);
        obj
    }

    #[test]
    fn test_set_only_rendering() {
        assert_eq!(
            item().to_json_set_only(),
            json!({"name": "Foo", "price": 50.2})
        );
        assert_eq!(item().set_fields(), vec!["name", "price"]);
    }

    #[test]
    fn test_merge_keeps_stored_values_for_unset_fields() {
        let stored = json!({"name": "Bar", "price": 62.0, "tax": 20.2, "tags": ["x"]});
        let mut patch = BoundObject::new();
        patch.push("name", "name", BoundValue::Absent, false);
        patch.push("price", "price", BoundValue::Float(70.0), true);
        patch.push("tax", "tax", BoundValue::Float(10.5), false);
        let merged = patch.merge_into(&stored);
        assert_eq!(
            merged,
            json!({"name": "Bar", "price": 70.0, "tax": 20.2, "tags": ["x"]})
        );
    }

    #[test]
    fn test_absent_is_not_empty_string() {
        assert_ne!(BoundValue::Absent, BoundValue::Str(String::new()));
        assert_eq!(BoundValue::Absent.to_json(), Value::Null);
    }

    #[test]
    fn test_map_keys_render_as_text() {
        let v = BoundValue::Map(vec![(BoundValue::Int(1), BoundValue::Float(0.5))]);
        assert_eq!(v.to_json(), json!({"1": 0.5}));
    }
}
