//! # Response Shaper
//!
//! Serializes a handler's output into a wire-ready JSON value following its declared
//! [`ResponseShape`] and a [`ShapePolicy`].
//!
//! The shaper only ever drops fields. It never invents a field the shape does not
//! declare and never renames one: output keys are the declared wire names.
//!
//! ## Policies
//!
//! - **include-all**, **include-only(names)** or **exclude(names)**, as a [`Selection`].
//!   Names are declared field names; dotted names such as `image.url` reach nested
//!   fields.
//! - **exclude-unset**: drop fields the producer did not explicitly supply.
//!
//! Policies recurse into nested objects, lists, sets and map values. A list of objects
//! is shaped element by element with the same policy, so `exclude_unset` applies to each
//! item's own set-tracking. A [`ResponseShape`] may declare a narrower policy for a
//! nested field path, which then replaces the inherited one for that subtree.

use crate::binder::coerce_json;
use crate::schema::{ObjectSchema, ResponseShape, SemanticType};
use crate::validator::{
    join_loc, ErrorKind, SchemaError, SchemaIssue, ValidationError, ValidationErrors,
};
use crate::value::{BoundObject, BoundValue};
use serde_json::{Map, Value};
use std::collections::BTreeSet;

/// Which fields of an object are kept.
///
/// Include-only and exclude are mutually exclusive by construction.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum Selection {
    #[default]
    All,
    Only(BTreeSet<String>),
    Except(BTreeSet<String>),
}

/// Response filtering policy.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ShapePolicy {
    pub selection: Selection,
    pub exclude_unset: bool,
}

fn name_set<I, S>(names: I) -> BTreeSet<String>
where
    I: IntoIterator<Item = S>,
    S: Into<String>,
{
    names.into_iter().map(Into::into).collect()
}

/// Entries below `key`, with the `key.` prefix removed.
fn below(names: &BTreeSet<String>, key: &str) -> BTreeSet<String> {
    names
        .iter()
        .filter_map(|n| n.strip_prefix(key)?.strip_prefix('.'))
        .map(str::to_string)
        .collect()
}

impl ShapePolicy {
    #[must_use]
    pub fn include_all() -> Self {
        Self::default()
    }

    pub fn include_only<I, S>(names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        ShapePolicy {
            selection: Selection::Only(name_set(names)),
            exclude_unset: false,
        }
    }

    pub fn exclude<I, S>(names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        ShapePolicy {
            selection: Selection::Except(name_set(names)),
            exclude_unset: false,
        }
    }

    #[must_use]
    pub fn with_exclude_unset(mut self) -> Self {
        self.exclude_unset = true;
        self
    }

    /// Build from optional include/exclude lists, as read from configuration.
    ///
    /// # Errors
    ///
    /// `INVALID_SCHEMA` when both lists are given.
    pub fn from_parts(
        include: Option<Vec<String>>,
        exclude: Option<Vec<String>>,
        exclude_unset: bool,
    ) -> Result<Self, SchemaError> {
        let selection = match (include, exclude) {
            (Some(_), Some(_)) => {
                return Err(SchemaError {
                    issues: vec![SchemaIssue::new(
                        "policy",
                        ErrorKind::InvalidSchema,
                        "include and exclude are mutually exclusive",
                    )],
                })
            }
            (Some(only), None) => Selection::Only(name_set(only)),
            (None, Some(except)) => Selection::Except(name_set(except)),
            (None, None) => Selection::All,
        };
        Ok(ShapePolicy {
            selection,
            exclude_unset,
        })
    }

    /// Whether the field `name` of the current object is kept.
    #[must_use]
    pub fn admits(&self, name: &str) -> bool {
        match &self.selection {
            Selection::All => true,
            Selection::Only(names) => names.contains(name) || !below(names, name).is_empty(),
            Selection::Except(names) => !names.contains(name),
        }
    }

    /// Policy inherited by the nested value of field `name`.
    #[must_use]
    pub fn descend(&self, name: &str) -> ShapePolicy {
        let selection = match &self.selection {
            Selection::All => Selection::All,
            Selection::Only(names) if names.contains(name) => Selection::All,
            Selection::Only(names) => Selection::Only(below(names, name)),
            Selection::Except(names) => {
                let nested = below(names, name);
                if nested.is_empty() {
                    Selection::All
                } else {
                    Selection::Except(nested)
                }
            }
        };
        ShapePolicy {
            selection,
            exclude_unset: self.exclude_unset,
        }
    }
}

struct Shaper<'a> {
    shape: &'a ResponseShape,
}

impl Shaper<'_> {
    fn value(&self, ty: &SemanticType, value: &BoundValue, policy: &ShapePolicy, path: &str) -> Value {
        match (ty, value) {
            (SemanticType::Union(_), value) => match ty.member_for(value) {
                Some(member) => self.value(member, value, policy, path),
                None => value.to_json(),
            },
            (SemanticType::Object(schema), BoundValue::Object(obj)) => {
                self.object(schema, obj, policy, path)
            }
            (
                SemanticType::List(inner) | SemanticType::Set(inner),
                BoundValue::List(items) | BoundValue::Set(items),
            ) => Value::Array(
                items
                    .iter()
                    .map(|item| self.value(inner, item, policy, path))
                    .collect(),
            ),
            (SemanticType::Map(_, value_ty), BoundValue::Map(pairs)) => Value::Object(
                pairs
                    .iter()
                    .map(|(k, v)| (k.key_text(), self.value(value_ty, v, policy, path)))
                    .collect(),
            ),
            (_, other) => other.to_json(),
        }
    }

    fn object(
        &self,
        schema: &ObjectSchema,
        obj: &BoundObject,
        policy: &ShapePolicy,
        path: &str,
    ) -> Value {
        let mut out = Map::with_capacity(schema.fields().len());
        for field in schema.fields() {
            if !policy.admits(&field.name) {
                continue;
            }
            let fallback;
            let (value, set) = match obj.field(&field.name) {
                Some(bound) => (&bound.value, bound.explicitly_set),
                None => {
                    fallback = field.default.clone().unwrap_or(BoundValue::Absent);
                    (&fallback, false)
                }
            };
            if policy.exclude_unset && !set {
                continue;
            }
            let child_path = join_loc(path, &field.name);
            let child_policy = self
                .shape
                .nested_policy(&child_path)
                .cloned()
                .unwrap_or_else(|| policy.descend(&field.name));
            out.insert(
                field.wire_name(),
                self.value(&field.ty, value, &child_policy, &child_path),
            );
        }
        Value::Object(out)
    }
}

/// Shape a bound value.
#[must_use]
pub fn shape(shape: &ResponseShape, value: &BoundValue, policy: &ShapePolicy) -> Value {
    Shaper { shape }.value(shape.root(), value, policy, "")
}

/// Validate an arbitrary handler JSON value against the shape, then shape it.
///
/// Keys present in the JSON count as explicitly set; keys the shape does not declare
/// are dropped.
///
/// # Errors
///
/// Response validation errors located under `response`.
pub fn shape_json(
    shape_decl: &ResponseShape,
    value: &Value,
    policy: &ShapePolicy,
) -> Result<Value, ValidationErrors> {
    let mut errors = Vec::new();
    match coerce_json(shape_decl.root(), value, "response", &mut errors) {
        Some(bound) if errors.is_empty() => Ok(shape(shape_decl, &bound, policy)),
        _ => Err(ValidationErrors::from_vec(errors).unwrap_or_else(|| {
            ValidationErrors::single(ValidationError::new(
                "response",
                ErrorKind::TypeError,
                "response does not match the declared shape",
            ))
        })),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::FieldSpec;
    use serde_json::json;
    use std::sync::Arc;

    fn item_schema() -> Arc<ObjectSchema> {
        ObjectSchema::builder("Item")
            .field(FieldSpec::field("name", SemanticType::String).required())
            .field(FieldSpec::field("description", SemanticType::String))
            .field(FieldSpec::field("price", SemanticType::Float).required())
            .field(FieldSpec::field("tax", SemanticType::Float).default(json!(10.5)))
            .field(FieldSpec::field("tags", SemanticType::list_of(SemanticType::String)).default(json!([])))
            .build()
            .unwrap()
    }

    #[test]
    fn test_exclude_unset_keeps_only_supplied_fields() {
        let shape_decl = ResponseShape::object(item_schema());
        let out = shape_json(
            &shape_decl,
            &json!({"name": "Foo", "price": 50.2}),
            &ShapePolicy::include_all().with_exclude_unset(),
        )
        .unwrap();
        assert_eq!(out, json!({"name": "Foo", "price": 50.2}));
    }

    #[test]
    fn test_defaults_render_without_exclude_unset() {
        let shape_decl = ResponseShape::object(item_schema());
        let out = shape_json(&shape_decl, &json!({"name": "Foo", "price": 50.2}), &ShapePolicy::default()).unwrap();
        assert_eq!(
            out,
            json!({"name": "Foo", "description": null, "price": 50.2, "tax": 10.5, "tags": []})
        );
    }

    #[test]
    fn test_include_and_exclude() {
        let shape_decl = ResponseShape::object(item_schema());
        let v = json!({"name": "Foo", "price": 50.2, "secret": "dropped"});
        assert_eq!(
            shape_json(&shape_decl, &v, &ShapePolicy::include_only(["name", "description"])).unwrap(),
            json!({"name": "Foo", "description": null})
        );
        let out = shape_json(&shape_decl, &v, &ShapePolicy::exclude(["tax"])).unwrap();
        assert!(out.get("tax").is_none());
        assert!(out.get("secret").is_none());
    }

    #[test]
    fn test_from_parts_rejects_both() {
        let err = ShapePolicy::from_parts(Some(vec!["a".into()]), Some(vec!["b".into()]), false)
            .unwrap_err();
        assert!(err.has_kind(ErrorKind::InvalidSchema));
    }

    #[test]
    fn test_dotted_selection() {
        let policy = ShapePolicy::include_only(["image.url", "name"]);
        assert!(policy.admits("image"));
        assert!(!policy.admits("price"));
        assert_eq!(policy.descend("image"), ShapePolicy::include_only(["url"]));
        assert_eq!(policy.descend("name").selection, Selection::All);
    }

    #[test]
    fn test_response_validation_errors() {
        let shape_decl = ResponseShape::object(item_schema());
        let err = shape_json(&shape_decl, &json!({"price": "free"}), &ShapePolicy::default()).unwrap_err();
        let locs: Vec<&str> = err.iter().map(|e| e.loc.as_str()).collect();
        assert_eq!(locs, vec!["response.name", "response.price"]);
    }
}
