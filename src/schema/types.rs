use crate::shaper::ShapePolicy;
use crate::value::BoundValue;
use regex::Regex;
use serde::Deserialize;
use std::fmt;
use std::sync::Arc;

/// Where a field's raw value comes from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Source {
    Path,
    Query,
    Header,
    Cookie,
    Body,
}

impl fmt::Display for Source {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Source::Path => write!(f, "path"),
            Source::Query => write!(f, "query"),
            Source::Header => write!(f, "header"),
            Source::Cookie => write!(f, "cookie"),
            Source::Body => write!(f, "body"),
        }
    }
}

/// Body encoding a schema expects for its body-sourced fields.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BodyEncoding {
    #[default]
    Json,
    Form,
    Multipart,
}

impl BodyEncoding {
    /// Canonical media type
    #[must_use]
    pub fn mime(&self) -> &'static str {
        match self {
            BodyEncoding::Json => "application/json",
            BodyEncoding::Form => "application/x-www-form-urlencoded",
            BodyEncoding::Multipart => "multipart/form-data",
        }
    }

    /// Whether a lower-cased media type (no parameters) carries this encoding.
    ///
    /// Structured-syntax suffixes (`application/problem+json`) count as JSON.
    #[must_use]
    pub fn accepts(&self, media_type: &str) -> bool {
        match self {
            BodyEncoding::Json => media_type == "application/json" || media_type.ends_with("+json"),
            other => media_type == other.mime(),
        }
    }
}

/// Declared type of a field.
#[derive(Debug, Clone)]
pub enum SemanticType {
    String,
    Integer,
    Float,
    Boolean,
    /// Untyped JSON, accepted as-is
    Any,
    /// An uploaded multipart file
    File,
    /// One of a fixed set of values
    Enum(Vec<String>),
    List(Box<SemanticType>),
    Set(Box<SemanticType>),
    Map(Box<SemanticType>, Box<SemanticType>),
    Object(Arc<ObjectSchema>),
    /// The first member the value binds to without errors
    Union(Vec<SemanticType>),
}

impl SemanticType {
    pub fn list_of(inner: SemanticType) -> Self {
        SemanticType::List(Box::new(inner))
    }

    pub fn set_of(inner: SemanticType) -> Self {
        SemanticType::Set(Box::new(inner))
    }

    pub fn map_of(key: SemanticType, value: SemanticType) -> Self {
        SemanticType::Map(Box::new(key), Box::new(value))
    }

    pub fn enum_of<I, S>(members: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        SemanticType::Enum(members.into_iter().map(Into::into).collect())
    }

    pub fn union_of<I>(members: I) -> Self
    where
        I: IntoIterator<Item = SemanticType>,
    {
        SemanticType::Union(members.into_iter().collect())
    }

    /// Short human-readable name, used in messages
    #[must_use]
    pub fn describe(&self) -> String {
        match self {
            SemanticType::String => "string".into(),
            SemanticType::Integer => "integer".into(),
            SemanticType::Float => "float".into(),
            SemanticType::Boolean => "boolean".into(),
            SemanticType::Any => "any".into(),
            SemanticType::File => "file".into(),
            SemanticType::Enum(members) => format!("enum[{}]", members.join(", ")),
            SemanticType::List(inner) => format!("list<{}>", inner.describe()),
            SemanticType::Set(inner) => format!("set<{}>", inner.describe()),
            SemanticType::Map(k, v) => format!("map<{}, {}>", k.describe(), v.describe()),
            SemanticType::Object(schema) => format!("object<{}>", schema.name()),
            SemanticType::Union(members) => format!(
                "union<{}>",
                members
                    .iter()
                    .map(SemanticType::describe)
                    .collect::<Vec<_>>()
                    .join(" | ")
            ),
        }
    }

    #[must_use]
    pub fn is_numeric(&self) -> bool {
        matches!(self, SemanticType::Integer | SemanticType::Float)
    }

    /// Types a length bound applies to
    #[must_use]
    pub fn has_length(&self) -> bool {
        matches!(
            self,
            SemanticType::String | SemanticType::List(_) | SemanticType::Set(_) | SemanticType::Map(..)
        )
    }

    /// Types that can be read from a single textual parameter
    #[must_use]
    pub fn is_textual(&self) -> bool {
        match self {
            SemanticType::String
            | SemanticType::Integer
            | SemanticType::Float
            | SemanticType::Boolean
            | SemanticType::Any
            | SemanticType::Enum(_) => true,
            SemanticType::List(inner) | SemanticType::Set(inner) => inner.is_scalar_textual(),
            SemanticType::Union(members) => {
                !members.is_empty() && members.iter().all(SemanticType::is_scalar_textual)
            }
            _ => false,
        }
    }

    fn is_scalar_textual(&self) -> bool {
        !matches!(self, SemanticType::List(_) | SemanticType::Set(_)) && self.is_textual()
    }

    /// Whether this is a file or a list/set of files
    #[must_use]
    pub fn is_file(&self) -> bool {
        match self {
            SemanticType::File => true,
            SemanticType::List(inner) | SemanticType::Set(inner) => inner.is_file(),
            _ => false,
        }
    }

    /// Object schema reached through lists, sets and map values, if any
    #[must_use]
    pub fn object_schema(&self) -> Option<&Arc<ObjectSchema>> {
        match self {
            SemanticType::Object(schema) => Some(schema),
            SemanticType::List(inner) | SemanticType::Set(inner) => inner.object_schema(),
            SemanticType::Map(_, value) => value.object_schema(),
            _ => None,
        }
    }

    /// Whether an already bound value has the structure of this type.
    ///
    /// Used to pick the union member a bound value came from. Objects match on their
    /// field names; absent and null values fit any type.
    #[must_use]
    pub fn fits(&self, value: &BoundValue) -> bool {
        match (self, value) {
            (_, BoundValue::Absent | BoundValue::Null) | (SemanticType::Any, _) => true,
            (SemanticType::String | SemanticType::Enum(_), BoundValue::Str(_))
            | (SemanticType::Integer, BoundValue::Int(_))
            | (SemanticType::Float, BoundValue::Float(_))
            | (SemanticType::Boolean, BoundValue::Bool(_))
            | (SemanticType::File, BoundValue::File(_)) => true,
            (SemanticType::List(inner), BoundValue::List(items))
            | (SemanticType::Set(inner), BoundValue::Set(items)) => {
                items.iter().all(|item| inner.fits(item))
            }
            (SemanticType::Map(_, value_ty), BoundValue::Map(pairs)) => {
                pairs.iter().all(|(_, v)| value_ty.fits(v))
            }
            (SemanticType::Object(schema), BoundValue::Object(obj)) => {
                obj.len() == schema.fields().len()
                    && obj.fields().iter().all(|f| schema.field(&f.name).is_some())
            }
            (SemanticType::Union(members), v) => members.iter().any(|m| m.fits(v)),
            _ => false,
        }
    }

    /// The union member a bound value came from; the type itself when not a union.
    #[must_use]
    pub fn member_for(&self, value: &BoundValue) -> Option<&SemanticType> {
        match self {
            SemanticType::Union(members) => members
                .iter()
                .find(|m| m.fits(value))
                .and_then(|m| m.member_for(value)),
            other => Some(other),
        }
    }
}

/// Declared bounds on a field value.
///
/// Numeric bounds apply to integers and floats; length bounds count string characters
/// or collection items.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Constraints {
    pub min_length: Option<usize>,
    pub max_length: Option<usize>,
    /// Exclusive lower bound
    pub gt: Option<f64>,
    /// Inclusive lower bound
    pub ge: Option<f64>,
    /// Exclusive upper bound
    pub lt: Option<f64>,
    /// Inclusive upper bound
    pub le: Option<f64>,
    /// Regular expression searched in the string; anchor with `^...$` for a full match
    pub pattern: Option<String>,
}

impl Constraints {
    #[must_use]
    pub fn is_empty(&self) -> bool {
        *self == Constraints::default()
    }

    pub(crate) fn has_numeric(&self) -> bool {
        self.gt.is_some() || self.ge.is_some() || self.lt.is_some() || self.le.is_some()
    }

    pub(crate) fn has_length(&self) -> bool {
        self.min_length.is_some() || self.max_length.is_some()
    }
}

/// One declared input or output field.
///
/// Built through [`FieldSpec::path`], [`FieldSpec::query`] and friends, then frozen
/// inside an [`ObjectSchema`].
#[derive(Debug, Clone)]
pub struct FieldSpec {
    /// Declared name
    pub name: String,
    /// Wire name override
    pub alias: Option<String>,
    pub source: Source,
    pub ty: SemanticType,
    pub required: bool,
    /// Coerced default value; never present on a required field
    pub default: Option<BoundValue>,
    pub constraints: Constraints,
    /// Informational; supplying a deprecated field logs a warning
    pub deprecated: bool,
    /// Header fields: map `_` to `-` in the wire name
    pub convert_underscores: bool,
    /// Body fields: always nest under the field name, even when it is the only body field
    pub embed: bool,
    pub title: Option<String>,
    pub description: Option<String>,
    pub(crate) pattern: Option<Regex>,
}

impl FieldSpec {
    /// Name looked up on the wire.
    ///
    /// The alias wins; otherwise header names convert `_` to `-` unless disabled.
    #[must_use]
    pub fn wire_name(&self) -> String {
        if let Some(alias) = &self.alias {
            return alias.clone();
        }
        if self.source == Source::Header && self.convert_underscores {
            return self.name.replace('_', "-");
        }
        self.name.clone()
    }

    /// Compiled pattern constraint
    #[must_use]
    pub fn pattern(&self) -> Option<&Regex> {
        self.pattern.as_ref()
    }
}

/// Ordered set of uniquely named fields describing a structured input or output.
///
/// Immutable once built and shared as `Arc<ObjectSchema>`.
#[derive(Debug, Clone)]
pub struct ObjectSchema {
    pub(crate) name: String,
    pub(crate) fields: Vec<FieldSpec>,
    pub(crate) encoding: BodyEncoding,
}

impl ObjectSchema {
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    #[must_use]
    pub fn fields(&self) -> &[FieldSpec] {
        &self.fields
    }

    #[must_use]
    pub fn field(&self, name: &str) -> Option<&FieldSpec> {
        self.fields.iter().find(|f| f.name == name)
    }

    /// Field by wire name
    #[must_use]
    pub fn field_by_wire_name(&self, wire: &str) -> Option<&FieldSpec> {
        self.fields.iter().find(|f| f.wire_name() == wire)
    }

    #[must_use]
    pub fn encoding(&self) -> BodyEncoding {
        self.encoding
    }

    pub fn body_fields(&self) -> impl Iterator<Item = &FieldSpec> {
        self.fields.iter().filter(|f| f.source == Source::Body)
    }

    #[must_use]
    pub fn has_body_fields(&self) -> bool {
        self.body_fields().next().is_some()
    }

    /// Whether the whole JSON body binds to a single body field.
    ///
    /// True for JSON schemas with exactly one body field that is not embedded. Form and
    /// multipart bodies are always keyed by field.
    #[must_use]
    pub fn body_is_single_field(&self) -> bool {
        if self.encoding != BodyEncoding::Json {
            return false;
        }
        let mut body = self.body_fields();
        matches!((body.next(), body.next()), (Some(f), None) if !f.embed)
    }
}

/// Declared output type for response shaping, with optional narrower policies for
/// nested fields (keyed by dotted field path, e.g. `items.image`).
#[derive(Debug, Clone)]
pub struct ResponseShape {
    pub(crate) root: SemanticType,
    pub(crate) nested: Vec<(String, ShapePolicy)>,
}

impl ResponseShape {
    /// Shape with no nested overrides. Use [`ResponseShape::builder`] to add them.
    #[must_use]
    pub fn new(root: SemanticType) -> Self {
        ResponseShape {
            root,
            nested: Vec::new(),
        }
    }

    #[must_use]
    pub fn object(schema: Arc<ObjectSchema>) -> Self {
        Self::new(SemanticType::Object(schema))
    }

    #[must_use]
    pub fn list_of(schema: Arc<ObjectSchema>) -> Self {
        Self::new(SemanticType::list_of(SemanticType::Object(schema)))
    }

    #[must_use]
    pub fn root(&self) -> &SemanticType {
        &self.root
    }

    /// Narrower policy declared for a nested path
    #[must_use]
    pub fn nested_policy(&self, path: &str) -> Option<&ShapePolicy> {
        self.nested
            .iter()
            .find(|(p, _)| p == path)
            .map(|(_, policy)| policy)
    }
}
