use super::types::{
    BodyEncoding, Constraints, FieldSpec, ObjectSchema, ResponseShape, SemanticType, Source,
};
use crate::binder::{check_constraints, coerce_json};
use crate::shaper::ShapePolicy;
use crate::validator::{fail_if_issues, ErrorKind, SchemaError, SchemaIssue};
use crate::value::BoundValue;
use regex::Regex;
use serde_json::Value;
use std::collections::HashSet;
use std::sync::Arc;
use tracing::debug;

/// Field declaration in progress. Frozen by [`ObjectSchemaBuilder::build`].
#[derive(Debug, Clone)]
pub struct FieldBuilder {
    spec: FieldSpec,
    default: Option<Value>,
    underscores_declared: bool,
}

impl FieldSpec {
    fn declare(name: &str, source: Source, ty: SemanticType) -> FieldBuilder {
        FieldBuilder {
            spec: FieldSpec {
                name: name.to_string(),
                alias: None,
                source,
                ty,
                required: source == Source::Path,
                default: None,
                constraints: Constraints::default(),
                deprecated: false,
                convert_underscores: true,
                embed: false,
                title: None,
                description: None,
                pattern: None,
            },
            default: None,
            underscores_declared: false,
        }
    }

    /// Path segment value. Always required.
    pub fn path(name: &str, ty: SemanticType) -> FieldBuilder {
        Self::declare(name, Source::Path, ty)
    }

    /// Query parameter, optional until `.required()`.
    pub fn query(name: &str, ty: SemanticType) -> FieldBuilder {
        Self::declare(name, Source::Query, ty)
    }

    pub fn header(name: &str, ty: SemanticType) -> FieldBuilder {
        Self::declare(name, Source::Header, ty)
    }

    pub fn cookie(name: &str, ty: SemanticType) -> FieldBuilder {
        Self::declare(name, Source::Cookie, ty)
    }

    pub fn body(name: &str, ty: SemanticType) -> FieldBuilder {
        Self::declare(name, Source::Body, ty)
    }

    /// Field of a nested model; same as [`FieldSpec::body`].
    pub fn field(name: &str, ty: SemanticType) -> FieldBuilder {
        Self::declare(name, Source::Body, ty)
    }
}

impl FieldBuilder {
    #[must_use]
    pub fn required(mut self) -> Self {
        self.spec.required = true;
        self
    }

    #[must_use]
    pub fn optional(mut self) -> Self {
        self.spec.required = false;
        self
    }

    /// Default used when the field is absent, coerced and checked at build time.
    #[must_use]
    pub fn default(mut self, value: Value) -> Self {
        self.default = Some(value);
        self
    }

    #[must_use]
    pub fn alias(mut self, alias: &str) -> Self {
        self.spec.alias = Some(alias.to_string());
        self
    }

    #[must_use]
    pub fn min_length(mut self, n: usize) -> Self {
        self.spec.constraints.min_length = Some(n);
        self
    }

    #[must_use]
    pub fn max_length(mut self, n: usize) -> Self {
        self.spec.constraints.max_length = Some(n);
        self
    }

    #[must_use]
    pub fn gt(mut self, bound: f64) -> Self {
        self.spec.constraints.gt = Some(bound);
        self
    }

    #[must_use]
    pub fn ge(mut self, bound: f64) -> Self {
        self.spec.constraints.ge = Some(bound);
        self
    }

    #[must_use]
    pub fn lt(mut self, bound: f64) -> Self {
        self.spec.constraints.lt = Some(bound);
        self
    }

    #[must_use]
    pub fn le(mut self, bound: f64) -> Self {
        self.spec.constraints.le = Some(bound);
        self
    }

    #[must_use]
    pub fn pattern(mut self, regex: &str) -> Self {
        self.spec.constraints.pattern = Some(regex.to_string());
        self
    }

    /// Replace all constraints at once
    #[must_use]
    pub fn constraints(mut self, constraints: Constraints) -> Self {
        self.spec.constraints = constraints;
        self
    }

    #[must_use]
    pub fn deprecated(mut self) -> Self {
        self.spec.deprecated = true;
        self
    }

    /// Header fields only
    #[must_use]
    pub fn convert_underscores(mut self, convert: bool) -> Self {
        self.spec.convert_underscores = convert;
        self.underscores_declared = true;
        self
    }

    /// Body fields only
    #[must_use]
    pub fn embed(mut self) -> Self {
        self.spec.embed = true;
        self
    }

    #[must_use]
    pub fn title(mut self, title: &str) -> Self {
        self.spec.title = Some(title.to_string());
        self
    }

    #[must_use]
    pub fn description(mut self, description: &str) -> Self {
        self.spec.description = Some(description.to_string());
        self
    }

    #[must_use]
    pub fn name(&self) -> &str {
        &self.spec.name
    }
}

/// Builder for an [`ObjectSchema`].
#[derive(Debug, Clone)]
pub struct ObjectSchemaBuilder {
    name: String,
    fields: Vec<FieldBuilder>,
    encoding: BodyEncoding,
}

impl ObjectSchema {
    pub fn builder(name: &str) -> ObjectSchemaBuilder {
        ObjectSchemaBuilder {
            name: name.to_string(),
            fields: Vec::new(),
            encoding: BodyEncoding::default(),
        }
    }
}

fn has_empty_enum(ty: &SemanticType) -> bool {
    match ty {
        SemanticType::Enum(members) => members.is_empty(),
        SemanticType::List(inner) | SemanticType::Set(inner) => has_empty_enum(inner),
        SemanticType::Map(k, v) => has_empty_enum(k) || has_empty_enum(v),
        SemanticType::Union(members) => members.iter().any(has_empty_enum),
        _ => false,
    }
}

fn has_empty_union(ty: &SemanticType) -> bool {
    match ty {
        SemanticType::Union(members) => members.is_empty() || members.iter().any(has_empty_union),
        SemanticType::List(inner) | SemanticType::Set(inner) => has_empty_union(inner),
        SemanticType::Map(_, v) => has_empty_union(v),
        _ => false,
    }
}

/// Constraint consistency for one field.
fn check_constraint_issues(spec: &FieldSpec, loc: &str, issues: &mut Vec<SchemaIssue>) {
    let c = &spec.constraints;
    let mut invalid = |msg: String| issues.push(SchemaIssue::new(loc, ErrorKind::InvalidSchema, msg));

    if c.has_numeric() && !spec.ty.is_numeric() {
        invalid(format!(
            "numeric bounds apply to integer and float fields, not {}",
            spec.ty.describe()
        ));
    }
    if c.has_length() && !spec.ty.has_length() {
        invalid(format!(
            "length bounds apply to string, list, set and map fields, not {}",
            spec.ty.describe()
        ));
    }
    if c.pattern.is_some() && !matches!(spec.ty, SemanticType::String) {
        invalid(format!("pattern applies to string fields, not {}", spec.ty.describe()));
    }
    if let (Some(min), Some(max)) = (c.min_length, c.max_length) {
        if min > max {
            invalid(format!("min_length {min} exceeds max_length {max}"));
        }
    }
    if c.gt.is_some() && c.ge.is_some() {
        invalid("set at most one of gt and ge".to_string());
    }
    if c.lt.is_some() && c.le.is_some() {
        invalid("set at most one of lt and le".to_string());
    }
    if [c.gt, c.ge, c.lt, c.le].iter().flatten().any(|b| b.is_nan()) {
        invalid("numeric bounds must be numbers".to_string());
    }
    let lower = c.gt.map(|b| (b, true)).or(c.ge.map(|b| (b, false)));
    let upper = c.lt.map(|b| (b, true)).or(c.le.map(|b| (b, false)));
    if let (Some((lo, lo_excl)), Some((hi, hi_excl))) = (lower, upper) {
        let empty = if lo_excl || hi_excl { lo >= hi } else { lo > hi };
        if empty {
            invalid(format!("lower bound {lo} is not below upper bound {hi}"));
        }
    }
}

/// Source and option legality for one field.
fn check_placement_issues(
    spec: &FieldSpec,
    underscores_declared: bool,
    encoding: BodyEncoding,
    loc: &str,
    issues: &mut Vec<SchemaIssue>,
) {
    let mut invalid = |msg: String| issues.push(SchemaIssue::new(loc, ErrorKind::InvalidSchema, msg));

    if spec.name.is_empty() {
        invalid("field name must not be empty".to_string());
    }
    if spec.source == Source::Path && !spec.required {
        invalid("path parameters are always required".to_string());
    }
    if spec.embed && spec.source != Source::Body {
        invalid(format!("embed only applies to body fields, not {} fields", spec.source));
    }
    if underscores_declared && spec.source != Source::Header {
        invalid(format!(
            "convert_underscores only applies to header fields, not {} fields",
            spec.source
        ));
    }
    if has_empty_enum(&spec.ty) {
        invalid("enumeration must declare at least one member".to_string());
    }
    if has_empty_union(&spec.ty) {
        invalid("union must declare at least one member".to_string());
    }
    if spec.ty.is_file() {
        if spec.source != Source::Body {
            invalid(format!("file fields must come from the body, not {}", spec.source));
        } else if encoding != BodyEncoding::Multipart {
            invalid("file fields require a multipart body encoding".to_string());
        }
    } else if spec.source != Source::Body && !spec.ty.is_textual() {
        invalid(format!("{} fields cannot carry {}", spec.source, spec.ty.describe()));
    } else if spec.source == Source::Body
        && encoding != BodyEncoding::Json
        && !spec.ty.is_textual()
    {
        invalid(format!(
            "{} bodies cannot carry {}",
            encoding.mime(),
            spec.ty.describe()
        ));
    }
}

impl ObjectSchemaBuilder {
    #[must_use]
    pub fn field(mut self, field: FieldBuilder) -> Self {
        self.fields.push(field);
        self
    }

    #[must_use]
    pub fn encoding(mut self, encoding: BodyEncoding) -> Self {
        self.encoding = encoding;
        self
    }

    /// Validate every declaration and freeze the schema.
    ///
    /// All issues are collected before failing, so one call reports every problem.
    pub fn build(self) -> Result<Arc<ObjectSchema>, SchemaError> {
        let mut issues = Vec::new();
        let mut names = HashSet::new();
        let mut wire_names = HashSet::new();
        let mut fields = Vec::with_capacity(self.fields.len());

        for builder in self.fields {
            let FieldBuilder {
                mut spec,
                default,
                underscores_declared,
            } = builder;
            let loc = format!("{}.{}", self.name, spec.name);
            let before = issues.len();

            let duplicate_name = !names.insert(spec.name.clone());
            if duplicate_name {
                issues.push(SchemaIssue::new(
                    &loc,
                    ErrorKind::DuplicateField,
                    format!("field `{}` is declared more than once", spec.name),
                ));
            }
            // header names compare case-insensitively on the wire
            let wire = match spec.source {
                Source::Header => spec.wire_name().to_ascii_lowercase(),
                _ => spec.wire_name(),
            };
            if !wire_names.insert((spec.source, wire.clone())) && !duplicate_name {
                issues.push(SchemaIssue::new(
                    &loc,
                    ErrorKind::DuplicateField,
                    format!("{} name `{wire}` is used by more than one field", spec.source),
                ));
            }
            if spec.required && default.is_some() {
                issues.push(SchemaIssue::new(
                    &loc,
                    ErrorKind::InvalidSchema,
                    "a required field cannot declare a default",
                ));
            }
            check_placement_issues(&spec, underscores_declared, self.encoding, &loc, &mut issues);
            check_constraint_issues(&spec, &loc, &mut issues);
            if let Some(pattern) = &spec.constraints.pattern {
                match Regex::new(pattern) {
                    Ok(re) => spec.pattern = Some(re),
                    Err(e) => issues.push(SchemaIssue::new(
                        &loc,
                        ErrorKind::InvalidSchema,
                        format!("pattern does not compile: {e}"),
                    )),
                }
            }

            if let (Some(raw), true) = (&default, issues.len() == before) {
                let mut errors = Vec::new();
                let coerced = if raw.is_null() {
                    Some(BoundValue::Null)
                } else {
                    coerce_json(&spec.ty, raw, &spec.name, &mut errors)
                };
                match coerced {
                    Some(v) if check_constraints(&spec, &v, &spec.name, &mut errors) => {
                        spec.default = Some(v);
                    }
                    _ => {
                        let reason = errors
                            .first()
                            .map_or_else(String::new, |e| format!(": {}", e.message));
                        issues.push(SchemaIssue::new(
                            &loc,
                            ErrorKind::InvalidSchema,
                            format!("default {raw} is not a valid {}{reason}", spec.ty.describe()),
                        ));
                    }
                }
            }
            fields.push(spec);
        }

        fail_if_issues(issues)?;
        debug!(
            schema = %self.name,
            field_count = fields.len(),
            encoding = self.encoding.mime(),
            "Object schema built"
        );
        Ok(Arc::new(ObjectSchema {
            name: self.name,
            fields,
            encoding: self.encoding,
        }))
    }
}

/// Builder for a [`ResponseShape`] with nested policies.
#[derive(Debug, Clone)]
pub struct ResponseShapeBuilder {
    root: SemanticType,
    nested: Vec<(String, ShapePolicy)>,
}

impl ResponseShape {
    pub fn builder(root: SemanticType) -> ResponseShapeBuilder {
        ResponseShapeBuilder {
            root,
            nested: Vec::new(),
        }
    }
}

impl ResponseShapeBuilder {
    /// Narrower policy for the nested object field at a dotted field path.
    #[must_use]
    pub fn nested_policy(mut self, path: &str, policy: ShapePolicy) -> Self {
        self.nested.push((path.to_string(), policy));
        self
    }

    /// Check that every nested path names an object-typed field.
    pub fn build(self) -> Result<ResponseShape, SchemaError> {
        let mut issues = Vec::new();
        let mut seen = HashSet::new();
        for (path, _) in &self.nested {
            if !seen.insert(path.as_str()) {
                issues.push(SchemaIssue::new(
                    path,
                    ErrorKind::DuplicateField,
                    "nested policy declared more than once",
                ));
                continue;
            }
            let mut current = self.root.object_schema();
            for segment in path.split('.') {
                current = current
                    .and_then(|schema| schema.field(segment))
                    .and_then(|field| field.ty.object_schema());
            }
            if current.is_none() {
                issues.push(SchemaIssue::new(
                    path,
                    ErrorKind::InvalidSchema,
                    "path does not name a nested object field",
                ));
            }
        }
        fail_if_issues(issues)?;
        Ok(ResponseShape {
            root: self.root,
            nested: self.nested,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_collects_every_issue() {
        let err = ObjectSchema::builder("Item")
            .field(FieldSpec::body("name", SemanticType::String).required())
            .field(FieldSpec::body("name", SemanticType::String))
            .field(FieldSpec::body("price", SemanticType::Float).required().default(json!(1.0)))
            .field(FieldSpec::query("q", SemanticType::Integer).min_length(2))
            .build()
            .unwrap_err();
        assert_eq!(err.issues.len(), 3);
        assert!(err.has_kind(ErrorKind::DuplicateField));
        assert!(err.has_kind(ErrorKind::InvalidSchema));
        assert_eq!(err.issues[1].location, "Item.price");
    }

    #[test]
    fn test_default_must_satisfy_constraints() {
        let err = ObjectSchema::builder("Q")
            .field(FieldSpec::query("limit", SemanticType::Integer).le(100.0).default(json!(500)))
            .build()
            .unwrap_err();
        assert!(err.issues[0].message.contains("default 500"));
    }

    #[test]
    fn test_default_is_coerced() {
        let schema = ObjectSchema::builder("Q")
            .field(FieldSpec::query("limit", SemanticType::Integer).default(json!("10")))
            .build()
            .unwrap();
        assert_eq!(
            schema.field("limit").and_then(|f| f.default.clone()),
            Some(BoundValue::Int(10))
        );
    }

    #[test]
    fn test_bound_ordering() {
        let err = ObjectSchema::builder("Q")
            .field(FieldSpec::query("n", SemanticType::Float).gt(5.0).le(5.0))
            .build()
            .unwrap_err();
        assert!(err.issues[0].message.contains("lower bound"));
        assert!(ObjectSchema::builder("Q")
            .field(FieldSpec::query("n", SemanticType::Float).ge(5.0).le(5.0))
            .build()
            .is_ok());
    }

    #[test]
    fn test_placement_rules() {
        let err = ObjectSchema::builder("P")
            .field(FieldSpec::path("id", SemanticType::Integer).optional())
            .field(FieldSpec::query("x", SemanticType::String).embed())
            .field(FieldSpec::query("y", SemanticType::String).convert_underscores(false))
            .field(FieldSpec::query("f", SemanticType::File))
            .build()
            .unwrap_err();
        assert_eq!(err.issues.len(), 4);
    }

    #[test]
    fn test_bad_pattern() {
        let err = ObjectSchema::builder("P")
            .field(FieldSpec::query("q", SemanticType::String).pattern("(unclosed"))
            .build()
            .unwrap_err();
        assert!(err.issues[0].message.starts_with("pattern does not compile"));
    }

    #[test]
    fn test_nested_policy_path_must_resolve() {
        let image = ObjectSchema::builder("Image")
            .field(FieldSpec::field("url", SemanticType::String).required())
            .build()
            .unwrap();
        let item = ObjectSchema::builder("Item")
            .field(FieldSpec::field("image", SemanticType::Object(image)))
            .field(FieldSpec::field("name", SemanticType::String))
            .build()
            .unwrap();
        assert!(ResponseShape::builder(SemanticType::Object(item.clone()))
            .nested_policy("image", ShapePolicy::include_all().with_exclude_unset())
            .build()
            .is_ok());
        assert!(ResponseShape::builder(SemanticType::Object(item))
            .nested_policy("name", ShapePolicy::include_all())
            .build()
            .is_err());
    }
}
