use super::build::FieldBuilder;
use super::types::{BodyEncoding, Constraints, FieldSpec, ObjectSchema, SemanticType, Source};
use crate::validator::{fail_if_issues, ErrorKind, SchemaError, SchemaIssue};
use anyhow::Context;
use serde::Deserialize;
use serde_json::Value;
use std::collections::{BTreeMap, HashMap, HashSet};
use std::path::Path;
use std::sync::Arc;
use tracing::info;

/// Declarative schema document: `models: { Name: { encoding?, fields: [...] } }`.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SchemaDocument {
    pub models: BTreeMap<String, ModelDecl>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ModelDecl {
    #[serde(default)]
    pub encoding: BodyEncoding,
    pub fields: Vec<FieldDecl>,
}

fn default_source() -> Source {
    Source::Body
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct FieldDecl {
    pub name: String,
    #[serde(rename = "in", default = "default_source")]
    pub source: Source,
    #[serde(rename = "type")]
    pub ty: TypeDecl,
    /// Path fields default to required, everything else to optional
    pub required: Option<bool>,
    pub default: Option<Value>,
    pub alias: Option<String>,
    #[serde(default)]
    pub constraints: Constraints,
    #[serde(default)]
    pub deprecated: bool,
    pub convert_underscores: Option<bool>,
    #[serde(default)]
    pub embed: bool,
    pub title: Option<String>,
    pub description: Option<String>,
}

/// `string`, or a composite such as `{list: integer}`, `{object: Image}` or
/// `{union: [{object: PlaneItem}, {object: CarItem}]}`.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum TypeDecl {
    Named(String),
    Composite(CompositeDecl),
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CompositeDecl {
    Enum(Vec<String>),
    List(Box<TypeDecl>),
    Set(Box<TypeDecl>),
    Map { key: Box<TypeDecl>, value: Box<TypeDecl> },
    Object(String),
    Union(Vec<TypeDecl>),
}

impl TypeDecl {
    fn collect_refs<'a>(&'a self, out: &mut Vec<&'a str>) {
        match self {
            TypeDecl::Named(_) => {}
            TypeDecl::Composite(c) => match c {
                CompositeDecl::Enum(_) => {}
                CompositeDecl::List(inner) | CompositeDecl::Set(inner) => inner.collect_refs(out),
                CompositeDecl::Map { key, value } => {
                    key.collect_refs(out);
                    value.collect_refs(out);
                }
                CompositeDecl::Object(name) => out.push(name),
                CompositeDecl::Union(members) => {
                    for member in members {
                        member.collect_refs(out);
                    }
                }
            },
        }
    }

    fn resolve(
        &self,
        built: &HashMap<String, Arc<ObjectSchema>>,
        declared: &BTreeMap<String, ModelDecl>,
    ) -> Result<SemanticType, String> {
        Ok(match self {
            TypeDecl::Named(name) => match name.as_str() {
                "string" | "str" => SemanticType::String,
                "integer" | "int" => SemanticType::Integer,
                "float" | "number" => SemanticType::Float,
                "boolean" | "bool" => SemanticType::Boolean,
                "any" => SemanticType::Any,
                "file" => SemanticType::File,
                other => return Err(format!("unknown type `{other}`")),
            },
            TypeDecl::Composite(c) => match c {
                CompositeDecl::Enum(members) => SemanticType::Enum(members.clone()),
                CompositeDecl::List(inner) => SemanticType::list_of(inner.resolve(built, declared)?),
                CompositeDecl::Set(inner) => SemanticType::set_of(inner.resolve(built, declared)?),
                CompositeDecl::Map { key, value } => SemanticType::map_of(
                    key.resolve(built, declared)?,
                    value.resolve(built, declared)?,
                ),
                CompositeDecl::Object(name) => match built.get(name) {
                    Some(schema) => SemanticType::Object(schema.clone()),
                    None if declared.contains_key(name) => {
                        return Err(format!("references invalid model `{name}`"))
                    }
                    None => return Err(format!("unknown model `{name}`")),
                },
                CompositeDecl::Union(members) => SemanticType::Union(
                    members
                        .iter()
                        .map(|m| m.resolve(built, declared))
                        .collect::<Result<_, _>>()?,
                ),
            },
        })
    }
}

impl ModelDecl {
    fn refs(&self) -> Vec<&str> {
        let mut out = Vec::new();
        for field in &self.fields {
            field.ty.collect_refs(&mut out);
        }
        out
    }
}

impl FieldDecl {
    fn to_builder(&self, ty: SemanticType) -> FieldBuilder {
        let mut b = match self.source {
            Source::Path => FieldSpec::path(&self.name, ty),
            Source::Query => FieldSpec::query(&self.name, ty),
            Source::Header => FieldSpec::header(&self.name, ty),
            Source::Cookie => FieldSpec::cookie(&self.name, ty),
            Source::Body => FieldSpec::body(&self.name, ty),
        };
        b = match self.required {
            Some(true) => b.required(),
            Some(false) => b.optional(),
            None => b,
        };
        if let Some(default) = &self.default {
            b = b.default(default.clone());
        }
        if let Some(alias) = &self.alias {
            b = b.alias(alias);
        }
        b = b.constraints(self.constraints.clone());
        if self.deprecated {
            b = b.deprecated();
        }
        if let Some(convert) = self.convert_underscores {
            b = b.convert_underscores(convert);
        }
        if self.embed {
            b = b.embed();
        }
        if let Some(title) = &self.title {
            b = b.title(title);
        }
        if let Some(description) = &self.description {
            b = b.description(description);
        }
        b
    }
}

#[derive(Clone, Copy, PartialEq, Eq)]
enum Mark {
    Visiting,
    Done,
}

struct Walk<'a> {
    doc: &'a SchemaDocument,
    marks: HashMap<&'a str, Mark>,
    stack: Vec<&'a str>,
    order: Vec<&'a str>,
    cyclic: HashSet<&'a str>,
    issues: Vec<SchemaIssue>,
}

impl<'a> Walk<'a> {
    fn visit(&mut self, name: &'a str) {
        let doc = self.doc;
        let Some(model) = doc.models.get(name) else {
            return;
        };
        self.marks.insert(name, Mark::Visiting);
        self.stack.push(name);
        for dep in model.refs() {
            let Some((dep, _)) = doc.models.get_key_value(dep) else {
                continue;
            };
            match self.marks.get(dep.as_str()) {
                Some(Mark::Visiting) => {
                    let start = self
                        .stack
                        .iter()
                        .position(|n| *n == dep.as_str())
                        .unwrap_or(0);
                    let cycle = &self.stack[start..];
                    self.cyclic.extend(cycle.iter().copied());
                    self.issues.push(SchemaIssue::new(
                        dep.as_str(),
                        ErrorKind::CycleDetected,
                        format!("model reference cycle: {} -> {dep}", cycle.join(" -> ")),
                    ));
                }
                Some(Mark::Done) => {}
                None => self.visit(dep),
            }
        }
        self.stack.pop();
        self.marks.insert(name, Mark::Done);
        self.order.push(name);
    }
}

/// Resolve model references and build every schema in the document.
///
/// Models are built dependencies first. Reference cycles, unknown types and every
/// per-schema issue are reported together.
pub fn build_schemas(doc: &SchemaDocument) -> Result<SchemaRegistry, SchemaError> {
    let mut walk = Walk {
        doc,
        marks: HashMap::new(),
        stack: Vec::new(),
        order: Vec::new(),
        cyclic: HashSet::new(),
        issues: Vec::new(),
    };
    for name in doc.models.keys() {
        if !walk.marks.contains_key(name.as_str()) {
            walk.visit(name);
        }
    }

    let Walk {
        order,
        cyclic,
        mut issues,
        ..
    } = walk;
    let mut built: HashMap<String, Arc<ObjectSchema>> = HashMap::new();
    for name in order {
        if cyclic.contains(name) {
            continue;
        }
        let Some(model) = doc.models.get(name) else {
            continue;
        };
        let mut builder = ObjectSchema::builder(name).encoding(model.encoding);
        let mut resolved = true;
        for field in &model.fields {
            match field.ty.resolve(&built, &doc.models) {
                Ok(ty) => builder = builder.field(field.to_builder(ty)),
                Err(msg) => {
                    resolved = false;
                    issues.push(SchemaIssue::new(
                        format!("{name}.{}", field.name),
                        ErrorKind::InvalidSchema,
                        msg,
                    ));
                }
            }
        }
        if !resolved {
            continue;
        }
        match builder.build() {
            Ok(schema) => {
                built.insert(name.to_string(), schema);
            }
            Err(e) => issues.extend(e.issues),
        }
    }

    fail_if_issues(issues)?;
    Ok(SchemaRegistry {
        models: built.into_iter().collect(),
    })
}

/// Parse a document from text; YAML is a superset of JSON so both are accepted.
pub fn parse_schemas(content: &str) -> anyhow::Result<SchemaRegistry> {
    let doc: SchemaDocument =
        serde_yaml::from_str(content).context("schema document is not valid YAML or JSON")?;
    Ok(build_schemas(&doc)?)
}

/// Load a schema document from a `.yaml`, `.yml` or `.json` file.
pub fn load_schemas(path: impl AsRef<Path>) -> anyhow::Result<SchemaRegistry> {
    let path = path.as_ref();
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read schema document {}", path.display()))?;
    let is_yaml = matches!(
        path.extension().and_then(|e| e.to_str()),
        Some("yaml") | Some("yml")
    );
    let doc: SchemaDocument = if is_yaml {
        serde_yaml::from_str(&content)
            .with_context(|| format!("invalid YAML in {}", path.display()))?
    } else {
        serde_json::from_str(&content)
            .with_context(|| format!("invalid JSON in {}", path.display()))?
    };
    let registry = build_schemas(&doc)?;
    info!(
        path = %path.display(),
        model_count = registry.len(),
        "Schema document loaded"
    );
    Ok(registry)
}

/// Named schemas built from one document.
#[derive(Debug, Clone, Default)]
pub struct SchemaRegistry {
    models: BTreeMap<String, Arc<ObjectSchema>>,
}

impl SchemaRegistry {
    #[must_use]
    pub fn get(&self, name: &str) -> Option<Arc<ObjectSchema>> {
        self.models.get(name).cloned()
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.models.keys().map(String::as_str)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.models.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.models.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const DOC: &str = r#"
models:
  Image:
    fields:
      - { name: url, type: string, required: true, constraints: { pattern: "^https?://" } }
      - { name: name, type: string, required: true }
  Item:
    fields:
      - { name: name, type: string, required: true }
      - { name: price, type: float, required: true, constraints: { gt: 0 } }
      - { name: tags, type: { set: string }, default: [] }
      - { name: images, type: { list: { object: Image } } }
"#;

    #[test]
    fn test_references_resolve() {
        let registry = parse_schemas(DOC).unwrap();
        assert_eq!(registry.len(), 2);
        let item = registry.get("Item").unwrap();
        let images = item.field("images").unwrap();
        assert_eq!(images.ty.object_schema().map(|s| s.name()), Some("Image"));
    }

    #[test]
    fn test_cycle_detected() {
        let doc = r#"
models:
  A: { fields: [ { name: b, type: { object: B } } ] }
  B: { fields: [ { name: a, type: { object: A } } ] }
  C: { fields: [ { name: c, type: { list: { object: C } } } ] }
"#;
        let err = parse_schemas(doc).unwrap_err();
        let err = err.downcast_ref::<SchemaError>().unwrap();
        let cycles: Vec<&SchemaIssue> = err
            .issues
            .iter()
            .filter(|i| i.kind == ErrorKind::CycleDetected)
            .collect();
        assert_eq!(cycles.len(), 2);
        assert!(cycles[0].message.contains("A -> B -> A"));
    }

    #[test]
    fn test_unknown_model_and_type() {
        let doc = r#"
models:
  A:
    fields:
      - { name: x, type: { object: Missing } }
      - { name: y, type: decimal }
"#;
        let err = parse_schemas(doc).unwrap_err();
        let err = err.downcast_ref::<SchemaError>().unwrap();
        assert_eq!(err.issues.len(), 2);
        assert_eq!(err.issues[0].location, "A.x");
    }
}
