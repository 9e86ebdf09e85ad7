//! # Validator Module
//!
//! Error taxonomy shared by schema construction and request binding.
//!
//! Two families of failure exist and they are never mixed:
//!
//! - **Construction-time** issues ([`SchemaIssue`], collected into a [`SchemaError`]) are
//!   programming errors in a schema or dependency declaration. They are reported all at
//!   once and the service refuses to start.
//! - **Request-time** failures ([`ValidationError`], collected into [`ValidationErrors`])
//!   are data. Every field is validated independently, so one request can carry many of
//!   them, and they are surfaced to the client as an "unprocessable input" response.

use serde::Serialize;
use serde_json::{json, Value};
use std::fmt;

/// Kind of a validation failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorKind {
    /// A required value was not supplied
    Missing,
    /// A value could not be coerced to the declared type
    TypeError,
    /// A numeric or length bound was violated
    RangeError,
    /// A string did not match the declared pattern
    PatternError,
    /// The body content type does not match the expected encoding
    UnsupportedMediaType,
    /// A dependency or model reference cycle (construction-time only)
    CycleDetected,
    /// Two fields or resolvers share a name (construction-time only)
    DuplicateField,
    /// Inconsistent constraints, defaults or field options (construction-time only)
    InvalidSchema,
    /// A resolver depends on a name nobody provides (construction-time only)
    UnknownDependency,
}

impl ErrorKind {
    /// Wire representation, e.g. `TYPE_ERROR`
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorKind::Missing => "MISSING",
            ErrorKind::TypeError => "TYPE_ERROR",
            ErrorKind::RangeError => "RANGE_ERROR",
            ErrorKind::PatternError => "PATTERN_ERROR",
            ErrorKind::UnsupportedMediaType => "UNSUPPORTED_MEDIA_TYPE",
            ErrorKind::CycleDetected => "CYCLE_DETECTED",
            ErrorKind::DuplicateField => "DUPLICATE_FIELD",
            ErrorKind::InvalidSchema => "INVALID_SCHEMA",
            ErrorKind::UnknownDependency => "UNKNOWN_DEPENDENCY",
        }
    }

    /// Whether this kind can only be raised while building schemas or graphs
    #[must_use]
    pub fn is_construction_time(&self) -> bool {
        matches!(
            self,
            ErrorKind::CycleDetected
                | ErrorKind::DuplicateField
                | ErrorKind::InvalidSchema
                | ErrorKind::UnknownDependency
        )
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Join a dotted location with one more segment.
#[must_use]
pub fn join_loc(prefix: &str, segment: &str) -> String {
    if prefix.is_empty() {
        segment.to_string()
    } else {
        format!("{prefix}.{segment}")
    }
}

/// One request-time failure, located by a dotted path such as `body.items.0.price`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ValidationError {
    /// Dotted path to the offending field
    pub loc: String,
    /// Failure kind
    pub kind: ErrorKind,
    /// Human-readable message
    pub message: String,
}

impl ValidationError {
    pub fn new(loc: impl Into<String>, kind: ErrorKind, message: impl Into<String>) -> Self {
        ValidationError {
            loc: loc.into(),
            kind,
            message: message.into(),
        }
    }

    /// `{"loc": ..., "type": ..., "msg": ...}`
    #[must_use]
    pub fn to_json(&self) -> Value {
        json!({
            "loc": self.loc,
            "type": self.kind.as_str(),
            "msg": self.message,
        })
    }
}

impl fmt::Display for ValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}] {}: {}", self.kind, self.loc, self.message)
    }
}

/// Non-empty, ordered list of request-time failures.
#[derive(Debug, Clone, PartialEq)]
pub struct ValidationErrors(Vec<ValidationError>);

impl ValidationErrors {
    /// Wrap a list of errors; `None` when the list is empty.
    #[must_use]
    pub fn from_vec(errors: Vec<ValidationError>) -> Option<Self> {
        if errors.is_empty() {
            None
        } else {
            Some(ValidationErrors(errors))
        }
    }

    /// A list holding exactly one error
    #[must_use]
    pub fn single(error: ValidationError) -> Self {
        ValidationErrors(vec![error])
    }

    #[must_use]
    pub fn errors(&self) -> &[ValidationError] {
        &self.0
    }

    #[must_use]
    pub fn into_vec(self) -> Vec<ValidationError> {
        self.0
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Always false; kept for clippy's `len_without_is_empty`
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, ValidationError> {
        self.0.iter()
    }

    /// First error reported at exactly `loc`
    #[must_use]
    pub fn at(&self, loc: &str) -> Option<&ValidationError> {
        self.0.iter().find(|e| e.loc == loc)
    }

    /// Append another list, keeping order
    pub fn extend(&mut self, other: ValidationErrors) {
        self.0.extend(other.0);
    }

    /// Response body for an "unprocessable input" reply: `{"detail": [...]}`
    #[must_use]
    pub fn to_problem_json(&self) -> Value {
        json!({ "detail": self.0.iter().map(ValidationError::to_json).collect::<Vec<_>>() })
    }
}

impl<'a> IntoIterator for &'a ValidationErrors {
    type Item = &'a ValidationError;
    type IntoIter = std::slice::Iter<'a, ValidationError>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.iter()
    }
}

impl fmt::Display for ValidationErrors {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} validation error(s)", self.0.len())?;
        for e in &self.0 {
            write!(f, "\n  {e}")?;
        }
        Ok(())
    }
}

impl std::error::Error for ValidationErrors {}

/// A construction-time problem in a schema or dependency declaration.
#[derive(Debug, Clone, PartialEq)]
pub struct SchemaIssue {
    /// Where the problem is, e.g. `Item.price`
    pub location: String,
    pub kind: ErrorKind,
    pub message: String,
}

impl SchemaIssue {
    pub fn new(location: impl Into<String>, kind: ErrorKind, message: impl Into<String>) -> Self {
        SchemaIssue {
            location: location.into(),
            kind,
            message: message.into(),
        }
    }
}

impl fmt::Display for SchemaIssue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}] {}: {}", self.kind, self.location, self.message)
    }
}

/// Every construction-time issue found while building one schema, shape or graph.
#[derive(Debug, Clone, PartialEq)]
pub struct SchemaError {
    pub issues: Vec<SchemaIssue>,
}

impl SchemaError {
    /// Whether any issue has the given kind
    #[must_use]
    pub fn has_kind(&self, kind: ErrorKind) -> bool {
        self.issues.iter().any(|i| i.kind == kind)
    }
}

impl fmt::Display for SchemaError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "schema declaration invalid, {} issue(s) found", self.issues.len())?;
        for issue in &self.issues {
            write!(f, "\n  {issue}")?;
        }
        Ok(())
    }
}

impl std::error::Error for SchemaError {}

pub fn print_issues(issues: &[SchemaIssue]) {
    eprintln!("\n❌ Schema validation failed. {} issue(s) found:\n", issues.len());
    for issue in issues {
        eprintln!("{issue}");
    }
    eprintln!("\nPlease fix the schema declarations before starting the service.\n");
}

/// Turn collected issues into a `SchemaError` when there are any.
pub fn fail_if_issues(issues: Vec<SchemaIssue>) -> Result<(), SchemaError> {
    if issues.is_empty() {
        Ok(())
    } else {
        Err(SchemaError { issues })
    }
}
