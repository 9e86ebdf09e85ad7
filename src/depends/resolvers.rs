use super::{ResolveContext, Resolved, Resolver};
use crate::dispatcher::HttpError;
use crate::schema::{FieldSpec, ObjectSchema, SemanticType};
use crate::validator::SchemaError;
use serde::de::DeserializeOwned;
use std::any::Any;
use std::fmt;
use std::marker::PhantomData;
use std::sync::Arc;

type AcquireFn = Box<dyn Fn(&ResolveContext<'_>) -> Result<Resolved, HttpError> + Send + Sync>;
type ReleaseFn = Box<dyn Fn(&Resolved) + Send + Sync>;

fn erase<T, F>(f: F) -> AcquireFn
where
    T: Any + Send + Sync,
    F: Fn(&ResolveContext<'_>) -> Result<T, HttpError> + Send + Sync + 'static,
{
    Box::new(move |ctx| f(ctx).map(|value| Arc::new(value) as Resolved))
}

fn owned_names<I, S>(names: I) -> Vec<String>
where
    I: IntoIterator<Item = S>,
    S: Into<String>,
{
    names.into_iter().map(Into::into).collect()
}

/// A resolver backed by a closure.
///
/// ```rust
/// use brrtbind::depends::FnResolver;
///
/// let db = FnResolver::new("db", |_ctx| Ok(String::from("connection")));
/// let repo = FnResolver::new("repo", |ctx| {
///     let db = ctx.require::<String>("db")?;
///     Ok(format!("repo over {db}"))
/// })
/// .depends_on(["db"]);
/// # let _ = (db, repo);
/// ```
pub struct FnResolver {
    name: String,
    dependencies: Vec<String>,
    inputs: Option<Arc<ObjectSchema>>,
    acquire: AcquireFn,
}

impl FnResolver {
    pub fn new<T, F>(name: impl Into<String>, f: F) -> Self
    where
        T: Any + Send + Sync,
        F: Fn(&ResolveContext<'_>) -> Result<T, HttpError> + Send + Sync + 'static,
    {
        FnResolver {
            name: name.into(),
            dependencies: Vec::new(),
            inputs: None,
            acquire: erase(f),
        }
    }

    #[must_use]
    pub fn depends_on<I, S>(mut self, names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.dependencies.extend(owned_names(names));
        self
    }

    /// Declare request inputs, bound before resolution and exposed as `ctx.inputs()`.
    #[must_use]
    pub fn with_inputs(mut self, schema: Arc<ObjectSchema>) -> Self {
        self.inputs = Some(schema);
        self
    }
}

impl fmt::Debug for FnResolver {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FnResolver")
            .field("name", &self.name)
            .field("dependencies", &self.dependencies)
            .finish_non_exhaustive()
    }
}

impl Resolver for FnResolver {
    fn name(&self) -> &str {
        &self.name
    }

    fn dependencies(&self) -> &[String] {
        &self.dependencies
    }

    fn inputs(&self) -> Option<&Arc<ObjectSchema>> {
        self.inputs.as_ref()
    }

    fn acquire(&self, ctx: &ResolveContext<'_>) -> Result<Resolved, HttpError> {
        (self.acquire)(ctx)
    }
}

/// A resolver with an explicit teardown step.
///
/// `release` runs once the request no longer needs the value, after every dependent has
/// been released, whether the request succeeded or not.
pub struct ScopedResolver {
    inner: FnResolver,
    release: ReleaseFn,
}

impl ScopedResolver {
    pub fn new<T, A, R>(name: impl Into<String>, acquire: A, release: R) -> Self
    where
        T: Any + Send + Sync,
        A: Fn(&ResolveContext<'_>) -> Result<T, HttpError> + Send + Sync + 'static,
        R: Fn(&T) + Send + Sync + 'static,
    {
        ScopedResolver {
            inner: FnResolver::new(name, acquire),
            release: Box::new(move |value: &Resolved| {
                if let Some(typed) = value.downcast_ref::<T>() {
                    release(typed);
                }
            }),
        }
    }

    #[must_use]
    pub fn depends_on<I, S>(mut self, names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.inner = self.inner.depends_on(names);
        self
    }

    #[must_use]
    pub fn with_inputs(mut self, schema: Arc<ObjectSchema>) -> Self {
        self.inner = self.inner.with_inputs(schema);
        self
    }
}

impl fmt::Debug for ScopedResolver {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ScopedResolver")
            .field("name", &self.inner.name)
            .field("dependencies", &self.inner.dependencies)
            .finish_non_exhaustive()
    }
}

impl Resolver for ScopedResolver {
    fn name(&self) -> &str {
        self.inner.name()
    }

    fn dependencies(&self) -> &[String] {
        self.inner.dependencies()
    }

    fn inputs(&self) -> Option<&Arc<ObjectSchema>> {
        self.inner.inputs()
    }

    fn acquire(&self, ctx: &ResolveContext<'_>) -> Result<Resolved, HttpError> {
        self.inner.acquire(ctx)
    }

    fn release(&self, value: &Resolved) {
        (self.release)(value);
    }
}

/// Binds its inputs and deserializes them into `T`.
///
/// This is the struct-builder form of a dependency: the schema says where each field
/// comes from, `T` says what the handler receives.
pub struct ModelResolver<T> {
    name: String,
    schema: Arc<ObjectSchema>,
    _model: PhantomData<fn() -> T>,
}

impl<T> ModelResolver<T> {
    pub fn new(name: impl Into<String>, schema: Arc<ObjectSchema>) -> Self {
        ModelResolver {
            name: name.into(),
            schema,
            _model: PhantomData,
        }
    }
}

impl<T> Resolver for ModelResolver<T>
where
    T: DeserializeOwned + Any + Send + Sync,
{
    fn name(&self) -> &str {
        &self.name
    }

    fn inputs(&self) -> Option<&Arc<ObjectSchema>> {
        Some(&self.schema)
    }

    fn acquire(&self, ctx: &ResolveContext<'_>) -> Result<Resolved, HttpError> {
        let inputs = ctx
            .inputs()
            .ok_or_else(|| HttpError::internal(format!("inputs of `{}` were not bound", self.name)))?;
        let model: T = inputs.deserialize().map_err(|e| {
            HttpError::internal(format!(
                "cannot build {} from `{}` inputs: {e}",
                std::any::type_name::<T>(),
                self.name
            ))
        })?;
        Ok(Arc::new(model))
    }
}

/// Hands out a shared, process-lifetime value.
///
/// Dependents receive `Arc<T>` through `ctx.require::<T>(name)`; the state itself is
/// never released by a request.
pub struct StateResolver<T> {
    name: String,
    state: Arc<T>,
}

impl<T> StateResolver<T> {
    pub fn new(name: impl Into<String>, state: Arc<T>) -> Self {
        StateResolver {
            name: name.into(),
            state,
        }
    }
}

impl<T: Any + Send + Sync> Resolver for StateResolver<T> {
    fn name(&self) -> &str {
        &self.name
    }

    fn acquire(&self, _ctx: &ResolveContext<'_>) -> Result<Resolved, HttpError> {
        let state: Resolved = Arc::clone(&self.state) as Resolved;
        Ok(state)
    }
}

/// Guard that requires a header to carry an exact value.
///
/// A missing header is a validation error (`MISSING`); a wrong value fails with 400.
/// Resolves to the header value as a `String`.
#[derive(Debug)]
pub struct HeaderEquals {
    name: String,
    header: String,
    expected: String,
    inputs: Arc<ObjectSchema>,
}

impl HeaderEquals {
    /// # Errors
    ///
    /// When `header` is not a usable header name.
    pub fn new(
        name: impl Into<String>,
        header: &str,
        expected: impl Into<String>,
    ) -> Result<Self, SchemaError> {
        let name = name.into();
        let inputs = ObjectSchema::builder(&name)
            .field(
                FieldSpec::header("value", SemanticType::String)
                    .alias(header)
                    .required(),
            )
            .build()?;
        Ok(HeaderEquals {
            name,
            header: header.to_string(),
            expected: expected.into(),
            inputs,
        })
    }
}

impl Resolver for HeaderEquals {
    fn name(&self) -> &str {
        &self.name
    }

    fn inputs(&self) -> Option<&Arc<ObjectSchema>> {
        Some(&self.inputs)
    }

    fn acquire(&self, ctx: &ResolveContext<'_>) -> Result<Resolved, HttpError> {
        match ctx.input("value").and_then(|v| v.as_str()) {
            Some(value) if value == self.expected => Ok(Arc::new(value.to_string())),
            _ => Err(HttpError::new(400, format!("{} header invalid", self.header))),
        }
    }
}

/// Extracts a bearer token from `Authorization`.
///
/// Only extraction: whether the token is any good is up to dependents. Resolves to the
/// token as a `String`; a missing header or another scheme fails with 401 and a
/// `WWW-Authenticate: Bearer` challenge.
#[derive(Debug, Clone)]
pub struct BearerToken {
    name: String,
}

impl BearerToken {
    pub fn new(name: impl Into<String>) -> Self {
        BearerToken { name: name.into() }
    }

    fn unauthorized() -> HttpError {
        HttpError::new(401, "Not authenticated").with_header("www-authenticate", "Bearer")
    }
}

impl Resolver for BearerToken {
    fn name(&self) -> &str {
        &self.name
    }

    fn acquire(&self, ctx: &ResolveContext<'_>) -> Result<Resolved, HttpError> {
        let header = ctx
            .request()
            .header("authorization")
            .ok_or_else(Self::unauthorized)?;
        let (scheme, token) = header.trim().split_once(' ').ok_or_else(Self::unauthorized)?;
        let token = token.trim();
        if !scheme.eq_ignore_ascii_case("bearer") || token.is_empty() {
            return Err(Self::unauthorized());
        }
        Ok(Arc::new(token.to_string()))
    }
}
