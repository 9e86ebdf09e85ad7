use super::HandlerResponse;
use crate::request::HeaderVec;
use crate::runtime_config::RuntimeConfig;
use crate::validator::ValidationErrors;
use serde_json::{json, Value};
use std::fmt;
use std::sync::Arc;

/// An error that maps onto an HTTP reply.
///
/// Raised by resolvers and handlers. The reply body is `{"detail": detail}` and any
/// extra headers (for example a `WWW-Authenticate` challenge) are carried along.
#[derive(Debug, Clone, PartialEq)]
pub struct HttpError {
    pub status: u16,
    pub detail: Value,
    pub headers: HeaderVec,
}

impl HttpError {
    pub fn new(status: u16, detail: impl Into<Value>) -> Self {
        HttpError {
            status,
            detail: detail.into(),
            headers: HeaderVec::new(),
        }
    }

    /// 500 with a message. The message is logged and sent as the detail.
    pub fn internal(message: impl Into<String>) -> Self {
        Self::new(500, message.into())
    }

    #[must_use]
    pub fn not_found(detail: impl Into<Value>) -> Self {
        Self::new(404, detail)
    }

    #[must_use]
    pub fn with_header(mut self, name: &str, value: impl Into<String>) -> Self {
        self.headers.retain(|(k, _)| !k.eq_ignore_ascii_case(name));
        self.headers.push((Arc::from(name), value.into()));
        self
    }

    /// Get a header by name
    #[must_use]
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }

    #[must_use]
    pub fn into_response(self) -> HandlerResponse {
        let mut resp = HandlerResponse::json(self.status, json!({ "detail": self.detail }));
        for (name, value) in self.headers {
            resp.set_header(&name, value);
        }
        resp
    }
}

impl fmt::Display for HttpError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.detail {
            Value::String(s) => write!(f, "{} {s}", self.status),
            other => write!(f, "{} {other}", self.status),
        }
    }
}

impl std::error::Error for HttpError {}

impl From<anyhow::Error> for HttpError {
    fn from(err: anyhow::Error) -> Self {
        HttpError::internal(format!("{err:#}"))
    }
}

pub type ValidationErrorHook =
    Arc<dyn Fn(&ValidationErrors, &RuntimeConfig) -> HandlerResponse + Send + Sync>;
pub type HttpErrorHook = Arc<dyn Fn(HttpError) -> HandlerResponse + Send + Sync>;

/// Overrides for how request validation failures and [`HttpError`]s become replies.
///
/// Unset hooks keep the default `{"detail": ...}` bodies. Cancellation (499) and handler
/// panics (500) are not routed through these hooks.
#[derive(Clone, Default)]
pub struct ErrorHandlers {
    validation: Option<ValidationErrorHook>,
    http: Option<HttpErrorHook>,
}

impl fmt::Debug for ErrorHandlers {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ErrorHandlers")
            .field("validation", &self.validation.is_some())
            .field("http", &self.http.is_some())
            .finish()
    }
}

impl ErrorHandlers {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn on_validation_error<F>(mut self, f: F) -> Self
    where
        F: Fn(&ValidationErrors, &RuntimeConfig) -> HandlerResponse + Send + Sync + 'static,
    {
        self.validation = Some(Arc::new(f));
        self
    }

    #[must_use]
    pub fn on_http_error<F>(mut self, f: F) -> Self
    where
        F: Fn(HttpError) -> HandlerResponse + Send + Sync + 'static,
    {
        self.http = Some(Arc::new(f));
        self
    }

    /// Hooks from `self`, falling back to `other` for the ones not set.
    #[must_use]
    pub fn or(&self, other: &ErrorHandlers) -> ErrorHandlers {
        ErrorHandlers {
            validation: self.validation.clone().or_else(|| other.validation.clone()),
            http: self.http.clone().or_else(|| other.http.clone()),
        }
    }

    #[must_use]
    pub fn validation_response(
        &self,
        errors: &ValidationErrors,
        config: &RuntimeConfig,
    ) -> HandlerResponse {
        match &self.validation {
            Some(hook) => hook(errors, config),
            None => HandlerResponse::json(config.validation_status, errors.to_problem_json()),
        }
    }

    #[must_use]
    pub fn http_response(&self, error: HttpError) -> HandlerResponse {
        match &self.http {
            Some(hook) => hook(error),
            None => error.into_response(),
        }
    }
}
