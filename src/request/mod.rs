//! # Request Module
//!
//! [`RawRequest`] is the input boundary of the pipeline: everything the HTTP layer has
//! already received for one request, before any typing or validation. The HTTP layer
//! owns sockets and framing; this module only holds the parsed pieces and offers lookup
//! helpers with the matching rules the binder needs (case-insensitive headers, repeated
//! query keys in appearance order).

mod multipart;
mod parse;

pub use multipart::{parse_multipart, MultipartError, Part};
pub use parse::{
    content_type_param, media_type, parse_cookies, parse_form_body, parse_query_string,
    split_uri,
};

use http::Method;
use serde_json::Value;
use smallvec::SmallVec;
use std::sync::Arc;

/// Maximum inline path/query params before heap allocation
pub const MAX_INLINE_PARAMS: usize = 8;

/// Maximum inline headers/cookies before heap allocation
pub const MAX_INLINE_HEADERS: usize = 16;

/// Ordered multi-map for path and query parameters.
///
/// Keys use `Arc<str>`: names repeat across requests and cloning is an atomic increment.
pub type ParamVec = SmallVec<[(Arc<str>, String); MAX_INLINE_PARAMS]>;

/// Ordered multi-map for headers and cookies.
pub type HeaderVec = SmallVec<[(Arc<str>, String); MAX_INLINE_HEADERS]>;

/// Raw request data handed over by the HTTP layer.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RawRequest {
    /// HTTP method
    pub method: Method,
    /// Request path without the query string
    pub path: String,
    /// Path segment values captured by the router
    pub path_params: ParamVec,
    /// Query parameters in appearance order; keys may repeat
    pub query_params: ParamVec,
    /// Headers in appearance order; names may repeat
    pub headers: HeaderVec,
    /// Cookies parsed from the `Cookie` header
    pub cookies: HeaderVec,
    /// Raw body bytes
    pub body: Vec<u8>,
    /// Declared body content type, if any
    pub content_type: Option<String>,
}

impl RawRequest {
    #[must_use]
    pub fn new(method: Method, path: impl Into<String>) -> Self {
        RawRequest {
            method,
            path: path.into(),
            ..Default::default()
        }
    }

    /// Build from a request target (`/items?q=a&q=b`) and a header list.
    ///
    /// The query string is split off the target, cookies are read from any `Cookie`
    /// headers and the content type from `Content-Type`.
    #[must_use]
    pub fn from_parts(
        method: Method,
        target: &str,
        headers: Vec<(String, String)>,
        body: Vec<u8>,
    ) -> Self {
        let (path, query) = split_uri(target);
        let mut req = RawRequest::new(method, path);
        if let Some(qs) = query {
            req.query_params = parse_query_string(qs);
        }
        for (name, value) in headers {
            if name.eq_ignore_ascii_case("cookie") {
                for (k, v) in parse_cookies(&value) {
                    if req.cookie(&k).is_none() {
                        req.cookies.push((k, v));
                    }
                }
            }
            if name.eq_ignore_ascii_case("content-type") {
                req.content_type = Some(value.clone());
            }
            req.headers.push((Arc::from(name.to_ascii_lowercase()), value));
        }
        req.body = body;
        req
    }

    pub fn with_path_param(mut self, name: &str, value: impl Into<String>) -> Self {
        self.path_params.push((Arc::from(name), value.into()));
        self
    }

    pub fn with_query(mut self, name: &str, value: impl Into<String>) -> Self {
        self.query_params.push((Arc::from(name), value.into()));
        self
    }

    /// Append every pair of an encoded query string (`a=1&b=2`).
    pub fn with_query_string(mut self, qs: &str) -> Self {
        self.query_params.extend(parse_query_string(qs));
        self
    }

    pub fn with_header(mut self, name: &str, value: impl Into<String>) -> Self {
        let value = value.into();
        if name.eq_ignore_ascii_case("content-type") {
            self.content_type = Some(value.clone());
        }
        self.headers.push((Arc::from(name), value));
        self
    }

    pub fn with_cookie(mut self, name: &str, value: impl Into<String>) -> Self {
        self.cookies.push((Arc::from(name), value.into()));
        self
    }

    /// Raw body with an explicit content type.
    pub fn with_body(mut self, content_type: &str, body: impl Into<Vec<u8>>) -> Self {
        self.content_type = Some(content_type.to_string());
        self.body = body.into();
        self
    }

    /// JSON body with `application/json`.
    pub fn with_json_body(self, body: &Value) -> Self {
        let bytes = body.to_string().into_bytes();
        self.with_body("application/json", bytes)
    }

    /// Url-encoded form body with `application/x-www-form-urlencoded`.
    pub fn with_form_body(self, pairs: &[(&str, &str)]) -> Self {
        let encoded = url::form_urlencoded::Serializer::new(String::new())
            .extend_pairs(pairs)
            .finish();
        self.with_body("application/x-www-form-urlencoded", encoded.into_bytes())
    }

    /// Path parameter by name; the last capture wins when a name repeats.
    #[must_use]
    pub fn path_param(&self, name: &str) -> Option<&str> {
        self.path_params
            .iter()
            .rfind(|(k, _)| k.as_ref() == name)
            .map(|(_, v)| v.as_str())
    }

    /// Every value of a query key, in appearance order.
    #[must_use]
    pub fn query_values(&self, name: &str) -> Vec<&str> {
        self.query_params
            .iter()
            .filter(|(k, _)| k.as_ref() == name)
            .map(|(_, v)| v.as_str())
            .collect()
    }

    /// Every value of a header, matched case-insensitively (RFC 7230), in appearance order.
    #[must_use]
    pub fn header_values(&self, name: &str) -> Vec<&str> {
        self.headers
            .iter()
            .filter(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
            .collect()
    }

    /// First value of a header
    #[must_use]
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }

    #[must_use]
    pub fn cookie(&self, name: &str) -> Option<&str> {
        self.cookies
            .iter()
            .find(|(k, _)| k.as_ref() == name)
            .map(|(_, v)| v.as_str())
    }

    #[must_use]
    pub fn content_type(&self) -> Option<&str> {
        self.content_type.as_deref()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_parts_splits_target_and_cookies() {
        let req = RawRequest::from_parts(
            Method::GET,
            "/items/?q=foo&q=bar&limit=5",
            vec![
                ("Cookie".to_string(), "ads_id=abc; theme=dark".to_string()),
                ("X-Token".to_string(), "one".to_string()),
                ("x-token".to_string(), "two".to_string()),
            ],
            Vec::new(),
        );
        assert_eq!(req.path, "/items/");
        assert_eq!(req.query_values("q"), vec!["foo", "bar"]);
        assert_eq!(req.cookie("ads_id"), Some("abc"));
        assert_eq!(req.header_values("X-TOKEN"), vec!["one", "two"]);
    }

    #[test]
    fn test_path_param_last_wins() {
        let req = RawRequest::new(Method::GET, "/org/1/user/2")
            .with_path_param("id", "1")
            .with_path_param("id", "2");
        assert_eq!(req.path_param("id"), Some("2"));
    }

    #[test]
    fn test_content_type_tracked_from_header() {
        let req = RawRequest::new(Method::POST, "/")
            .with_header("Content-Type", "application/json; charset=utf-8");
        assert_eq!(req.content_type(), Some("application/json; charset=utf-8"));
    }
}
