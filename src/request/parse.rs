use super::{HeaderVec, ParamVec};
use std::sync::Arc;
use tracing::debug;

/// Split a request target into path and optional raw query string.
#[must_use]
pub fn split_uri(target: &str) -> (&str, Option<&str>) {
    match target.split_once('?') {
        Some((path, query)) => (if path.is_empty() { "/" } else { path }, Some(query)),
        None => (target, None),
    }
}

/// Parse a `Cookie` header value into name/value pairs.
#[must_use]
pub fn parse_cookies(header: &str) -> HeaderVec {
    let cookies: HeaderVec = header
        .split(';')
        .filter_map(|pair| {
            let mut parts = pair.trim().splitn(2, '=');
            let name = parts.next()?.trim();
            if name.is_empty() {
                return None;
            }
            let value = parts.next().unwrap_or("").trim().trim_matches('"');
            Some((Arc::from(name), value.to_string()))
        })
        .collect();
    debug!(
        cookie_count = cookies.len(),
        cookie_names = ?cookies.iter().map(|(k, _)| k.as_ref()).collect::<Vec<_>>(),
        "Cookies extracted"
    );
    cookies
}

/// Parse an encoded query string, keeping repeated keys in appearance order.
#[must_use]
pub fn parse_query_string(qs: &str) -> ParamVec {
    let params: ParamVec = url::form_urlencoded::parse(qs.trim_start_matches('?').as_bytes())
        .map(|(k, v)| (Arc::from(k.as_ref()), v.into_owned()))
        .collect();
    debug!(param_count = params.len(), "Query params parsed");
    params
}

/// Parse an `application/x-www-form-urlencoded` body.
#[must_use]
pub fn parse_form_body(body: &[u8]) -> ParamVec {
    url::form_urlencoded::parse(body)
        .map(|(k, v)| (Arc::from(k.as_ref()), v.into_owned()))
        .collect()
}

/// Lower-cased media type of a content type, without parameters.
///
/// `"Application/JSON; charset=utf-8"` becomes `"application/json"`.
#[must_use]
pub fn media_type(content_type: &str) -> String {
    content_type
        .split(';')
        .next()
        .unwrap_or("")
        .trim()
        .to_ascii_lowercase()
}

/// A named parameter of a content type, e.g. the multipart `boundary`.
#[must_use]
pub fn content_type_param(content_type: &str, name: &str) -> Option<String> {
    content_type.split(';').skip(1).find_map(|param| {
        let (k, v) = param.trim().split_once('=')?;
        if k.trim().eq_ignore_ascii_case(name) {
            Some(v.trim().trim_matches('"').to_string())
        } else {
            None
        }
    })
}
