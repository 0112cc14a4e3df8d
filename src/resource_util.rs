//! Status code classification, size estimates and caching heuristics for resources.

use crate::resource::{HeaderMap, Resource, ResourceType};
use crate::uri_util;
use std::collections::BTreeMap;

/// Colon plus CRLF for each header line.
const HEADER_OVERHEAD: usize = 3;

pub type DirectiveMap = BTreeMap<String, String>;

pub fn is_redirect_status_code(code: i32) -> bool {
    matches!(code, 301 | 302 | 303 | 307 | 308)
}

/// Status codes whose response carries (or, for 304, stands for) a real body.
pub fn is_body_status_code(code: i32) -> bool {
    matches!(code, 200 | 203 | 206 | 304)
}

pub fn is_cacheable_response_status_code(code: i32) -> bool {
    matches!(code, 200 | 203 | 206 | 300 | 301 | 304 | 410)
}

fn estimate_headers_bytes(headers: &HeaderMap) -> usize {
    headers
        .iter()
        .map(|(name, value)| HEADER_OVERHEAD + name.len() + value.len())
        .sum()
}

pub fn estimate_request_bytes(resource: &Resource) -> usize {
    let request_line =
        resource.request_method().len() + 1 + resource.request_url().len() + 1 + resource.request_protocol().len() + 2;
    request_line + estimate_headers_bytes(resource.request_headers()) + resource.request_body().len()
}

pub fn estimate_response_bytes(resource: &Resource) -> usize {
    resource.response_body().len()
        + resource.response_protocol().len()
        + estimate_headers_bytes(resource.response_headers())
}

/// Parse a comma separated directive header such as `Cache-Control`. Keys are
/// lowercased; quoted values are unquoted. Returns `None` for malformed input.
pub fn header_directives(header: &str) -> Option<DirectiveMap> {
    let mut directives = DirectiveMap::new();
    for part in header.split(',') {
        let part = part.trim();
        if part.is_empty() {
            continue;
        }
        let (key, value) = match part.split_once('=') {
            Some((key, value)) => (key.trim(), value.trim().trim_matches('"')),
            None => (part, ""),
        };
        if key.is_empty() || key.contains(char::is_whitespace) {
            return None;
        }
        directives.insert(key.to_ascii_lowercase(), value.to_string());
    }
    Some(directives)
}

pub fn has_explicit_no_cache_directive(resource: &Resource) -> bool {
    let Some(directives) = header_directives(&resource.response_header("Cache-Control")) else {
        log::warn!("Failed to parse cache control directives for {}", resource.request_url());
        return true;
    };
    if directives.contains_key("no-cache") || directives.contains_key("no-store") {
        return true;
    }
    resource.response_header("Pragma").contains("no-cache") || resource.response_header("Vary").contains('*')
}

/// Explicit freshness lifetime from `Cache-Control: max-age`, or zero for an `Expires`
/// value that can only mean "already expired". `None` when the response does not say.
pub fn freshness_lifetime_millis(resource: &Resource) -> Option<i64> {
    if let Some(directives) = header_directives(&resource.response_header("Cache-Control"))
        && let Some(max_age) = directives.get("max-age")
        && let Ok(seconds) = max_age.parse::<i64>()
    {
        return Some(seconds.saturating_mul(1000));
    }
    let expires = resource.response_header("Expires");
    let expires = expires.trim();
    if expires.is_empty() {
        return None;
    }
    if expires == "0" || expires.starts_with('-') {
        return Some(0);
    }
    None
}

pub fn is_likely_static_resource_type(resource_type: ResourceType) -> bool {
    matches!(
        resource_type,
        ResourceType::Image | ResourceType::Css | ResourceType::Js | ResourceType::Redirect
    )
}

/// Heuristic: a cacheable response of a usually-static type with no query string and
/// no directive against caching.
pub fn is_likely_static_resource(resource: &Resource) -> bool {
    if has_explicit_no_cache_directive(resource) {
        return false;
    }
    let code = resource.response_status_code();
    if !is_cacheable_response_status_code(code) {
        return false;
    }
    if freshness_lifetime_millis(resource).is_some_and(|lifetime| lifetime <= 0) {
        return false;
    }
    let type_heuristic_applies = !matches!(code, 300 | 301 | 410);
    if type_heuristic_applies && !is_likely_static_resource_type(resource.resource_type()) {
        return false;
    }
    !resource.request_url().contains('?')
}

/// The absolute target of a redirect response, if it has a resolvable `Location`.
pub fn get_redirected_url(resource: &Resource) -> Option<String> {
    if !is_redirect_status_code(resource.response_status_code()) {
        return None;
    }
    let location = resource.response_header("Location");
    if location.is_empty() {
        log::info!("Redirect {} has no Location header", resource.request_url());
        return None;
    }
    let resolved = uri_util::resolve_uri(&location, resource.request_url());
    if resolved.is_none() {
        log::info!("Unable to resolve Location {} of {}", location, resource.request_url());
    }
    resolved
}
