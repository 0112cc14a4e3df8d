//! One captured HTTP request/response exchange.

use crate::resource_util;
use crate::uri_util;
use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ResourceType {
    Html,
    Text,
    Css,
    Image,
    Js,
    Redirect,
    Flash,
    Media,
    #[default]
    Other,
}

impl ResourceType {
    pub const ALL: [ResourceType; 9] = [
        ResourceType::Html,
        ResourceType::Text,
        ResourceType::Css,
        ResourceType::Image,
        ResourceType::Js,
        ResourceType::Redirect,
        ResourceType::Flash,
        ResourceType::Media,
        ResourceType::Other,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            ResourceType::Html => "html",
            ResourceType::Text => "text",
            ResourceType::Css => "css",
            ResourceType::Image => "image",
            ResourceType::Js => "js",
            ResourceType::Redirect => "redirect",
            ResourceType::Flash => "flash",
            ResourceType::Media => "media",
            ResourceType::Other => "other",
        }
    }
}

impl fmt::Display for ResourceType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ImageType {
    Png,
    Gif,
    Jpeg,
    Svg,
    Unknown,
}

/// Ordered header list with case-insensitive lookup. Repeated headers are kept as
/// separate entries and joined with `,` on lookup.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct HeaderMap {
    entries: Vec<(String, String)>,
}

impl HeaderMap {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, name: &str, value: &str) {
        self.entries.push((name.to_string(), value.to_string()));
    }

    /// Empty string when the header is absent.
    pub fn get(&self, name: &str) -> String {
        let values: Vec<&str> = self
            .entries
            .iter()
            .filter(|(key, _)| key.eq_ignore_ascii_case(name))
            .map(|(_, value)| value.as_str())
            .collect();
        values.join(",")
    }

    pub fn contains(&self, name: &str) -> bool {
        self.entries.iter().any(|(key, _)| key.eq_ignore_ascii_case(name))
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// A JavaScript call observed during the page load, such as a `document.write`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JavaScriptCallInfo {
    pub id: String,
    pub document_url: String,
    pub line_number: u32,
    #[serde(default)]
    pub args: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct Resource {
    request_url: String,
    request_method: String,
    request_protocol: String,
    request_headers: HeaderMap,
    request_body: Vec<u8>,
    response_status_code: i32,
    response_protocol: String,
    response_headers: HeaderMap,
    response_body: Vec<u8>,
    explicit_type: Option<ResourceType>,
    request_start_time_millis: Option<i64>,
    first_byte_millis: Option<i64>,
    lazy_loaded: bool,
    javascript_calls: Vec<JavaScriptCallInfo>,
}

impl Resource {
    pub fn new() -> Self {
        Self {
            request_method: "GET".to_string(),
            request_protocol: "HTTP/1.1".to_string(),
            response_protocol: "HTTP/1.1".to_string(),
            ..Default::default()
        }
    }

    pub fn request_url(&self) -> &str {
        &self.request_url
    }

    pub fn set_request_url(&mut self, url: &str) {
        self.request_url = url.to_string();
    }

    pub fn request_method(&self) -> &str {
        &self.request_method
    }

    pub fn set_request_method(&mut self, method: &str) {
        self.request_method = method.to_string();
    }

    pub fn request_protocol(&self) -> &str {
        &self.request_protocol
    }

    pub fn set_request_protocol(&mut self, protocol: &str) {
        self.request_protocol = protocol.to_string();
    }

    pub fn request_headers(&self) -> &HeaderMap {
        &self.request_headers
    }

    pub fn request_header(&self, name: &str) -> String {
        self.request_headers.get(name)
    }

    pub fn add_request_header(&mut self, name: &str, value: &str) {
        self.request_headers.add(name, value);
    }

    pub fn request_body(&self) -> &[u8] {
        &self.request_body
    }

    pub fn set_request_body(&mut self, body: impl Into<Vec<u8>>) {
        self.request_body = body.into();
    }

    pub fn response_status_code(&self) -> i32 {
        self.response_status_code
    }

    pub fn set_response_status_code(&mut self, code: i32) {
        self.response_status_code = code;
    }

    pub fn response_protocol(&self) -> &str {
        &self.response_protocol
    }

    pub fn set_response_protocol(&mut self, protocol: &str) {
        self.response_protocol = protocol.to_string();
    }

    pub fn response_headers(&self) -> &HeaderMap {
        &self.response_headers
    }

    pub fn response_header(&self, name: &str) -> String {
        self.response_headers.get(name)
    }

    pub fn add_response_header(&mut self, name: &str, value: &str) {
        self.response_headers.add(name, value);
    }

    pub fn response_body(&self) -> &[u8] {
        &self.response_body
    }

    pub fn set_response_body(&mut self, body: impl Into<Vec<u8>>) {
        self.response_body = body.into();
    }

    pub fn request_start_time_millis(&self) -> Option<i64> {
        self.request_start_time_millis
    }

    /// Negative start times are clamped to zero.
    pub fn set_request_start_time_millis(&mut self, millis: i64) {
        if millis < 0 {
            log::warn!("Negative request start time {} for {}", millis, self.request_url);
        }
        self.request_start_time_millis = Some(millis.max(0));
    }

    pub fn first_byte_millis(&self) -> Option<i64> {
        self.first_byte_millis
    }

    pub fn set_first_byte_millis(&mut self, millis: i64) {
        self.first_byte_millis = Some(millis.max(0));
    }

    pub fn is_lazy_loaded(&self) -> bool {
        self.lazy_loaded
    }

    pub fn set_lazy_loaded(&mut self, lazy: bool) {
        self.lazy_loaded = lazy;
    }

    pub fn javascript_calls(&self) -> &[JavaScriptCallInfo] {
        &self.javascript_calls
    }

    pub fn add_javascript_call(&mut self, call: JavaScriptCallInfo) {
        self.javascript_calls.push(call);
    }

    /// Explicitly set the type. Ignored for redirects and for status codes that carry no
    /// body, where the status code decides the type.
    pub fn set_resource_type(&mut self, resource_type: ResourceType) {
        if resource_type == ResourceType::Redirect {
            log::error!("Unable to set resource type to redirect for {}", self.request_url);
            return;
        }
        if self.resource_type() == ResourceType::Redirect {
            log::error!("Unable to set resource type of redirect {}", self.request_url);
            return;
        }
        if !resource_util::is_body_status_code(self.response_status_code) {
            log::info!(
                "Unable to set resource type for {} with status {}",
                self.request_url,
                self.response_status_code
            );
            return;
        }
        self.explicit_type = Some(resource_type);
    }

    pub fn has_explicit_type(&self) -> bool {
        self.explicit_type.is_some()
    }

    /// Status code first, then any explicitly assigned type, then the Content-Type header.
    pub fn resource_type(&self) -> ResourceType {
        if resource_util::is_redirect_status_code(self.response_status_code) {
            return ResourceType::Redirect;
        }
        if !resource_util::is_body_status_code(self.response_status_code) {
            return ResourceType::Other;
        }
        if let Some(explicit) = self.explicit_type {
            return explicit;
        }
        type_from_content_type(&self.response_header("Content-Type"))
    }

    pub fn image_type(&self) -> ImageType {
        if self.resource_type() != ResourceType::Image {
            log::debug!("Non-image resource {} asked for image type", self.request_url);
            return ImageType::Unknown;
        }
        let content_type = self.response_header("Content-Type");
        let mime = mime_essence(&content_type);
        if mime.is_empty() {
            let path = uri_util::path(&self.request_url).unwrap_or_default().to_ascii_lowercase();
            return if path.ends_with(".png") {
                ImageType::Png
            } else if path.ends_with(".gif") {
                ImageType::Gif
            } else if path.ends_with(".jpg") || path.ends_with(".jpeg") {
                ImageType::Jpeg
            } else if path.ends_with(".svg") {
                ImageType::Svg
            } else {
                ImageType::Unknown
            };
        }
        match mime.as_str() {
            "image/png" => ImageType::Png,
            "image/gif" => ImageType::Gif,
            "image/jpg" | "image/jpeg" => ImageType::Jpeg,
            "image/svg+xml" => ImageType::Svg,
            _ => ImageType::Unknown,
        }
    }

    pub fn host(&self) -> Option<String> {
        uri_util::host(&self.request_url)
    }

    pub fn estimate_request_bytes(&self) -> usize {
        resource_util::estimate_request_bytes(self)
    }

    pub fn estimate_response_bytes(&self) -> usize {
        resource_util::estimate_response_bytes(self)
    }

    /// Only meaningful when both resources carry a start time; otherwise logs and
    /// returns false.
    pub fn is_request_start_time_less_than(&self, other: &Resource) -> bool {
        match (self.request_start_time_millis, other.request_start_time_millis) {
            (Some(a), Some(b)) => a < b,
            _ => {
                log::error!(
                    "Unable to compare request start times for {} and {}",
                    self.request_url,
                    other.request_url
                );
                false
            }
        }
    }
}

fn mime_essence(content_type: &str) -> String {
    content_type
        .split(';')
        .next()
        .unwrap_or_default()
        .trim()
        .to_ascii_lowercase()
}

fn is_js_mime(mime: &str, prefix: &str) -> bool {
    let sub = &mime[prefix.len()..];
    sub.starts_with("javascript")
        || sub.starts_with("x-javascript")
        || mime.ends_with("json")
        || mime.ends_with("ecmascript")
        || matches!(sub, "livescript" | "jscript" | "js" | "x-js")
}

fn type_from_content_type(content_type: &str) -> ResourceType {
    let mime = mime_essence(content_type);
    if mime.starts_with("text/") {
        return match mime.as_str() {
            "text/html" | "text/html-sandboxed" => ResourceType::Html,
            "text/css" => ResourceType::Css,
            m if is_js_mime(m, "text/") => ResourceType::Js,
            _ => ResourceType::Text,
        };
    }
    if mime.starts_with("image/") {
        return ResourceType::Image;
    }
    if mime.starts_with("video/") || mime.starts_with("audio/") {
        return ResourceType::Media;
    }
    if mime.starts_with("application/") {
        return match mime.as_str() {
            m if is_js_mime(m, "application/") => ResourceType::Js,
            "application/xhtml+xml" | "application/ce-html+xml" => ResourceType::Html,
            "application/xml" => ResourceType::Text,
            "application/x-shockwave-flash" => ResourceType::Flash,
            _ => ResourceType::Other,
        };
    }
    ResourceType::Other
}
