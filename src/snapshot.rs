//! JSON page-load snapshots.
//!
//! A [`PageSnapshot`] is the on-disk form of one captured page load:
//!
//! ```json
//! {
//!   "primaryUrl": "http://example.com/",
//!   "onloadMillis": 1200,
//!   "viewport": { "width": 1024, "height": 768 },
//!   "resources": [
//!     { "url": "http://example.com/", "status": 200,
//!       "responseHeaders": [ { "name": "Content-Type", "value": "text/html" } ],
//!       "body": "<html>...</html>", "startTimeMillis": 0 }
//!   ],
//!   "dom": { "documentUrl": "http://example.com/", "elements": [] },
//!   "imageSizes": { "http://example.com/a.png": { "width": 42, "height": 23 } }
//! }
//! ```
//!
//! Binary bodies go in `bodyBytes` as an array of byte values. The DOM uses the schema
//! of [`crate::dom::json_dom`]. Without one, the primary document's markup is scanned into a
//! [`MarkupDocument`].

use crate::dom::{DomDocument, DomError, JsonDocument, MarkupDocument};
use crate::image_attributes::{MapImageAttributesFactory, SniffingImageAttributesFactory};
use crate::input::{ClientCharacteristics, InputError, OnloadState, PagespeedInput};
use crate::instrumentation::InstrumentationData;
use crate::resource::{Resource, ResourceType};
use memmap2::Mmap;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::io;
use std::path::Path;
use thiserror::Error;

/// Snapshots larger than this are memory-mapped instead of read.
const MMAP_THRESHOLD: u64 = 1024 * 1024;

#[derive(Debug, Error)]
pub enum SnapshotError {
    #[error("Failed to read snapshot {path}: {source}")]
    Io { source: io::Error, path: String },

    #[error("Invalid snapshot: {0}")]
    Json(#[from] serde_json::Error),

    #[error(transparent)]
    Dom(#[from] DomError),

    #[error("Unable to build input: {0}")]
    Input(#[from] InputError),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SnapshotHeader {
    pub name: String,
    pub value: String,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SnapshotResource {
    pub url: String,
    #[serde(default = "default_method")]
    pub method: String,
    #[serde(default)]
    pub status: i32,
    #[serde(default)]
    pub request_headers: Vec<SnapshotHeader>,
    #[serde(default)]
    pub response_headers: Vec<SnapshotHeader>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub request_body: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub body: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub body_bytes: Option<Vec<u8>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub start_time_millis: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub first_byte_millis: Option<i64>,
    /// Overrides the type sniffed from Content-Type
    #[serde(default, rename = "type", skip_serializing_if = "Option::is_none")]
    pub resource_type: Option<ResourceType>,
    #[serde(default)]
    pub lazy_loaded: bool,
}

fn default_method() -> String {
    "GET".to_string()
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SnapshotSize {
    pub width: u32,
    pub height: u32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SnapshotViewport {
    pub width: i32,
    pub height: i32,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PageSnapshot {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub primary_url: Option<String>,
    #[serde(default)]
    pub resources: Vec<SnapshotResource>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub dom: Option<serde_json::Value>,
    /// Natural image sizes by URL. When absent they are read from the image bodies.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub image_sizes: BTreeMap<String, SnapshotSize>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub onload_millis: Option<i64>,
    /// Only read when `onloadMillis` is absent.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub onload_state: Option<OnloadState>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub viewport: Option<SnapshotViewport>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub client: Option<ClientCharacteristics>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub timeline: Vec<InstrumentationData>,
}

impl PageSnapshot {
    pub fn from_json(json: &str) -> Result<Self, SnapshotError> {
        Ok(serde_json::from_str(json)?)
    }

    pub fn from_slice(bytes: &[u8]) -> Result<Self, SnapshotError> {
        Ok(serde_json::from_slice(bytes)?)
    }

    /// Read a snapshot file, memory-mapping large ones.
    pub fn load(path: &Path) -> Result<Self, SnapshotError> {
        let io_error = |source| SnapshotError::Io {
            source,
            path: path.display().to_string(),
        };
        let file_size = fs::metadata(path).map_err(io_error)?.len();

        if file_size > MMAP_THRESHOLD {
            let file = fs::File::open(path).map_err(io_error)?;
            // SAFETY: the mapping is only read for the duration of this call.
            let mmap = unsafe { Mmap::map(&file) }.map_err(io_error)?;
            Self::from_slice(&mmap)
        } else {
            let bytes = fs::read(path).map_err(io_error)?;
            Self::from_slice(&bytes)
        }
    }

    /// Build and freeze a [`PagespeedInput`]. `default_client` is used when the snapshot
    /// carries no client characteristics of its own.
    ///
    /// Resources the input refuses (empty or duplicate URLs, bad status codes) are
    /// skipped with a warning, as are a primary URL or viewport it rejects.
    pub fn into_input(self, default_client: &ClientCharacteristics) -> Result<PagespeedInput, SnapshotError> {
        let mut input = PagespeedInput::new();

        for snapshot_resource in self.resources {
            let url = snapshot_resource.url.clone();
            if let Err(e) = input.add_resource(snapshot_resource.into_resource()) {
                log::warn!("Skipping resource {url}: {e}");
            }
        }

        if let Some(url) = &self.primary_url
            && let Err(e) = input.set_primary_resource_url(url)
        {
            log::warn!("Ignoring primary URL {url}: {e}");
        }

        match (self.onload_millis, self.onload_state) {
            (Some(millis), _) if millis < 0 => log::warn!("Ignoring negative onload time {millis}"),
            (Some(millis), _) => input.set_onload_time_millis(millis)?,
            (None, Some(state)) => input.set_onload_state(state)?,
            (None, None) => {}
        }

        if let Some(viewport) = self.viewport
            && let Err(e) = input.set_viewport_width_and_height(viewport.width, viewport.height)
        {
            log::warn!("Ignoring viewport: {e}");
        }

        input.set_client_characteristics(self.client.unwrap_or_else(|| default_client.clone()))?;

        if self.image_sizes.is_empty() {
            input.acquire_image_attributes_factory(Box::new(SniffingImageAttributesFactory))?;
        } else {
            let mut factory = MapImageAttributesFactory::new();
            for (url, size) in &self.image_sizes {
                factory.insert(url, size.width, size.height);
            }
            input.acquire_image_attributes_factory(Box::new(factory))?;
        }

        if !self.timeline.is_empty() {
            input.acquire_instrumentation_data(self.timeline)?;
        }

        match self.dom {
            Some(dom) => {
                let document = JsonDocument::from_value(dom)?;
                input.acquire_dom_document(Box::new(document))?;
            }
            None => {
                if let Some(document) = markup_document(&input) {
                    log::debug!("No DOM in snapshot, scanning markup of {}", document.document_url());
                    input.acquire_dom_document(Box::new(document))?;
                }
            }
        }

        input.freeze()?;
        Ok(input)
    }
}

/// A DOM scanned from the primary document's HTML body, for captures without one.
fn markup_document(input: &PagespeedInput) -> Option<MarkupDocument> {
    let primary = input.resource_with_url(input.primary_resource_url()?)?;
    if primary.resource_type() != ResourceType::Html || primary.response_body().is_empty() {
        return None;
    }
    Some(MarkupDocument::parse(primary.request_url(), primary.response_body()))
}

impl SnapshotResource {
    fn into_resource(self) -> Resource {
        let mut resource = Resource::new();
        resource.set_request_url(&self.url);
        resource.set_request_method(&self.method);
        resource.set_response_status_code(self.status);
        for header in &self.request_headers {
            resource.add_request_header(&header.name, &header.value);
        }
        for header in &self.response_headers {
            resource.add_response_header(&header.name, &header.value);
        }
        if let Some(body) = self.request_body {
            resource.set_request_body(body);
        }
        match (self.body_bytes, self.body) {
            (Some(bytes), _) => resource.set_response_body(bytes),
            (None, Some(text)) => resource.set_response_body(text),
            (None, None) => {}
        }
        if let Some(start) = self.start_time_millis {
            resource.set_request_start_time_millis(start);
        }
        if let Some(first_byte) = self.first_byte_millis {
            resource.set_first_byte_millis(first_byte);
        }
        if let Some(resource_type) = self.resource_type {
            resource.set_resource_type(resource_type);
        }
        resource.set_lazy_loaded(self.lazy_loaded);
        resource
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::input::InputCapabilities;
    use pretty_assertions::assert_eq;
    use std::io::Write;

    const SNAPSHOT: &str = r#"{
        "primaryUrl": "http://example.com/",
        "onloadMillis": 500,
        "viewport": { "width": 1024, "height": 768 },
        "resources": [
            { "url": "http://example.com/", "status": 200, "startTimeMillis": 0,
              "responseHeaders": [ { "name": "Content-Type", "value": "text/html" } ],
              "body": "<html><body><img src=\"a.png\"></body></html>" },
            { "url": "http://example.com/a.png", "status": 200, "startTimeMillis": 10,
              "responseHeaders": [ { "name": "Content-Type", "value": "image/png" } ],
              "bodyBytes": [1, 2, 3] }
        ],
        "dom": { "documentUrl": "http://example.com/",
                 "elements": [ { "tag": "IMG", "attrs": { "src": "a.png" }, "width": 15, "height": 5 } ] },
        "imageSizes": { "http://example.com/a.png": { "width": 42, "height": 23 } }
    }"#;

    #[test]
    fn test_into_input() {
        let snapshot = PageSnapshot::from_json(SNAPSHOT).unwrap();
        let input = snapshot.into_input(&ClientCharacteristics::default()).unwrap();

        assert!(input.is_frozen());
        assert_eq!(input.num_resources(), 2);
        assert_eq!(input.primary_resource_url(), Some("http://example.com/"));
        assert_eq!(input.onload_millis(), Some(500));
        assert_eq!(input.viewport_width_and_height(), Some((1024, 768)));

        let image = input.resource_with_url("http://example.com/a.png").unwrap();
        assert_eq!(image.resource_type(), ResourceType::Image);
        assert_eq!(image.response_body(), &[1, 2, 3]);
        let attrs = input.new_image_attributes(image).unwrap();
        assert_eq!((attrs.width, attrs.height), (42, 23));

        let capabilities = input.estimate_capabilities();
        assert!(capabilities.satisfies(
            InputCapabilities::DOM | InputCapabilities::ONLOAD | InputCapabilities::REQUEST_START_TIMES
        ));
    }

    #[test]
    fn test_duplicate_resource_skipped() {
        let json = r#"{ "resources": [
            { "url": "http://example.com/", "status": 200 },
            { "url": "http://example.com/", "status": 200 }
        ] }"#;
        let input = PageSnapshot::from_json(json)
            .unwrap()
            .into_input(&ClientCharacteristics::default())
            .unwrap();
        assert_eq!(input.num_resources(), 1);
    }

    #[test]
    fn test_snapshot_client_wins() {
        let json = r#"{ "resources": [ { "url": "http://example.com/", "status": 200 } ],
                        "client": { "mobile": true } }"#;
        let input = PageSnapshot::from_json(json)
            .unwrap()
            .into_input(&ClientCharacteristics::default())
            .unwrap();
        assert!(input.client_characteristics().mobile);
    }

    #[test]
    fn test_markup_dom_without_snapshot_dom() {
        let json = r#"{ "primaryUrl": "http://example.com/",
            "resources": [
                { "url": "http://example.com/", "status": 200,
                  "responseHeaders": [ { "name": "Content-Type", "value": "text/html" } ],
                  "body": "<html><body><img src=\"a.png\"></body></html>" }
            ] }"#;
        let input = PageSnapshot::from_json(json)
            .unwrap()
            .into_input(&ClientCharacteristics::default())
            .unwrap();
        let document = input.dom_document().unwrap();
        assert_eq!(document.document_url(), "http://example.com/");

        let mut tags = Vec::new();
        document.traverse(&mut |el: &dyn crate::dom::DomElement| tags.push(el.tag_name()));
        assert_eq!(tags, vec!["HTML", "BODY", "IMG"]);
    }

    #[test]
    fn test_invalid_json() {
        assert!(matches!(PageSnapshot::from_json("{ nope"), Err(SnapshotError::Json(_))));
    }

    #[test]
    fn test_load_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(SNAPSHOT.as_bytes()).unwrap();
        let snapshot = PageSnapshot::load(file.path()).unwrap();
        assert_eq!(snapshot.resources.len(), 2);

        let missing = PageSnapshot::load(Path::new("/nonexistent/snapshot.json"));
        assert!(matches!(missing, Err(SnapshotError::Io { .. })));
    }
}
