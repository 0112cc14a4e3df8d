//! Read-only view of a page's element tree.
//!
//! Rules only ever see the [`DomDocument`] and [`DomElement`] traits. A backend that
//! cannot answer a geometry question says so with [`DomStatus::Unsupported`], which is
//! distinct from an element that simply has no value ([`DomStatus::NotApplicable`]).

pub mod json_dom;
pub mod markup_dom;
pub mod resource_coordinate_finder;

pub use json_dom::JsonDocument;
pub use markup_dom::MarkupDocument;
pub use resource_coordinate_finder::{ImageRects, OnAndOffscreenImages, find_on_and_offscreen_image_resources};

use crate::uri_util;
use thiserror::Error;

/// Outcome of a query that not every backend can answer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DomStatus<T> {
    Success(T),
    /// The backend understood the question, but this element has no such value.
    NotApplicable,
    /// The backend has no way to answer this question at all.
    Unsupported,
}

impl<T> DomStatus<T> {
    pub fn ok(self) -> Option<T> {
        match self {
            DomStatus::Success(value) => Some(value),
            _ => None,
        }
    }

    pub fn is_success(&self) -> bool {
        matches!(self, DomStatus::Success(_))
    }

    pub fn map<U>(self, f: impl FnOnce(T) -> U) -> DomStatus<U> {
        match self {
            DomStatus::Success(value) => DomStatus::Success(f(value)),
            DomStatus::NotApplicable => DomStatus::NotApplicable,
            DomStatus::Unsupported => DomStatus::Unsupported,
        }
    }
}

impl<T> From<Option<T>> for DomStatus<T> {
    fn from(value: Option<T>) -> Self {
        value.map_or(DomStatus::NotApplicable, DomStatus::Success)
    }
}

#[derive(Debug, Error)]
pub enum DomError {
    #[error("Invalid JSON DOM: {0}")]
    Json(#[from] serde_json::Error),
}

pub trait DomElementVisitor {
    fn visit(&mut self, element: &dyn DomElement);
}

impl<F: FnMut(&dyn DomElement)> DomElementVisitor for F {
    fn visit(&mut self, element: &dyn DomElement) {
        self(element)
    }
}

pub trait DomDocument: Send + Sync + std::fmt::Debug {
    fn document_url(&self) -> String;

    fn base_url(&self) -> String;

    /// Pre-order traversal, calling the visitor once per element.
    fn traverse(&self, visitor: &mut dyn DomElementVisitor);

    fn width(&self) -> DomStatus<i32> {
        DomStatus::Unsupported
    }

    fn height(&self) -> DomStatus<i32> {
        DomStatus::Unsupported
    }

    /// Resolve a reference found in this document against its base URL.
    fn resolve_uri(&self, uri: &str) -> Option<String> {
        uri_util::resolve_uri(uri, &self.base_url())
    }

    fn clone_document(&self) -> Box<dyn DomDocument>;
}

pub trait DomElement {
    /// The document loaded in a FRAME or IFRAME. Every call returns a new, independent
    /// value owned by the caller.
    fn content_document(&self) -> Option<Box<dyn DomDocument>>;

    /// Always upper case.
    fn tag_name(&self) -> String;

    fn attribute(&self, name: &str) -> Option<String>;

    fn css_property(&self, _name: &str) -> DomStatus<String> {
        DomStatus::Unsupported
    }

    fn x(&self) -> DomStatus<i32> {
        DomStatus::Unsupported
    }

    fn y(&self) -> DomStatus<i32> {
        DomStatus::Unsupported
    }

    fn actual_width(&self) -> DomStatus<i32> {
        DomStatus::Unsupported
    }

    fn actual_height(&self) -> DomStatus<i32> {
        DomStatus::Unsupported
    }

    fn has_width_specified(&self) -> DomStatus<bool> {
        DomStatus::Unsupported
    }

    fn has_height_specified(&self) -> DomStatus<bool> {
        DomStatus::Unsupported
    }
}

/// Resolved URL of the external resource `element` loads, if it loads one: `src` of
/// IMG, SCRIPT, IFRAME, FRAME and EMBED, or `href` of a stylesheet LINK.
///
/// An empty reference is skipped, since resolving it would name the document itself.
/// Inline `data:` URLs are not external.
pub fn external_resource_url(document: &dyn DomDocument, element: &dyn DomElement) -> Option<String> {
    let uri = match element.tag_name().as_str() {
        "IMG" | "SCRIPT" | "IFRAME" | "FRAME" | "EMBED" => element.attribute("src")?,
        "LINK" => {
            let rel = element.attribute("rel")?;
            if !rel.split_ascii_whitespace().any(|r| r.eq_ignore_ascii_case("stylesheet")) {
                return None;
            }
            element.attribute("href")?
        }
        _ => return None,
    };
    if uri.trim().is_empty() {
        return None;
    }
    let Some(url) = document.resolve_uri(&uri) else {
        log::info!("Unable to resolve {uri} against {}", document.base_url());
        return None;
    };
    uri_util::is_external_resource_url(&url).then_some(url)
}

/// Visit every external resource reference in `document` and, depth first, in the
/// documents of its frames.
pub fn traverse_external_resources(document: &dyn DomDocument, visit: &mut dyn FnMut(&dyn DomElement, &str)) {
    document.traverse(&mut |element: &dyn DomElement| {
        if let Some(url) = external_resource_url(document, element) {
            visit(element, &url);
        }
        if matches!(element.tag_name().as_str(), "IFRAME" | "FRAME")
            && let Some(child) = element.content_document()
        {
            traverse_external_resources(child.as_ref(), visit);
        }
    });
}

/// True when `value` is a usable dimension: present and not blank.
pub(crate) fn is_specified(value: Option<&str>) -> bool {
    value.is_some_and(|v| !v.trim().is_empty())
}

/// Integer rectangle in document coordinates.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct DomRect {
    pub x: i32,
    pub y: i32,
    pub width: i32,
    pub height: i32,
}

impl DomRect {
    pub fn new(x: i32, y: i32, width: i32, height: i32) -> Self {
        Self { x, y, width, height }
    }

    pub fn is_empty(&self) -> bool {
        self.width <= 0 || self.height <= 0
    }

    pub fn right(&self) -> i32 {
        self.x.saturating_add(self.width)
    }

    pub fn bottom(&self) -> i32 {
        self.y.saturating_add(self.height)
    }

    pub fn intersection(&self, other: &DomRect) -> DomRect {
        let x = self.x.max(other.x);
        let y = self.y.max(other.y);
        let right = self.right().min(other.right());
        let bottom = self.bottom().min(other.bottom());
        if right <= x || bottom <= y {
            return DomRect::default();
        }
        DomRect::new(x, y, right - x, bottom - y)
    }
}
