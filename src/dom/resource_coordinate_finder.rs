//! Where on the page each image resource was drawn.

use super::{DomDocument, DomElement, DomRect, external_resource_url};
use crate::input::PagespeedInput;
use crate::resource::{Resource, ResourceType};
use std::collections::BTreeMap;

/// Rectangles in top-level document coordinates, keyed by resource URL.
pub type ImageRects = BTreeMap<String, Vec<DomRect>>;

#[derive(Debug, Default)]
pub struct OnAndOffscreenImages<'a> {
    /// Sorted by URL.
    pub onscreen: Vec<&'a Resource>,
    /// Sorted by URL.
    pub offscreen: Vec<&'a Resource>,
}

/// Collect the rectangle of every image element whose position and size are known,
/// descending into frames with their origin translated by the frame element's offset.
pub fn find_image_rects(input: &PagespeedInput, document: &dyn DomDocument) -> ImageRects {
    let mut rects = ImageRects::new();
    collect_rects(input, document, 0, 0, &mut rects);
    rects
}

fn collect_rects(input: &PagespeedInput, document: &dyn DomDocument, tx: i32, ty: i32, rects: &mut ImageRects) {
    document.traverse(&mut |element: &dyn DomElement| {
        if let Some(url) = external_resource_url(document, element) {
            record_image_rect(input, element, &url, tx, ty, rects);
        }
        if !matches!(element.tag_name().as_str(), "IFRAME" | "FRAME") {
            return;
        }
        let Some(child) = element.content_document() else {
            return;
        };
        if let (Some(x), Some(y)) = (element.x().ok(), element.y().ok()) {
            collect_rects(input, child.as_ref(), tx.saturating_add(x), ty.saturating_add(y), rects);
        }
    });
}

fn record_image_rect(
    input: &PagespeedInput,
    element: &dyn DomElement,
    url: &str,
    tx: i32,
    ty: i32,
    rects: &mut ImageRects,
) {
    let Some(resource) = input.resource_with_url(url) else {
        return;
    };
    let resource = if resource.resource_type() == ResourceType::Redirect {
        input.final_redirect_target(resource)
    } else {
        resource
    };
    if resource.resource_type() != ResourceType::Image {
        return;
    }
    let (Some(x), Some(y), Some(width), Some(height)) = (
        element.x().ok(),
        element.y().ok(),
        element.actual_width().ok(),
        element.actual_height().ok(),
    ) else {
        return;
    };
    rects
        .entry(resource.request_url().to_string())
        .or_default()
        .push(DomRect::new(x.saturating_add(tx), y.saturating_add(ty), width, height));
}

/// Split the page's images by whether any of their rectangles intersects the viewport.
///
/// `None` when there is no DOM or the viewport is empty.
pub fn find_on_and_offscreen_image_resources(input: &PagespeedInput) -> Option<OnAndOffscreenImages<'_>> {
    let document = input.dom_document()?;
    let (width, height) = input.viewport_width_and_height()?;
    let viewport = DomRect::new(0, 0, width, height);
    if viewport.is_empty() {
        return None;
    }

    let mut images = OnAndOffscreenImages::default();
    for (url, rects) in find_image_rects(input, document) {
        let Some(resource) = input.resource_with_url(&url) else {
            continue;
        };
        if rects.iter().any(|rect| !viewport.intersection(rect).is_empty()) {
            images.onscreen.push(resource);
        } else {
            images.offscreen.push(resource);
        }
    }
    Some(images)
}
